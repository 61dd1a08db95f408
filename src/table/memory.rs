use crate::error::LegacyError;
use crate::table::column::ColumnDescriptor;
use crate::table::column::ColumnType;
use crate::table::value::FieldValue;
use crate::table::RecordCursor;
use crate::table::TableFile;
use crate::table::TableSource;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

/// A table held in memory.
///
/// Cells can be marked unreadable, and the table can be made to fail while
/// advancing or while opening, to exercise the failure paths of callers.
#[derive(Clone, Debug, Default)]
pub struct MemoryTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Vec<Result<FieldValue, String>>>,
    advance_failure: Option<usize>,
    open_failure: Option<String>,
}

impl MemoryTable {
    /// Creates an empty table with the given columns.
    pub fn new(columns: &[(&str, ColumnType)]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(name, kind)| ColumnDescriptor::new(name, *kind, 0, 0))
                .collect(),
            ..Self::default()
        }
    }

    /// Appends a row of raw values.
    pub fn row(mut self, values: Vec<FieldValue>) -> Self {
        self.rows.push(values.into_iter().map(Ok).collect());
        self
    }

    /// Appends a row of text values.
    pub fn text_row(self, values: &[&str]) -> Self {
        self.row(values.iter().map(|value| FieldValue::Text(value.to_string())).collect())
    }

    /// Makes one cell fail to decode.
    pub fn broken_cell(mut self, row: usize, column: usize) -> Self {
        if let Some(cell) = self.rows.get_mut(row).and_then(|row| row.get_mut(column)) {
            *cell = Err(format!("unreadable cell at row {row}, column {column}"));
        }
        self
    }

    /// Makes `advance` fail instead of moving onto the given row.
    pub fn fail_advance_at(mut self, row: usize) -> Self {
        self.advance_failure = Some(row);
        self
    }

    /// Makes `open` fail with the given message.
    pub fn fail_open(mut self, message: &str) -> Self {
        self.open_failure = Some(message.to_owned());
        self
    }
}

/// Serves [`MemoryTable`]s by path.
#[derive(Clone, Debug, Default)]
pub struct MemoryTableSource {
    tables: HashMap<PathBuf, Arc<MemoryTable>>,
}

impl MemoryTableSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<P: AsRef<Path>>(mut self, path: P, table: MemoryTable) -> Self {
        self.tables.insert(path.as_ref().to_owned(), Arc::new(table));
        self
    }
}

impl TableSource for MemoryTableSource {
    fn open(&self, path: &Path) -> Result<Box<dyn RecordCursor>, LegacyError> {
        let table = self
            .tables
            .get(path)
            .ok_or_else(|| LegacyError::FileNotFound { path: path.to_owned() })?;
        if let Some(message) = &table.open_failure {
            Err(std::io::Error::new(ErrorKind::InvalidData, message.to_owned()))?
        }
        Ok(Box::new(MemoryCursor {
            table: Arc::clone(table),
            current: None,
            next: 0,
        }))
    }

    fn inspect(&self, path: &Path) -> Option<TableFile> {
        self.tables.get(path).map(|table| TableFile {
            size: (table.rows.len() * table.columns.len().max(1)) as u64,
            modified: None,
        })
    }
}

struct MemoryCursor {
    table: Arc<MemoryTable>,
    current: Option<usize>,
    next: usize,
}

impl RecordCursor for MemoryCursor {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.table.columns
    }

    fn record_count(&self) -> u32 {
        self.table.rows.len() as u32
    }

    fn advance(&mut self) -> Result<bool, LegacyError> {
        if self.table.advance_failure == Some(self.next) {
            Err(std::io::Error::new(ErrorKind::InvalidData, "stream corrupted"))?
        }
        if self.next < self.table.rows.len() {
            self.current = Some(self.next);
            self.next += 1;
            Ok(true)
        } else {
            self.current = None;
            Ok(false)
        }
    }

    fn value(&self, ordinal: usize) -> Result<FieldValue, LegacyError> {
        let row = self.current.ok_or_else(|| LegacyError::RowDecode {
            row: self.next,
            message: "no current record".to_owned(),
        })?;
        match self.table.rows[row].get(ordinal) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(LegacyError::RowDecode {
                row,
                message: message.to_owned(),
            }),
            None if ordinal < self.table.columns.len() => Ok(FieldValue::Null),
            None => Err(LegacyError::UnknownColumn(format!("#{ordinal}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_cursor_walks_rows() {
        let source = MemoryTableSource::new().with_table(
            "/mem/t.dbf",
            MemoryTable::new(&[("CODE", ColumnType::Character), ("NAME", ColumnType::Character)])
                .text_row(&["A", "Alpha"])
                .text_row(&["B"])
                .broken_cell(0, 1),
        );
        let mut cursor = source.open(Path::new("/mem/t.dbf")).unwrap();
        assert_eq!(cursor.record_count(), 2);
        assert!(cursor.value(0).is_err());
        assert!(cursor.advance().unwrap());
        assert_eq!(cursor.value(0).unwrap(), FieldValue::Text("A".to_owned()));
        assert!(cursor.value(1).is_err());
        assert!(cursor.advance().unwrap());
        assert_eq!(cursor.value(1).unwrap(), FieldValue::Null);
        assert!(!cursor.advance().unwrap());
    }

    #[test]
    fn memory_source_failures() {
        let source = MemoryTableSource::new()
            .with_table("/mem/bad.dbf", MemoryTable::new(&[]).fail_open("bad header"))
            .with_table(
                "/mem/corrupt.dbf",
                MemoryTable::new(&[("CODE", ColumnType::Character)])
                    .text_row(&["A"])
                    .fail_advance_at(0),
            );
        assert!(matches!(
            source.open(Path::new("/mem/none.dbf")).err(),
            Some(LegacyError::FileNotFound { .. })
        ));
        assert!(matches!(
            source.open(Path::new("/mem/bad.dbf")).err(),
            Some(LegacyError::IoError(_))
        ));
        let mut cursor = source.open(Path::new("/mem/corrupt.dbf")).unwrap();
        assert!(cursor.advance().is_err());
        assert!(source.inspect(Path::new("/mem/none.dbf")).is_none());
        assert!(source.inspect(Path::new("/mem/bad.dbf")).is_some());
    }
}
