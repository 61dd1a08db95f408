use crate::error::LegacyError;
use crate::helpers::dbf::DbfReader;
use crate::table::column::ColumnDescriptor;
use crate::table::value::FieldValue;
use crate::table::RecordCursor;
use crate::table::TableSource;
use encoding_rs::Encoding;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;
use tracing::warn;

/// Opens dBase / FoxPro tables from disk, read-only.
#[derive(Clone, Debug, Default)]
pub struct DbfTableSource {
    /// Text encoding overriding the header language driver
    encoding: Option<&'static Encoding>,
    /// Surface records carrying the deletion flag
    include_deleted: bool,
}

impl DbfTableSource {
    pub fn new(encoding: Option<&'static Encoding>) -> Self {
        Self {
            encoding,
            include_deleted: false,
        }
    }

    pub fn include_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }
}

impl TableSource for DbfTableSource {
    fn open(&self, path: &Path) -> Result<Box<dyn RecordCursor>, LegacyError> {
        if !path.is_file() {
            Err(LegacyError::FileNotFound { path: path.to_owned() })?
        }
        let mut reader = DbfReader::open(path, self.encoding)?;
        reader.include_deleted = self.include_deleted;
        debug!(
            path = %path.display(),
            version = reader.header.version,
            records = reader.header.record_count,
            last_update = ?reader.header.last_update,
            encoding = reader.encoding.name(),
            "opened table"
        );
        for warning in reader.warnings() {
            warn!(path = %path.display(), "{warning}");
        }
        let columns = reader.fields.iter().map(|field| field.column.clone()).collect();
        Ok(Box::new(DbfCursor { reader, columns }))
    }
}

/// Cursor over one open DBF file
struct DbfCursor {
    reader: DbfReader<BufReader<File>>,
    columns: Vec<ColumnDescriptor>,
}

impl RecordCursor for DbfCursor {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn record_count(&self) -> u32 {
        self.reader.header.record_count
    }

    fn advance(&mut self) -> Result<bool, LegacyError> {
        self.reader.next()
    }

    fn value(&self, ordinal: usize) -> Result<FieldValue, LegacyError> {
        Ok(self.reader.decode(ordinal)?)
    }

    fn is_deleted(&self) -> bool {
        self.reader.is_deleted()
    }

    fn warnings(&self) -> Vec<String> {
        self.reader.warnings()
    }
}
