//! # Schema Diagnostics
//!
//! Operator-facing inspection of one legacy table: existence, size, column
//! catalog and conformance to an expected column list. [`SchemaDiagnostic::diagnose`]
//! never fails; broken tables become data in the returned [`DiagnosticReport`].
use crate::error::LegacyError;
use crate::error::ResultPath;
use crate::table::accessor::Row;
use crate::table::column::ColumnDescriptor;
use crate::table::TableSource;
use chrono::DateTime;
use chrono::Local;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tracing::debug;
use tracing::debug_span;
use tracing::info;
use tracing::warn;
use tracing::Span;

/// Progress of a diagnostic run; terminal states are `FileMissing`,
/// `OpenFailed` and `Completed`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticState {
    NotStarted,
    FileChecked,
    FileMissing,
    Opened,
    OpenFailed,
    ColumnsCollected,
    Completed,
}

/// Health and shape of one legacy table.
///
/// When the file does not exist only `path`, `exists` and `errors` carry data
/// (besides the log lines and the elapsed time).
#[derive(Clone, Debug, Serialize)]
pub struct DiagnosticReport {
    pub path: PathBuf,
    pub state: DiagnosticState,
    pub exists: bool,
    pub size_bytes: Option<u64>,
    pub modified: Option<DateTime<Local>>,
    pub opened_ok: bool,
    /// Record count declared by the header, deleted records included
    pub record_count: Option<u32>,
    pub columns: Vec<ColumnDescriptor>,
    pub expected_columns: Vec<String>,
    pub missing_columns: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub log_lines: Vec<String>,
    pub elapsed: Duration,
}

impl DiagnosticReport {
    /// True when the table opened and nothing was flagged.
    pub fn is_healthy(&self) -> bool {
        self.opened_ok && self.warnings.is_empty() && self.errors.is_empty()
    }
}

/// Accumulates a report; `finish` consumes the builder, so it runs once.
struct ReportBuilder<'a> {
    report: DiagnosticReport,
    started: Instant,
    span: &'a Span,
}

impl<'a> ReportBuilder<'a> {
    fn new(path: &Path, span: &'a Span) -> Self {
        Self {
            report: DiagnosticReport {
                path: path.to_owned(),
                state: DiagnosticState::NotStarted,
                exists: false,
                size_bytes: None,
                modified: None,
                opened_ok: false,
                record_count: None,
                columns: Vec::new(),
                expected_columns: Vec::new(),
                missing_columns: Vec::new(),
                warnings: Vec::new(),
                errors: Vec::new(),
                log_lines: Vec::new(),
                elapsed: Duration::ZERO,
            },
            started: Instant::now(),
            span,
        }
    }

    fn log(&mut self, line: String) {
        debug!(parent: self.span, "{line}");
        let stamp = Local::now().format("%H:%M:%S%.3f");
        self.report.log_lines.push(format!("[{stamp}] {line}"));
    }

    fn warning(&mut self, message: String) {
        self.log(format!("WARNING: {message}"));
        self.report.warnings.push(message);
    }

    fn error(&mut self, message: String) {
        self.log(format!("ERROR: {message}"));
        self.report.errors.push(message);
    }

    fn state(&mut self, state: DiagnosticState) {
        self.report.state = state;
    }

    fn finish(mut self) -> DiagnosticReport {
        self.report.elapsed = self.started.elapsed();
        let elapsed = self.report.elapsed.as_millis() as u64;
        if self.report.errors.is_empty() {
            info!(parent: self.span, elapsed_ms = elapsed, warnings = self.report.warnings.len(), "diagnostic completed");
            self.log(format!("Diagnostic completed in {elapsed} ms"));
        } else {
            warn!(parent: self.span, elapsed_ms = elapsed, errors = ?self.report.errors, "diagnostic failed");
            self.log(format!("Diagnostic failed in {elapsed} ms"));
        }
        self.report
    }
}

/// Inspects legacy tables directly through a [`TableSource`].
#[derive(Clone)]
pub struct SchemaDiagnostic {
    source: Arc<dyn TableSource>,
    span: Span,
}

impl SchemaDiagnostic {
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        Self {
            source,
            span: debug_span!("schema_diagnostic"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Builds the report for `path`, checking `expected` columns when given.
    pub fn diagnose(&self, path: &Path, expected: Option<&[&str]>) -> DiagnosticReport {
        let mut builder = ReportBuilder::new(path, &self.span);
        self.inspect(&mut builder, path, expected);
        builder.finish()
    }

    fn inspect(&self, builder: &mut ReportBuilder<'_>, path: &Path, expected: Option<&[&str]>) {
        builder.log(format!("Checking {}", path.display()));
        let file = self.source.inspect(path);
        builder.state(DiagnosticState::FileChecked);
        let Some(file) = file else {
            builder.error(format!("File not found: {}", path.display()));
            builder.state(DiagnosticState::FileMissing);
            return;
        };

        builder.report.exists = true;
        builder.report.size_bytes = Some(file.size);
        builder.report.modified = file.modified;
        match file.modified {
            Some(modified) => builder.log(format!("Size {} bytes, modified {}", file.size, modified.format("%Y-%m-%d %H:%M:%S"))),
            None => builder.log(format!("Size {} bytes", file.size)),
        }
        if let Some(expected) = expected {
            builder.report.expected_columns = expected.iter().map(|column| column.to_string()).collect();
        }

        let cursor = match self.source.open(path) {
            Ok(cursor) => cursor,
            Err(error) => {
                builder.error(format!("Cannot open table: {error}"));
                builder.state(DiagnosticState::OpenFailed);
                return;
            }
        };
        builder.state(DiagnosticState::Opened);
        builder.report.opened_ok = true;

        let record_count = cursor.record_count();
        builder.report.record_count = Some(record_count);
        builder.report.columns = cursor.columns().to_vec();
        builder.state(DiagnosticState::ColumnsCollected);
        builder.log(format!(
            "Opened table: {} records, {} columns",
            record_count,
            builder.report.columns.len()
        ));
        if record_count == 0 {
            builder.warning("Table header declares no records".to_owned());
        }
        if builder.report.columns.is_empty() {
            builder.warning("Table declares no columns".to_owned());
        }
        for warning in cursor.warnings() {
            builder.warning(warning);
        }

        if let Some(expected) = expected {
            let missing = missing_columns(expected, &builder.report.columns);
            if missing.is_empty() {
                builder.log(format!("All {} expected columns present", expected.len()));
            } else {
                builder.warning(format!("Missing expected columns: {}", missing.join(", ")));
            }
            builder.report.missing_columns = missing;
        }
        builder.state(DiagnosticState::Completed);
    }

    /// Reads up to `count` rows as column → value maps.
    ///
    /// Unreadable rows are skipped; failing to open the table is an error.
    pub fn sample(&self, path: &Path, count: usize) -> Result<Vec<Map<String, Value>>, LegacyError> {
        let mut cursor = self.source.open(path).with_path(path)?;
        let mut rows = Vec::with_capacity(count.min(cursor.record_count() as usize));
        let mut number = 0;
        while rows.len() < count {
            match cursor.advance() {
                Ok(true) => (),
                Ok(false) => break,
                Err(error) => {
                    debug!(parent: &self.span, row = number, %error, "sample stopped");
                    break;
                }
            }
            match Row::new(cursor.as_ref(), number, &self.span).to_json_map() {
                Ok(map) => rows.push(map),
                Err(error) => debug!(parent: &self.span, row = number, %error, "skipping row"),
            }
            number += 1;
        }
        Ok(rows)
    }
}

/// Expected columns absent from the table, compared case-insensitively.
fn missing_columns(expected: &[&str], columns: &[ColumnDescriptor]) -> Vec<String> {
    expected
        .iter()
        .map(|column| column.trim())
        .filter(|column| !columns.iter().any(|present| present.name.eq_ignore_ascii_case(column)))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::dbf::DbfBuilder;
    use crate::table::column::ColumnType;
    use crate::table::dbf::DbfTableSource;
    use crate::table::memory::MemoryTable;
    use crate::table::memory::MemoryTableSource;
    use serde_json::json;

    const PATH: &str = "/mem/products.dbf";

    fn diagnostic(table: MemoryTable) -> SchemaDiagnostic {
        SchemaDiagnostic::new(Arc::new(MemoryTableSource::new().with_table(PATH, table)))
    }

    fn products() -> MemoryTable {
        MemoryTable::new(&[
            ("CODE", ColumnType::Character),
            ("NAME", ColumnType::Character),
            ("PRICE", ColumnType::Numeric),
        ])
        .text_row(&["A1", "Apple", "1.5"])
        .text_row(&["B2", "Banana", "2"])
    }

    #[test]
    fn diagnose_missing_file() {
        let report = diagnostic(products()).diagnose(Path::new("/mem/none.dbf"), Some(&["CODE"]));
        assert!(!report.exists);
        assert!(!report.opened_ok);
        assert!(!report.errors.is_empty());
        assert!(report.columns.is_empty());
        assert!(report.expected_columns.is_empty());
        assert_eq!(report.size_bytes, None);
        assert_eq!(report.state, DiagnosticState::FileMissing);
        assert!(report.log_lines.last().unwrap().contains("Diagnostic failed"));
    }

    #[test]
    fn diagnose_all_expected_present() {
        let report = diagnostic(products()).diagnose(Path::new(PATH), Some(&["code", "Name", "PRICE"]));
        assert!(report.exists);
        assert!(report.opened_ok);
        assert_eq!(report.state, DiagnosticState::Completed);
        assert_eq!(report.record_count, Some(2));
        assert_eq!(report.columns.len(), 3);
        assert!(report.warnings.is_empty());
        assert!(report.missing_columns.is_empty());
        assert!(report.is_healthy());
        assert!(report.log_lines.last().unwrap().contains("Diagnostic completed"));
    }

    #[test]
    fn diagnose_missing_expected_column() {
        let report = diagnostic(products()).diagnose(Path::new(PATH), Some(&["CODE", "TAXRATE"]));
        assert!(report.opened_ok);
        assert_eq!(report.missing_columns, vec!["TAXRATE"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("TAXRATE"));
        assert!(!report.warnings[0].contains("CODE"));
        assert!(report.errors.is_empty());
    }

    #[test]
    fn diagnose_open_failure() {
        let report = diagnostic(products().fail_open("bad header")).diagnose(Path::new(PATH), None);
        assert!(report.exists);
        assert!(!report.opened_ok);
        assert_eq!(report.state, DiagnosticState::OpenFailed);
        assert!(report.errors[0].contains("bad header"));
        assert!(report.columns.is_empty());
    }

    #[test]
    fn diagnose_empty_table() {
        let report = diagnostic(MemoryTable::new(&[])).diagnose(Path::new(PATH), None);
        assert!(report.opened_ok);
        assert_eq!(report.warnings.len(), 2);
        assert!(!report.is_healthy());
    }

    #[test]
    fn diagnose_dbf_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("docs.dbf");
        DbfBuilder::new()
            .field("DOCNUM", b'C', 10, 0)
            .field("DATE", b'D', 8, 0)
            .record(&["D-1", "20240502"])
            .deleted(&["D-2", "20240502"])
            .write_to(&path)
            .unwrap();

        let diagnostic = SchemaDiagnostic::new(Arc::new(DbfTableSource::default()));
        let report = diagnostic.diagnose(&path, Some(&["DOCNUM", "TOTAL"]));
        assert!(report.opened_ok);
        assert!(report.size_bytes.unwrap() > 0);
        assert!(report.modified.is_some());
        assert_eq!(report.record_count, Some(2));
        assert_eq!(report.columns[1].kind, ColumnType::Date);
        assert_eq!(report.missing_columns, vec!["TOTAL"]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], json!("completed"));
        assert_eq!(json["columns"][0]["name"], json!("DOCNUM"));
    }

    #[test]
    fn diagnose_reports_unreadable_text_sources() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("CUTS.DBF");
        DbfBuilder::new()
            .field("CUTID", b'C', 4, 0)
            .field("INVOICES", b'M', 10, 0)
            .language_driver(0x01)
            .record(&["C1", "         8"])
            .write_to(&path)
            .unwrap();

        let diagnostic = SchemaDiagnostic::new(Arc::new(DbfTableSource::default()));
        let report = diagnostic.diagnose(&path, None);
        assert!(report.opened_ok);
        assert_eq!(report.state, DiagnosticState::Completed);
        assert_eq!(report.columns[1].kind, ColumnType::Memo);
        assert_eq!(report.warnings.len(), 2, "{:?}", report.warnings);
        assert!(report.warnings.iter().any(|warning| warning.contains("437")));
        assert!(report.warnings.iter().any(|warning| warning.contains("INVOICES")));
        assert!(!report.is_healthy());
    }

    #[test]
    fn sample_skips_unreadable_rows() {
        let diagnostic = diagnostic(products().text_row(&["C3", "Cherry", "3"]).broken_cell(1, 2));
        let rows = diagnostic.sample(Path::new(PATH), 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(Value::Object(rows[1].clone()), json!({"CODE": "C3", "NAME": "Cherry", "PRICE": "3"}));

        let rows = diagnostic.sample(Path::new(PATH), 10).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn sample_open_failure_propagates() {
        let diagnostic = diagnostic(products().fail_open("bad header"));
        assert!(matches!(
            diagnostic.sample(Path::new(PATH), 5),
            Err(LegacyError::DataRead { .. })
        ));
        assert!(matches!(
            diagnostic.sample(Path::new("/mem/none.dbf"), 5),
            Err(LegacyError::FileNotFound { .. })
        ));
    }
}
