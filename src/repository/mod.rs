//! # Legacy Table Repository
//!
//! [`LegacyTable`] runs the scan loop shared by every legacy retrieval: open
//! the table, advance row by row, evaluate a predicate and map matching rows
//! into typed [`records`]. Each row resolves to a [`RowOutcome`]; a row that
//! fails to read or map is logged and skipped, while open/advance failures
//! abort the call with the table path attached.
//!
//! [`catalog::LegacyCatalog`] is the async facade the application talks to.
use crate::error::LegacyError;
use crate::error::ResultPath;
use crate::search::criteria::SearchCriteria;
use crate::search::matcher::matches;
use crate::table::accessor::Row;
use crate::table::RecordCursor;
use crate::table::TableSource;
use std::ops::ControlFlow;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::debug_span;
use tracing::Span;

pub mod catalog;
pub mod records;

/// Result of evaluating one row against a predicate and a mapper.
#[derive(Debug)]
pub enum RowOutcome<T> {
    /// The predicate accepted the row and the mapper built a record
    Matched(T),
    /// The predicate rejected the row
    Skipped,
    /// Reading or mapping the row failed; the scan moves on
    Failed(LegacyError),
}

impl<T> RowOutcome<T> {
    /// Applies `predicate`, then `mapper` on acceptance.
    pub fn evaluate<P, M>(row: &Row<'_>, predicate: P, mapper: M) -> Self
    where
        P: FnOnce(&Row<'_>) -> Result<bool, LegacyError>,
        M: FnOnce(&Row<'_>) -> Result<T, LegacyError>,
    {
        match predicate(row) {
            Ok(false) => Self::Skipped,
            Ok(true) => match mapper(row) {
                Ok(record) => Self::Matched(record),
                Err(error) => Self::Failed(error),
            },
            Err(error) => Self::Failed(error),
        }
    }
}

/// One legacy table file, scanned on demand.
///
/// Holds no table contents: every operation opens its own cursor and drops it
/// before returning.
#[derive(Clone)]
pub struct LegacyTable {
    source: Arc<dyn TableSource>,
    path: PathBuf,
    span: Span,
}

impl LegacyTable {
    pub fn new<P: Into<PathBuf>>(source: Arc<dyn TableSource>, path: P) -> Self {
        let path = path.into();
        let span = debug_span!("legacy_table", path = %path.display());
        Self { source, path, span }
    }

    /// Replaces the span the table logs under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    fn open(&self) -> Result<Box<dyn RecordCursor>, LegacyError> {
        if self.source.inspect(&self.path).is_none() {
            Err(LegacyError::FileNotFound { path: self.path.clone() })?
        }
        self.source.open(&self.path).with_path(&self.path)
    }

    /// Drives the cursor, polling `cancel` before every row.
    fn scan<F>(&self, cancel: &CancellationToken, mut visit: F) -> Result<(), LegacyError>
    where
        F: FnMut(&Row<'_>) -> Result<ControlFlow<()>, LegacyError>,
    {
        let mut cursor = self.open()?;
        let mut number = 0;
        loop {
            if cancel.is_cancelled() {
                debug!(parent: &self.span, rows = number, "scan cancelled");
                Err(LegacyError::Cancelled)?
            }
            if !cursor.advance().with_path(&self.path)? {
                break;
            }
            let row = Row::new(cursor.as_ref(), number, &self.span);
            number += 1;
            if visit(&row)?.is_break() {
                break;
            }
        }
        debug!(parent: &self.span, rows = number, "scan finished");
        Ok(())
    }

    /// Sorts an outcome into `records`; true once the row was kept.
    fn collect<T>(&self, row: &Row<'_>, outcome: RowOutcome<T>, records: &mut Vec<T>) -> Result<bool, LegacyError> {
        match outcome {
            RowOutcome::Matched(record) => {
                records.push(record);
                Ok(true)
            }
            RowOutcome::Skipped => Ok(false),
            RowOutcome::Failed(error) if error.is_cancelled() => Err(error),
            RowOutcome::Failed(error) => {
                debug!(parent: &self.span, row = row.number(), %error, "skipping row");
                Ok(false)
            }
        }
    }

    /// Returns the mapped rows accepted by `predicate`, in physical order.
    pub fn scan_filtered<T, P, M>(&self, predicate: P, mapper: M, cancel: &CancellationToken) -> Result<Vec<T>, LegacyError>
    where
        P: Fn(&Row<'_>) -> Result<bool, LegacyError>,
        M: Fn(&Row<'_>) -> Result<T, LegacyError>,
    {
        let mut records = Vec::new();
        self.scan_into(&mut records, predicate, mapper, cancel)?;
        Ok(records)
    }

    /// Same as [`scan_filtered`](Self::scan_filtered), appending to `records`.
    ///
    /// Records appended before a cancellation stay in the buffer.
    pub fn scan_into<T, P, M>(
        &self,
        records: &mut Vec<T>,
        predicate: P,
        mapper: M,
        cancel: &CancellationToken,
    ) -> Result<(), LegacyError>
    where
        P: Fn(&Row<'_>) -> Result<bool, LegacyError>,
        M: Fn(&Row<'_>) -> Result<T, LegacyError>,
    {
        self.scan(cancel, |row| {
            let outcome = RowOutcome::evaluate(row, &predicate, &mapper);
            self.collect(row, outcome, records)?;
            Ok(ControlFlow::Continue(()))
        })
    }

    /// Returns the first row whose `code_column` equals `code`, ignoring case and padding.
    pub fn lookup_by_code<T, M>(
        &self,
        code_column: &str,
        code: &str,
        mapper: M,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, LegacyError>
    where
        M: Fn(&Row<'_>) -> Result<T, LegacyError>,
    {
        let code = code.trim().to_lowercase();
        let mut found = Vec::with_capacity(1);
        self.scan(cancel, |row| {
            let outcome = RowOutcome::evaluate(
                row,
                |row| Ok(row.string(code_column)?.to_lowercase() == code),
                &mapper,
            );
            if self.collect(row, outcome, &mut found)? {
                Ok(ControlFlow::Break(()))
            } else {
                Ok(ControlFlow::Continue(()))
            }
        })?;
        Ok(found.pop())
    }

    /// Free-text search over `criteria.fields`.
    ///
    /// A blank term returns nothing without opening the table. The scan stops
    /// once `criteria.cap()` records are collected.
    pub fn search<T, M>(&self, criteria: &SearchCriteria, mapper: M, cancel: &CancellationToken) -> Result<Vec<T>, LegacyError>
    where
        M: Fn(&Row<'_>) -> Result<T, LegacyError>,
    {
        if criteria.is_blank() {
            return Ok(Vec::new());
        }
        let cap = criteria.cap();
        let mut records = Vec::new();
        self.scan(cancel, |row| {
            let outcome = RowOutcome::evaluate(row, |row| row_matches(row, criteria), &mapper);
            self.collect(row, outcome, &mut records)?;
            if records.len() >= cap {
                Ok(ControlFlow::Break(()))
            } else {
                Ok(ControlFlow::Continue(()))
            }
        })?;
        Ok(records)
    }
}

/// Columns missing from the table compare as empty values.
fn row_matches(row: &Row<'_>, criteria: &SearchCriteria) -> Result<bool, LegacyError> {
    let values = criteria
        .fields
        .iter()
        .map(|field| row.optional_string(field))
        .collect::<Result<Vec<_>, _>>()?;
    let fields = criteria
        .fields
        .iter()
        .zip(&values)
        .map(|(field, value)| (field.as_str(), value.as_str()))
        .collect::<Vec<_>>();
    Ok(matches(&criteria.term, criteria.mode, &fields))
}
