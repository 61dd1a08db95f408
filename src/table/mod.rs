//! # Legacy Table Access
//!
//! Forward-only cursors over legacy tabular files. A [`TableSource`] opens one
//! table per operation and hands back a [`RecordCursor`]; the cursor is dropped
//! (and the file released) when the operation that opened it returns.
//!
//! - [`dbf`]: production source over dBase / FoxPro tables
//! - [`memory`]: in-memory source used by tests and demos
//! - [`accessor`]: [`Row`](accessor::Row), the null-tolerant typed view of the current record
use crate::error::LegacyError;
use chrono::DateTime;
use chrono::Local;
use std::path::Path;

pub mod accessor;
pub mod column;
pub mod dbf;
pub mod memory;
pub mod value;

use crate::table::column::ColumnDescriptor;
use crate::table::value::FieldValue;

/// Sequential, forward-only cursor over one open table.
///
/// `advance` must be called before the first field read. Field values are valid
/// only until the next `advance`.
pub trait RecordCursor: Send {
    /// Column catalog declared by the table header
    fn columns(&self) -> &[ColumnDescriptor];

    /// Number of records declared by the table header, deleted ones included
    fn record_count(&self) -> u32;

    /// Moves to the next record, returning false at the end of the table
    fn advance(&mut self) -> Result<bool, LegacyError>;

    /// Reads the raw value of a column in the current record
    fn value(&self, ordinal: usize) -> Result<FieldValue, LegacyError>;

    /// True if the current record carries the deletion flag; such records are
    /// only visible when the source includes them
    fn is_deleted(&self) -> bool {
        false
    }

    /// Conditions of the open table that make some values unreadable or
    /// unreliable, such as a missing memo file
    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }

    /// Resolves a column name (case-insensitive) to its ordinal
    fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns()
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// File facts gathered before a table is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct TableFile {
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
}

/// Opens legacy tables by path.
pub trait TableSource: Send + Sync {
    /// Opens a table for reading; an absent path yields `LegacyError::FileNotFound`
    fn open(&self, path: &Path) -> Result<Box<dyn RecordCursor>, LegacyError>;

    /// Returns size and modification time, or None if the path does not exist
    fn inspect(&self, path: &Path) -> Option<TableFile> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(TableFile {
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
        })
    }
}
