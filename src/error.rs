use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for legacy table access.
/// Aggregates errors from the standard library, dependencies and internal modules.
#[derive(Error, Debug)]
pub enum LegacyError {
    /// A configured table path does not exist on disk
    #[error("Legacy table file not found: '{}'", path.display())]
    FileNotFound { path: PathBuf },

    /// Systemic read failure, wrapped with the offending file
    #[error("Failed to read legacy table '{}': {source}", path.display())]
    DataRead {
        path: PathBuf,
        #[source]
        source: Box<LegacyError>,
    },

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    /// A single record could not be mapped
    #[error("Invalid record at row {row}: {message}")]
    RowDecode { row: usize, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    // Third-party library errors
    #[error("{0}")]
    JoinError(#[from] tokio::task::JoinError),

    // Internal module errors
    #[error("{0}")]
    DbfError(#[from] crate::helpers::dbf::DbfError),

    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("{0}")]
    ReferenceError(#[from] crate::reference::ReferenceError),
}

impl LegacyError {
    /// Returns true if the error is a cancellation request, at any wrapping depth.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::DataRead { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

pub(crate) trait ResultPath {
    /// Attaches the table path to systemic failures.
    fn with_path(self, path: &Path) -> Self;
}

impl<T> ResultPath for Result<T, LegacyError> {
    fn with_path(self, path: &Path) -> Self {
        self.map_err(|error| match error {
            LegacyError::Cancelled
            | LegacyError::FileNotFound { .. }
            | LegacyError::DataRead { .. } => error,
            LegacyError::IoError(e) if e.kind() == ErrorKind::NotFound => {
                LegacyError::FileNotFound { path: path.to_owned() }
            }
            error => LegacyError::DataRead {
                path: path.to_owned(),
                source: Box::new(error),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_path_wraps_systemic_errors() {
        let result: Result<(), LegacyError> = Err(LegacyError::UnknownColumn("X".to_owned()));
        let error = result.with_path(Path::new("/data/products.dbf")).unwrap_err();
        assert!(matches!(error, LegacyError::DataRead { .. }));
        assert_eq!(
            error.to_string(),
            "Failed to read legacy table '/data/products.dbf': Unknown column 'X'"
        );
    }

    #[test]
    fn with_path_keeps_cancellation_unwrapped() {
        let result: Result<(), LegacyError> = Err(LegacyError::Cancelled);
        let error = result.with_path(Path::new("a.dbf")).unwrap_err();
        assert!(matches!(error, LegacyError::Cancelled));
        assert!(error.is_cancelled());
    }

    #[test]
    fn with_path_turns_missing_file_into_not_found() {
        let io = std::io::Error::new(ErrorKind::NotFound, "gone");
        let result: Result<(), LegacyError> = Err(io.into());
        let error = result.with_path(Path::new("gone.dbf")).unwrap_err();
        assert!(matches!(error, LegacyError::FileNotFound { ref path } if path == Path::new("gone.dbf")));
    }
}
