//! Error types for the policybook library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for policybook operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading workbooks and reference tables.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The path is not a readable ZIP archive.
    #[error("Corrupt archive {path}: {reason}")]
    CorruptArchive { path: String, reason: String },

    /// A required entry is absent from the archive.
    #[error("Missing archive entry: {0}")]
    MissingEntry(String),

    /// An archive entry is not well-formed XML.
    #[error("Malformed document {entry}: {reason}")]
    MalformedDocument { entry: String, reason: String },

    /// The workbook declares no sheets.
    #[error("Workbook declares no sheets")]
    MissingSheet,

    /// The sheet's relationship id has no entry in the workbook relationships.
    #[error("No workbook relationship with id {0}")]
    MissingRelationship(String),

    /// No row matched the header predicate.
    #[error("Could not find policy header row")]
    HeaderNotFound,

    /// The header row lacks a required column.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A required input table does not exist.
    #[error("Missing input file: {}", .0.display())]
    MissingInput(PathBuf),

    /// Error reading a delimited table.
    #[error("CSV error: {0}")]
    Csv(String),

    /// Error serializing output.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(entry: &str, reason: impl ToString) -> Self {
        Error::MalformedDocument {
            entry: entry.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MissingEntry("xl/workbook.xml".to_string());
        assert_eq!(err.to_string(), "Missing archive entry: xl/workbook.xml");

        let err = Error::MissingRelationship("rId7".to_string());
        assert_eq!(err.to_string(), "No workbook relationship with id rId7");

        let err = Error::malformed("xl/sharedStrings.xml", "unexpected end");
        assert_eq!(
            err.to_string(),
            "Malformed document xl/sharedStrings.xml: unexpected end"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
