//! # Export Error Types
//!
//! Failures while producing a sheet or a document. Text the configured
//! fonts cannot draw is not an error: it degrades to a placeholder (see
//! [`crate::text`]).

use thiserror::Error;

/// Export operation errors.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The CSV writer rejected a record.
    ///
    /// ## When This Occurs
    /// - A row has a different number of fields than the header
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    /// The PDF backend failed (font registration, serialization).
    #[error("PDF export failed: {0}")]
    Pdf(String),

    /// Writing to the destination failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub(crate) fn pdf(err: impl std::fmt::Debug) -> Self {
        ExportError::Pdf(format!("{err:?}"))
    }
}

impl From<csv::IntoInnerError<csv::Writer<Vec<u8>>>> for ExportError {
    fn from(err: csv::IntoInnerError<csv::Writer<Vec<u8>>>) -> Self {
        ExportError::Io(err.into_error())
    }
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;
