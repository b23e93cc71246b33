//! Error types for the report engine

use thiserror::Error;

/// Result type for report-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Report-engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Error bubbled up from the row store
    #[error("Core error: {0}")]
    Core(#[from] report_core::Error),

    /// Requested company has no registry record
    #[error("Unknown company: {0}")]
    UnknownCompany(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
