//! Error types for the import service

use thiserror::Error;

/// Result type for import-service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Import-service errors
#[derive(Error, Debug)]
pub enum Error {
    /// Error bubbled up from the row store
    #[error("Core error: {0}")]
    Core(#[from] report_core::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A source API fetch exceeded the configured timeout
    #[error("Fetch timed out: {0}")]
    FetchTimeout(String),

    /// The source API answered with a non-success status
    #[error("Source API error: {0}")]
    Api(String),

    /// No credential stored for a company
    #[error("No credential stored for company: {0}")]
    NoCredential(String),

    /// An import for the same company and report is already running
    #[error("Import already in progress: {0}")]
    AlreadyRunning(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
