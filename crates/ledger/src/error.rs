//! Error types for ledger operations.

use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    /// The ledger API rejected a request.
    #[error("Ledger API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure talking to the ledger service.
    #[error("Ledger network error: {message}")]
    Network { message: String },

    /// A write-back could not locate the record's row.
    #[error("Record id not found in ledger: {id}")]
    RowNotFound { id: String },

    /// A response body did not have the expected shape.
    #[error("Unexpected ledger response: {message}")]
    Malformed { message: String },

    /// Invalid configuration.
    #[error("Invalid ledger configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl LedgerError {
    /// Check if this error is worth retrying at a higher level.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Network { .. } => true,
            LedgerError::Api { status, .. } => *status == 429 || *status >= 500,
            LedgerError::RowNotFound { .. }
            | LedgerError::Malformed { .. }
            | LedgerError::InvalidConfig { .. }
            | LedgerError::Other { .. } => false,
        }
    }
}
