//! Error types for remote store operations.

use thiserror::Error;

/// Errors that can occur during remote store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Folder or file not found.
    #[error("Remote object not found: {id}")]
    NotFound { id: String },

    /// Access denied.
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// The service is throttling requests.
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    /// Transport-level failure.
    #[error("Store network error: {message}")]
    Network { message: String, retryable: bool },

    /// Local I/O error while staging an upload.
    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },

    /// Invalid configuration.
    #[error("Invalid store configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StoreError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::RateLimited { .. } => true,
            StoreError::Network { retryable, .. } => *retryable,
            StoreError::NotFound { .. }
            | StoreError::AccessDenied { .. }
            | StoreError::Io { .. }
            | StoreError::InvalidConfig { .. }
            | StoreError::Other { .. } => false,
        }
    }
}
