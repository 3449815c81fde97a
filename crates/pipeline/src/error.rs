//! Error types for the harvest pipeline.

use thiserror::Error;

use tender_harvest_ledger::LedgerError;
use tender_harvest_store::StoreError;

use crate::driver::DriverError;

/// Errors that abort one record attempt.
///
/// An attempt-level error is retried at the whole-record level; ledger
/// write-back errors are logged where they occur and never reach this
/// type.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Browser capability failure.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Remote store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Ledger read failure (run setup only).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Staging directory failure.
    #[error("Staging error: {message}")]
    Staging { message: String },

    /// Invalid pipeline configuration; fatal at startup.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl From<std::io::Error> for HarvestError {
    fn from(err: std::io::Error) -> Self {
        HarvestError::Staging {
            message: err.to_string(),
        }
    }
}
