//! Ledger access for tender-harvest.
//!
//! The ledger is a spreadsheet-backed source of truth mapping valid record
//! ids to their source URLs and processing state. This crate provides:
//!
//! - Typed ledger records and the per-run snapshot with its valid-id set
//! - The [`LedgerClient`] trait used by the harvest pipeline and the
//!   reconciliation engine
//! - [`SheetsLedger`], an implementation over the Google Sheets v4 REST API
//! - Access to the quarantine log sheet used by the two-strike protocol
//!
//! Credential acquisition is the embedding process's concern; clients are
//! constructed with a ready-to-use access token.

mod error;
mod sheets;
mod traits;
mod types;

pub use error::LedgerError;
pub use sheets::{LedgerSettings, SheetsLedger, QUARANTINE_SHEET};
pub use traits::LedgerClient;
pub use types::{
    LedgerRecord, LedgerSnapshot, PriorityFlag, QuarantineEntry, QuarantineState,
    COL_ID, COL_PRIORITY, COL_SHARE_LINK, COL_SOURCE_URL,
};
