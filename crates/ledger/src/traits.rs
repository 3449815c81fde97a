//! Ledger client interface.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::types::{LedgerSnapshot, PriorityFlag, QuarantineEntry};

/// Operations the pipeline needs from the ledger - implemented by each
/// backend.
///
/// Write-backs are keyed by record id and resolved to a row at write time,
/// so disjoint-id writers (one per shard) never race on the same cell.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Read all records and the valid-id set.
    async fn fetch_records(&self) -> Result<LedgerSnapshot, LedgerError>;

    /// Write a record's remote folder share link (share-link column).
    async fn write_share_link(&self, id: &str, link: &str) -> Result<(), LedgerError>;

    /// Write a record's priority flag (priority column).
    async fn set_priority(&self, id: &str, flag: PriorityFlag) -> Result<(), LedgerError>;

    /// Read the set of ids currently at Strike1 in the quarantine log.
    /// Creates the log (with its header) if it does not exist yet.
    async fn read_quarantine(&self) -> Result<BTreeSet<String>, LedgerError>;

    /// Append entries to the end of the quarantine log.
    async fn append_quarantine(&self, entries: &[QuarantineEntry]) -> Result<(), LedgerError>;

    /// Replace the quarantine log's contents (header is preserved).
    async fn rewrite_quarantine(&self, entries: &[QuarantineEntry]) -> Result<(), LedgerError>;
}
