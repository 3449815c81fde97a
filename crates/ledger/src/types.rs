//! Typed ledger rows and the per-run snapshot.

use std::collections::BTreeSet;

use tender_harvest_common::SAFETY_MIN_VALID_IDS;

/// 1-based ledger column holding the record's source URL.
pub const COL_SOURCE_URL: usize = 1;
/// 1-based ledger column holding the record id.
pub const COL_ID: usize = 2;
/// 1-based ledger column the share link is written back to.
pub const COL_SHARE_LINK: usize = 15;
/// 1-based ledger column holding the priority flag.
pub const COL_PRIORITY: usize = 16;

/// Priority flag persisted in the ledger's priority column.
///
/// `Retry` marks a record whose last harvest failed after exhausting its
/// attempts; a future run processes it ahead of plain existing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityFlag {
    /// No priority ("" in the ledger cell).
    #[default]
    None,
    /// Prioritized for retry ("1" in the ledger cell).
    Retry,
}

impl PriorityFlag {
    /// Parse a raw (already trimmed) ledger cell.
    pub fn from_cell(cell: &str) -> Self {
        if cell == "1" {
            PriorityFlag::Retry
        } else {
            PriorityFlag::None
        }
    }

    /// Cell value written back to the ledger.
    pub fn as_cell(&self) -> &'static str {
        match self {
            PriorityFlag::None => "",
            PriorityFlag::Retry => "1",
        }
    }
}

/// One harvestable row of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    /// Absolute ledger row number (header = row 1). Stable ordering key for
    /// shard assignment.
    pub row: u64,
    /// Record id (trimmed, non-empty); doubles as the remote folder name.
    pub id: String,
    /// URL of the record's detail view.
    pub source_url: String,
    /// Current priority flag.
    pub priority: PriorityFlag,
}

/// The ledger as read at the start of a run.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    /// Harvestable records in ledger order.
    pub records: Vec<LedgerRecord>,
    /// All non-empty trimmed ids seen in the id column.
    pub valid_ids: BTreeSet<String>,
}

impl LedgerSnapshot {
    /// Build a snapshot from raw sheet rows (including the header row).
    ///
    /// Rows missing a source URL or an id are skipped as records but a
    /// non-empty id still contributes to the valid-id set, mirroring how
    /// the reconciliation engine reads the id column.
    pub fn from_rows(rows: &[Vec<String>]) -> Self {
        let mut records: Vec<LedgerRecord> = Vec::new();
        let mut valid_ids: BTreeSet<String> = BTreeSet::new();

        for (index, row) in rows.iter().enumerate().skip(1) {
            let id: &str = cell(row, COL_ID).trim();
            if !id.is_empty() {
                valid_ids.insert(id.to_string());
            }

            let source_url: &str = cell(row, COL_SOURCE_URL).trim();
            if id.is_empty() || source_url.is_empty() {
                continue;
            }

            records.push(LedgerRecord {
                row: index as u64 + 1,
                id: id.to_string(),
                source_url: source_url.to_string(),
                priority: PriorityFlag::from_cell(cell(row, COL_PRIORITY).trim()),
            });
        }

        Self { records, valid_ids }
    }

    /// Whether the valid-id set is large enough to trust.
    ///
    /// A set below [`SAFETY_MIN_VALID_IDS`] is treated as a transient bad
    /// read; reconciliation must not mutate anything based on it.
    pub fn is_safe(&self) -> bool {
        self.valid_ids.len() >= SAFETY_MIN_VALID_IDS
    }
}

/// Quarantine lifecycle state of an orphaned folder id.
///
/// Only `Strike1` is ever persisted: a second sighting deletes the folder
/// and removes the entry, and forgiveness removes the entry as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarantineState {
    /// First orphan sighting recorded, folder untouched.
    Strike1,
}

impl QuarantineState {
    /// Cell value persisted in the quarantine log's status column.
    pub fn as_cell(&self) -> &'static str {
        match self {
            QuarantineState::Strike1 => "STRIKE_1",
        }
    }
}

/// One row of the quarantine log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantineEntry {
    /// Orphaned folder id.
    pub id: String,
    /// Lifecycle state.
    pub state: QuarantineState,
}

impl QuarantineEntry {
    /// New Strike1 entry for an id.
    pub fn strike1(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: QuarantineState::Strike1,
        }
    }
}

/// 1-based cell access; out-of-range and missing cells read as "".
fn cell(row: &[String], column: usize) -> &str {
    row.get(column - 1).map(String::as_str).unwrap_or("")
}
