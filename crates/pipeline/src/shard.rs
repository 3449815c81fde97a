//! Deterministic shard assignment and workload classification.
//!
//! Records are assigned to shards by their persisted ledger row number, so
//! the assignment is reproducible even if the source row order shifts
//! between reads. Shards partition the record set exactly: no overlap, no
//! omission.

use std::collections::HashMap;

use tender_harvest_ledger::{LedgerClient, LedgerRecord, LedgerSnapshot, PriorityFlag};
use tender_harvest_store::{FolderHandle, RemoteStore};

use crate::error::HarvestError;

/// One worker's slice of the record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardAssignment {
    /// 0-based shard index.
    pub index: u64,
    /// Total number of shards (≥ 1).
    pub total: u64,
}

impl ShardAssignment {
    /// Validated assignment.
    ///
    /// # Errors
    /// `InvalidConfig` when `total` is zero or `index` is out of range.
    pub fn new(index: u64, total: u64) -> Result<Self, HarvestError> {
        if total == 0 {
            return Err(HarvestError::InvalidConfig {
                message: "shard total must be at least 1".to_string(),
            });
        }
        if index >= total {
            return Err(HarvestError::InvalidConfig {
                message: format!("shard index {} out of range for {} shards", index, total),
            });
        }
        Ok(Self { index, total })
    }

    /// Whether the record with this ordering key belongs to this shard.
    pub fn is_assigned(&self, ordering_key: u64) -> bool {
        ordering_key % self.total == self.index
    }
}

/// A shard's workload, classified against the remote folder index.
///
/// New records (no folder yet) run first, then records flagged for retry.
/// Plain existing records are listed but skipped by default.
#[derive(Debug, Clone, Default)]
pub struct ShardPlan {
    /// Records with no remote folder yet.
    pub new: Vec<LedgerRecord>,
    /// Records with a folder and the retry flag set.
    pub prioritized: Vec<LedgerRecord>,
    /// Records with a folder and no flag.
    pub existing: Vec<LedgerRecord>,
}

impl ShardPlan {
    /// Classify this shard's slice of `records` against the remote folder
    /// names.
    pub fn build(
        records: &[LedgerRecord],
        remote_folders: &HashMap<String, FolderHandle>,
        assignment: ShardAssignment,
    ) -> Self {
        let mut plan = ShardPlan::default();
        for record in records {
            if !assignment.is_assigned(record.row) {
                continue;
            }
            if !remote_folders.contains_key(&record.id) {
                plan.new.push(record.clone());
            } else if record.priority == PriorityFlag::Retry {
                plan.prioritized.push(record.clone());
            } else {
                plan.existing.push(record.clone());
            }
        }
        plan
    }

    /// Total records in the plan, including skipped-by-default ones.
    pub fn len(&self) -> usize {
        self.new.len() + self.prioritized.len() + self.existing.len()
    }

    /// Whether the plan holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read the ledger and the remote folder index, then build this shard's
/// plan.
pub async fn plan_shard<L, S>(
    ledger: &L,
    store: &S,
    root: &FolderHandle,
    assignment: ShardAssignment,
) -> Result<ShardPlan, HarvestError>
where
    L: LedgerClient,
    S: RemoteStore,
{
    let snapshot: LedgerSnapshot = ledger.fetch_records().await?;
    let folders: HashMap<String, FolderHandle> = store.list_folders(root).await?;
    Ok(ShardPlan::build(&snapshot.records, &folders, assignment))
}
