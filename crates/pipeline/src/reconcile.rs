//! Two-strike quarantine reconciliation engine.
//!
//! A separate, singleton job run after every harvest shard has finished.
//! It diffs remote folders against the ledger's valid-id set: the first
//! time a folder is seen orphaned its id is quarantined (Strike1); a
//! second sighting on a later run deletes the folder. Ids that become
//! valid again while quarantined are forgiven. One transient bad read of
//! the ledger therefore never deletes data, and the safety gate suppresses
//! the whole run when the valid-id set is implausibly small.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use thiserror::Error;

use tender_harvest_common::SAFETY_MIN_VALID_IDS;
use tender_harvest_ledger::{LedgerClient, LedgerError, LedgerSnapshot, QuarantineEntry};
use tender_harvest_store::{FolderHandle, RemoteStore, StoreError};

/// Tuning for a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Pause between consecutive folder deletions.
    pub deletion_pause: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            deletion_pause: Duration::from_millis(500),
        }
    }
}

impl ReconcileSettings {
    /// Settings with no deletion pause. Intended for tests.
    pub fn none() -> Self {
        Self {
            deletion_pause: Duration::ZERO,
        }
    }
}

/// Errors that abort a reconciliation run.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The valid-id set is too small to trust; nothing was mutated.
    #[error(
        "Safety abort: only {found} valid ids (minimum {required}); no mutation performed"
    )]
    SafetyAbort { found: usize, required: usize },

    /// Ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Remote store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one reconciliation run did.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Folder ids deleted on their second strike.
    pub deleted: Vec<String>,
    /// Ids newly quarantined at Strike1.
    pub new_strikes: Vec<String>,
    /// Quarantined ids forgiven because they are valid again.
    pub forgiven: Vec<String>,
}

/// Run one reconciliation pass.
///
/// Must run as a single instance: the quarantine log is updated with an
/// append + re-read + rewrite sequence, so two concurrent runs can lose
/// each other's rows.
///
/// # Errors
/// `SafetyAbort` when fewer than [`SAFETY_MIN_VALID_IDS`] valid ids are
/// visible; ledger/store errors pass through. In every error case the run
/// performed no further mutation past the point of failure.
pub async fn run_reconciliation<L, S>(
    ledger: &L,
    store: &S,
    root: &FolderHandle,
    settings: &ReconcileSettings,
) -> Result<ReconcileReport, ReconcileError>
where
    L: LedgerClient,
    S: RemoteStore,
{
    log::info!("Starting quarantine reconciliation");
    let snapshot: LedgerSnapshot = ledger.fetch_records().await?;
    if !snapshot.is_safe() {
        log::error!(
            "Only {} valid ids in the ledger; aborting reconciliation",
            snapshot.valid_ids.len()
        );
        return Err(ReconcileError::SafetyAbort {
            found: snapshot.valid_ids.len(),
            required: SAFETY_MIN_VALID_IDS,
        });
    }

    let folders: HashMap<String, FolderHandle> = store.list_folders(root).await?;
    let quarantine: BTreeSet<String> = ledger.read_quarantine().await?;
    log::info!(
        "Analysis: {} valid ids vs {} remote folders ({} quarantined)",
        snapshot.valid_ids.len(),
        folders.len(),
        quarantine.len()
    );

    let orphans: BTreeSet<String> = folders
        .keys()
        .filter(|name| !snapshot.valid_ids.contains(*name))
        .cloned()
        .collect();

    let mut report = ReconcileReport::default();
    if orphans.is_empty() {
        log::info!("Remote store is clean, no orphaned folders");
        if !quarantine.is_empty() {
            report.forgiven = quarantine.into_iter().collect();
            ledger.rewrite_quarantine(&[]).await?;
            log::info!("{} quarantined ids forgiven", report.forgiven.len());
        }
        return Ok(report);
    }
    log::warn!("{} orphaned folders detected", orphans.len());

    let mut new_strikes: Vec<QuarantineEntry> = Vec::new();
    for name in &orphans {
        if quarantine.contains(name) {
            // Second sighting on a separate run: delete for real.
            log::warn!("[strike 2] deleting confirmed orphan folder '{}'", name);
            match store.delete_folder(&folders[name]).await {
                Ok(()) => {
                    report.deleted.push(name.clone());
                    tokio::time::sleep(settings.deletion_pause).await;
                }
                // The id stays quarantined; a later run tries again.
                Err(e) => log::error!("Could not delete folder '{}': {}", name, e),
            }
        } else {
            log::info!("[strike 1] quarantining candidate '{}'", name);
            new_strikes.push(QuarantineEntry::strike1(name.clone()));
        }
    }

    report.forgiven = quarantine
        .iter()
        .filter(|id| !orphans.contains(*id))
        .cloned()
        .collect();

    ledger.append_quarantine(&new_strikes).await?;
    report.new_strikes = new_strikes.into_iter().map(|e| e.id).collect();

    if !report.deleted.is_empty() || !report.forgiven.is_empty() {
        // Compact the log: re-read it fresh so the rows appended above
        // (and any row this run never touched) survive the rewrite.
        let current: BTreeSet<String> = ledger.read_quarantine().await?;
        let remaining: Vec<QuarantineEntry> = current
            .into_iter()
            .filter(|id| !report.deleted.contains(id) && !report.forgiven.contains(id))
            .map(QuarantineEntry::strike1)
            .collect();
        ledger.rewrite_quarantine(&remaining).await?;
    }

    if !report.forgiven.is_empty() {
        log::info!("{} ids forgiven (valid again)", report.forgiven.len());
    }
    log::info!(
        "Reconciliation done: {} deleted, {} new strikes, {} forgiven",
        report.deleted.len(),
        report.new_strikes.len(),
        report.forgiven.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_deletion_pause() {
        assert_eq!(
            ReconcileSettings::default().deletion_pause,
            Duration::from_millis(500)
        );
        assert_eq!(ReconcileSettings::none().deletion_pause, Duration::ZERO);
    }
}
