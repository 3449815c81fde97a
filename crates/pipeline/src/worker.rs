//! Harvest worker: per-record state machine.
//!
//! Each record walks folder resolution → navigation → attachment discovery
//! → download → upload. Attempt-level failures retry the whole record with
//! a randomized backoff; the final outcome is written back to the ledger's
//! priority column. Per-attachment problems (stale elements, native
//! dialogs, vanished downloads, upload failures) are logged and never fail
//! the record.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use tender_harvest_common::{
    sanitize_description, PacingSettings, DEDUP_MIN_DESCRIPTION_LEN, DEFAULT_BATCH_SIZE,
};
use tender_harvest_ledger::{LedgerClient, LedgerRecord, PriorityFlag};
use tender_harvest_store::{FolderHandle, FolderResolution, RemoteStore};

use crate::driver::{CandidateHandle, DriverError, DriverFactory, DriverSession};
use crate::error::HarvestError;
use crate::shard::ShardPlan;
use crate::staging::{compose_final_name, strip_partial_markers, StagingArea, StagingSettings};

/// Tuning for the harvest worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Whole-record attempts before giving up.
    pub max_attempts: u32,
    /// Records per processing batch.
    pub batch_size: usize,
    /// Whether to re-scan existing records that carry no retry flag.
    pub include_existing: bool,
    /// Selector opening the attachment listing context.
    pub attachment_panel_selector: String,
    /// Selector matching downloadable attachment candidates.
    pub candidate_selector: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            batch_size: DEFAULT_BATCH_SIZE,
            include_existing: false,
            attachment_panel_selector: "#imgAdjuntos".to_string(),
            candidate_selector: "input[id*='DWNL_grdId'][type='image']".to_string(),
        }
    }
}

/// Terminal outcome of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// All discovered attachments are present remotely.
    Success,
    /// Every attempt failed; the record is flagged for retry.
    Failed,
}

/// Counters for one successful attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptStats {
    /// Files uploaded this attempt.
    pub uploaded: usize,
    /// Files skipped because they already existed remotely.
    pub skipped: usize,
    /// Uploads that failed even after the retry.
    pub upload_failures: usize,
}

/// Aggregate result of one shard run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardReport {
    /// Records processed.
    pub processed: usize,
    /// Records that reached Success.
    pub succeeded: usize,
    /// Records that exhausted their attempts.
    pub failed: usize,
}

/// One staged download awaiting upload.
struct StagedDownload {
    staged_name: String,
    description: String,
}

/// Drives every record of a shard through the harvest state machine.
pub struct HarvestWorker<'a, L, S, F>
where
    L: LedgerClient,
    S: RemoteStore,
    F: DriverFactory,
{
    ledger: &'a L,
    store: &'a S,
    driver: &'a F,
    root: FolderHandle,
    settings: WorkerSettings,
    pacing: PacingSettings,
    staging: StagingSettings,
}

impl<'a, L, S, F> HarvestWorker<'a, L, S, F>
where
    L: LedgerClient,
    S: RemoteStore,
    F: DriverFactory,
{
    /// Create a worker with default tuning.
    pub fn new(ledger: &'a L, store: &'a S, driver: &'a F, root: FolderHandle) -> Self {
        Self {
            ledger,
            store,
            driver,
            root,
            settings: WorkerSettings::default(),
            pacing: PacingSettings::default(),
            staging: StagingSettings::default(),
        }
    }

    /// Set worker tuning.
    pub fn with_settings(mut self, settings: WorkerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set pacing delays.
    pub fn with_pacing(mut self, pacing: PacingSettings) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set staging-wait ceilings.
    pub fn with_staging(mut self, staging: StagingSettings) -> Self {
        self.staging = staging;
        self
    }

    /// Process a shard's whole plan: new records first, then prioritized
    /// retries, then (optionally) plain existing records, in batches.
    pub async fn run_shard(&self, plan: &ShardPlan) -> ShardReport {
        let mut queue: Vec<&LedgerRecord> = plan.new.iter().collect();
        queue.extend(plan.prioritized.iter());
        if self.settings.include_existing {
            queue.extend(plan.existing.iter());
        }
        log::info!(
            "Shard workload: {} new, {} prioritized, {} existing ({})",
            plan.new.len(),
            plan.prioritized.len(),
            plan.existing.len(),
            if self.settings.include_existing {
                "included"
            } else {
                "skipped"
            }
        );

        let mut report = ShardReport::default();
        let batch_size: usize = self.settings.batch_size.max(1);
        for batch in queue.chunks(batch_size) {
            for record in batch {
                report.processed += 1;
                match self.process_record(record).await {
                    RecordOutcome::Success => report.succeeded += 1,
                    RecordOutcome::Failed => report.failed += 1,
                }
            }
        }
        log::info!(
            "Shard done: {} succeeded, {} failed of {}",
            report.succeeded,
            report.failed,
            report.processed
        );
        report
    }

    /// Run one record to a terminal outcome, retrying attempts with
    /// backoff and writing the outcome to the ledger's priority column.
    pub async fn process_record(&self, record: &LedgerRecord) -> RecordOutcome {
        log::info!("[{}] starting", record.id);
        let max_attempts: u32 = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.run_attempt(record).await {
                Ok(stats) => {
                    log::info!(
                        "[{}] success: {} uploaded, {} already present, {} upload failures",
                        record.id,
                        stats.uploaded,
                        stats.skipped,
                        stats.upload_failures
                    );
                    if let Err(e) = self.ledger.set_priority(&record.id, PriorityFlag::None).await {
                        log::warn!("[{}] could not clear priority flag: {}", record.id, e);
                    }
                    return RecordOutcome::Success;
                }
                Err(e) => {
                    log::error!("[{}] attempt {}/{} failed: {}", record.id, attempt, max_attempts, e);
                    if attempt < max_attempts {
                        self.pacing.attempt_backoff().await;
                    }
                }
            }
        }

        if let Err(e) = self.ledger.set_priority(&record.id, PriorityFlag::Retry).await {
            log::warn!("[{}] could not set retry flag: {}", record.id, e);
        }
        RecordOutcome::Failed
    }

    /// One attempt: owns a staging directory and a driver session, both
    /// released whatever the outcome.
    async fn run_attempt(&self, record: &LedgerRecord) -> Result<AttemptStats, HarvestError> {
        let staging: StagingArea = StagingArea::new()?;
        let mut session: F::Session = self.driver.launch(staging.path()).await?;

        let result: Result<AttemptStats, HarvestError> =
            self.drive_record(record, &mut session, &staging).await;

        if let Err(e) = session.quit().await {
            log::warn!("[{}] session teardown failed: {}", record.id, e);
        }
        result
    }

    /// The state machine proper.
    async fn drive_record(
        &self,
        record: &LedgerRecord,
        session: &mut F::Session,
        staging: &StagingArea,
    ) -> Result<AttemptStats, HarvestError> {
        // Init → FolderReady
        let folder: FolderResolution = self
            .store
            .get_or_create_folder(&self.root, &record.id)
            .await?;
        if let Some(ref link) = folder.share_link {
            if let Err(e) = self.ledger.write_share_link(&record.id, link).await {
                log::warn!("[{}] could not write share link: {}", record.id, e);
            }
        }
        let remote_files: HashMap<String, String> = if folder.was_created {
            HashMap::new()
        } else {
            self.store.list_files(&folder.handle).await?
        };
        let remote_names: Vec<String> = remote_files.keys().map(|n| n.to_lowercase()).collect();

        // FolderReady → Navigated
        session.navigate(&record.source_url).await?;
        self.pacing.short_pause().await;
        if session.dismiss_dialog_if_any().await? {
            log::warn!("[{}] dismissed a dialog after navigation", record.id);
        }
        if session.is_access_denied().await? {
            return Err(DriverError::AccessDenied.into());
        }

        // Navigated → AttachmentsDiscovered
        session
            .open_linked_context(&self.settings.attachment_panel_selector)
            .await?;
        self.pacing.short_pause().await;
        if session.is_access_denied().await? {
            if let Err(e) = session.close_linked_context().await {
                log::warn!("[{}] could not close blocked context: {}", record.id, e);
            }
            return Err(DriverError::AccessDenied.into());
        }
        let handles: Vec<CandidateHandle> = session
            .list_candidates(&self.settings.candidate_selector)
            .await?;
        let queue: Vec<(CandidateHandle, String)> =
            self.discover(record, session, &handles, &remote_names).await?;
        if queue.is_empty() {
            log::info!("[{}] no new attachments to download", record.id);
            session.close_linked_context().await?;
            return Ok(AttemptStats {
                skipped: handles.len(),
                ..AttemptStats::default()
            });
        }

        // AttachmentsDiscovered → Downloading
        let staged: Vec<StagedDownload> =
            self.download_all(record, session, staging, &queue).await?;

        // Downloading → Uploading
        let stats: AttemptStats = self
            .upload_all(record, staging, &folder.handle, &remote_names, staged, queue.len())
            .await?;

        // Uploading → Done
        session.close_linked_context().await?;
        Ok(stats)
    }

    /// Describe and filter candidates: sanitize each description and drop
    /// the ones already represented in the remote folder.
    async fn discover(
        &self,
        record: &LedgerRecord,
        session: &mut F::Session,
        handles: &[CandidateHandle],
        remote_names: &[String],
    ) -> Result<Vec<(CandidateHandle, String)>, HarvestError> {
        let mut queue: Vec<(CandidateHandle, String)> = Vec::new();
        for &handle in handles {
            let raw: String = match session.describe(handle).await {
                Ok(text) => text,
                Err(DriverError::StaleElement) => {
                    log::warn!("[{}] candidate went stale while describing", record.id);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let description: String = sanitize_description(raw.trim());

            // A description that is long enough to be distinctive and
            // already appears inside a remote filename means this
            // attachment was uploaded on an earlier run.
            if description.len() > DEDUP_MIN_DESCRIPTION_LEN {
                let needle: String = description.to_lowercase();
                if remote_names.iter().any(|name| name.contains(&needle)) {
                    continue;
                }
            }
            queue.push((handle, description));
        }
        Ok(queue)
    }

    /// Click every queued candidate and collect its staged download.
    async fn download_all(
        &self,
        record: &LedgerRecord,
        session: &mut F::Session,
        staging: &StagingArea,
        queue: &[(CandidateHandle, String)],
    ) -> Result<Vec<StagedDownload>, HarvestError> {
        log::info!("[{}] downloading {} attachments", record.id, queue.len());
        let mut known: BTreeSet<String> = staging.list_names().await?;
        let mut staged: Vec<StagedDownload> = Vec::new();

        for (index, (handle, description)) in queue.iter().enumerate() {
            if self.pacing.long_pause_due(index) {
                self.pacing.long_pause().await;
            }
            self.pacing.short_pause().await;

            match session.click(*handle).await {
                Ok(()) => {}
                Err(DriverError::StaleElement) => {
                    log::warn!("[{}] candidate went stale before click", record.id);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            if session.dismiss_dialog_if_any().await? {
                log::warn!("[{}] click raised a dialog, attachment skipped", record.id);
                continue;
            }

            match staging.wait_for_new_file(&known, &self.staging).await? {
                Some(name) => {
                    known.insert(name.clone());
                    staged.push(StagedDownload {
                        staged_name: name,
                        description: description.clone(),
                    });
                }
                None => {
                    log::warn!("[{}] download never materialized", record.id);
                }
            }
        }
        Ok(staged)
    }

    /// Wait for downloads to settle, then rename and upload each staged
    /// file, skipping names already present remotely.
    async fn upload_all(
        &self,
        record: &LedgerRecord,
        staging: &StagingArea,
        folder: &FolderHandle,
        remote_names: &[String],
        staged: Vec<StagedDownload>,
        expected: usize,
    ) -> Result<AttemptStats, HarvestError> {
        if !staging.wait_until_settled(&self.staging).await? {
            log::warn!("[{}] downloads still unsettled at the ceiling", record.id);
        }
        staging.await_expected_count(expected, &self.staging).await?;
        log::info!("[{}] uploading to remote folder", record.id);

        let mut stats = AttemptStats::default();
        let mut available: BTreeSet<String> = staging.list_names().await?;

        for item in staged {
            let base: String = strip_partial_markers(&item.staged_name);
            let real: String = match available.iter().find(|n| n.starts_with(&base)).cloned() {
                Some(name) => name,
                None => {
                    log::warn!("[{}] staged file vanished: {}", record.id, item.staged_name);
                    continue;
                }
            };
            available.remove(&real);

            let final_name: String = compose_final_name(&real, &item.description);
            if remote_names.contains(&final_name.to_lowercase()) {
                stats.skipped += 1;
                continue;
            }

            let path = match staging.finalize(&real, &final_name).await {
                Ok(path) => path,
                Err(e) => {
                    log::warn!("[{}] could not finalize '{}': {}", record.id, real, e);
                    continue;
                }
            };
            if self.upload_with_retry(folder, &final_name, &path).await {
                stats.uploaded += 1;
            } else {
                stats.upload_failures += 1;
            }
        }
        Ok(stats)
    }

    /// Upload with one retry after a fixed backoff. Failures are non-fatal
    /// to the record.
    async fn upload_with_retry(&self, folder: &FolderHandle, name: &str, path: &Path) -> bool {
        match self.store.upload_file(folder, name, path).await {
            Ok(()) => true,
            Err(first) => {
                log::warn!("Upload of '{}' failed, retrying: {}", name, first);
                tokio::time::sleep(self.pacing.upload_retry_backoff).await;
                match self.store.upload_file(folder, name, path).await {
                    Ok(()) => true,
                    Err(second) => {
                        log::error!("Upload of '{}' failed after retry: {}", name, second);
                        false
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.max_attempts, 2);
        assert_eq!(settings.batch_size, DEFAULT_BATCH_SIZE);
        assert!(!settings.include_existing);
        assert!(!settings.attachment_panel_selector.is_empty());
        assert!(!settings.candidate_selector.is_empty());
    }
}
