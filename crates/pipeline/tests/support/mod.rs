//! In-memory fakes shared by the pipeline integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tender_harvest_ledger::{
    LedgerClient, LedgerError, LedgerRecord, LedgerSnapshot, PriorityFlag, QuarantineEntry,
};
use tender_harvest_pipeline::{CandidateHandle, DriverError, DriverFactory, DriverSession};
use tender_harvest_store::{FolderHandle, FolderResolution, RemoteStore, StoreError};

// ---------------------------------------------------------------------------
// Ledger fake

#[derive(Default)]
struct LedgerState {
    records: Vec<(String, String)>,
    extra_valid_ids: BTreeSet<String>,
    priorities: HashMap<String, PriorityFlag>,
    share_links: HashMap<String, String>,
    quarantine: Vec<QuarantineEntry>,
}

/// In-memory [`LedgerClient`] backend.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger whose id column holds exactly these ids.
    pub fn with_valid_ids(ids: &[&str]) -> Self {
        let ledger = Self::new();
        for id in ids {
            ledger.add_record(id, &format!("https://portal.example/{}", id));
        }
        ledger
    }

    pub fn add_record(&self, id: &str, url: &str) {
        let mut state = self.state.lock().unwrap();
        state.records.push((id.to_string(), url.to_string()));
    }

    pub fn set_priority_flag(&self, id: &str, flag: PriorityFlag) {
        let mut state = self.state.lock().unwrap();
        state.priorities.insert(id.to_string(), flag);
    }

    pub fn seed_quarantine(&self, ids: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.quarantine = ids.iter().map(|id| QuarantineEntry::strike1(*id)).collect();
    }

    pub fn quarantine_ids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.quarantine.iter().map(|e| e.id.clone()).collect()
    }

    pub fn priority_of(&self, id: &str) -> Option<PriorityFlag> {
        let state = self.state.lock().unwrap();
        state.priorities.get(id).copied()
    }

    pub fn share_link_of(&self, id: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.share_links.get(id).cloned()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn fetch_records(&self) -> Result<LedgerSnapshot, LedgerError> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<LedgerRecord> = Vec::new();
        let mut valid_ids: BTreeSet<String> = state.extra_valid_ids.clone();
        for (index, (id, url)) in state.records.iter().enumerate() {
            valid_ids.insert(id.clone());
            records.push(LedgerRecord {
                row: index as u64 + 2,
                id: id.clone(),
                source_url: url.clone(),
                priority: state.priorities.get(id).copied().unwrap_or_default(),
            });
        }
        Ok(LedgerSnapshot { records, valid_ids })
    }

    async fn write_share_link(&self, id: &str, link: &str) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.share_links.insert(id.to_string(), link.to_string());
        Ok(())
    }

    async fn set_priority(&self, id: &str, flag: PriorityFlag) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.priorities.insert(id.to_string(), flag);
        Ok(())
    }

    async fn read_quarantine(&self) -> Result<BTreeSet<String>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state.quarantine.iter().map(|e| e.id.clone()).collect())
    }

    async fn append_quarantine(&self, entries: &[QuarantineEntry]) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.quarantine.extend(entries.iter().cloned());
        Ok(())
    }

    async fn rewrite_quarantine(&self, entries: &[QuarantineEntry]) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.quarantine = entries.to_vec();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Remote store fake

struct FolderRecord {
    handle: FolderHandle,
    files: HashMap<String, String>,
}

#[derive(Default)]
struct StoreState {
    folders: HashMap<String, FolderRecord>,
    uploads: Vec<(String, String)>,
    fail_upload_once: BTreeSet<String>,
    fail_delete: BTreeSet<String>,
    next_id: u64,
}

/// In-memory [`RemoteStore`] backend holding one root's folders.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root() -> FolderHandle {
        FolderHandle::new("root")
    }

    pub fn seed_folder(&self, name: &str, files: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let handle = FolderHandle::new(format!("folder-{}", state.next_id));
        let files: HashMap<String, String> = files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.to_string(), format!("file-{}", i)))
            .collect();
        state.folders.insert(name.to_string(), FolderRecord { handle, files });
    }

    pub fn folder_names(&self) -> BTreeSet<String> {
        let state = self.state.lock().unwrap();
        state.folders.keys().cloned().collect()
    }

    pub fn file_names(&self, folder_name: &str) -> BTreeSet<String> {
        let state = self.state.lock().unwrap();
        state.folders[folder_name].files.keys().cloned().collect()
    }

    /// (folder name, file name) pairs in upload order.
    pub fn uploads(&self) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap();
        state.uploads.clone()
    }

    /// Make the next upload of this file name fail once.
    pub fn fail_upload_once(&self, file_name: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_upload_once.insert(file_name.to_string());
    }

    /// Make deletions of this folder fail.
    pub fn fail_delete(&self, folder_name: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_delete.insert(folder_name.to_string());
    }

    fn folder_name_of(state: &StoreState, handle: &FolderHandle) -> Option<String> {
        state
            .folders
            .iter()
            .find(|(_, record)| &record.handle == handle)
            .map(|(name, _)| name.clone())
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn list_folders(
        &self,
        _root: &FolderHandle,
    ) -> Result<HashMap<String, FolderHandle>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .folders
            .iter()
            .map(|(name, record)| (name.clone(), record.handle.clone()))
            .collect())
    }

    async fn get_or_create_folder(
        &self,
        _root: &FolderHandle,
        name: &str,
    ) -> Result<FolderResolution, StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.folders.get(name) {
            return Ok(FolderResolution {
                handle: record.handle.clone(),
                share_link: Some(format!("https://folders.example/{}", name)),
                was_created: false,
            });
        }
        state.next_id += 1;
        let handle = FolderHandle::new(format!("folder-{}", state.next_id));
        state.folders.insert(
            name.to_string(),
            FolderRecord {
                handle: handle.clone(),
                files: HashMap::new(),
            },
        );
        Ok(FolderResolution {
            handle,
            share_link: Some(format!("https://folders.example/{}", name)),
            was_created: true,
        })
    }

    async fn list_files(
        &self,
        folder: &FolderHandle,
    ) -> Result<HashMap<String, String>, StoreError> {
        let state = self.state.lock().unwrap();
        let name: String = Self::folder_name_of(&state, folder).ok_or(StoreError::NotFound {
            id: folder.to_string(),
        })?;
        Ok(state.folders[&name].files.clone())
    }

    async fn upload_file(
        &self,
        folder: &FolderHandle,
        name: &str,
        local_path: &Path,
    ) -> Result<(), StoreError> {
        if !local_path.exists() {
            return Err(StoreError::Io {
                path: local_path.display().to_string(),
                message: "file not found".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_upload_once.remove(name) {
            return Err(StoreError::Network {
                message: "injected upload failure".to_string(),
                retryable: true,
            });
        }
        let folder_name: String =
            Self::folder_name_of(&state, folder).ok_or(StoreError::NotFound {
                id: folder.to_string(),
            })?;
        let file_id: String = format!("file-{}", state.uploads.len());
        state
            .folders
            .get_mut(&folder_name)
            .unwrap()
            .files
            .insert(name.to_string(), file_id);
        state.uploads.push((folder_name, name.to_string()));
        Ok(())
    }

    async fn delete_folder(&self, folder: &FolderHandle) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let name: String = Self::folder_name_of(&state, folder).ok_or(StoreError::NotFound {
            id: folder.to_string(),
        })?;
        if state.fail_delete.contains(&name) {
            return Err(StoreError::Network {
                message: "injected delete failure".to_string(),
                retryable: true,
            });
        }
        state.folders.remove(&name);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Driver fake

/// What clicking a scripted attachment does.
#[derive(Clone, Copy)]
pub enum ClickBehavior {
    /// Write the attachment file into the staging directory.
    Download,
    /// Raise a native dialog instead of downloading.
    Dialog,
    /// Do nothing; the download never materializes.
    Nothing,
}

#[derive(Clone)]
pub struct ScriptedAttachment {
    pub description: String,
    pub file_name: String,
    pub behavior: ClickBehavior,
}

impl ScriptedAttachment {
    pub fn download(description: &str, file_name: &str) -> Self {
        Self {
            description: description.to_string(),
            file_name: file_name.to_string(),
            behavior: ClickBehavior::Download,
        }
    }

    pub fn with_behavior(mut self, behavior: ClickBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

/// Scripted [`DriverFactory`]: every session replays the same portal.
pub struct ScriptedDriver {
    attachments: Vec<ScriptedAttachment>,
    deny_access: bool,
    launches: AtomicUsize,
    quits: Arc<AtomicUsize>,
}

impl ScriptedDriver {
    pub fn new(attachments: Vec<ScriptedAttachment>) -> Self {
        Self {
            attachments,
            deny_access: false,
            launches: AtomicUsize::new(0),
            quits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A portal that blocks every session with an access-denied page.
    pub fn denying() -> Self {
        let mut driver = Self::new(Vec::new());
        driver.deny_access = true;
        driver
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn quit_count(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverFactory for ScriptedDriver {
    type Session = ScriptedSession;

    async fn launch(&self, staging_dir: &Path) -> Result<ScriptedSession, DriverError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            staging_dir: staging_dir.to_path_buf(),
            attachments: self.attachments.clone(),
            deny_access: self.deny_access,
            pending_dialog: false,
            quits: Arc::clone(&self.quits),
        })
    }
}

pub struct ScriptedSession {
    staging_dir: PathBuf,
    attachments: Vec<ScriptedAttachment>,
    deny_access: bool,
    pending_dialog: bool,
    quits: Arc<AtomicUsize>,
}

#[async_trait]
impl DriverSession for ScriptedSession {
    async fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn open_linked_context(&mut self, _selector: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn list_candidates(
        &mut self,
        _selector: &str,
    ) -> Result<Vec<CandidateHandle>, DriverError> {
        Ok((0..self.attachments.len() as u64).map(CandidateHandle).collect())
    }

    async fn describe(&mut self, handle: CandidateHandle) -> Result<String, DriverError> {
        self.attachments
            .get(handle.0 as usize)
            .map(|a| a.description.clone())
            .ok_or(DriverError::StaleElement)
    }

    async fn click(&mut self, handle: CandidateHandle) -> Result<(), DriverError> {
        let attachment: &ScriptedAttachment = self
            .attachments
            .get(handle.0 as usize)
            .ok_or(DriverError::StaleElement)?;
        match attachment.behavior {
            ClickBehavior::Download => {
                std::fs::write(self.staging_dir.join(&attachment.file_name), b"content")
                    .map_err(|e| DriverError::Unclassified {
                        message: e.to_string(),
                        retryable: false,
                    })?;
            }
            ClickBehavior::Dialog => self.pending_dialog = true,
            ClickBehavior::Nothing => {}
        }
        Ok(())
    }

    async fn is_access_denied(&mut self) -> Result<bool, DriverError> {
        Ok(self.deny_access)
    }

    async fn dismiss_dialog_if_any(&mut self) -> Result<bool, DriverError> {
        Ok(std::mem::take(&mut self.pending_dialog))
    }

    async fn close_linked_context(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        self.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
