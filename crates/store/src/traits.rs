//! Remote store interface.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{FolderHandle, FolderResolution};

/// Hierarchical folder store operations - implemented by each backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Enumerate non-trashed immediate child folders under `root`.
    ///
    /// # Returns
    /// Folder name → handle mapping for every page of results.
    async fn list_folders(
        &self,
        root: &FolderHandle,
    ) -> Result<HashMap<String, FolderHandle>, StoreError>;

    /// Resolve a folder by exact name under `root`, creating it on a miss.
    ///
    /// Creation includes a best-effort public-read grant; a grant failure
    /// is logged and does not fail the call.
    async fn get_or_create_folder(
        &self,
        root: &FolderHandle,
        name: &str,
    ) -> Result<FolderResolution, StoreError>;

    /// List non-trashed files directly inside a folder.
    ///
    /// # Returns
    /// File name → file id mapping.
    async fn list_files(
        &self,
        folder: &FolderHandle,
    ) -> Result<HashMap<String, String>, StoreError>;

    /// Upload a local file into a folder under the given name.
    async fn upload_file(
        &self,
        folder: &FolderHandle,
        name: &str,
        local_path: &Path,
    ) -> Result<(), StoreError>;

    /// Permanently delete a folder and its contents.
    async fn delete_folder(&self, folder: &FolderHandle) -> Result<(), StoreError>;
}
