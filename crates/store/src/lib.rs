//! Remote folder store access for tender-harvest.
//!
//! The remote store is a hierarchical folder service: one folder per record
//! id under a fixed root. This crate provides:
//!
//! - The [`RemoteStore`] trait used by the harvest worker (folder
//!   resolution, file listing, upload) and the reconciliation engine
//!   (enumeration, deletion)
//! - [`DriveStore`], an implementation over the Google Drive v3 REST API
//!
//! Folder-creation races between shards are resolved by re-querying by
//! exact name before creating; a true race is last-create-wins, which is
//! acceptable because folder contents are additive and idempotently
//! reconciled.

mod drive;
mod error;
mod traits;
mod types;

pub use drive::{DriveStore, StoreSettings};
pub use error::StoreError;
pub use traits::RemoteStore;
pub use types::{FolderHandle, FolderResolution};
