//! Google Drive v3 REST implementation of [`RemoteStore`].
//!
//! All requests set `supportsAllDrives` / `includeItemsFromAllDrives` so
//! the store works transparently across shared drives. The embedding
//! process supplies a ready-to-use OAuth access token.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::traits::RemoteStore;
use crate::types::{FolderHandle, FolderResolution};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Boundary for multipart upload bodies.
const UPLOAD_BOUNDARY: &str = "tender_harvest_upload_boundary";

/// Configuration for [`DriveStore`].
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// OAuth bearer token with drive scope.
    pub access_token: String,
    /// API endpoint; overridable for tests.
    pub base_url: String,
    /// Upload endpoint; overridable for tests.
    pub upload_base_url: String,
    /// Page size for folder enumeration.
    pub page_size: usize,
}

impl StoreSettings {
    /// Settings against the production Drive endpoints.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: "https://www.googleapis.com".to_string(),
            upload_base_url: "https://www.googleapis.com/upload".to_string(),
            page_size: 1000,
        }
    }
}

/// [`RemoteStore`] implementation over the Google Drive v3 REST API.
pub struct DriveStore {
    http: reqwest::Client,
    settings: StoreSettings,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "webViewLink")]
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

impl DriveStore {
    /// Create a client.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when the access token is empty.
    pub fn new(settings: StoreSettings) -> Result<Self, StoreError> {
        if settings.access_token.trim().is_empty() {
            return Err(StoreError::InvalidConfig {
                message: "access token is empty".to_string(),
            });
        }
        Ok(Self {
            http: reqwest::Client::new(),
            settings,
        })
    }

    /// Run a files query, following page tokens until exhausted.
    async fn query_files(&self, query: &str, fields: &str) -> Result<Vec<DriveFile>, StoreError> {
        let url: String = format!("{}/drive/v3/files", self.settings.base_url);
        let page_size: String = self.settings.page_size.to_string();
        let fields: String = format!("nextPageToken, files({})", fields);

        let mut files: Vec<DriveFile> = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(&self.settings.access_token)
                .query(&[
                    ("q", query),
                    ("fields", fields.as_str()),
                    ("pageSize", page_size.as_str()),
                    ("supportsAllDrives", "true"),
                    ("includeItemsFromAllDrives", "true"),
                ]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.map_err(transport_error)?;
            let status: u16 = response.status().as_u16();
            if status != 200 {
                let body: String = response.text().await.unwrap_or_default();
                return Err(response_error(status, &body));
            }

            let page: FileList = response.json().await.map_err(|e| StoreError::Other {
                message: format!("malformed list response: {}", e),
            })?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(files)
    }

    async fn create_folder(
        &self,
        root: &FolderHandle,
        name: &str,
    ) -> Result<FolderResolution, StoreError> {
        let url: String = format!("{}/drive/v3/files", self.settings.base_url);
        let body: Value = json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [root.as_str()],
        });
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.access_token)
            .query(&[("fields", "id, webViewLink"), ("supportsAllDrives", "true")])
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status: u16 = response.status().as_u16();
        if status != 200 {
            let text: String = response.text().await.unwrap_or_default();
            return Err(response_error(status, &text));
        }
        let created: DriveFile = response.json().await.map_err(|e| StoreError::Other {
            message: format!("malformed create response: {}", e),
        })?;

        let handle = FolderHandle::new(created.id);
        if let Err(e) = self.grant_public_read(&handle).await {
            log::warn!("Could not make folder '{}' public: {}", name, e);
        }

        Ok(FolderResolution {
            handle,
            share_link: created.web_view_link,
            was_created: true,
        })
    }

    async fn grant_public_read(&self, folder: &FolderHandle) -> Result<(), StoreError> {
        let url: String = format!(
            "{}/drive/v3/files/{}/permissions",
            self.settings.base_url,
            folder.as_str()
        );
        let body: Value = json!({ "type": "anyone", "role": "reader" });
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.access_token)
            .query(&[("supportsAllDrives", "true")])
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status: u16 = response.status().as_u16();
        if status != 200 {
            let text: String = response.text().await.unwrap_or_default();
            return Err(response_error(status, &text));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn list_folders(
        &self,
        root: &FolderHandle,
    ) -> Result<HashMap<String, FolderHandle>, StoreError> {
        let files: Vec<DriveFile> = self
            .query_files(&child_folders_query(root), "id, name")
            .await?;
        Ok(files
            .into_iter()
            .map(|f| (f.name, FolderHandle::new(f.id)))
            .collect())
    }

    async fn get_or_create_folder(
        &self,
        root: &FolderHandle,
        name: &str,
    ) -> Result<FolderResolution, StoreError> {
        let found: Vec<DriveFile> = self
            .query_files(&named_folder_query(root, name), "id, webViewLink")
            .await?;
        if let Some(existing) = found.into_iter().next() {
            return Ok(FolderResolution {
                handle: FolderHandle::new(existing.id),
                share_link: existing.web_view_link,
                was_created: false,
            });
        }
        self.create_folder(root, name).await
    }

    async fn list_files(
        &self,
        folder: &FolderHandle,
    ) -> Result<HashMap<String, String>, StoreError> {
        let files: Vec<DriveFile> = self
            .query_files(&children_query(folder), "id, name")
            .await?;
        Ok(files.into_iter().map(|f| (f.name, f.id)).collect())
    }

    async fn upload_file(
        &self,
        folder: &FolderHandle,
        name: &str,
        local_path: &Path,
    ) -> Result<(), StoreError> {
        let data: Vec<u8> = tokio::fs::read(local_path).await.map_err(|e| StoreError::Io {
            path: local_path.display().to_string(),
            message: e.to_string(),
        })?;

        let metadata: Value = json!({ "name": name, "parents": [folder.as_str()] });
        let body: Vec<u8> = multipart_body(&metadata, &data, UPLOAD_BOUNDARY);

        let url: String = format!("{}/drive/v3/files", self.settings.upload_base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.access_token)
            .query(&[("uploadType", "multipart"), ("supportsAllDrives", "true")])
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", UPLOAD_BOUNDARY),
            )
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status: u16 = response.status().as_u16();
        if status != 200 {
            let text: String = response.text().await.unwrap_or_default();
            return Err(response_error(status, &text));
        }
        Ok(())
    }

    async fn delete_folder(&self, folder: &FolderHandle) -> Result<(), StoreError> {
        let url: String = format!(
            "{}/drive/v3/files/{}",
            self.settings.base_url,
            folder.as_str()
        );
        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.settings.access_token)
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(transport_error)?;

        let status: u16 = response.status().as_u16();
        // Drive answers 204 on successful deletion.
        if status != 200 && status != 204 {
            let text: String = response.text().await.unwrap_or_default();
            return Err(response_error(status, &text));
        }
        Ok(())
    }
}

/// Query for non-trashed child folders of a root.
fn child_folders_query(root: &FolderHandle) -> String {
    format!(
        "'{}' in parents and mimeType = '{}' and trashed = false",
        escape_query_value(root.as_str()),
        FOLDER_MIME_TYPE
    )
}

/// Query for a child folder with an exact name.
fn named_folder_query(root: &FolderHandle, name: &str) -> String {
    format!(
        "{} and name = '{}'",
        child_folders_query(root),
        escape_query_value(name)
    )
}

/// Query for all non-trashed children of a folder.
fn children_query(folder: &FolderHandle) -> String {
    format!(
        "'{}' in parents and trashed = false",
        escape_query_value(folder.as_str())
    )
}

/// Escape a value for embedding in a Drive query string literal.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Assemble a multipart/related body: JSON metadata part + binary content.
fn multipart_body(metadata: &Value, data: &[u8], boundary: &str) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

fn transport_error(err: reqwest::Error) -> StoreError {
    StoreError::Network {
        message: err.to_string(),
        retryable: err.is_timeout() || err.is_connect(),
    }
}

/// Map a non-success response to a [`StoreError`].
///
/// Drive reports throttling as a 403 whose error reason carries a
/// `rateLimitExceeded` marker, so the raw body is checked, not just the
/// status.
fn response_error(status: u16, body: &str) -> StoreError {
    let message: String = error_message(body);
    match status {
        404 => StoreError::NotFound { id: message },
        429 => StoreError::RateLimited { message },
        403 if body.contains("ateLimitExceeded") => StoreError::RateLimited { message },
        401 | 403 => StoreError::AccessDenied { message },
        500..=599 => StoreError::Network {
            message,
            retryable: true,
        },
        _ => StoreError::Other {
            message: format!("HTTP {}: {}", status, message),
        },
    }
}

/// Extract the message from the Google error envelope when present.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
