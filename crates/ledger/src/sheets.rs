//! Google Sheets v4 REST implementation of [`LedgerClient`].
//!
//! The main ledger is the spreadsheet's first sheet; the quarantine log
//! lives in a secondary sheet named [`QUARANTINE_SHEET`], auto-created with
//! its header on first access. The embedding process supplies a
//! ready-to-use OAuth access token.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::LedgerError;
use crate::traits::LedgerClient;
use crate::types::{
    LedgerSnapshot, PriorityFlag, QuarantineEntry, COL_ID, COL_PRIORITY, COL_SHARE_LINK,
};

/// Name of the quarantine log sheet.
pub const QUARANTINE_SHEET: &str = "PAPELERA_LOG";

/// Header row written when the quarantine log sheet is created.
const QUARANTINE_HEADER: [&str; 2] = ["ID_MP", "ESTADO"];

/// Range covering the harvestable columns of the main sheet.
/// No sheet prefix: the Sheets API resolves it against the first sheet,
/// which is where the ledger lives.
const MAIN_RANGE: &str = "A1:P";

/// Configuration for [`SheetsLedger`].
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Spreadsheet id.
    pub spreadsheet_id: String,
    /// OAuth bearer token with spreadsheet scope.
    pub access_token: String,
    /// API endpoint; overridable for tests.
    pub base_url: String,
}

impl LedgerSettings {
    /// Settings against the production Sheets endpoint.
    pub fn new(spreadsheet_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
            base_url: "https://sheets.googleapis.com".to_string(),
        }
    }
}

/// [`LedgerClient`] implementation over the Google Sheets v4 REST API.
pub struct SheetsLedger {
    http: reqwest::Client,
    settings: LedgerSettings,
}

/// Body shape of a `values.get` response.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsLedger {
    /// Create a client.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when the spreadsheet id or token is empty.
    pub fn new(settings: LedgerSettings) -> Result<Self, LedgerError> {
        if settings.spreadsheet_id.trim().is_empty() {
            return Err(LedgerError::InvalidConfig {
                message: "spreadsheet id is empty".to_string(),
            });
        }
        if settings.access_token.trim().is_empty() {
            return Err(LedgerError::InvalidConfig {
                message: "access token is empty".to_string(),
            });
        }
        Ok(Self {
            http: reqwest::Client::new(),
            settings,
        })
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            self.settings.base_url, self.settings.spreadsheet_id, range, suffix
        )
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, LedgerError> {
        let response = self
            .http
            .get(self.values_url(range, ""))
            .bearer_auth(&self.settings.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let status: u16 = response.status().as_u16();
        if status != 200 {
            let body: String = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let body: ValueRange = response.json().await.map_err(|e| LedgerError::Malformed {
            message: e.to_string(),
        })?;
        Ok(body.values)
    }

    async fn post_values(&self, url: String, body: Value) -> Result<(), LedgerError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.settings.access_token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status: u16 = response.status().as_u16();
        if status != 200 {
            let text: String = response.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }
        Ok(())
    }

    async fn update_cell(&self, range: &str, value: &str) -> Result<(), LedgerError> {
        let url: String = self.values_url(range, "?valueInputOption=RAW");
        let body: Value = json!({ "values": [[value]] });
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.settings.access_token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status: u16 = response.status().as_u16();
        if status != 200 {
            let text: String = response.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }
        Ok(())
    }

    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), LedgerError> {
        self.post_values(
            self.values_url(range, ":append?valueInputOption=RAW"),
            json!({ "values": rows }),
        )
        .await
    }

    async fn clear_range(&self, range: &str) -> Result<(), LedgerError> {
        self.post_values(self.values_url(range, ":clear"), json!({})).await
    }

    /// Locate a record's absolute row by exact id match in the id column,
    /// falling back to a trimmed comparison.
    async fn find_row(&self, id: &str) -> Result<Option<u64>, LedgerError> {
        let column: String = format!("{0}1:{0}", column_letter(COL_ID));
        let rows: Vec<Vec<String>> = self.get_values(&column).await?;

        let matches = |candidate: &str| candidate == id || candidate.trim() == id.trim();
        for (index, row) in rows.iter().enumerate().skip(1) {
            if row.first().map(|c| matches(c)).unwrap_or(false) {
                return Ok(Some(index as u64 + 1));
            }
        }
        Ok(None)
    }

    async fn write_record_cell(
        &self,
        id: &str,
        column: usize,
        value: &str,
    ) -> Result<(), LedgerError> {
        let row: u64 = self
            .find_row(id)
            .await?
            .ok_or_else(|| LedgerError::RowNotFound { id: id.to_string() })?;
        let range: String = format!("{}{}", column_letter(column), row);
        self.update_cell(&range, value).await
    }

    /// Create the quarantine sheet with its header row.
    async fn create_quarantine_sheet(&self) -> Result<(), LedgerError> {
        log::info!("Creating quarantine log sheet '{}'", QUARANTINE_SHEET);
        let url: String = format!(
            "{}/v4/spreadsheets/{}:batchUpdate",
            self.settings.base_url, self.settings.spreadsheet_id
        );
        let body: Value = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": QUARANTINE_SHEET,
                        "gridProperties": { "rowCount": 1000, "columnCount": 2 }
                    }
                }
            }]
        });
        self.post_values(url, body).await?;
        self.append_rows(&quarantine_range(), vec![header_row()]).await
    }
}

#[async_trait]
impl LedgerClient for SheetsLedger {
    async fn fetch_records(&self) -> Result<LedgerSnapshot, LedgerError> {
        let rows: Vec<Vec<String>> = self.get_values(MAIN_RANGE).await?;
        let snapshot = LedgerSnapshot::from_rows(&rows);
        log::info!(
            "Ledger read: {} records, {} valid ids",
            snapshot.records.len(),
            snapshot.valid_ids.len()
        );
        Ok(snapshot)
    }

    async fn write_share_link(&self, id: &str, link: &str) -> Result<(), LedgerError> {
        self.write_record_cell(id, COL_SHARE_LINK, link).await
    }

    async fn set_priority(&self, id: &str, flag: PriorityFlag) -> Result<(), LedgerError> {
        self.write_record_cell(id, COL_PRIORITY, flag.as_cell()).await
    }

    async fn read_quarantine(&self) -> Result<BTreeSet<String>, LedgerError> {
        let rows: Vec<Vec<String>> = match self.get_values(&quarantine_range()).await {
            Ok(rows) => rows,
            // A 400 on a sheet-qualified range means the sheet does not
            // exist yet ("Unable to parse range").
            Err(LedgerError::Api { status: 400, .. }) => {
                self.create_quarantine_sheet().await?;
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let ids: BTreeSet<String> = rows
            .iter()
            .skip(1)
            .filter_map(|row| row.first())
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        Ok(ids)
    }

    async fn append_quarantine(&self, entries: &[QuarantineEntry]) -> Result<(), LedgerError> {
        if entries.is_empty() {
            return Ok(());
        }
        self.append_rows(&quarantine_range(), entry_rows(entries)).await
    }

    async fn rewrite_quarantine(&self, entries: &[QuarantineEntry]) -> Result<(), LedgerError> {
        self.clear_range(&quarantine_range()).await?;
        let mut rows: Vec<Vec<String>> = vec![header_row()];
        rows.extend(entry_rows(entries));
        self.append_rows(&quarantine_range(), rows).await
    }
}

fn quarantine_range() -> String {
    format!("{}!A1:B", QUARANTINE_SHEET)
}

fn header_row() -> Vec<String> {
    QUARANTINE_HEADER.iter().map(|s| s.to_string()).collect()
}

fn entry_rows(entries: &[QuarantineEntry]) -> Vec<Vec<String>> {
    entries
        .iter()
        .map(|e| vec![e.id.clone(), e.state.as_cell().to_string()])
        .collect()
}

/// A1-notation letter for a 1-based column index (A..Z only; the ledger
/// never reaches past column P).
fn column_letter(column: usize) -> char {
    debug_assert!((1..=26).contains(&column));
    (b'A' + (column as u8 - 1)) as char
}

fn transport_error(err: reqwest::Error) -> LedgerError {
    LedgerError::Network {
        message: err.to_string(),
    }
}

/// Map a non-200 response to an API error, extracting the message from the
/// Google error envelope when present.
fn api_error(status: u16, body: &str) -> LedgerError {
    let message: String = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.chars().take(200).collect());
    LedgerError::Api { status, message }
}
