//! Spreadsheet access.
//!
//! The resolver never performs I/O; it works on a [`SpreadsheetSnapshot`]
//! handed to it by a [`SpreadsheetSource`].  The production source pulls
//! the sheet through Google's CSV export, and an in-memory source backs
//! tests and local demos.

use crate::error::SheetError;
use crate::models::SpreadsheetSnapshot;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Default location of Google's spreadsheet export endpoint.
pub const GOOGLE_SHEETS_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";

/// Supplies the full contents of one sheet of a spreadsheet.
#[async_trait]
pub trait SpreadsheetSource: Send + Sync {
    async fn snapshot(
        &self,
        spreadsheet_id: &str,
        sheet_id: u64,
    ) -> Result<SpreadsheetSnapshot, SheetError>;
}

/// Reads sheets through `{base_url}/{spreadsheet}/export?format=csv&gid={sheet}`.
///
/// The spreadsheet must be readable by anyone with the link.
#[derive(Debug, Clone)]
pub struct GoogleSheetsCsvSource {
    client: reqwest::Client,
    base_url: Url,
}

impl GoogleSheetsCsvSource {
    /// Every export request is abandoned after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SheetError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, SheetError> {
        let base_url =
            Url::parse(base_url).map_err(|e| SheetError::InvalidBaseUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(SheetError::InvalidBaseUrl(format!(
                "{} cannot carry a path",
                base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    /// The spreadsheet id is pushed as a single path segment, so `/`, `?`
    /// and `#` in it are percent-encoded rather than reshaping the URL.
    pub fn export_url(&self, spreadsheet_id: &str, sheet_id: u64) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(spreadsheet_id).push("export");
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("format", "csv")
            .append_pair("gid", &sheet_id.to_string());
        url
    }
}

#[async_trait]
impl SpreadsheetSource for GoogleSheetsCsvSource {
    async fn snapshot(
        &self,
        spreadsheet_id: &str,
        sheet_id: u64,
    ) -> Result<SpreadsheetSnapshot, SheetError> {
        let url = self.export_url(spreadsheet_id, sheet_id);
        debug!(%url, "fetching sheet export");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Err(SheetError::SheetNotFound);
        }
        if !status.is_success() {
            warn!(spreadsheet_id, sheet_id, status = status.as_u16(), "sheet export failed");
            return Err(SheetError::Upstream(status.as_u16()));
        }
        let body = response.text().await?;
        Ok(SpreadsheetSnapshot::from_csv_str(&body)?)
    }
}

/// Sheets held in memory, keyed by spreadsheet id and sheet id.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    sheets: HashMap<(String, u64), SpreadsheetSnapshot>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(
        mut self,
        spreadsheet_id: impl Into<String>,
        sheet_id: u64,
        snapshot: SpreadsheetSnapshot,
    ) -> Self {
        self.insert(spreadsheet_id, sheet_id, snapshot);
        self
    }

    pub fn insert(
        &mut self,
        spreadsheet_id: impl Into<String>,
        sheet_id: u64,
        snapshot: SpreadsheetSnapshot,
    ) {
        self.sheets.insert((spreadsheet_id.into(), sheet_id), snapshot);
    }
}

#[async_trait]
impl SpreadsheetSource for InMemorySource {
    async fn snapshot(
        &self,
        spreadsheet_id: &str,
        sheet_id: u64,
    ) -> Result<SpreadsheetSnapshot, SheetError> {
        self.sheets
            .get(&(spreadsheet_id.to_string(), sheet_id))
            .cloned()
            .ok_or(SheetError::SheetNotFound)
    }
}
