//! Google Sheets ledger client.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;

use super::auth::GoogleAuth;
use crate::job::LedgerRecord;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4";

/// Appends ledger rows to a spreadsheet range.
pub struct SheetsClient {
    client: Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
}

impl SheetsClient {
    pub fn new(auth: Arc<GoogleAuth>) -> Self {
        Self {
            client: Client::new(),
            auth,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override API base URL (useful for tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Append one record to the ledger range. No retry; a failure here is
    /// surfaced as-is.
    pub async fn append(
        &self,
        spreadsheet_id: &str,
        range: &str,
        record: &LedgerRecord,
    ) -> Result<()> {
        let token = self.auth.access_token().await?;
        let url = format!(
            "{}/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.base_url.trim_end_matches('/'),
            spreadsheet_id,
            urlencoding::encode(range),
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({ "values": [record.row()] }))
            .send()
            .await
            .context("Sheets append request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Sheets append failed ({status}): {body}");
        }

        tracing::info!(range, "Ledger row appended");
        Ok(())
    }
}
