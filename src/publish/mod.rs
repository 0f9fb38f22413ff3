//! Publishing: Drive upload + spreadsheet ledger append.

mod auth;
mod drive;
mod sheets;

pub use auth::{GoogleAuth, ServiceAccountKey};
pub use drive::DriveClient;
pub use sheets::SheetsClient;

use crate::error::RunError;
use crate::job::{CaptureArtifact, CaptureRequest, LedgerRecord};

/// Uploads a capture to the month's Drive folder and records it in the
/// evidence ledger.
pub struct Publisher {
    drive: DriveClient,
    sheets: SheetsClient,
    sheet_id: String,
    sheet_name: String,
}

impl Publisher {
    pub fn new(
        drive: DriveClient,
        sheets: SheetsClient,
        sheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
    ) -> Self {
        Self {
            drive,
            sheets,
            sheet_id: sheet_id.into(),
            sheet_name: sheet_name.into(),
        }
    }

    /// Upload the artifact and append its ledger row. Returns the
    /// link-accessible image URL.
    pub async fn publish(
        &self,
        artifact: &CaptureArtifact,
        request: &CaptureRequest,
    ) -> Result<String, RunError> {
        let folder_id = request.month.folder_id();

        let image_url = self
            .drive
            .upload(&artifact.file_path, folder_id)
            .await
            .map_err(RunError::PublishFailed)?;

        let record = LedgerRecord {
            account_id: request.account_id.clone(),
            ad_set_id: request.ad_set_id.clone(),
            image_url: image_url.clone(),
            label: request.label.clone(),
            report_kind: request.report_kind,
        };

        self.sheets
            .append(&self.sheet_id, &self.sheet_name, &record)
            .await
            .map_err(RunError::PublishFailed)?;

        Ok(image_url)
    }
}
