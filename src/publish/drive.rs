//! Google Drive upload client.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::auth::GoogleAuth;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

const MULTIPART_BOUNDARY: &str = "adshot-drive-upload";

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// Thin Drive v3 client: multipart create, permission grant, direct link.
pub struct DriveClient {
    client: Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
    upload_base_url: String,
}

impl DriveClient {
    pub fn new(auth: Arc<GoogleAuth>) -> Self {
        Self {
            client: Client::new(),
            auth,
            base_url: DEFAULT_BASE_URL.to_string(),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
        }
    }

    /// Override API base URLs (useful for tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.upload_base_url = format!("{}/upload", base_url.trim_end_matches('/'));
        self.base_url = base_url;
        self
    }

    /// Upload `file_path` into the Drive folder, make it link-accessible,
    /// and return the direct-access URL.
    ///
    /// The three sub-steps (create, permission, link) are all-or-nothing:
    /// any failure aborts the upload with no partial cleanup.
    pub async fn upload(&self, file_path: &Path, folder_id: &str) -> Result<String> {
        let file_id = self.create_file(file_path, folder_id).await?;
        tracing::info!(file_id, "File uploaded to Drive");

        self.grant_public_read(&file_id).await?;

        Ok(format!("https://drive.google.com/uc?id={file_id}"))
    }

    async fn create_file(&self, file_path: &Path, folder_id: &str) -> Result<String> {
        let file_name = file_path
            .file_name()
            .context("Capture path has no file name")?
            .to_string_lossy()
            .into_owned();
        let bytes = std::fs::read(file_path)
            .with_context(|| format!("Failed to read capture: {}", file_path.display()))?;

        let metadata = json!({
            "name": file_name,
            "mimeType": "image/png",
            "parents": [folder_id],
        });
        let body = multipart_related(&metadata.to_string(), &bytes);

        let token = self.auth.access_token().await?;
        let url = format!(
            "{}/files?uploadType=multipart&supportsAllDrives=true&fields=id",
            self.upload_base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await
            .context("Drive upload request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Drive upload response")?;
        if !status.is_success() {
            anyhow::bail!("Drive upload failed ({status}): {body}");
        }

        let created: CreatedFile =
            serde_json::from_str(&body).context("Failed to parse Drive upload response")?;
        Ok(created.id)
    }

    async fn grant_public_read(&self, file_id: &str) -> Result<()> {
        let token = self.auth.access_token().await?;
        let url = format!(
            "{}/files/{file_id}/permissions?supportsAllDrives=true",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .context("Drive permission request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Drive permission grant failed ({status}): {body}");
        }
        Ok(())
    }
}

/// Assemble a `multipart/related` body: one JSON metadata part, one
/// binary content part.
fn multipart_related(metadata: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{MULTIPART_BOUNDARY}\r\nContent-Type: image/png\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_body_has_both_parts_and_terminator() {
        let body = multipart_related(r#"{"name":"x"}"#, b"\x89PNG");
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains(r#"{"name":"x"}"#));
        assert!(text.contains("Content-Type: image/png"));
        assert!(text.ends_with(&format!("--{MULTIPART_BOUNDARY}--\r\n")));
    }
}
