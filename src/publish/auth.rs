//! Service-account authentication for the Google APIs.
//!
//! Mints a signed JWT assertion from the service-account key and trades
//! it for a short-lived bearer token. Tests can bypass the whole dance
//! with a static token.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Scopes required for the spreadsheet ledger, Drive uploads, and storage.
const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/devstorage.read_write",
];

const TOKEN_LIFETIME_SECS: u64 = 3600;
/// Refresh this long before the token actually expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The fields we need from a standard Google service-account JSON key.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service-account key: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse service-account key: {}", path.display()))
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

enum TokenSource {
    ServiceAccount(ServiceAccountKey),
    Static(String),
}

/// Token provider shared by the Drive and Sheets clients.
pub struct GoogleAuth {
    source: TokenSource,
    client: Client,
    cached: Mutex<Option<(String, Instant)>>,
}

impl GoogleAuth {
    pub fn from_key(key: ServiceAccountKey) -> Self {
        Self {
            source: TokenSource::ServiceAccount(key),
            client: Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Use a fixed token instead of minting one (useful for tests).
    pub fn with_static_token(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            client: Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Return a bearer token, minting or refreshing as needed.
    pub async fn access_token(&self) -> Result<String> {
        let key = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(key) => key,
        };

        let mut cached = self.cached.lock().await;
        if let Some((token, expires_at)) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < *expires_at {
                return Ok(token.clone());
            }
        }

        let token_uri = key.token_uri.as_str();
        let assertion = self.sign_assertion(key, token_uri)?;
        let response = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("Token request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read token response")?;
        if !status.is_success() {
            anyhow::bail!("Token request failed ({status}): {body}");
        }

        let token: TokenResponse =
            serde_json::from_str(&body).context("Failed to parse token response")?;
        let lifetime = token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS);

        tracing::debug!(expires_in = lifetime, "Obtained Google access token");
        *cached = Some((
            token.access_token.clone(),
            Instant::now() + Duration::from_secs(lifetime),
        ));
        Ok(token.access_token)
    }

    fn sign_assertion(&self, key: &ServiceAccountKey, audience: &str) -> Result<String> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = Claims {
            iss: &key.client_email,
            scope: SCOPES.join(" "),
            aud: audience,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Service-account private key is not valid RSA PEM")?;
        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .context("Failed to sign JWT assertion")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let auth = GoogleAuth::with_static_token("test-token");
        assert_eq!(auth.access_token().await.unwrap(), "test-token");
    }

    #[test]
    fn key_token_uri_defaults_to_google_endpoint() {
        let key: ServiceAccountKey = serde_json::from_str(
            r#"{"client_email":"svc@example.iam.gserviceaccount.com","private_key":"pem"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
    }
}
