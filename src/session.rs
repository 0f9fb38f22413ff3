//! Persisted browser session cookies.
//!
//! The cookie file is the only state carried between runs. A missing,
//! empty, or unparseable file is a valid "no session" state: the run
//! falls back to login instead of erroring.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
use serde::{Deserialize, Serialize};

/// One cookie as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

impl From<&Cookie> for StoredCookie {
    fn from(cookie: &Cookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: Some(cookie.domain.clone()),
            path: Some(cookie.path.clone()),
            expires: Some(cookie.expires),
            http_only: cookie.http_only,
            secure: cookie.secure,
        }
    }
}

impl StoredCookie {
    /// Convert to a CDP cookie parameter for restoring into a fresh page.
    pub fn to_param(&self) -> CookieParam {
        let mut param = CookieParam::new(self.name.clone(), self.value.clone());
        param.domain = self.domain.clone();
        param.path = self.path.clone();
        param.http_only = Some(self.http_only);
        param.secure = Some(self.secure);
        param
    }
}

/// Reads and writes the session cookie file.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted session.
    ///
    /// Returns `None` for a missing file, an empty cookie array, or content
    /// that fails to parse; none of these are errors.
    pub fn load(&self) -> Option<Vec<StoredCookie>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => {
                tracing::debug!(path = %self.path.display(), "No cookie file found");
                return None;
            }
        };

        match serde_json::from_str::<Vec<StoredCookie>>(&content) {
            Ok(cookies) if cookies.is_empty() => None,
            Ok(cookies) => Some(cookies),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %self.path.display(),
                    "Cookie file unreadable; proceeding without a session"
                );
                None
            }
        }
    }

    /// Persist cookies, overwriting any previous session.
    ///
    /// Writes to a temp file in the same directory and renames it into
    /// place so a crash mid-write cannot corrupt the previous valid file.
    pub fn save(&self, cookies: &[StoredCookie]) -> Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let content =
            serde_json::to_string_pretty(cookies).context("Failed to serialize cookies")?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .context("Failed to create temporary cookie file")?;
        tmp.write_all(content.as_bytes())
            .context("Failed to write cookies")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace cookie file: {}", self.path.display()))?;

        tracing::info!(count = cookies.len(), "Session cookies saved");
        Ok(())
    }

    /// Delete the persisted session if present. Idempotent.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to delete cookie file: {}", self.path.display()))?;
            tracing::info!(path = %self.path.display(), "Session cookies deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_cookies() -> Vec<StoredCookie> {
        vec![
            StoredCookie {
                name: "c_user".to_string(),
                value: "123".to_string(),
                domain: Some(".facebook.com".to_string()),
                path: Some("/".to_string()),
                expires: Some(1.9e9),
                http_only: false,
                secure: true,
            },
            StoredCookie {
                name: "xs".to_string(),
                value: "abc".to_string(),
                domain: Some(".facebook.com".to_string()),
                path: Some("/".to_string()),
                expires: None,
                http_only: true,
                secure: true,
            },
        ]
    }

    #[test]
    fn missing_file_is_no_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("cookies.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn empty_array_is_no_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(SessionStore::new(&path).load().is_none());
    }

    #[test]
    fn corrupt_file_is_no_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(SessionStore::new(&path).load().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("cookies.json"));
        let cookies = sample_cookies();
        store.save(&cookies).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), cookies.len());
        for (a, b) in loaded.iter().zip(&cookies) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.value, b.value);
            assert_eq!(a.domain, b.domain);
        }
    }

    #[test]
    fn save_overwrites_previous_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("cookies.json"));
        store.save(&sample_cookies()).unwrap();
        store.save(&sample_cookies()[..1]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("cookies.json"));
        store.clear().unwrap();
        store.save(&sample_cookies()).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
    }
}
