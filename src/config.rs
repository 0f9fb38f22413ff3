use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_sheet_name() -> String {
    "Evidencias".to_string()
}

fn default_cookies_file() -> PathBuf {
    PathBuf::from("cookies.json")
}

fn default_screenshots_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_headless() -> bool {
    true
}

/// Google Drive/Sheets configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Spreadsheet holding the evidence ledger.
    pub sheet_id: String,

    /// Sheet (tab) name the ledger rows are appended to.
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Path to the service-account JSON key file. If relative, resolved
    /// from the config file location.
    pub service_account_key_file: Option<PathBuf>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            sheet_id: String::new(),
            sheet_name: default_sheet_name(),
            service_account_key_file: None,
        }
    }
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run Chrome headless. Headed runs are useful for the manual login path.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Explicit Chrome/Chromium binary. When unset, the usual install
    /// locations are searched.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_executable: None,
        }
    }
}

/// Local filesystem paths used by a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Persisted session cookies (JSON array).
    #[serde(default = "default_cookies_file")]
    pub cookies_file: PathBuf,

    /// Working directory captured images are written to.
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cookies_file: default_cookies_file(),
            screenshots_dir: default_screenshots_dir(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Loaded configuration with paths resolved from the config file location.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub google: GoogleConfig,
    pub browser: BrowserSettings,
    pub cookies_file: PathBuf,
    pub screenshots_dir: PathBuf,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./adshot.toml` if it exists in the current directory
/// 2. `~/.local/share/adshot/adshot.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("adshot.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("adshot").join("adshot.toml");
    }

    local_config
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

impl ResolvedConfig {
    /// Load and resolve config from a file path.
    ///
    /// Relative paths are resolved against the config file's parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?;
        Ok(Self::from_config(config, config_dir))
    }

    /// Load config, falling back to defaults if the file doesn't exist.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            let config_path = if config_path.is_relative() {
                std::env::current_dir()
                    .context("Failed to get current directory")?
                    .join(config_path)
            } else {
                config_path.to_path_buf()
            };

            let config_dir = config_path
                .parent()
                .context("Config path has no parent directory")?;

            Ok(Self::from_config(Config::default(), config_dir))
        }
    }

    fn from_config(config: Config, config_dir: &Path) -> Self {
        let mut google = config.google;
        google.service_account_key_file = google
            .service_account_key_file
            .map(|p| resolve(config_dir, p));

        Self {
            google,
            browser: config.browser,
            cookies_file: resolve(config_dir, config.paths.cookies_file),
            screenshots_dir: resolve(config_dir, config.paths.screenshots_dir),
        }
    }
}
