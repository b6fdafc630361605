use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ReleveError, Result};

pub const DB_FILE: &str = "releve.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Client used when a command omits `--client`.
    #[serde(default)]
    pub default_client: Option<String>,
    /// Trailing digits compared when matching masked account references.
    #[serde(default = "default_suffix_digits")]
    pub account_suffix_digits: usize,
    /// Largest cash-closure gap still considered balanced.
    #[serde(default)]
    pub closure_tolerance: Decimal,
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_suffix_digits() -> usize {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            default_client: None,
            account_suffix_digits: default_suffix_digits(),
            closure_tolerance: Decimal::ZERO,
            log_level: None,
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }

    /// Explicit `--client` wins over the configured default.
    pub fn client<'a>(&'a self, explicit: Option<&'a str>) -> Result<&'a str> {
        explicit
            .or(self.default_client.as_deref())
            .ok_or_else(|| ReleveError::Settings("no client given and no default_client configured".into()))
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("releve")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("releve")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ReleveError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
