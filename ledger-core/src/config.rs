//! Configuration management
//!
//! Settings live in `settings.json` inside the ledger directory:
//! ```json
//! {
//!   "transfer": { "maxRetries": 3 },
//!   "history": { "pageSize": 100 }
//! }
//! ```
//! Unknown fields are ignored.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::result::Error;
use crate::services::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Environment variable overriding `transfer.maxRetries`
pub const MAX_RETRIES_ENV: &str = "LEDGER_MAX_RETRIES";
/// Environment variable overriding `history.pageSize`
pub const PAGE_SIZE_ENV: &str = "LEDGER_HISTORY_PAGE_SIZE";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    transfer: TransferSettings,
    #[serde(default)]
    history: HistorySettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferSettings {
    #[serde(default)]
    max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistorySettings {
    #[serde(default)]
    page_size: Option<usize>,
}

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Attempts a contended transfer makes before reporting `Retryable`
    pub max_retries: u32,
    /// Records fetched per store round-trip when iterating history
    pub history_page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_ATTEMPTS,
            history_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    /// Load config from the ledger directory, then apply env overrides
    pub fn load(ledger_dir: &Path) -> Result<Self> {
        Self::load_with(ledger_dir, |name| std::env::var(name).ok())
    }

    /// Like [`Config::load`], reading overrides through `lookup`
    pub fn load_with(ledger_dir: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = read_settings(ledger_dir)?;
        let defaults = Self::default();

        let mut config = Self {
            max_retries: raw.transfer.max_retries.unwrap_or(defaults.max_retries),
            history_page_size: raw.history.page_size.unwrap_or(defaults.history_page_size),
        };

        if let Some(value) = lookup(MAX_RETRIES_ENV) {
            config.max_retries = parse_override(MAX_RETRIES_ENV, &value)?;
        }
        if let Some(value) = lookup(PAGE_SIZE_ENV) {
            config.history_page_size = parse_override(PAGE_SIZE_ENV, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_retries < 1 {
            return Err(Error::Config("transfer.maxRetries must be at least 1".into()).into());
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.history_page_size) {
            return Err(Error::Config(format!(
                "history.pageSize must be between 1 and {}",
                MAX_PAGE_SIZE
            ))
            .into());
        }
        Ok(())
    }
}

fn read_settings(ledger_dir: &Path) -> Result<SettingsFile> {
    let settings_path = ledger_dir.join("settings.json");
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)
        .with_context(|| format!("reading {}", settings_path.display()))?;
    serde_json::from_str(&content).map_err(|e| {
        anyhow::Error::from(Error::Config(format!(
            "{} is not valid: {}",
            settings_path.display(),
            e
        )))
    })
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| {
            anyhow::Error::from(Error::Config(format!(
                "{} must be a positive integer, got '{}'",
                name, value
            )))
        })
}
