//! Application configuration.
//!
//! Persisted settings live in the platform config directory
//! (`~/.config/setcache/config.json` on Linux). Environment variables
//! override the file: `SETCACHE_API_URL` for the server, and
//! `SETCACHE_USERNAME` / `SETCACHE_PASSWORD` for non-interactive sign-in.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "setcache";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    /// Username to suggest at the login prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_username: Option<String>,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join(APP_NAME);
        Ok(dir.join(CONFIG_FILE))
    }

    /// Load the config file; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Effective API base URL: env override, then config, then default.
    pub fn api_base_url(&self) -> String {
        std::env::var("SETCACHE_API_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }
}

/// Directory for the persistent KV store
/// (`~/.cache/setcache` on Linux).
pub fn cache_dir() -> Result<PathBuf> {
    Ok(dirs::cache_dir()
        .context("Could not determine cache directory")?
        .join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, "{}");
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert!(parsed.api_base_url.is_none());
    }

    #[test]
    fn file_value_beats_default() {
        let config = Config {
            api_base_url: Some("https://fit.example.com/api".into()),
            last_username: None,
        };
        // Env override not set in tests; config value wins over default
        if std::env::var("SETCACHE_API_URL").is_err() {
            assert_eq!(config.api_base_url(), "https://fit.example.com/api");
        }
    }
}
