use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::chart::AxisKeyPolicy;

/// Environment variable holding the analysis API base URL.
pub const API_BASE_URL_ENV: &str = "ATOS_API_BASE_URL";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Base URL baked in at build time, if any.
const BUILD_API_BASE_URL: Option<&str> = option_env!("ATOS_API_BASE_URL");

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub timeout_secs: u64,
    pub axis_key_policy: AxisKeyPolicy,
    pub download_dir: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            axis_key_policy: AxisKeyPolicy::CaseInsensitive,
            download_dir: None,
            log_json: false,
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Resolve the API base URL: runtime env, config file, build-time env, default.
    pub fn resolved_base_url(&self) -> String {
        let env_url = std::env::var(API_BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        self.resolve_base_url_with(env_url)
    }

    fn resolve_base_url_with(&self, env_url: Option<String>) -> String {
        let chosen = env_url
            .or_else(|| self.api_base_url.clone().filter(|v| !v.trim().is_empty()))
            .or_else(|| BUILD_API_BASE_URL.map(str::to_string));

        match chosen {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                warn!(
                    "API base URL not configured (set {}); using {}",
                    API_BASE_URL_ENV, DEFAULT_API_BASE_URL
                );
                DEFAULT_API_BASE_URL.to_string()
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("atos").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atos").join("config.json");

        let mut config = Config::new();
        config.api_base_url = Some("http://analytics.internal:9000/".to_string());
        config.axis_key_policy = AxisKeyPolicy::Exact;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api_base_url": "http://x"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base_url.as_deref(), Some("http://x"));
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.axis_key_policy, AxisKeyPolicy::CaseInsensitive);
    }

    #[test]
    fn test_env_url_wins_and_trailing_slash_is_trimmed() {
        let mut config = Config::new();
        config.api_base_url = Some("http://from-file".to_string());

        assert_eq!(
            config.resolve_base_url_with(Some("http://from-env/".to_string())),
            "http://from-env"
        );
        assert_eq!(config.resolve_base_url_with(None), "http://from-file");
    }

    #[test]
    fn test_blank_file_url_is_ignored() {
        let mut config = Config::new();
        config.api_base_url = Some("   ".to_string());
        let url = config.resolve_base_url_with(None);
        let expected = BUILD_API_BASE_URL.unwrap_or(DEFAULT_API_BASE_URL);
        assert_eq!(url, expected.trim_end_matches('/'));
    }
}
