use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

pub const APP_DIR: &str = "gemini-chat";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_TYPING_INTERVAL_MS: u64 = 75;
pub const DEFAULT_LOADING_DELAY_MS: u64 = 500;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
    pub typing_interval_ms: Option<u64>,
    pub loading_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub suggestions: Option<Vec<String>>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Layer command-line / environment values over the file values.
    pub fn with_overrides(
        mut self,
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if model.is_some() {
            self.model = model;
        }
        if base_url.is_some() {
            self.base_url = base_url;
        }
        self
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }

    pub fn typing_interval(&self) -> Duration {
        Duration::from_millis(self.typing_interval_ms.unwrap_or(DEFAULT_TYPING_INTERVAL_MS).max(1))
    }

    pub fn loading_delay(&self) -> Duration {
        Duration::from_millis(self.loading_delay_ms.unwrap_or(DEFAULT_LOADING_DELAY_MS))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn suggestions(&self) -> Vec<String> {
        match &self.suggestions {
            Some(list) if !list.is_empty() => list.clone(),
            _ => default_suggestions(),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR).join("config.json"))
    }

    /// Directory holding the saved conversation, theme and log file.
    pub fn default_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join(APP_DIR))
    }
}

fn default_suggestions() -> Vec<String> {
    [
        "Help me plan a game night with my 5 best friends for under $100.",
        "What are the best tips to improve my public speaking skills?",
        "Can you help me find the latest news on web development?",
        "Write JavaScript code to sum all elements in an array.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();

        assert!(config.api_key.is_none());
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.typing_interval(), Duration::from_millis(75));
        assert_eq!(config.loading_delay(), Duration::from_millis(500));
        assert!(config.request_timeout().is_none());
        assert_eq!(config.suggestions().len(), 4);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            model: Some("gemini-1.5-flash".to_string()),
            typing_interval_ms: Some(10),
            ..Config::new()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.model(), "gemini-1.5-flash");
        assert_eq!(loaded.typing_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = Config {
            api_key: Some("from-file".to_string()),
            model: Some("file-model".to_string()),
            ..Config::new()
        };

        let config = config.with_overrides(Some("from-env".to_string()), None, Some("http://localhost:1".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.model(), "file-model");
        assert_eq!(config.base_url(), "http://localhost:1");
    }

    #[test]
    fn test_blank_key_override_is_ignored() {
        let config = Config {
            api_key: Some("from-file".to_string()),
            ..Config::new()
        };

        let config = config.with_overrides(Some("  ".to_string()), None, None);
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_empty_suggestions_fall_back() {
        let config = Config {
            suggestions: Some(Vec::new()),
            ..Config::new()
        };
        assert_eq!(config.suggestions().len(), 4);
    }
}
