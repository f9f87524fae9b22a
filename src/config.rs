//! User settings: `~/.config/rom-collector/settings.toml`, with `API_KEY`
//! and `DIRECTORY_PATH` taking precedence when set in the environment.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    api::ApiConfig,
    application::RetryPolicy,
    domain::{AppError, ConsoleSourceSet},
};

pub const API_KEY_VAR: &str = "API_KEY";
pub const DOWNLOAD_ROOT_VAR: &str = "DIRECTORY_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub download_root: PathBuf,
    pub api_base_url: String,
    pub user_agent: String,
    pub request_delay_ms: u64,
    pub mirror_delay_ms: u64,
    pub listing_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub chunk_size: usize,
    pub default_rom_count: usize,
    pub max_rom_count: usize,
    pub listing_retries: u32,
    pub retry_backoff_ms: u64,
    /// Replaces the built-in mirror table when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consoles: Option<BTreeMap<String, Vec<String>>>,
}

impl Default for Settings {
    fn default() -> Self {
        let api = ApiConfig::default();
        Self {
            api_key: String::new(),
            download_root: dirs::home_dir().unwrap_or_default(),
            api_base_url: api.base_url,
            user_agent: api.user_agent,
            request_delay_ms: 500,
            mirror_delay_ms: 500,
            listing_timeout_secs: 30,
            connect_timeout_secs: 30,
            chunk_size: 8192,
            default_rom_count: 10,
            max_rom_count: 100,
            listing_retries: 1,
            retry_backoff_ms: 1000,
            consoles: None,
        }
    }
}

pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("rom-collector").join("settings.toml")
}

impl Settings {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, AppError> {
        let mut settings = Self::load_from(&settings_path())?;
        settings.apply_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// A missing file yields defaults; a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Non-empty values from `lookup` replace the API key and download root.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_VAR).filter(|v| !v.trim().is_empty()) {
            self.api_key = key.trim().to_string();
        }
        if let Some(root) = lookup(DOWNLOAD_ROOT_VAR).filter(|v| !v.trim().is_empty()) {
            self.download_root = PathBuf::from(root.trim());
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::Config(format!(
                "API key is not set; add api_key to {} or set {API_KEY_VAR}",
                settings_path().display()
            )));
        }
        if self.download_root.as_os_str().is_empty() {
            return Err(AppError::Config(format!(
                "download directory is not set; set {DOWNLOAD_ROOT_VAR}"
            )));
        }
        if self.max_rom_count == 0 || self.default_rom_count > self.max_rom_count {
            return Err(AppError::Config(format!(
                "default_rom_count ({}) must be between 1 and max_rom_count ({})",
                self.default_rom_count, self.max_rom_count
            )));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<(), AppError> {
        self.save_to(&settings_path())
    }

    /// Write atomically through a sibling temp file.
    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            api_key: self.api_key.clone(),
            base_url: self.api_base_url.clone(),
            user_agent: self.user_agent.clone(),
            listing_timeout: Duration::from_secs(self.listing_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn source_set(&self) -> ConsoleSourceSet {
        match &self.consoles {
            Some(table) => ConsoleSourceSet::new(table.clone()),
            None => ConsoleSourceSet::builtin(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.listing_retries,
            delay: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn mirror_delay(&self) -> Duration {
        Duration::from_millis(self.mirror_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings.default_rom_count, 10);
        assert_eq!(settings.max_rom_count, 100);
        assert_eq!(settings.chunk_size, 8192);
        assert_eq!(settings.api_base_url, "https://retroachievements.org/API");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            r#"
api_key = "abc"
request_delay_ms = 0

[consoles]
"Game Boy" = ["https://mirror.example/gb/"]
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.api_key, "abc");
        assert_eq!(settings.request_delay(), Duration::ZERO);
        assert_eq!(settings.mirror_delay_ms, 500);

        let sources = settings.source_set();
        assert_eq!(sources.supported_consoles(), vec!["Game Boy"]);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "api_key = [").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut settings = Settings {
            api_key: "from-file".to_string(),
            ..Settings::default()
        };
        settings.apply_overrides(|name| match name {
            API_KEY_VAR => Some(" from-env ".to_string()),
            DOWNLOAD_ROOT_VAR => Some("/srv/roms".to_string()),
            _ => None,
        });
        assert_eq!(settings.api_key, "from-env");
        assert_eq!(settings.download_root, PathBuf::from("/srv/roms"));

        settings.apply_overrides(|_| Some(String::new()));
        assert_eq!(settings.api_key, "from-env");
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings {
            download_root: PathBuf::from("/roms"),
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(AppError::Config(_))));

        settings.api_key = "key".to_string();
        assert!(settings.validate().is_ok());

        settings.download_root = PathBuf::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings = Settings {
            api_key: "key".to_string(),
            download_root: PathBuf::from("/roms"),
            max_rom_count: 25,
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();
        assert!(!path.with_extension("toml.tmp").exists());
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_builtin_sources_without_override() {
        let sources = Settings::default().source_set();
        assert!(sources.is_supported("Arcade"));
        assert!(!sources.is_supported("Virtual Boy"));
    }
}
