//! Configuration management for companion-chat

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub indicator: IndicatorConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Timeout for the JSON endpoints (not the response stream)
    pub request_timeout_secs: u64,
    /// Close the response stream if no bytes arrive for this long
    pub stream_idle_timeout_secs: u64,
    pub endpoints: EndpointsConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 10,
            stream_idle_timeout_secs: 60,
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

/// Endpoint paths relative to `base_url`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointsConfig {
    pub create_session: String,
    pub send_prompt: String,
    pub stream_response: String,
    pub list_sessions: String,
    pub session_history: String,
    pub clear_sessions: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            create_session: "/chatLLM/start".to_string(),
            send_prompt: "/chatLLM/sendPrompt".to_string(),
            stream_response: "/chatLLM/responseLLM".to_string(),
            list_sessions: "/chatLLM/uploadChats".to_string(),
            session_history: "/chatLLM/getChat".to_string(),
            clear_sessions: "/chatLLM/clearChats".to_string(),
        }
    }
}

/// Thinking placeholder shown while waiting for the first token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub label: String,
    pub interval_ms: u64,
    /// Dots cycle from 0 up to this count
    pub max_dots: u8,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            label: "I am thinking".to_string(),
            interval_ms: 500,
            max_dots: 3,
        }
    }
}

impl IndicatorConfig {
    pub fn interval(&self) -> Duration {
        // tokio intervals panic on a zero period
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Text-to-speech of completed replies via an external program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub command: String,
    pub args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "espeak".to_string(),
            args: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or fall back to defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "companion-chat") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    /// Save configuration to the given path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply a base URL override, validating it first
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        url::Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
        self.backend.base_url = base_url.to_string();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[backend]
base_url = "http://chat.local:8080"

[backend.endpoints]
send_prompt = "/api/prompt"

[indicator]
interval_ms = 250
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend.base_url, "http://chat.local:8080");
        assert_eq!(config.backend.endpoints.send_prompt, "/api/prompt");
        assert_eq!(config.backend.endpoints.create_session, "/chatLLM/start");
        assert_eq!(config.indicator.interval_ms, 250);
        assert_eq!(config.indicator.label, "I am thinking");
        assert!(!config.speech.enabled);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.speech.enabled = true;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backend = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_base_url_override_is_validated() {
        assert!(Config::default().with_base_url("not a url").is_err());
        let config = Config::default()
            .with_base_url("http://localhost:9000")
            .unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let indicator = IndicatorConfig {
            interval_ms: 0,
            ..IndicatorConfig::default()
        };
        assert_eq!(indicator.interval(), Duration::from_millis(1));
    }
}
