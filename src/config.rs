use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, VkError};
use crate::preview::PLACEHOLDER;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub longpoll: LongPollConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub version: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: default_api_version(),
            timeout_secs: default_api_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongPollConfig {
    /// Seconds the server holds a request open before answering empty
    #[serde(default = "default_wait")]
    pub wait_secs: u64,
    #[serde(default)]
    pub mode: u32,
    #[serde(default = "default_lp_version")]
    pub version: u32,
}

impl LongPollConfig {
    /// Client-side budget for one long-poll request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_secs * 2)
    }
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            wait_secs: default_wait(),
            mode: 0,
            version: default_lp_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_period")]
    pub requests_per_period: usize,
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_period: default_requests_per_period(),
            period_ms: default_period_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    #[serde(default = "default_tokens_file")]
    pub tokens_file: PathBuf,
    #[serde(default = "default_preview_width")]
    pub preview_width: usize,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            tokens_file: default_tokens_file(),
            preview_width: default_preview_width(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_base_url() -> String {
    "https://api.vk.com/method".to_string()
}

fn default_api_version() -> String {
    "5.131".to_string()
}

fn default_api_timeout() -> u64 {
    30
}

fn default_wait() -> u64 {
    25
}

fn default_lp_version() -> u32 {
    1
}

fn default_requests_per_period() -> usize {
    3
}

fn default_period_ms() -> u64 {
    1000
}

fn default_tokens_file() -> PathBuf {
    PathBuf::from("tokens.txt")
}

fn default_preview_width() -> usize {
    25
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| VkError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| VkError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                VkError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| VkError::Config(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| VkError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(VkError::Config("api.base_url cannot be empty".to_string()));
        }
        if self.api.version.trim().is_empty() {
            return Err(VkError::Config("api.version cannot be empty".to_string()));
        }
        if self.api.timeout_secs == 0 {
            return Err(VkError::Config(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }

        // VK caps the long-poll wait at 90 seconds
        if self.longpoll.wait_secs == 0 || self.longpoll.wait_secs > 90 {
            return Err(VkError::Config(
                "longpoll.wait_secs must be between 1 and 90".to_string(),
            ));
        }

        if self.rate_limit.requests_per_period == 0 {
            return Err(VkError::Config(
                "rate_limit.requests_per_period must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.period_ms == 0 {
            return Err(VkError::Config(
                "rate_limit.period_ms must be greater than 0".to_string(),
            ));
        }

        if self.accounts.tokens_file.as_os_str().is_empty() {
            return Err(VkError::Config(
                "accounts.tokens_file cannot be empty".to_string(),
            ));
        }
        // Narrower previews could never hold the placeholder
        let min_width = PLACEHOLDER.chars().count();
        if self.accounts.preview_width < min_width {
            return Err(VkError::Config(format!(
                "accounts.preview_width must be at least {}",
                min_width
            )));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}
