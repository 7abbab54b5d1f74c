use std::time::Duration;

use serde::Deserialize;

use crate::domain::retry::RetryConfig;
use crate::domain::split::{
    SplitLimits, DEFAULT_CONCURRENCY_LEVEL, DEFAULT_STARTING_PAGE_NUMBER, MAX_CONCURRENCY_LEVEL,
    MAX_PAGES_PER_SPLIT, MIN_PAGES_PER_SPLIT,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub split: SplitConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Splitter bounds and transport timeout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub default_concurrency: usize,
    pub max_concurrency: usize,
    pub min_pages_per_split: u32,
    pub max_pages_per_split: u32,
    pub default_starting_page_number: u32,
    pub request_timeout_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            default_concurrency: DEFAULT_CONCURRENCY_LEVEL,
            max_concurrency: MAX_CONCURRENCY_LEVEL,
            min_pages_per_split: MIN_PAGES_PER_SPLIT,
            max_pages_per_split: MAX_PAGES_PER_SPLIT,
            default_starting_page_number: DEFAULT_STARTING_PAGE_NUMBER,
            request_timeout_secs: 600,
        }
    }
}

impl SplitConfig {
    pub fn limits(&self) -> SplitLimits {
        SplitLimits {
            default_concurrency: self.default_concurrency,
            max_concurrency: self.max_concurrency,
            min_pages_per_split: self.min_pages_per_split,
            max_pages_per_split: self.max_pages_per_split,
            default_starting_page_number: self.default_starting_page_number,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    /// Load `config/default`, `config/local` and `SPLIT_PDF__*` environment
    /// variables, in increasing priority. A `.env` file is read first.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_with_env(Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("SPLIT_PDF")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("retry.status_codes")
    }

    fn load_with_env(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(environment)
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config
            .split
            .limits()
            .validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(app_config)
    }
}
