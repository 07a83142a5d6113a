//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate:
//! 1. Compiled defaults (see [`defaults`])
//! 2. `gwatch.toml` in the working directory, or the user config directory
//! 3. Environment variables prefixed with `GWATCH__` (`GWATCH__API__PAGE_SIZE=50`)
//!
//! The open API key additionally falls back to `NA_KEY`.

#![allow(clippy::uninlined_format_args)]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Missing credential: {name}")]
    MissingCredential { name: &'static str },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub http: HttpConfig,
    pub browser: BrowserConfig,
    pub legislation: LegislationConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// 국회 열린국회정보 Open API 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key (`NA_KEY`)
    pub key: String,
    pub base_url: String,
    pub page_size: u32,
    /// Fetch tier size of the importer
    pub fetch_workers: usize,
    /// Persist tier size of the importer
    pub persist_workers: usize,
    pub row_queue_capacity: usize,
    /// 0 = unlimited
    pub max_requests_per_second: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// UA sent to the legislation portal, which rejects bot agents
    pub browser_user_agent: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Bounded wait for the opinion table to render
    pub wait_timeout_seconds: u64,
    /// Pause after the page-size change so deferred rows can load
    pub settle_millis: u64,
    /// Chrome/Chromium binary. Auto-detected when unset.
    pub executable: Option<PathBuf>,
}

/// 입법예고 포털 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LegislationConfig {
    pub base_url: String,
    pub download_dir: PathBuf,
    pub download_workers: usize,
    pub opinion_workers: usize,
    pub notice_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    /// Enable JSON formatted file logs
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: PathBuf,
    pub file_name: String,
}

/// Default configuration values
pub mod defaults {
    pub const CONFIG_FILE: &str = "gwatch.toml";
    pub const ENV_PREFIX: &str = "GWATCH";
    pub const API_KEY_ENV: &str = "NA_KEY";

    pub const API_BASE_URL: &str = "https://open.assembly.go.kr/portal/openapi";
    /// 한 페이지당 행 수
    pub const PAGE_SIZE: u32 = 100;
    pub const FETCH_WORKERS: usize = 5;
    pub const PERSIST_WORKERS: usize = 30;
    pub const ROW_QUEUE_CAPACITY: usize = 5000;

    pub const USER_AGENT: &str = "GWatchBot/1.0 (+https://gwatch.example.com)";
    pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const BROWSER_WAIT_TIMEOUT_SECONDS: u64 = 30;
    pub const BROWSER_SETTLE_MILLIS: u64 = 3000;

    pub const LEGISLATION_BASE_URL: &str = "https://pal.assembly.go.kr";
    pub const DOWNLOAD_DIR: &str = "downloads";
    /// 엑셀 다운로드 워커 수
    pub const DOWNLOAD_WORKERS: usize = 3;
    /// 의견 본문 수집 워커 수
    pub const OPINION_WORKERS: usize = 10;
    pub const NOTICE_WORKERS: usize = 8;

    pub const DATABASE_URL: &str = "sqlite:data/gwatch.db";
    pub const MAX_CONNECTIONS: u32 = 30;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_DIR: &str = "logs";
    pub const LOG_FILE_NAME: &str = "gwatch.log";
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            base_url: defaults::API_BASE_URL.to_string(),
            page_size: defaults::PAGE_SIZE,
            fetch_workers: defaults::FETCH_WORKERS,
            persist_workers: defaults::PERSIST_WORKERS,
            row_queue_capacity: defaults::ROW_QUEUE_CAPACITY,
            max_requests_per_second: 0,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            browser_user_agent: defaults::BROWSER_USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            wait_timeout_seconds: defaults::BROWSER_WAIT_TIMEOUT_SECONDS,
            settle_millis: defaults::BROWSER_SETTLE_MILLIS,
            executable: None,
        }
    }
}

impl Default for LegislationConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::LEGISLATION_BASE_URL.to_string(),
            download_dir: PathBuf::from(defaults::DOWNLOAD_DIR),
            download_workers: defaults::DOWNLOAD_WORKERS,
            opinion_workers: defaults::OPINION_WORKERS,
            notice_workers: defaults::NOTICE_WORKERS,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::MAX_CONNECTIONS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            log_dir: PathBuf::from(defaults::LOG_DIR),
            file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

impl LegislationConfig {
    /// 의견 엑셀 저장 위치
    #[must_use]
    pub fn opinion_dir(&self) -> PathBuf {
        self.download_dir.join("opinion")
    }

    /// 진행 중 입법예고 엑셀 저장 위치
    #[must_use]
    pub fn notice_dir(&self) -> PathBuf {
        self.download_dir.join("notice")
    }
}

impl AppConfig {
    /// Load configuration. An explicit `path` must exist; the implicit
    /// lookup is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(explicit) => builder.add_source(config::File::from(explicit)),
            None => match Self::discover_config_file() {
                Some(found) => {
                    info!("📁 Using configuration file: {}", found.display());
                    builder.add_source(config::File::from(found))
                }
                None => builder,
            },
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = settings.try_deserialize()?;
        if config.api.key.trim().is_empty() {
            if let Ok(key) = std::env::var(defaults::API_KEY_ENV) {
                config.api.key = key;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// `./gwatch.toml`, then `<user config dir>/gwatch/gwatch.toml`
    fn discover_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(defaults::CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("gwatch").join(defaults::CONFIG_FILE))
            .filter(|p| p.exists())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.page_size == 0 {
            return Err(ConfigError::Validation {
                message: "api.page_size must be greater than 0".to_string(),
            });
        }
        if self.api.fetch_workers == 0 || self.api.persist_workers == 0 {
            return Err(ConfigError::Validation {
                message: "importer worker counts must be greater than 0".to_string(),
            });
        }
        if self.api.row_queue_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "api.row_queue_capacity must be greater than 0".to_string(),
            });
        }
        if self.legislation.download_workers == 0 || self.legislation.opinion_workers == 0 {
            return Err(ConfigError::Validation {
                message: "legislation worker counts must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Commands that call the open API refuse to start without a key.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        let key = self.api.key.trim();
        if key.is_empty() {
            return Err(ConfigError::MissingCredential {
                name: defaults::API_KEY_ENV,
            });
        }
        Ok(key)
    }
}
