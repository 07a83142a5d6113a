//! Infrastructure layer for database connections, HTTP, browser automation
//! and external integrations

pub mod browser;
pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod repositories;
pub mod spreadsheet;

// Re-export commonly used items
pub use browser::{BrowserDriver, BrowserError, BrowserLauncher, ChromiumLauncher, WaitMode};
pub use config::{AppConfig, ConfigError};
pub use database_connection::DatabaseConnection;
pub use http_client::{FetchError, FetchRequest, FetchResponse, HttpClient, Method, PageFetcher};
pub use logging::init_logging_with_config;
pub use repositories::SqliteLegislativeStore;
pub use spreadsheet::{SpreadsheetError, SpreadsheetReader, XlsxReader};
