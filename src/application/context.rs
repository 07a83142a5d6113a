//! Pipeline context - explicit dependencies for every service
//!
//! Store, fetcher and configuration are created once at the entry point and
//! passed down; nothing in the pipeline reaches for a global handle.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::crawling::{ApiCollector, AuthenticatedRequests, PortalUrls, SessionBootstrapper};
use crate::domain::LegislativeStore;
use crate::infrastructure::{
    AppConfig, ChromiumLauncher, DatabaseConnection, HttpClient, PageFetcher, SqliteLegislativeStore,
};

pub type SharedFetcher = Arc<dyn PageFetcher>;

#[derive(Clone)]
pub struct PipelineContext {
    pub config: AppConfig,
    pub store: Arc<dyn LegislativeStore>,
    pub fetcher: SharedFetcher,
}

impl PipelineContext {
    pub fn new(config: AppConfig, store: Arc<dyn LegislativeStore>, fetcher: SharedFetcher) -> Self {
        Self { config, store, fetcher }
    }

    /// Connect the database, create the schema and build the HTTP client.
    /// Any failure here is fatal for the run.
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let database = DatabaseConnection::new(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("cannot open database {}", config.database.url))?;
        database.migrate().await.context("schema bootstrap failed")?;
        info!("🗄️ database ready: {}", config.database.url);

        let http = HttpClient::with_config(&config.http, config.api.max_requests_per_second)
            .context("HTTP client initialization failed")?;

        let store: Arc<dyn LegislativeStore> = Arc::new(SqliteLegislativeStore::new(database.pool().clone()));
        Ok(Self::new(config, store, Arc::new(http)))
    }

    /// Open API collector. Refuses to build without an API key.
    pub fn collector(&self) -> Result<Arc<ApiCollector<SharedFetcher>>> {
        let key = self.config.require_api_key()?;
        Ok(Arc::new(ApiCollector::new(
            Arc::clone(&self.fetcher),
            self.config.api.base_url.clone(),
            key,
        )))
    }

    #[must_use]
    pub fn portal_urls(&self) -> PortalUrls {
        PortalUrls::new(&self.config.legislation.base_url)
    }

    #[must_use]
    pub fn portal_requests(&self) -> AuthenticatedRequests {
        AuthenticatedRequests::new(self.portal_urls(), &self.config.http.browser_user_agent)
    }

    #[must_use]
    pub fn bootstrapper(&self) -> SessionBootstrapper<ChromiumLauncher> {
        let launcher = ChromiumLauncher::new(
            self.config.browser.clone(),
            &self.config.http.browser_user_agent,
        );
        SessionBootstrapper::from_config(launcher, &self.config.browser, &self.config.legislation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawling::Resource;
    use crate::infrastructure::{ConfigError, FetchError, FetchRequest, FetchResponse};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl PageFetcher for Unreachable {
        async fn request(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
            Err(FetchError::Request {
                url: request.url,
                message: "unreachable".into(),
            })
        }
    }

    async fn context(key: &str) -> PipelineContext {
        let db = DatabaseConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let mut config = AppConfig::default();
        config.api.key = key.to_string();
        PipelineContext::new(
            config,
            Arc::new(SqliteLegislativeStore::new(db.pool().clone())),
            Arc::new(Unreachable),
        )
    }

    #[tokio::test]
    async fn collector_needs_an_api_key() {
        let err = context("  ").await.collector().err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingCredential { name: "NA_KEY" })
        ));

        let collector = context("abc").await.collector().unwrap();
        let url = collector.page_url(&Resource::CurrentMembers, 1, 10).unwrap();
        assert!(url.as_str().contains("KEY=abc"));
    }
}
