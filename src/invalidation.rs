// Outbound cache invalidation after successful inserts

use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::{InvalidationConfig, Secret};
use crate::error::{CrawlError, Result};

#[async_trait::async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Tell the downstream cache that `movie` was added.
    async fn invalidate(&self, movie: &str) -> Result<()>;
}

/// Used when no invalidation endpoint is configured.
pub struct NoopInvalidator;

#[async_trait::async_trait]
impl CacheInvalidator for NoopInvalidator {
    async fn invalidate(&self, _movie: &str) -> Result<()> {
        Ok(())
    }
}

/// `GET {url}?secret=...` against the site's revalidation hook.
pub struct HttpInvalidator {
    url: String,
    secret: Secret,
    http: Client,
}

impl HttpInvalidator {
    pub fn new(config: &InvalidationConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            url: config.url.clone(),
            secret: config.secret.clone(),
            http,
        })
    }
}

#[async_trait::async_trait]
impl CacheInvalidator for HttpInvalidator {
    #[instrument(skip(self))]
    async fn invalidate(&self, movie: &str) -> Result<()> {
        let resp = self
            .http
            .get(&self.url)
            .query(&[("secret", self.secret.expose())])
            .send()
            .await
            .map_err(|e| CrawlError::Invalidation(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CrawlError::Invalidation(format!(
                "revalidation hook returned {status}"
            )));
        }
        debug!("cache invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn noop_always_succeeds() {
        assert!(NoopInvalidator.invalidate("anything").await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_hook_reports_invalidation_error() {
        let inv = HttpInvalidator::new(&InvalidationConfig {
            url: "http://127.0.0.1:9/api/revalidate".into(),
            secret: Secret::new("s"),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        assert!(matches!(
            inv.invalidate("M1").await,
            Err(CrawlError::Invalidation(_))
        ));
    }
}
