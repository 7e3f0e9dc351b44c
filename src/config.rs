//! Explicit runtime configuration.
//!
//! Every component receives the slice of configuration it needs at
//! construction; nothing reads the environment after startup.

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;
use std::time::Duration;

use crate::error::{CrawlError, Result};
use crate::util::env::{env_flag, env_parse, env_parse_opt, env_req, process_lookup};

/// String that never shows up in `Debug` output or tracing spans.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<Secret>,
    pub database: String,
    pub max_connections: u32,
    pub ssl_require: bool,
    pub statement_timeout: Duration,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database)
            // A hung statement is treated like any other store failure.
            .options([(
                "statement_timeout",
                format!("{}", self.statement_timeout.as_millis()),
            )]);
        if let Some(pw) = &self.password {
            opts = opts.password(pw.expose());
        }
        if self.ssl_require {
            opts = opts.ssl_mode(PgSslMode::Require);
        }
        opts
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub endpoint: String,
    pub api_credential: Secret,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct InvalidationConfig {
    pub url: String,
    pub secret: Secret,
    pub timeout: Duration,
}

/// Bounds how much work one invocation may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlBudget {
    pub max_pages: u32,
    pub max_duration: Option<Duration>,
}

impl Default for CrawlBudget {
    fn default() -> Self {
        Self {
            max_pages: 4,
            max_duration: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub invalidation: Option<InvalidationConfig>,
    pub budget: CrawlBudget,
    pub trigger_secret: Option<Secret>,
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from the process environment (after .env).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_lookup)
    }

    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let database = DatabaseConfig {
            host: lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: env_parse(&lookup, "DB_PORT", 5432u16)?,
            user: lookup("DB_USER").unwrap_or_else(|| "postgres".to_string()),
            password: lookup("DB_PASSWORD").map(Secret::new),
            database: lookup("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
            max_connections: env_parse(&lookup, "DB_MAX_CONNS", 5u32)?,
            ssl_require: env_flag(&lookup, "DB_SSL_REQUIRE", false),
            statement_timeout: Duration::from_millis(env_parse(
                &lookup,
                "DB_STATEMENT_TIMEOUT_MS",
                30_000u64,
            )?),
        };

        let upstream = UpstreamConfig {
            endpoint: env_req(&lookup, "CATALOG_API_URL")?,
            api_credential: Secret::new(env_req(&lookup, "CATALOG_API_KEY")?),
            timeout: Duration::from_secs(env_parse(&lookup, "CATALOG_TIMEOUT_SECS", 15u64)?),
        };
        url::Url::parse(&upstream.endpoint)
            .map_err(|e| CrawlError::Config(format!("CATALOG_API_URL is not a URL: {e}")))?;

        let invalidation = match (lookup("REVALIDATE_URL"), lookup("REVALIDATE_SECRET")) {
            (Some(url), Some(secret)) => Some(InvalidationConfig {
                url,
                secret: Secret::new(secret),
                timeout: Duration::from_secs(5),
            }),
            (None, None) => None,
            _ => {
                return Err(CrawlError::Config(
                    "REVALIDATE_URL and REVALIDATE_SECRET must be set together".into(),
                ))
            }
        };

        let max_pages: u32 = env_parse(&lookup, "CRAWL_PAGE_BUDGET", 4u32)?;
        if max_pages == 0 {
            return Err(CrawlError::Config("CRAWL_PAGE_BUDGET must be at least 1".into()));
        }
        let budget = CrawlBudget {
            max_pages,
            max_duration: env_parse_opt::<_, u64>(&lookup, "CRAWL_TIME_BUDGET_SECS")?
                .map(Duration::from_secs),
        };

        let http = HttpConfig {
            host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_parse(&lookup, "API_PORT", 8080u16)?,
        };

        Ok(Self {
            database,
            upstream,
            invalidation,
            budget,
            trigger_secret: lookup("TRIGGER_SECRET").map(Secret::new),
            http,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key: &str| map.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("CATALOG_API_URL", "https://catalog.example/api/movies"),
        ("CATALOG_API_KEY", "k-123"),
    ];

    #[test]
    fn defaults_fill_optional_settings() {
        let cfg = load(&REQUIRED).unwrap();
        assert_eq!(cfg.database.host, "localhost");
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.budget, CrawlBudget::default());
        assert!(cfg.invalidation.is_none());
        assert!(cfg.trigger_secret.is_none());
    }

    #[test]
    fn reads_database_and_budget_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_USER", "crawler"),
            ("DB_PASSWORD", "hunter2"),
            ("DB_NAME", "movies"),
            ("CRAWL_PAGE_BUDGET", "2"),
            ("CRAWL_TIME_BUDGET_SECS", "50"),
        ]);
        let cfg = load(&pairs).unwrap();
        assert_eq!(cfg.database.host, "db.internal");
        assert_eq!(cfg.database.port, 6543);
        assert_eq!(cfg.database.user, "crawler");
        assert_eq!(cfg.database.database, "movies");
        assert_eq!(cfg.budget.max_pages, 2);
        assert_eq!(cfg.budget.max_duration, Some(Duration::from_secs(50)));
    }

    #[test]
    fn missing_credential_is_rejected() {
        let err = load(&[("CATALOG_API_URL", "https://catalog.example")]).unwrap_err();
        assert!(err.to_string().contains("CATALOG_API_KEY"));
    }

    #[test]
    fn zero_page_budget_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CRAWL_PAGE_BUDGET", "0"));
        assert!(matches!(load(&pairs), Err(CrawlError::Config(_))));
    }

    #[test]
    fn invalidation_needs_both_halves() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("REVALIDATE_URL", "https://site.example/api/revalidate"));
        assert!(matches!(load(&pairs), Err(CrawlError::Config(_))));

        pairs.push(("REVALIDATE_SECRET", "s3cret"));
        let cfg = load(&pairs).unwrap();
        assert_eq!(cfg.invalidation.unwrap().secret.expose(), "s3cret");
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DB_PASSWORD", "hunter2"));
        let rendered = format!("{:?}", load(&pairs).unwrap());
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("k-123"));
    }
}
