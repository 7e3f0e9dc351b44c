// API server implementation using actix-web

use crate::api::{auth, middleware, routes};
use crate::config::{Config, Secret};
use crate::database_ops::db::Db;
use crate::ingest::ResumptionEngine;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Shared state behind every worker.
pub struct AppState {
    pub engine: Arc<ResumptionEngine>,
    pub db: Option<Db>,
    /// Held for the duration of a run; a second trigger gets 409 instead of
    /// racing the first one on the same progress row.
    pub run_lock: Mutex<()>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<ResumptionEngine>, db: Option<Db>) -> Self {
        Self {
            engine,
            db,
            run_lock: Mutex::new(()),
            started_at: Instant::now(),
        }
    }
}

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub trigger_secret: Option<Secret>,
}

impl ApiServer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.http.host.clone(),
            port: config.http.port,
            trigger_secret: config.trigger_secret.clone(),
        }
    }

    /// Start the HTTP server
    pub async fn run(self, state: AppState) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            auth = self.trigger_secret.is_some(),
            "starting crawl trigger server"
        );

        let state = web::Data::new(state);
        let secret = self.trigger_secret.map(|s| s.expose().to_string());

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let auth = auth::Auth::new(secret.clone());

            App::new()
                .app_data(state.clone())
                .wrap(auth)
                .wrap(compress)
                .wrap(logger)
                .configure(routes::configure_routes)
        })
        // One worker: runs are serialized anyway.
        .workers(1)
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
