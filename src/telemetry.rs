//! Log output shared by the CLI subcommands and the trigger server.

use tracing_subscriber::{fmt, EnvFilter};

/// Used when `RUST_LOG` is unset: crawl progress at info, the database and
/// HTTP client only when they warn.
pub const DEFAULT_FILTER: &str = "info,movie_ingest=info,sqlx=warn,reqwest=warn";

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| anyhow::anyhow!("invalid log filter '{default_filter}': {e}"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
