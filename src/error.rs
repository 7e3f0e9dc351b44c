use thiserror::Error;

/// Failure kinds surfaced by the crawl components.
///
/// The engine decides what each kind means for the current invocation:
/// upstream failures truncate paging, per-record failures are absorbed by the
/// writer, and persistence failures abort the run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("upstream transport error (status {status:?}): {reason}")]
    Transport { status: Option<u16>, reason: String },

    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),

    #[error("movie '{name}' already exists in the destination store")]
    WriteConflict { name: String },

    #[error("failed to insert movie '{name}': {reason}")]
    RecordInsert { name: String, reason: String },

    #[error("failed to persist crawl progress: {0}")]
    Persistence(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cache invalidation failed: {0}")]
    Invalidation(String),
}

impl CrawlError {
    pub fn transport(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Transport {
            status,
            reason: reason.into(),
        }
    }

    pub fn record(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RecordInsert {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Upstream failures stop paging for this invocation but keep whatever
    /// was already collected.
    pub fn truncates_paging(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::MalformedPayload(_))
    }
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let reason = if err.is_timeout() {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        Self::Transport { status, reason }
    }
}

pub type Result<T, E = CrawlError> = std::result::Result<T, E>;
