// Response bodies for the crawl trigger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope around every trigger response; `data` carries a run report,
/// the progress state or the health summary.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub meta: Meta,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Meta::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Meta::now(),
        }
    }
}

/// Lets a scheduler correlate its trigger with the server's log lines.
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub request_id: String,
    pub responded_at: DateTime<Utc>,
    pub service: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            responded_at: Utc::now(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    /// A trigger currently holds the run lock.
    pub crawl_running: bool,
    pub uptime_seconds: u64,
}
