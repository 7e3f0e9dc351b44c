use reqwest::{header, Client};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::{CatalogSource, PageFetch};
use crate::config::{Secret, UpstreamConfig};
use crate::error::{CrawlError, Result};
use crate::models::Movie;

fn truncate_for_log(mut s: String, max_chars: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
        s.push('…');
    }
    s
}

/// Upstream catalog client.
///
/// Each page is one `POST {endpoint}` with a bearer credential and a
/// `{"page": n}` body; the response carries the page in a `movies` array,
/// newest first.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    endpoint: String,
    credential: Secret,
    http: Client,
}

impl HttpCatalog {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("movie-ingest/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            credential: config.api_credential.clone(),
            http,
        })
    }
}

#[async_trait::async_trait]
impl CatalogSource for HttpCatalog {
    #[instrument(skip(self))]
    async fn fetch_page(&self, page: u32) -> Result<PageFetch> {
        if page == 0 {
            return Err(CrawlError::Config("catalog pages are 1-based".into()));
        }

        // Timeouts and connection failures surface as transport errors via From.
        let resp = self
            .http
            .post(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(self.credential.expose())
            .json(&json!({ "page": page }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 500);
            return Err(CrawlError::transport(
                Some(status.as_u16()),
                format!("catalog page {page} returned {status}: {body}"),
            ));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| CrawlError::MalformedPayload(format!("page {page}: {e}")))?;
        let fetched = parse_page(body)?;
        if let PageFetch::Records(movies) = &fetched {
            debug!(page, records = movies.len(), "fetched catalog page");
        }
        Ok(fetched)
    }
}

/// Decode a page body. An absent, non-array or empty `movies` field is an
/// empty page. Elements that do not decode are skipped; a non-empty page where
/// nothing decodes is malformed.
pub fn parse_page(body: Value) -> Result<PageFetch> {
    let items = match body {
        Value::Object(mut obj) => match obj.remove("movies") {
            Some(Value::Array(items)) => items,
            _ => return Ok(PageFetch::Empty),
        },
        _ => return Ok(PageFetch::Empty),
    };
    if items.is_empty() {
        return Ok(PageFetch::Empty);
    }

    let total = items.len();
    let mut movies = Vec::with_capacity(total);
    for (idx, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Movie>(item) {
            Ok(m) => {
                let m = m.normalized();
                if m.name.is_empty() {
                    warn!(index = idx, "skipping catalog record with blank name");
                    continue;
                }
                movies.push(m);
            }
            Err(e) => warn!(index = idx, error = %e, "skipping undecodable catalog record"),
        }
    }

    if movies.is_empty() {
        return Err(CrawlError::MalformedPayload(format!(
            "none of {total} records on the page could be decoded"
        )));
    }
    Ok(PageFetch::Records(movies))
}
