pub mod provider;

use crate::error::Result;
use crate::models::Movie;

pub use provider::HttpCatalog;

/// Outcome of fetching one upstream page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageFetch {
    /// Records in upstream order (newest first).
    Records(Vec<Movie>),
    /// The page holds no records: the catalog has been walked to its origin.
    Empty,
}

/// Paginated upstream catalog. Implementations never retry; a failed page is
/// retried by the next invocation resuming from the persisted cursor.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch page `page` (1-based).
    async fn fetch_page(&self, page: u32) -> Result<PageFetch>;
}
