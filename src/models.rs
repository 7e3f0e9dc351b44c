// Domain records shared by the crawl components

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One catalog entry as delivered by the upstream source.
///
/// `name` is the identity: two movies are the same iff their names are equal,
/// both for the boundary check and for destination de-duplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "year")]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, alias = "poster")]
    pub poster_url: Option<String>,
    #[serde(default, alias = "categories")]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "download_links", alias = "links")]
    pub downloads: Vec<DownloadLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadLink {
    #[serde(alias = "quality")]
    pub label: String,
    #[serde(alias = "link")]
    pub url: String,
}

impl Movie {
    /// Minimal record, mostly useful for building fixtures.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            release_year: None,
            rating: None,
            poster_url: None,
            genres: Vec::new(),
            tags: Vec::new(),
            downloads: Vec::new(),
        }
    }

    pub fn with_download(mut self, label: &str, url: &str) -> Self {
        self.downloads.push(DownloadLink {
            label: label.to_string(),
            url: url.to_string(),
        });
        self
    }

    /// Trim identity and labels, drop blank labels and collapse duplicates so
    /// get-or-create sees each label once per movie. Repeated download
    /// variants (same label and url) are kept once.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.genres = dedupe_labels(self.genres);
        self.tags = dedupe_labels(self.tags);
        let mut seen = HashSet::new();
        self.downloads = self
            .downloads
            .into_iter()
            .map(|d| DownloadLink {
                label: d.label.trim().to_string(),
                url: d.url.trim().to_string(),
            })
            .filter(|d| seen.insert((d.label.clone(), d.url.clone())))
            .collect();
        self
    }
}

fn dedupe_labels(labels: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && seen.insert(l.clone()))
        .collect()
}

/// Durable crawl progress. Exactly one current state exists at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Page to fetch next; always >= 1.
    pub cursor: u32,
    /// Newest movie name seen on the most recently processed page.
    pub watermark: Option<String>,
    /// Destination watermark pinned when the current cycle started at page 1.
    pub boundary: Option<String>,
    /// Newest catalog name of this cycle: the first new record on page 1, or
    /// the boundary when page 1 had nothing new. Only persisted after a run
    /// has flushed its records; carried into the next cycle as its boundary.
    #[serde(default)]
    pub head: Option<String>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressState {
    pub fn initial() -> Self {
        Self {
            cursor: 1,
            watermark: None,
            boundary: None,
            head: None,
            completed: false,
            updated_at: None,
        }
    }

    /// Fresh cycle after `self` completed, bounded by the previous cycle's
    /// head so records stored by any of its runs are not fetched again.
    pub fn next_cycle(&self) -> Self {
        Self {
            boundary: self.head.clone().or_else(|| self.boundary.clone()),
            ..Self::initial()
        }
    }

    pub fn is_cycle_start(&self) -> bool {
        self.cursor <= 1
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Structured summary returned by one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub pages_processed: u32,
    pub records_found: usize,
    pub records_inserted: usize,
    pub records_failed: usize,
    pub resume_cursor: u32,
    pub completed: bool,
    pub message: String,
}
