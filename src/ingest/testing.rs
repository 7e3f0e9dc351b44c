//! In-memory doubles for the engine's collaborators.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::catalog::{CatalogSource, PageFetch};
use crate::database_ops::movies::MovieStore;
use crate::database_ops::progress::ProgressStore;
use crate::error::{CrawlError, Result};
use crate::invalidation::CacheInvalidator;
use crate::models::{Movie, ProgressState};

pub fn movie(name: &str) -> Movie {
    Movie::named(name).with_download("1080p", &format!("https://cdn.example/{name}"))
}

/// Catalog whose entries are paged newest first, `page_size` per page.
pub struct ScriptedCatalog {
    entries: Mutex<Vec<String>>,
    page_size: usize,
    failing: Mutex<HashSet<u32>>,
    broken: Mutex<HashSet<u32>>,
    requests: Mutex<Vec<u32>>,
}

impl ScriptedCatalog {
    /// `newest_first` lists the whole catalog, newest entry first.
    pub fn new(newest_first: &[&str], page_size: usize) -> Self {
        Self {
            entries: Mutex::new(newest_first.iter().map(|s| s.to_string()).collect()),
            page_size,
            failing: Mutex::new(HashSet::new()),
            broken: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Publish new entries; they land in front of everything else.
    pub fn publish(&self, newest_first: &[&str]) {
        let mut entries = self.entries.lock().unwrap();
        let mut fresh: Vec<String> = newest_first.iter().map(|s| s.to_string()).collect();
        fresh.append(&mut entries);
        *entries = fresh;
    }

    pub fn fail_page(&self, page: u32) {
        self.failing.lock().unwrap().insert(page);
    }

    /// Fetching `page` fails with an error that does not end paging cleanly.
    pub fn break_page(&self, page: u32) {
        self.broken.lock().unwrap().insert(page);
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
        self.broken.lock().unwrap().clear();
    }

    pub fn requests(&self) -> Vec<u32> {
        self.requests.lock().unwrap().clone()
    }

    pub fn reset_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl CatalogSource for ScriptedCatalog {
    async fn fetch_page(&self, page: u32) -> Result<PageFetch> {
        self.requests.lock().unwrap().push(page);
        if self.failing.lock().unwrap().contains(&page) {
            return Err(CrawlError::transport(Some(503), "scripted outage"));
        }
        if self.broken.lock().unwrap().contains(&page) {
            return Err(CrawlError::Config("scripted fault".into()));
        }
        let entries = self.entries.lock().unwrap();
        let start = (page as usize - 1) * self.page_size;
        if start >= entries.len() {
            return Ok(PageFetch::Empty);
        }
        let end = (start + self.page_size).min(entries.len());
        Ok(PageFetch::Records(
            entries[start..end].iter().map(|n| movie(n)).collect(),
        ))
    }
}

#[derive(Default)]
pub struct MemoryProgressStore {
    state: Mutex<Option<ProgressState>>,
    history: Mutex<Vec<ProgressState>>,
    fail_writes: Mutex<bool>,
}

impl MemoryProgressStore {
    pub fn with_state(state: ProgressState) -> Self {
        let store = Self::default();
        *store.state.lock().unwrap() = Some(state);
        store
    }

    /// Current state without the initialize-on-read side effect.
    pub fn peek(&self) -> Option<ProgressState> {
        self.state.lock().unwrap().clone()
    }

    /// Every state written, oldest first.
    pub fn history(&self) -> Vec<ProgressState> {
        self.history.lock().unwrap().clone()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }
}

#[async_trait::async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn read(&self) -> Result<ProgressState> {
        let mut state = self.state.lock().unwrap();
        Ok(state.get_or_insert_with(ProgressState::initial).clone())
    }

    async fn write(&self, state: &ProgressState) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(CrawlError::Persistence("scripted write failure".into()));
        }
        *self.state.lock().unwrap() = Some(state.clone());
        self.history.lock().unwrap().push(state.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.state.lock().unwrap() = None;
        Ok(())
    }
}

/// Destination store keeping names in insertion order.
#[derive(Default)]
pub struct MemoryMovieStore {
    rows: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl MemoryMovieStore {
    /// `oldest_first` are already-ingested names in insertion order.
    pub fn with_existing(oldest_first: &[&str]) -> Self {
        Self {
            rows: Mutex::new(oldest_first.iter().map(|s| s.to_string()).collect()),
            failing: HashSet::new(),
        }
    }

    /// Inserts of these names fail as if a constraint were violated.
    pub fn failing(mut self, names: &[&str]) -> Self {
        self.failing.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MovieStore for MemoryMovieStore {
    async fn latest_movie_name(&self) -> Result<Option<String>> {
        Ok(self.rows.lock().unwrap().last().cloned())
    }

    async fn insert_movie(&self, movie: &Movie) -> Result<i64> {
        if self.failing.contains(&movie.name) {
            return Err(CrawlError::record(&movie.name, "scripted constraint violation"));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.contains(&movie.name) {
            return Err(CrawlError::WriteConflict {
                name: movie.name.clone(),
            });
        }
        rows.push(movie.name.clone());
        Ok(rows.len() as i64)
    }
}

#[derive(Default)]
pub struct RecordingInvalidator {
    calls: Mutex<Vec<String>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingInvalidator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every call sleeps for `delay` before answering.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CacheInvalidator for RecordingInvalidator {
    async fn invalidate(&self, movie: &str) -> Result<()> {
        self.calls.lock().unwrap().push(movie.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(CrawlError::Invalidation("scripted hook failure".into()));
        }
        Ok(())
    }
}
