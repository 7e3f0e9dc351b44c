use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::database_ops::movies::MovieStore;
use crate::error::{CrawlError, Result};
use crate::invalidation::CacheInvalidator;
use crate::models::Movie;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOutcome {
    /// Names actually inserted, in insertion order.
    pub inserted: Vec<String>,
    pub failed: Vec<RecordFailure>,
}

/// How long a finished batch waits for outstanding cache notifications
/// before leaving them to finish in the background.
const NOTIFY_GRACE: Duration = Duration::from_secs(1);

/// Persists new movies one at a time, oldest first as handed in.
///
/// A failing record is logged and skipped; it never aborts the batch. Each
/// successful insert spawns a best-effort cache invalidation that does not
/// hold up the next insert.
pub struct TaxonomyWriter {
    store: Arc<dyn MovieStore>,
    invalidator: Arc<dyn CacheInvalidator>,
    notify_grace: Duration,
}

impl TaxonomyWriter {
    pub fn new(store: Arc<dyn MovieStore>, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        Self {
            store,
            invalidator,
            notify_grace: NOTIFY_GRACE,
        }
    }

    pub fn with_notify_grace(mut self, grace: Duration) -> Self {
        self.notify_grace = grace;
        self
    }

    #[instrument(skip_all, fields(batch = movies.len()))]
    pub async fn insert_all(&self, movies: Vec<Movie>) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();
        let mut notifications = JoinSet::new();
        for movie in movies {
            match self.insert_one(&movie).await {
                Ok(movie_id) => {
                    info!(movie = %movie.name, movie_id, "inserted movie");
                    let invalidator = self.invalidator.clone();
                    let name = movie.name.clone();
                    notifications.spawn(async move {
                        if let Err(e) = invalidator.invalidate(&name).await {
                            warn!(movie = %name, error = %e, "cache invalidation failed; continuing");
                        }
                    });
                    outcome.inserted.push(movie.name);
                }
                Err(e) => {
                    warn!(movie = %movie.name, error = %e, "skipping movie that failed to insert");
                    outcome.failed.push(RecordFailure {
                        name: movie.name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.settle(notifications).await;
        outcome
    }

    /// Give outstanding notifications a short grace period, then detach them
    /// so the batch never waits on a slow hook.
    async fn settle(&self, mut notifications: JoinSet<()>) {
        let drained = tokio::time::timeout(self.notify_grace, async {
            while notifications.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            debug!(pending = notifications.len(), "leaving cache notifications in flight");
            notifications.detach_all();
        }
    }

    async fn insert_one(&self, movie: &Movie) -> Result<i64> {
        if movie.name.trim().is_empty() {
            return Err(CrawlError::record(&movie.name, "movie has no name"));
        }
        if movie.downloads.is_empty() {
            return Err(CrawlError::record(&movie.name, "movie has no download variants"));
        }
        if let Some(bad) = movie
            .downloads
            .iter()
            .find(|d| d.label.trim().is_empty() || d.url.trim().is_empty())
        {
            return Err(CrawlError::record(
                &movie.name,
                format!("download variant '{}' is incomplete", bad.label),
            ));
        }
        self.store.insert_movie(movie).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testing::{movie, MemoryMovieStore, RecordingInvalidator};

    fn writer(store: &Arc<MemoryMovieStore>, inv: &Arc<RecordingInvalidator>) -> TaxonomyWriter {
        TaxonomyWriter::new(store.clone(), inv.clone())
    }

    #[tokio::test]
    async fn inserts_in_given_order_and_notifies() {
        let store = Arc::new(MemoryMovieStore::default());
        let inv = Arc::new(RecordingInvalidator::default());

        let out = writer(&store, &inv)
            .insert_all(vec![movie("M7"), movie("M8"), movie("M9")])
            .await;

        assert_eq!(out.inserted, vec!["M7", "M8", "M9"]);
        assert!(out.failed.is_empty());
        assert_eq!(store.names(), vec!["M7", "M8", "M9"]);
        let mut calls = inv.calls();
        calls.sort();
        assert_eq!(calls, vec!["M7", "M8", "M9"]);
    }

    #[tokio::test]
    async fn one_bad_record_does_not_abort_the_batch() {
        let store = Arc::new(MemoryMovieStore::default());
        let inv = Arc::new(RecordingInvalidator::default());
        let mut broken = movie("M2");
        broken.downloads.clear();

        let out = writer(&store, &inv)
            .insert_all(vec![movie("M1"), broken, movie("M3")])
            .await;

        assert_eq!(out.inserted, vec!["M1", "M3"]);
        assert_eq!(out.failed.len(), 1);
        assert_eq!(out.failed[0].name, "M2");
        assert_eq!(store.names(), vec!["M1", "M3"]);
    }

    #[tokio::test]
    async fn store_failures_are_isolated_per_record() {
        let store = Arc::new(MemoryMovieStore::default().failing(&["M2"]));
        let inv = Arc::new(RecordingInvalidator::default());

        let out = writer(&store, &inv)
            .insert_all(vec![movie("M1"), movie("M2"), movie("M3")])
            .await;

        assert_eq!(out.inserted.len(), 2);
        assert_eq!(out.failed[0].name, "M2");
        let mut calls = inv.calls();
        calls.sort();
        assert_eq!(calls, vec!["M1", "M3"]);
    }

    #[tokio::test]
    async fn duplicates_are_rejected_not_duplicated() {
        let store = Arc::new(MemoryMovieStore::with_existing(&["M1"]));
        let inv = Arc::new(RecordingInvalidator::default());

        let out = writer(&store, &inv).insert_all(vec![movie("M1"), movie("M2")]).await;

        assert_eq!(out.inserted, vec!["M2"]);
        assert!(out.failed[0].reason.contains("already exists"));
        assert_eq!(store.names(), vec!["M1", "M2"]);
    }

    #[tokio::test]
    async fn invalidation_failure_keeps_the_insert() {
        let store = Arc::new(MemoryMovieStore::default());
        let inv = Arc::new(RecordingInvalidator::failing());

        let out = writer(&store, &inv).insert_all(vec![movie("M1")]).await;

        assert_eq!(out.inserted, vec!["M1"]);
        assert_eq!(store.names(), vec!["M1"]);
    }

    #[tokio::test]
    async fn slow_invalidation_does_not_hold_up_the_batch() {
        let store = Arc::new(MemoryMovieStore::default());
        let inv = Arc::new(RecordingInvalidator::slow(Duration::from_secs(5)));
        let names: Vec<String> = (1..=9).map(|i| format!("M{i}")).collect();
        let batch = names.iter().map(|n| movie(n)).collect();

        let started = std::time::Instant::now();
        let out = writer(&store, &inv)
            .with_notify_grace(Duration::from_millis(50))
            .insert_all(batch)
            .await;

        assert_eq!(out.inserted.len(), 9);
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "flush waited {:?} on the hook",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn incomplete_download_variant_fails_the_record() {
        let store = Arc::new(MemoryMovieStore::default());
        let inv = Arc::new(RecordingInvalidator::default());
        let bad = Movie::named("M1").with_download("1080p", " ");

        let out = writer(&store, &inv).insert_all(vec![bad]).await;

        assert!(out.inserted.is_empty());
        assert_eq!(out.failed.len(), 1);
    }
}
