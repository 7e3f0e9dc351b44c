//! Resumption engine: Idle → Paging → Flushing → Completed | Suspended.
//!
//! One invocation fetches at most `budget.max_pages` pages (and stops early
//! once `budget.max_duration` has elapsed), checkpointing progress after every
//! page before the next fetch. New records are written only after paging ends,
//! oldest first. Overlapping invocations against the same stores must be
//! prevented by the caller.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{CatalogSource, HttpCatalog, PageFetch};
use crate::config::{Config, CrawlBudget};
use crate::database_ops::db::Db;
use crate::database_ops::movies::{MovieStore, PgMovieStore};
use crate::database_ops::progress::{PgProgressStore, ProgressStore};
use crate::error::Result;
use crate::ingest::boundary;
use crate::ingest::writer::TaxonomyWriter;
use crate::invalidation::{CacheInvalidator, HttpInvalidator, NoopInvalidator};
use crate::models::{Movie, ProgressState, RunReport};

/// Why paging stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// A page reached the boundary record.
    CaughtUp,
    /// Upstream returned an empty page past page 1.
    Exhausted,
    /// Page or wall-clock budget ran out mid-crawl.
    BudgetExhausted,
    /// Upstream failed; paging resumes from the same page next time.
    Interrupted(String),
    /// Page 1 came back empty; not trusted as exhaustion.
    EmptyFirstPage,
}

impl Termination {
    pub fn completes_cycle(&self) -> bool {
        matches!(self, Termination::CaughtUp | Termination::Exhausted)
    }
}

/// Mutable state carried through one Paging phase.
///
/// The cycle head is held back from checkpoints until the buffer has been
/// flushed: a persisted head means every run of the cycle stored its records.
struct Paging {
    state: ProgressState,
    head: Option<String>,
    pages: u32,
    checkpointed: bool,
    buffer: Vec<Movie>,
    seen: HashSet<String>,
}

impl Paging {
    fn new(mut state: ProgressState) -> Self {
        let head = state.head.take();
        Self {
            state,
            head,
            pages: 0,
            checkpointed: false,
            buffer: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Append newest-first records, dropping names already buffered this run
    /// (upstream can shift an entry onto the next page between fetches).
    fn absorb(&mut self, keep: Vec<Movie>) {
        for movie in keep {
            if self.seen.insert(movie.name.clone()) {
                self.buffer.push(movie);
            } else {
                debug!(movie = %movie.name, "dropping record repeated across pages");
            }
        }
    }
}

pub struct ResumptionEngine {
    catalog: Arc<dyn CatalogSource>,
    progress: Arc<dyn ProgressStore>,
    movies: Arc<dyn MovieStore>,
    writer: TaxonomyWriter,
    budget: CrawlBudget,
}

impl ResumptionEngine {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        progress: Arc<dyn ProgressStore>,
        movies: Arc<dyn MovieStore>,
        invalidator: Arc<dyn CacheInvalidator>,
        budget: CrawlBudget,
    ) -> Self {
        let writer = TaxonomyWriter::new(movies.clone(), invalidator);
        Self {
            catalog,
            progress,
            movies,
            writer,
            budget,
        }
    }

    /// Production wiring: Postgres stores, HTTP catalog and the revalidation
    /// hook when one is configured.
    pub fn from_config(config: &Config, db: Db) -> Result<Self> {
        let catalog = Arc::new(HttpCatalog::new(&config.upstream)?);
        let invalidator: Arc<dyn CacheInvalidator> = match &config.invalidation {
            Some(inv) => Arc::new(HttpInvalidator::new(inv)?),
            None => Arc::new(NoopInvalidator),
        };
        Ok(Self::new(
            catalog,
            Arc::new(PgProgressStore::new(db.clone())),
            Arc::new(PgMovieStore::new(db)),
            invalidator,
            config.budget,
        ))
    }

    pub fn progress(&self) -> &Arc<dyn ProgressStore> {
        &self.progress
    }

    #[instrument(skip(self), fields(max_pages = self.budget.max_pages))]
    pub async fn run(&self) -> Result<RunReport> {
        // Idle
        let mut state = self.progress.read().await?;
        if state.completed {
            state = state.next_cycle();
            info!(boundary = ?state.boundary, "previous cycle completed; starting a new one");
            self.progress.write(&state).await?;
        }

        // The destination does not change while paging: writes wait for Flushing.
        // A cycle spread over several runs stores its slices out of publication
        // order, so a carried-over head takes precedence over the latest row.
        let destination = self.movies.latest_movie_name().await?;
        if state.is_cycle_start() {
            if state.boundary.is_none() {
                state.boundary = destination.clone();
            }
        } else if state.boundary != destination {
            info!(
                cursor = state.cursor,
                pinned = ?state.boundary,
                destination = ?destination,
                "resuming cycle against its pinned boundary"
            );
        }
        let boundary = state.boundary.clone();

        // Paging
        let mut paging = Paging::new(state);
        let termination = match self.page(&mut paging, boundary.as_deref()).await {
            Ok(t) => t,
            Err(err) => {
                let mut checkpoint = paging.state.clone();
                checkpoint.completed = false;
                if let Err(ckpt_err) = self.progress.write(&checkpoint).await {
                    warn!(error = %ckpt_err, "best-effort checkpoint failed");
                }
                return Err(err);
            }
        };

        // Flushing
        let found = paging.buffer.len();
        let mut batch = std::mem::take(&mut paging.buffer);
        batch.reverse();
        let outcome = self.writer.insert_all(batch).await;
        let inserted = outcome.inserted.len();

        // A completed cycle stays checkpointed as completed=true with its head;
        // the next run derives its boundary from it.
        if paging.checkpointed {
            paging.state.head = paging.head.take();
            if let Err(e) = self.progress.write(&paging.state).await {
                warn!(error = %e, "failed to record the flushed cycle head");
            }
        }
        let completed = termination.completes_cycle();

        let resume_cursor = if completed { 1 } else { paging.state.cursor };
        let report = RunReport {
            pages_processed: paging.pages,
            records_found: found,
            records_inserted: inserted,
            records_failed: outcome.failed.len(),
            resume_cursor,
            completed,
            message: describe(&termination, found, inserted, resume_cursor),
        };
        info!(
            pages = report.pages_processed,
            found,
            inserted,
            resume_cursor,
            completed,
            termination = ?termination,
            "crawl run finished"
        );
        Ok(report)
    }

    async fn page(&self, paging: &mut Paging, boundary: Option<&str>) -> Result<Termination> {
        let started = Instant::now();
        while paging.pages < self.budget.max_pages {
            if let Some(limit) = self.budget.max_duration {
                if started.elapsed() >= limit {
                    info!(elapsed_ms = started.elapsed().as_millis() as u64, "time budget exhausted");
                    return Ok(Termination::BudgetExhausted);
                }
            }

            let cursor = paging.state.cursor;
            let movies = match self.catalog.fetch_page(cursor).await {
                Ok(PageFetch::Records(movies)) => movies,
                Ok(PageFetch::Empty) if cursor == 1 => {
                    warn!("catalog returned an empty first page; leaving progress untouched");
                    return Ok(Termination::EmptyFirstPage);
                }
                Ok(PageFetch::Empty) => {
                    info!(page = cursor, "catalog exhausted");
                    paging.state.completed = true;
                    self.checkpoint(paging).await?;
                    return Ok(Termination::Exhausted);
                }
                Err(err) if err.truncates_paging() => {
                    warn!(page = cursor, error = %err, "stopping paging after upstream failure");
                    return Ok(Termination::Interrupted(err.to_string()));
                }
                Err(err) => return Err(err),
            };
            paging.pages += 1;

            let split = boundary::split(movies, boundary);
            debug!(page = cursor, new = split.keep.len(), boundary_hit = split.boundary_hit, "page scanned");
            if let Some(newest) = split.keep.first() {
                paging.state.watermark = Some(newest.name.clone());
            }
            if cursor == 1 {
                paging.head = match split.keep.first() {
                    Some(newest) => Some(newest.name.clone()),
                    None => boundary.map(str::to_string),
                };
            }
            paging.absorb(split.keep);

            if split.boundary_hit {
                paging.state.completed = true;
                self.checkpoint(paging).await?;
                return Ok(Termination::CaughtUp);
            }
            paging.state.cursor = cursor + 1;
            self.checkpoint(paging).await?;
        }
        Ok(Termination::BudgetExhausted)
    }

    async fn checkpoint(&self, paging: &mut Paging) -> Result<()> {
        self.progress.write(&paging.state).await?;
        paging.checkpointed = true;
        Ok(())
    }
}

fn describe(termination: &Termination, found: usize, inserted: usize, resume: u32) -> String {
    match termination {
        Termination::CaughtUp => {
            format!("caught up with the catalog; inserted {inserted} of {found} new movies")
        }
        Termination::Exhausted => {
            format!("walked the whole catalog; inserted {inserted} of {found} new movies")
        }
        Termination::BudgetExhausted => format!(
            "crawl in progress; inserted {inserted} of {found} new movies, resuming at page {resume}"
        ),
        Termination::Interrupted(reason) => format!(
            "crawl interrupted ({reason}); inserted {inserted} of {found} new movies, resuming at page {resume}"
        ),
        Termination::EmptyFirstPage => {
            "catalog returned an empty first page; nothing ingested".to_string()
        }
    }
}
