//! Durable crawl progress.
//!
//! Progress is stored append-only in `crawl_progress`; the row with the
//! highest id is the current state. Older rows are pruned in the same
//! transaction that appends a new one.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{debug, info, instrument};

use crate::database_ops::db::Db;
use crate::error::{CrawlError, Result};
use crate::models::ProgressState;

#[async_trait::async_trait]
pub trait ProgressStore: Send + Sync {
    /// Current state; initializes and persists the initial state when none
    /// exists yet.
    async fn read(&self) -> Result<ProgressState>;

    /// Persist `state` as the current one. Must be durable on return.
    async fn write(&self, state: &ProgressState) -> Result<()>;

    /// Remove all progress; nothing is left to resume.
    async fn clear(&self) -> Result<()>;
}

pub struct PgProgressStore {
    db: Db,
}

impl PgProgressStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn persistence(err: sqlx::Error) -> CrawlError {
    CrawlError::Persistence(err.to_string())
}

fn state_from_row(row: &sqlx::postgres::PgRow) -> Result<ProgressState> {
    let last_page: i32 = row.try_get("last_page").map_err(persistence)?;
    let cursor = u32::try_from(last_page)
        .ok()
        .filter(|c| *c >= 1)
        .ok_or_else(|| CrawlError::Persistence(format!("stored page {last_page} is below 1")))?;
    Ok(ProgressState {
        cursor,
        watermark: row.try_get("last_movie_name").map_err(persistence)?,
        boundary: row.try_get("boundary_movie_name").map_err(persistence)?,
        head: row.try_get("head_movie_name").map_err(persistence)?,
        completed: row.try_get("completed").map_err(persistence)?,
        updated_at: row
            .try_get::<Option<DateTime<Utc>>, _>("updated_at")
            .map_err(persistence)?,
    })
}

fn page_column(cursor: u32) -> Result<i32> {
    i32::try_from(cursor)
        .map_err(|_| CrawlError::Persistence(format!("page {cursor} does not fit the progress table")))
}

#[async_trait::async_trait]
impl ProgressStore for PgProgressStore {
    #[instrument(skip(self))]
    async fn read(&self) -> Result<ProgressState> {
        let row = sqlx::query(
            "SELECT last_page, last_movie_name, boundary_movie_name, head_movie_name, completed, \
                    updated_at \
             FROM crawl_progress ORDER BY id DESC LIMIT 1",
        )
        .persistent(false)
        .fetch_optional(&self.db.pool)
        .await
        .map_err(persistence)?;

        match row {
            Some(r) => {
                let state = state_from_row(&r)?;
                debug!(cursor = state.cursor, completed = state.completed, "loaded crawl progress");
                Ok(state)
            }
            None => {
                let state = ProgressState::initial();
                self.write(&state).await?;
                info!("no crawl progress found; initialized at page 1");
                Ok(state)
            }
        }
    }

    #[instrument(skip(self, state), fields(cursor = state.cursor, completed = state.completed))]
    async fn write(&self, state: &ProgressState) -> Result<()> {
        let mut tx = self.db.pool.begin().await.map_err(persistence)?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO crawl_progress \
               (last_page, last_movie_name, boundary_movie_name, head_movie_name, completed, \
                created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, now(), now()) \
             RETURNING id",
        )
        .persistent(false)
        .bind(page_column(state.cursor)?)
        .bind(state.watermark.as_deref())
        .bind(state.boundary.as_deref())
        .bind(state.head.as_deref())
        .bind(state.completed)
        .fetch_one(&mut *tx)
        .await
        .map_err(persistence)?;

        sqlx::query("DELETE FROM crawl_progress WHERE id < $1")
            .persistent(false)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
        tx.commit().await.map_err(persistence)?;
        debug!(progress_id = id, "checkpointed crawl progress");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let res = sqlx::query("DELETE FROM crawl_progress")
            .persistent(false)
            .execute(&self.db.pool)
            .await
            .map_err(persistence)?;
        info!(rows = res.rows_affected(), "cleared crawl progress");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_column_fits_postgres_integer() {
        assert_eq!(page_column(3).unwrap(), 3);
        assert!(matches!(
            page_column(u32::MAX),
            Err(CrawlError::Persistence(_))
        ));
    }
}
