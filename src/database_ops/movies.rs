//! Destination store for movies and their taxonomy.
//!
//! Tables touched: `movies`, `download_links`, `genres`, `tags`,
//! `movie_genres`, `movie_tags`. Get-or-create on `genres`/`tags` relies on a
//! UNIQUE constraint on `name`; without it two concurrent writers could create
//! duplicate label rows.

use sqlx::PgConnection;
use tracing::{debug, instrument};

use crate::database_ops::db::Db;
use crate::error::{CrawlError, Result};
use crate::models::Movie;

#[async_trait::async_trait]
pub trait MovieStore: Send + Sync {
    /// Name of the most recently inserted movie, `None` when the store is empty.
    async fn latest_movie_name(&self) -> Result<Option<String>>;

    /// Insert one movie with its download variants and taxonomy links.
    /// Returns the new row id. A name that already exists is a
    /// [`CrawlError::WriteConflict`].
    async fn insert_movie(&self, movie: &Movie) -> Result<i64>;
}

/// Shared, name-keyed label entities attached to movies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    Genre,
    Tag,
}

impl Taxonomy {
    pub fn table(self) -> &'static str {
        match self {
            Taxonomy::Genre => "genres",
            Taxonomy::Tag => "tags",
        }
    }

    pub fn link_table(self) -> &'static str {
        match self {
            Taxonomy::Genre => "movie_genres",
            Taxonomy::Tag => "movie_tags",
        }
    }

    pub fn link_column(self) -> &'static str {
        match self {
            Taxonomy::Genre => "genre_id",
            Taxonomy::Tag => "tag_id",
        }
    }
}

/// Find-by-name; if absent, insert; return the id either way.
pub async fn get_or_create(conn: &mut PgConnection, kind: Taxonomy, name: &str) -> Result<i64> {
    let select = format!("SELECT id FROM {} WHERE name = $1", kind.table());
    if let Some(id) = sqlx::query_scalar::<_, i64>(&select)
        .persistent(false)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(id);
    }

    let insert = format!(
        "INSERT INTO {} (name) VALUES ($1) ON CONFLICT (name) DO NOTHING RETURNING id",
        kind.table()
    );
    if let Some(id) = sqlx::query_scalar::<_, i64>(&insert)
        .persistent(false)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
    {
        debug!(table = kind.table(), label = %name, id, "created label");
        return Ok(id);
    }

    // Lost a race with another writer between select and insert.
    let id = sqlx::query_scalar::<_, i64>(&select)
        .persistent(false)
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

async fn link(conn: &mut PgConnection, kind: Taxonomy, movie_id: i64, label_id: i64) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (movie_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        kind.link_table(),
        kind.link_column()
    );
    sqlx::query(&sql)
        .persistent(false)
        .bind(movie_id)
        .bind(label_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Unique violations on `movies.name` become write conflicts; everything else
/// stays a database error.
fn classify_insert_error(name: &str, err: sqlx::Error) -> CrawlError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => CrawlError::WriteConflict {
            name: name.to_string(),
        },
        _ => CrawlError::Database(err),
    }
}

pub struct PgMovieStore {
    db: Db,
}

impl PgMovieStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl MovieStore for PgMovieStore {
    #[instrument(skip(self))]
    async fn latest_movie_name(&self) -> Result<Option<String>> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM movies ORDER BY id DESC LIMIT 1")
            .persistent(false)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(name)
    }

    #[instrument(skip(self, movie), fields(movie = %movie.name))]
    async fn insert_movie(&self, movie: &Movie) -> Result<i64> {
        let mut tx = self.db.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM movies WHERE name = $1")
            .persistent(false)
            .bind(&movie.name)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(CrawlError::WriteConflict {
                name: movie.name.clone(),
            });
        }

        let movie_id: i64 = sqlx::query_scalar(
            "INSERT INTO movies \
               (name, title, description, release_year, rating, poster_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, now(), now()) \
             RETURNING id",
        )
        .persistent(false)
        .bind(&movie.name)
        .bind(movie.title.as_deref())
        .bind(movie.description.as_deref())
        .bind(movie.release_year)
        .bind(movie.rating)
        .bind(movie.poster_url.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify_insert_error(&movie.name, e))?;

        for dl in &movie.downloads {
            sqlx::query("INSERT INTO download_links (movie_id, label, url) VALUES ($1, $2, $3)")
                .persistent(false)
                .bind(movie_id)
                .bind(&dl.label)
                .bind(&dl.url)
                .execute(&mut *tx)
                .await?;
        }

        for (kind, labels) in [(Taxonomy::Genre, &movie.genres), (Taxonomy::Tag, &movie.tags)] {
            for label in labels {
                let label_id = get_or_create(&mut tx, kind, label).await?;
                link(&mut tx, kind, movie_id, label_id).await?;
            }
        }

        tx.commit().await?;
        debug!(movie_id, downloads = movie.downloads.len(), "movie inserted");
        Ok(movie_id)
    }
}
