use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{PageRequest, Post};

/// Connections for a file-backed pool. Concurrent transactions get
/// independent connections; last commit wins.
const MAX_POOL_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Requested record was not found in the local store")]
    ObjectNotFound,

    #[error("Unable to read from the local store")]
    FetchFailed,

    #[error("No cached image data for this record")]
    ImageDataNotFound,

    #[error("Local store failure: {0}")]
    Database(String),
}

// ============================================================================
// Storage Trait
// ============================================================================

/// Durable keyed storage for posts and their cached avatar bytes. All
/// operations run on the pool's background connections; callers never
/// perform storage I/O on their own context.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Upsert by `id`. Last writer wins on every post field; cached image
    /// bytes are not part of the upsert and survive it.
    async fn save_posts(&self, posts: &[Post]) -> Result<(), StorageError>;

    /// Deterministic slice ordered by ascending `id`, starting at
    /// `(page - 1) * limit`, at most `limit` rows.
    async fn fetch_posts(&self, request: PageRequest) -> Result<Vec<Post>, StorageError>;

    /// Flips `is_liked` for the matching record. An absent record is an
    /// Ok no-op, not an error.
    async fn toggle_like(&self, post_id: i64) -> Result<(), StorageError>;

    /// Attaches bytes to the record whose `avatar_url` matches. No-op when
    /// nothing matches.
    async fn save_image_data(&self, data: &[u8], url: &str) -> Result<(), StorageError>;

    /// `Ok(None)` when no record matches the URL at all;
    /// `Err(ImageDataNotFound)` when the record exists but carries no
    /// bytes. The two absent cases are intentionally distinguished.
    async fn get_image_data(&self, url: &str) -> Result<Option<Bytes>, StorageError>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_POOL_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Single-connection pool so the in-memory database outlives
    /// individual checkouts. Used by tests and previews.
    pub async fn new_in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                is_liked INTEGER NOT NULL DEFAULT 0,
                avatar_url TEXT NOT NULL,
                avatar_image BLOB
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_avatar_url ON posts(avatar_url)")
            .execute(pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    /// Releases the pool. Pending operations finish; new ones fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PostStore for SqliteStore {
    async fn save_posts(&self, posts: &[Post]) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        for post in posts {
            sqlx::query(
                r#"
                INSERT INTO posts (id, user_id, title, body, is_liked, avatar_url)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    title = excluded.title,
                    body = excluded.body,
                    is_liked = excluded.is_liked,
                    avatar_url = excluded.avatar_url
                "#,
            )
            .bind(post.id)
            .bind(post.user_id)
            .bind(&post.title)
            .bind(&post.body)
            .bind(post.is_liked)
            .bind(&post.avatar_url)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    async fn fetch_posts(&self, request: PageRequest) -> Result<Vec<Post>, StorageError> {
        let limit = i64::from(request.limit());
        let offset = i64::try_from(request.offset()).map_err(|_| StorageError::FetchFailed)?;

        let rows: Vec<(i64, i64, String, String, bool, String)> = sqlx::query_as(
            r#"
            SELECT id, user_id, title, body, is_liked, avatar_url
            FROM posts
            ORDER BY id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "post page query failed");
            StorageError::FetchFailed
        })?;

        Ok(rows
            .into_iter()
            .map(|(id, user_id, title, body, is_liked, avatar_url)| Post {
                id,
                user_id,
                title,
                body,
                is_liked,
                avatar_url,
            })
            .collect())
    }

    async fn toggle_like(&self, post_id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE posts SET is_liked = NOT is_liked WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            debug!(post_id, "toggle_like on absent record");
        }
        Ok(())
    }

    async fn save_image_data(&self, data: &[u8], url: &str) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE posts SET avatar_image = ? WHERE avatar_url = ?")
            .bind(data)
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            debug!(url, "image bytes for unknown record, dropped");
        }
        Ok(())
    }

    async fn get_image_data(&self, url: &str) -> Result<Option<Bytes>, StorageError> {
        let row: Option<(Option<Vec<u8>>,)> =
            sqlx::query_as("SELECT avatar_image FROM posts WHERE avatar_url = ? LIMIT 1")
                .bind(url)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, "image query failed");
                    StorageError::FetchFailed
                })?;

        match row {
            None => Ok(None),
            Some((None,)) => Err(StorageError::ImageDataNotFound),
            Some((Some(data),)) => Ok(Some(Bytes::from(data))),
        }
    }
}
