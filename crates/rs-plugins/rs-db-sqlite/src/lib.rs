//! # rs-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `rs-core` domain models.
//!
//! Every mutation runs inside a `BEGIN IMMEDIATE` transaction, so the write
//! lock is held from the first read. Concurrent casts from one identity queue
//! on that lock (bounded by `busy_timeout`) instead of racing; the UNIQUE keys
//! in the migration are the backstop. The transaction guard rolls back when
//! dropped, so a cancelled request never leaves its connection mid-transaction.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rs_core::error::{AppError, Result};
use rs_core::ledger::{self, RepeatPolicy, VoteTransition};
use rs_core::models::{
    Comment, CommentId, CommentRow, EngagementCounts, LikeStatus, NewComment, TargetId,
    VoteCounts, VoteDirection, VoteOutcome, VoteRecord, VoterIdentity,
};
use rs_core::traits::{CommentRepo, EngagementReader, VoteRepo};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite, Transaction};
use uuid::Uuid;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Keeps `IN (...)` lists well under SQLite's bound-parameter limit.
const BATCH_SIZE: usize = 500;

pub struct SqliteStore {
    pool: SqlitePool,
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Uuid {
    Uuid::from_slice(blob).unwrap_or_default()
}

fn storage(err: sqlx::Error) -> AppError {
    AppError::Storage(err.to_string())
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(storage)
}

fn identity_from_key(key: &str) -> Result<VoterIdentity> {
    VoterIdentity::from_storage_key(key)
        .ok_or_else(|| AppError::Storage(format!("unrecognised identity key {key:?}")))
}

fn direction_from_text(text: &str) -> Result<VoteDirection> {
    text.parse()
        .map_err(|e| AppError::Storage(format!("corrupt vote row: {e}")))
}

fn vote_from_row(row: &SqliteRow) -> Result<VoteRecord> {
    Ok(VoteRecord {
        id: blob_to_uuid(col::<Vec<u8>>(row, "id")?.as_slice()),
        target_id: col(row, "target_id")?,
        identity: identity_from_key(&col::<String>(row, "identity")?)?,
        direction: direction_from_text(&col::<String>(row, "direction")?)?,
        created_at: col(row, "created_at")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment> {
    Ok(Comment {
        id: col(row, "id")?,
        target_id: col(row, "target_id")?,
        author_identity: identity_from_key(&col::<String>(row, "author_identity")?)?,
        display_name: col(row, "display_name")?,
        parent_comment_id: col(row, "parent_comment_id")?,
        content: col(row, "content")?,
        created_at: col(row, "created_at")?,
    })
}

impl SqliteStore {
    /// Connects with default pool settings and applies the schema.
    pub async fn new(url: &str) -> Result<Self> {
        Self::connect(url, 5, Duration::from_secs(5)).await
    }

    pub async fn connect(url: &str, max_connections: u32, busy_timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);

        // Every connection to `:memory:` is a separate database, so pin one
        // and never let it be recycled.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await.map_err(storage)?;
        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Wraps an existing pool. The caller is responsible for [`Self::migrate`].
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Applies pending migrations from `migrations/`. Already-applied ones
    /// are tracked in `_sqlx_migrations` and skipped.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        tracing::debug!(migrations = MIGRATOR.iter().count(), "sqlite schema up to date");
        Ok(())
    }

    /// A transaction holding the write lock. Rolls back unless committed.
    async fn write_tx(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool.begin_with("BEGIN IMMEDIATE").await.map_err(storage)
    }
}

async fn counts_in(conn: &mut SqliteConnection, target_id: TargetId) -> Result<VoteCounts> {
    let row = sqlx::query(
        "SELECT COALESCE(SUM(direction = 'up'), 0) AS up, \
                COALESCE(SUM(direction = 'down'), 0) AS down \
         FROM votes WHERE target_id = ?",
    )
    .bind(target_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(storage)?;

    Ok(VoteCounts {
        upvotes: col::<i64>(&row, "up")? as u64,
        downvotes: col::<i64>(&row, "down")? as u64,
    })
}

async fn apply_vote_in(
    conn: &mut SqliteConnection,
    target_id: TargetId,
    identity: &VoterIdentity,
    direction: VoteDirection,
    policy: RepeatPolicy,
) -> Result<VoteOutcome> {
    let key = identity.storage_key();
    let existing = sqlx::query("SELECT direction FROM votes WHERE target_id = ? AND identity = ?")
        .bind(target_id)
        .bind(&key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage)?
        .map(|row| direction_from_text(&col::<String>(&row, "direction")?))
        .transpose()?;

    let transition = ledger::plan_vote(existing, direction, policy)?;
    match transition {
        VoteTransition::Insert(d) => {
            sqlx::query(
                "INSERT INTO votes (id, target_id, identity, direction, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(uuid_to_blob(Uuid::now_v7()))
            .bind(target_id)
            .bind(&key)
            .bind(d.as_str())
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        }
        VoteTransition::Switch { to, .. } => {
            sqlx::query("UPDATE votes SET direction = ? WHERE target_id = ? AND identity = ?")
                .bind(to.as_str())
                .bind(target_id)
                .bind(&key)
                .execute(&mut *conn)
                .await
                .map_err(storage)?;
        }
        VoteTransition::Remove(_) => {
            sqlx::query("DELETE FROM votes WHERE target_id = ? AND identity = ?")
                .bind(target_id)
                .bind(&key)
                .execute(&mut *conn)
                .await
                .map_err(storage)?;
        }
    }

    let counts = counts_in(conn, target_id).await?;
    tracing::trace!(target_id, ?transition, "sqlite vote write");
    Ok(VoteOutcome { new_state: transition.resulting_state(), counts })
}

async fn comment_exists(conn: &mut SqliteConnection, comment_id: CommentId) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage)?;
    Ok(row.is_some())
}

async fn like_count_in(conn: &mut SqliteConnection, comment_id: CommentId) -> Result<u64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM comment_likes WHERE comment_id = ?")
        .bind(comment_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(storage)?;
    Ok(col::<i64>(&row, "n")? as u64)
}

async fn toggle_like_in(
    conn: &mut SqliteConnection,
    comment_id: CommentId,
    identity: &VoterIdentity,
) -> Result<LikeStatus> {
    if !comment_exists(conn, comment_id).await? {
        return Err(AppError::comment_not_found(comment_id));
    }

    let key = identity.storage_key();
    let removed = sqlx::query("DELETE FROM comment_likes WHERE comment_id = ? AND identity = ?")
        .bind(comment_id)
        .bind(&key)
        .execute(&mut *conn)
        .await
        .map_err(storage)?
        .rows_affected();

    if removed == 0 {
        sqlx::query(
            "INSERT INTO comment_likes (id, comment_id, identity, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(Uuid::now_v7()))
        .bind(comment_id)
        .bind(&key)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(storage)?;
    }

    Ok(LikeStatus {
        is_liked: removed == 0,
        like_count: like_count_in(conn, comment_id).await?,
    })
}

#[async_trait]
impl VoteRepo for SqliteStore {
    async fn apply_vote(
        &self,
        target_id: TargetId,
        identity: &VoterIdentity,
        direction: VoteDirection,
        policy: RepeatPolicy,
    ) -> Result<VoteOutcome> {
        let mut tx = self.write_tx().await?;
        let outcome = apply_vote_in(&mut *tx, target_id, identity, direction, policy).await?;
        tx.commit().await.map_err(storage)?;
        Ok(outcome)
    }

    async fn vote_direction(
        &self,
        target_id: TargetId,
        identity: &VoterIdentity,
    ) -> Result<Option<VoteDirection>> {
        sqlx::query("SELECT direction FROM votes WHERE target_id = ? AND identity = ?")
            .bind(target_id)
            .bind(identity.storage_key())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .map(|row| direction_from_text(&col::<String>(&row, "direction")?))
            .transpose()
    }

    async fn vote_counts(&self, target_id: TargetId) -> Result<VoteCounts> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        counts_in(&mut conn, target_id).await
    }

    async fn vote_records(&self, target_id: TargetId) -> Result<Vec<VoteRecord>> {
        sqlx::query("SELECT * FROM votes WHERE target_id = ? ORDER BY created_at ASC, id ASC")
            .bind(target_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?
            .iter()
            .map(vote_from_row)
            .collect()
    }
}

#[async_trait]
impl CommentRepo for SqliteStore {
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let id = sqlx::query(
            "INSERT INTO comments \
             (target_id, author_identity, display_name, parent_comment_id, content, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(comment.target_id)
        .bind(comment.author_identity.storage_key())
        .bind(&comment.display_name)
        .bind(comment.parent_comment_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?
        .last_insert_rowid();

        Ok(comment.into_comment(id))
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>> {
        sqlx::query("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .as_ref()
            .map(comment_from_row)
            .transpose()
    }

    async fn list_comments(
        &self,
        target_id: TargetId,
        viewer: &VoterIdentity,
    ) -> Result<Vec<CommentRow>> {
        let rows = sqlx::query(
            "SELECT c.*, \
                (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS like_count, \
                EXISTS (SELECT 1 FROM comment_likes l \
                        WHERE l.comment_id = c.id AND l.identity = ?) AS liked_by_viewer \
             FROM comments c WHERE c.target_id = ? ORDER BY c.id ASC",
        )
        .bind(viewer.storage_key())
        .bind(target_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| {
                Ok(CommentRow {
                    comment: comment_from_row(row)?,
                    like_count: col::<i64>(row, "like_count")? as u64,
                    liked_by_viewer: col(row, "liked_by_viewer")?,
                })
            })
            .collect()
    }

    async fn toggle_like(
        &self,
        comment_id: CommentId,
        identity: &VoterIdentity,
    ) -> Result<LikeStatus> {
        let mut tx = self.write_tx().await?;
        let status = toggle_like_in(&mut *tx, comment_id, identity).await?;
        tx.commit().await.map_err(storage)?;
        Ok(status)
    }

    async fn like_status(
        &self,
        comment_id: CommentId,
        identity: &VoterIdentity,
    ) -> Result<LikeStatus> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        if !comment_exists(&mut conn, comment_id).await? {
            return Err(AppError::comment_not_found(comment_id));
        }
        let liked = sqlx::query("SELECT 1 FROM comment_likes WHERE comment_id = ? AND identity = ?")
            .bind(comment_id)
            .bind(identity.storage_key())
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage)?
            .is_some();

        Ok(LikeStatus {
            is_liked: liked,
            like_count: like_count_in(&mut conn, comment_id).await?,
        })
    }
}

#[async_trait]
impl EngagementReader for SqliteStore {
    /// Two grouped reads per batch, both inside one read transaction.
    async fn engagement_counts(&self, target_ids: &[TargetId]) -> Result<Vec<EngagementCounts>> {
        let mut found: HashMap<TargetId, EngagementCounts> = HashMap::new();
        let mut tx = self.pool.begin().await.map_err(storage)?;

        for chunk in target_ids.chunks(BATCH_SIZE) {
            let mut votes = QueryBuilder::<Sqlite>::new(
                "SELECT target_id, COALESCE(SUM(direction = 'up'), 0) AS up, \
                        COALESCE(SUM(direction = 'down'), 0) AS down \
                 FROM votes WHERE target_id IN (",
            );
            let mut ids = votes.separated(", ");
            for id in chunk {
                ids.push_bind(*id);
            }
            ids.push_unseparated(") GROUP BY target_id");

            for row in votes.build().fetch_all(&mut *tx).await.map_err(storage)? {
                let target_id: TargetId = col(&row, "target_id")?;
                let entry = found
                    .entry(target_id)
                    .or_insert_with(|| EngagementCounts { target_id, ..Default::default() });
                entry.upvotes = col::<i64>(&row, "up")? as u64;
                entry.downvotes = col::<i64>(&row, "down")? as u64;
            }

            let mut comments = QueryBuilder::<Sqlite>::new(
                "SELECT target_id, COUNT(*) AS n FROM comments WHERE target_id IN (",
            );
            let mut ids = comments.separated(", ");
            for id in chunk {
                ids.push_bind(*id);
            }
            ids.push_unseparated(") GROUP BY target_id");

            for row in comments.build().fetch_all(&mut *tx).await.map_err(storage)? {
                let target_id: TargetId = col(&row, "target_id")?;
                found
                    .entry(target_id)
                    .or_insert_with(|| EngagementCounts { target_id, ..Default::default() })
                    .comment_count = col::<i64>(&row, "n")? as u64;
            }
        }
        tx.commit().await.map_err(storage)?;

        Ok(target_ids
            .iter()
            .map(|&id| {
                found
                    .get(&id)
                    .copied()
                    .unwrap_or(EngagementCounts { target_id: id, ..Default::default() })
            })
            .collect())
    }
}
