#[cfg(test)]
mod tests;

use std::str::FromStr;

use chrono::Utc;
use redwatch_core::{CoreError, DatabaseError, DbStats, FetchLogEntry, Post, StoredPost};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

/// Filters for querying stored posts. Defaults: any subreddit, any
/// relevance, last 7 days, 50 rows.
#[derive(Debug, Clone)]
pub struct PostFilter {
    pub subreddit: Option<String>,
    pub is_relevant: Option<bool>,
    pub max_age_days: Option<u32>,
    pub limit: u32,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            subreddit: None,
            is_relevant: None,
            max_age_days: Some(7),
            limit: 50,
        }
    }
}

/// SQLite-backed store for posts and the fetch audit log.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database file and run migrations.
    pub async fn connect(path: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(DatabaseError::Sql)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let db = Self { pool };
        db.run_migrations().await?;
        info!(path, "database ready");
        Ok(db)
    }

    /// In-memory database for tests. Single connection: each SQLite
    /// in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reddit_id TEXT NOT NULL UNIQUE,
                subreddit TEXT NOT NULL,
                title TEXT NOT NULL,
                selftext TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '[deleted]',
                score INTEGER NOT NULL DEFAULT 0,
                upvote_ratio REAL NOT NULL DEFAULT 0.5,
                num_comments INTEGER NOT NULL DEFAULT 0,
                created_utc INTEGER NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                permalink TEXT NOT NULL DEFAULT '',
                is_self INTEGER NOT NULL DEFAULT 1,
                fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
                is_relevant INTEGER,
                relevance_score REAL,
                keywords_found TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_posts_reddit_id ON posts(reddit_id);
            CREATE INDEX IF NOT EXISTS idx_posts_subreddit ON posts(subreddit);
            CREATE INDEX IF NOT EXISTS idx_posts_created_utc ON posts(created_utc);
            CREATE INDEX IF NOT EXISTS idx_posts_is_relevant ON posts(is_relevant);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed {
            reason: e.to_string(),
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fetch_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subreddit TEXT NOT NULL,
                posts_fetched INTEGER NOT NULL DEFAULT 0,
                posts_stored INTEGER NOT NULL DEFAULT 0,
                posts_matched INTEGER NOT NULL DEFAULT 0,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                run_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_fetch_log_subreddit ON fetch_log(subreddit);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Idempotent insert keyed on `reddit_id`. Returns whether a new row
    /// was stored; an already-seen post is a no-op.
    pub async fn insert_post(&self, post: &Post) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (
                reddit_id, subreddit, title, selftext, author,
                score, upvote_ratio, num_comments, created_utc,
                url, permalink, is_self
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(reddit_id) DO NOTHING
            "#,
        )
        .bind(&post.reddit_id)
        .bind(&post.subreddit)
        .bind(&post.title)
        .bind(&post.selftext)
        .bind(&post.author)
        .bind(post.score)
        .bind(post.upvote_ratio)
        .bind(post.num_comments)
        .bind(post.created_utc)
        .bind(&post.url)
        .bind(&post.permalink)
        .bind(post.is_self)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;

        let stored = result.rows_affected() > 0;
        if stored {
            debug!(reddit_id = %post.reddit_id, subreddit = %post.subreddit, "stored post");
        } else {
            debug!(reddit_id = %post.reddit_id, "post already present");
        }
        Ok(stored)
    }

    /// Annotate a stored post with its relevance verdict.
    pub async fn mark_relevant(
        &self,
        reddit_id: &str,
        score: f64,
        keywords: &[String],
    ) -> Result<(), CoreError> {
        let keywords_json = serde_json::to_string(keywords)?;

        sqlx::query(
            r#"
            UPDATE posts
            SET is_relevant = 1, relevance_score = ?, keywords_found = ?
            WHERE reddit_id = ?
            "#,
        )
        .bind(score)
        .bind(keywords_json)
        .bind(reddit_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;

        Ok(())
    }

    /// Query stored posts, newest first.
    pub async fn posts(&self, filter: &PostFilter) -> Result<Vec<StoredPost>, CoreError> {
        let mut sql = String::from(
            "SELECT reddit_id, subreddit, title, selftext, author, score, upvote_ratio, \
             num_comments, created_utc, url, permalink, is_self, fetched_at, is_relevant, \
             relevance_score, keywords_found FROM posts WHERE 1=1",
        );
        if filter.subreddit.is_some() {
            sql.push_str(" AND subreddit = ?");
        }
        if filter.is_relevant.is_some() {
            sql.push_str(" AND is_relevant = ?");
        }
        if filter.max_age_days.is_some() {
            sql.push_str(" AND created_utc > ?");
        }
        sql.push_str(" ORDER BY created_utc DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, PostRow>(&sql);
        if let Some(subreddit) = &filter.subreddit {
            query = query.bind(subreddit);
        }
        if let Some(is_relevant) = filter.is_relevant {
            query = query.bind(is_relevant);
        }
        if let Some(days) = filter.max_age_days {
            let cutoff = Utc::now().timestamp() - i64::from(days) * 86_400;
            query = query.bind(cutoff);
        }
        query = query.bind(i64::from(filter.limit));

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;

        rows.into_iter().map(PostRow::into_stored_post).collect()
    }

    /// Append one audit row. Rows are never updated or deleted.
    pub async fn log_fetch(&self, entry: &FetchLogEntry) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO fetch_log (
                subreddit, posts_fetched, posts_stored, posts_matched, duration_ms, error
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.subreddit)
        .bind(entry.posts_fetched)
        .bind(entry.posts_stored)
        .bind(entry.posts_matched)
        .bind(entry.duration_ms as i64)
        .bind(&entry.error)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;

        Ok(())
    }

    pub async fn stats(&self) -> Result<DbStats, CoreError> {
        let (total_posts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;

        let (relevant_posts,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM posts WHERE is_relevant = 1")
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::Sql)?;

        let (unique_subreddits,): (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT subreddit) FROM posts")
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::Sql)?;

        let (monitoring_runs,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fetch_log")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;

        let top_subreddits: Vec<(String, i64)> = sqlx::query_as(
            "SELECT subreddit, COUNT(*) as count FROM posts \
             GROUP BY subreddit ORDER BY count DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Sql)?;

        Ok(DbStats {
            total_posts,
            relevant_posts,
            unique_subreddits,
            monitoring_runs,
            top_subreddits,
        })
    }

    /// Delete posts whose creation time is older than `days` days. The
    /// fetch log is untouched. Returns the number of rows removed.
    pub async fn cleanup_old(&self, days: u32) -> Result<u64, CoreError> {
        let cutoff = Utc::now().timestamp() - i64::from(days) * 86_400;

        let result = sqlx::query("DELETE FROM posts WHERE created_utc < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Sql)?;

        let deleted = result.rows_affected();
        info!(deleted, days, "cleaned up old posts");
        Ok(deleted)
    }
}

#[derive(Debug, FromRow)]
struct PostRow {
    reddit_id: String,
    subreddit: String,
    title: String,
    selftext: String,
    author: String,
    score: i64,
    upvote_ratio: f64,
    num_comments: i64,
    created_utc: i64,
    url: String,
    permalink: String,
    is_self: bool,
    fetched_at: String,
    is_relevant: Option<bool>,
    relevance_score: Option<f64>,
    keywords_found: Option<String>,
}

impl PostRow {
    fn into_stored_post(self) -> Result<StoredPost, CoreError> {
        let keywords_found = match self.keywords_found {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };

        Ok(StoredPost {
            post: Post {
                reddit_id: self.reddit_id,
                subreddit: self.subreddit,
                title: self.title,
                selftext: self.selftext,
                author: self.author,
                score: self.score,
                upvote_ratio: self.upvote_ratio,
                num_comments: self.num_comments,
                created_utc: self.created_utc,
                url: self.url,
                permalink: self.permalink,
                is_self: self.is_self,
            },
            fetched_at: self.fetched_at,
            is_relevant: self.is_relevant,
            relevance_score: self.relevance_score,
            keywords_found,
        })
    }
}
