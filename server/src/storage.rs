//! Durable storage for players and chat transcripts

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use shared::{PlayerStats, SteamId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// A chat line waiting to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRecord {
    pub message: String,
    /// Row id of the author in the `player` table
    pub player_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// A stored chat line as read back
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ChatLog {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Row id of the player with this steam id, if one was ever stored
    async fn find_player(&self, steam_id: SteamId) -> Result<Option<i64>, StorageError>;

    /// Creates or refreshes the player row and returns its id
    async fn store_player(&self, steam_id: SteamId, stats: &PlayerStats) -> Result<i64, StorageError>;

    /// Writes every record in one transaction; either all rows land or none do
    async fn insert_chat_batch(&self, batch: &[ChatRecord]) -> Result<(), StorageError>;

    /// Messages by one player between `start` and `end` inclusive, oldest first
    async fn chat_logs(
        &self,
        steam_id: SteamId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ChatLog>, StorageError>;

    async fn close(&self);
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS player (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        steam_id INTEGER NOT NULL UNIQUE,
        is_banned INTEGER NOT NULL DEFAULT 0,
        stats BLOB,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message TEXT NOT NULL,
        player_id INTEGER NOT NULL REFERENCES player(id),
        timestamp TEXT NOT NULL
    )
    "#,
];

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database behind `url` and its schema
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives and dies with its connection.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        let store = Self { pool };
        store.migrate().await?;
        info!("Connected to chat store at {}", url);
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn chat_log_count(&self) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn find_player(&self, steam_id: SteamId) -> Result<Option<i64>, StorageError> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM player WHERE steam_id = ?")
            .bind(steam_id.0 as i64)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn store_player(&self, steam_id: SteamId, stats: &PlayerStats) -> Result<i64, StorageError> {
        let encoded = stats.encode()?;
        let now = Utc::now();

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO player (steam_id, is_banned, stats, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(steam_id) DO UPDATE SET
                is_banned = excluded.is_banned,
                stats = excluded.stats,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(steam_id.0 as i64)
        .bind(stats.is_banned)
        .bind(encoded)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!("Stored player {} as row {}", steam_id, id);
        Ok(id)
    }

    async fn insert_chat_batch(&self, batch: &[ChatRecord]) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in batch {
            let inserted = sqlx::query(
                "INSERT INTO chat_logs (message, player_id, timestamp) VALUES (?, ?, ?)",
            )
            .bind(&record.message)
            .bind(record.player_id)
            .bind(record.timestamp)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                tx.rollback().await?;
                return Err(e.into());
            }
        }
        tx.commit().await?;

        Ok(())
    }

    async fn chat_logs(
        &self,
        steam_id: SteamId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ChatLog>, StorageError> {
        let logs = sqlx::query_as::<_, ChatLog>(
            r#"
            SELECT c.message, c.timestamp
            FROM chat_logs c
            JOIN player p ON p.id = c.player_id
            WHERE p.steam_id = ? AND c.timestamp >= ? AND c.timestamp <= ?
            ORDER BY c.timestamp, c.id
            "#,
        )
        .bind(steam_id.0 as i64)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
