use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{ConfigError, DatabaseError};
use crate::model::{OutcomeRecord, RunStatistics};
use crate::traits::ResultSink;

/// Append-only SQLite store for outcome records.
///
/// One row per module invocation with the columns of the results sheet:
/// date, time, wallet, network name and id, module, status, explorer link
/// (or `-`) and error (or `-`).
#[derive(Debug, Clone)]
pub struct SqliteResultStore {
    pool: SqlitePool,
    explorer_tx_url: String,
}

impl SqliteResultStore {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

    /// Opens (creating if needed) the database at `db_path`.
    ///
    /// `explorer_tx_url` is prefixed to transaction hashes, e.g.
    /// `https://blockscout.lisk.com/tx/`.
    pub async fn new(db_path: &str, explorer_tx_url: impl Into<String>) -> Result<Self> {
        if !Path::new(db_path).exists() {
            std::fs::File::create(db_path).map_err(|e| ConfigError::IoError {
                path: db_path.to_string(),
                msg: e.to_string(),
            })?;
            info!("Created new results database: {}", db_path);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_millis(Self::DEFAULT_TIMEOUT_MS))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode=WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous=NORMAL;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("sqlite://{}", db_path))
            .await
            .map_err(|e| DatabaseError::ConnectionFailed { msg: e.to_string() })?;

        let store = Self {
            pool,
            explorer_tx_url: explorer_tx_url.into(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS outcomes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                wallet_address TEXT NOT NULL,
                network_name TEXT NOT NULL,
                network_id INTEGER NOT NULL,
                module TEXT NOT NULL,
                status TEXT NOT NULL,
                tx_link TEXT NOT NULL,
                error TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create outcomes table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_outcomes_wallet ON outcomes(wallet_address)")
            .execute(&self.pool)
            .await
            .context("Failed to create outcomes index")?;

        Ok(())
    }

    pub fn tx_link(&self, tx_hash: Option<&str>) -> String {
        match tx_hash {
            Some(hash) => format!("{}{}", self.explorer_tx_url, hash),
            None => "-".to_string(),
        }
    }

    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM outcomes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryFailed { msg: e.to_string() })?;
        Ok(row.0)
    }

    pub async fn count_for_wallet(&self, wallet_address: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM outcomes WHERE wallet_address = ?")
            .bind(wallet_address)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryFailed { msg: e.to_string() })?;
        Ok(row.0)
    }

    async fn most_used(&self, column: &str) -> Result<Option<String>> {
        // `column` is one of two fixed names, never user input.
        let sql = format!(
            "SELECT {col} FROM outcomes GROUP BY {col} ORDER BY COUNT(*) DESC, {col} ASC LIMIT 1",
            col = column
        );
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryFailed { msg: e.to_string() })?;
        Ok(row.map(|r| r.0))
    }
}

#[async_trait]
impl ResultSink for SqliteResultStore {
    async fn record(&self, outcome: &OutcomeRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO outcomes (date, time, wallet_address, network_name, network_id, module, status, tx_link, error, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(outcome.timestamp.format("%Y-%m-%d").to_string())
        .bind(outcome.timestamp.format("%H:%M:%S").to_string())
        .bind(&outcome.wallet_address)
        .bind(&outcome.network_name)
        .bind(outcome.network_id as i64)
        .bind(&outcome.module)
        .bind(outcome.status())
        .bind(self.tx_link(outcome.tx_hash.as_deref()))
        .bind(outcome.error.as_deref().unwrap_or("-"))
        .bind(outcome.timestamp.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryFailed { msg: e.to_string() })?;

        Ok(())
    }

    async fn statistics(&self) -> Result<RunStatistics> {
        let (total, successful): (i64, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), SUM(CASE WHEN status = 'Success' THEN 1 ELSE 0 END) FROM outcomes",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryFailed { msg: e.to_string() })?;

        let total = total.max(0) as u64;
        let successful = successful.unwrap_or(0).max(0) as u64;
        let success_rate = if total > 0 {
            (successful as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        Ok(RunStatistics {
            total,
            successful,
            failed: total - successful,
            success_rate,
            most_used_network: self.most_used("network_name").await?,
            most_used_module: self.most_used("module").await?,
        })
    }
}
