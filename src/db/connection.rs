use crate::config::{DatabaseConfig, JournalMode, SyncMode};
use crate::error::DbError;
use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::time::Duration;

const DEFAULT_MAX_CONNS: u32 = 4;

pub async fn make_pool(cfg: &DatabaseConfig) -> Result<SqlitePool> {
    make_pool_with_size(cfg, None).await
}

pub async fn make_pool_with_size(cfg: &DatabaseConfig, max: Option<u32>) -> Result<SqlitePool> {
    let max_conn: u32 = if let Some(m) = max {
        m
    } else if let Ok(s) = std::env::var("CHESS_PREP_POOL_SIZE") {
        match s.parse::<u32>() {
            Ok(v) if v > 0 => v,
            _ => {
                log::warn!(
                    "Invalid CHESS_PREP_POOL_SIZE='{}'; using default {}",
                    s,
                    DEFAULT_MAX_CONNS
                );
                DEFAULT_MAX_CONNS
            }
        }
    } else {
        DEFAULT_MAX_CONNS
    };
    let max_conn = if max_conn == 0 { 1 } else { max_conn };
    let acquire_ms: u64 = std::env::var("CHESS_PREP_ACQUIRE_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30_000);

    let opts = SqliteConnectOptions::new()
        .filename(&cfg.path)
        .create_if_missing(cfg.create_if_missing)
        .journal_mode(match cfg.journal_mode {
            JournalMode::Wal => SqliteJournalMode::Wal,
            JournalMode::Delete => SqliteJournalMode::Delete,
        })
        .synchronous(match cfg.sync_mode {
            SyncMode::Normal => SqliteSynchronous::Normal,
            SyncMode::Full => SqliteSynchronous::Full,
        })
        .busy_timeout(cfg.busy_timeout());

    log::debug!(
        "SQLite pool: path={}, max_conns={}, journal={:?}, sync={:?}",
        cfg.path.display(),
        max_conn,
        cfg.journal_mode,
        cfg.sync_mode
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(max_conn)
        .acquire_timeout(Duration::from_millis(acquire_ms))
        .connect_with(opts)
        .await
        .map_err(|e| DbError::Connection(format!("{}: {}", cfg.path.display(), e)))?;
    Ok(pool)
}
