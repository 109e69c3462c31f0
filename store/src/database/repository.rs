//! Repository layer for database operations
//!
//! The repository owns the single-connection pool and the per-process
//! session state. Entity operations live in sibling modules as further
//! `impl Repository` blocks; their internal helpers take the already held
//! `&mut SqliteConnection` so composite operations never re-acquire the
//! pool (which would wait on themselves).

use super::models::StoreEvent;
use super::session::SessionState;
use crate::config::{Clock, SystemClock};
use crate::error::Result;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pub(crate) pool: SqlitePool,
    pub(crate) session: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<StoreEvent>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pool,
            session: Arc::new(Mutex::new(SessionState::default())),
            events,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for date-relative filters such as Today and Yesterday
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Receive change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: StoreEvent) {
        // No receivers is not an error
        let _ = self.events.send(event);
    }

    /// Fold the WAL back into the main database file
    pub async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        tracing::debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Write a consistent copy of the live database to `target`.
    /// `target` must not exist.
    pub async fn snapshot_to(&self, target: &Path) -> Result<()> {
        sqlx::query("VACUUM INTO ?")
            .bind(target.to_string_lossy().into_owned())
            .execute(&self.pool)
            .await?;
        tracing::debug!("Database snapshot written to {:?}", target);
        Ok(())
    }

    /// Close the pool, waiting for the connection to be returned
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database connection closed");
    }
}
