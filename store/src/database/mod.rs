//! Database module
//!
//! This module provides all kernel database functionality:
//! - Schema and migrations
//! - Model definitions
//! - Repository operations for notes, categories, tags, todos and queries

pub mod categories;
pub mod fts;
pub mod models;
pub mod notes;
pub mod query;
pub mod repository;
pub mod schema;
pub(crate) mod session;
pub mod tags;
pub mod todos;

pub use models::*;
pub use query::roll_up_category_counts;
pub use repository::Repository;
pub use schema::initialize_database;
pub use tags::TagCount;

use crate::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// Build connection options shared by migration and application connections.
fn connect_options(db_path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
}

/// Create and initialize the kernel connection pool.
///
/// Migrations run on a dedicated connection that is closed before the
/// application pool opens, so no pooled connection caches a pre-migration
/// schema. The application pool holds exactly one connection for the
/// lifetime of the process: it is the single writer every repository call
/// queues on.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Phase 1: migrations
    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path))
        .await?;

    initialize_database(&migration_pool)
        .await
        .map_err(|e| AppError::Schema(e.to_string()))?;
    migration_pool.close().await;

    // Phase 2: the single application connection
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options(db_path))
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}
