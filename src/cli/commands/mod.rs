//! Command handlers.

pub mod progress;
pub mod reward;

use crate::config::resolve_db_path;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use std::path::PathBuf;

/// Open the engine against the resolved database path.
pub fn open_engine(db_path: Option<&PathBuf>, actor: &str) -> Result<Engine> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("could not resolve a database location".to_string()))?;

    let storage = SqliteStorage::open(&db_path)?;
    Ok(Engine::new(storage).with_actor(actor))
}

/// Format a Unix-millisecond timestamp for display.
#[must_use]
pub fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
