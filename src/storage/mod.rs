//! SQLite storage layer for the Stride engine.
//!
//! This module provides the persistence layer using SQLite with:
//! - Transaction discipline for atomic writes
//! - Optimistic concurrency on progress records (version column)
//! - A uniqueness constraint on ledger event keys (exactly-once credits)
//! - Audit events for history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod schema;
pub mod sqlite;

pub use sqlite::{
    MutationContext, SqliteStorage, completed_item_ids, get_progress, insert_progress,
    ledger_entries, ledger_insert, lifetime_points, set_all_items_completed, set_item_completed,
    snapshot_item_ids, streak_day_buckets, update_progress_versioned,
};
