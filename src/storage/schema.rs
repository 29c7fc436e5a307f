//! Database schema definitions.
//!
//! Two durable stores plus an audit trail:
//! - `plan_progress` / `progress_items`: one progress record per
//!   (user, content) pair with the item set snapshotted at start time
//! - `reward_ledger`: append-only, `UNIQUE(event_key)` is the
//!   exactly-once mechanism for point crediting
//! - `events`: audit history of every mutation

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the Stride database.
///
/// Timestamps are stored as INTEGER (Unix milliseconds); day buckets
/// as TEXT `YYYY-MM-DD` in UTC.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Progress Store
-- ====================

-- One record per (user, content type, content id). A missing row means
-- the plan was never started; rows are never deleted.
CREATE TABLE IF NOT EXISTS plan_progress (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    content_type TEXT NOT NULL,
    content_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'in_progress',
    total_item_count INTEGER NOT NULL,
    reward_claimed INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 1,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    updated_at INTEGER NOT NULL,
    UNIQUE(user_id, content_type, content_id),
    CHECK (status IN ('in_progress', 'completed'))
);

CREATE INDEX IF NOT EXISTS idx_plan_progress_user ON plan_progress(user_id);
CREATE INDEX IF NOT EXISTS idx_plan_progress_status ON plan_progress(user_id, status);

-- Item snapshot taken at start time. Completion is membership-based:
-- toggling flips the completed flag, which makes it naturally
-- idempotent and reversible.
CREATE TABLE IF NOT EXISTS progress_items (
    progress_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    completed_at INTEGER,
    PRIMARY KEY (progress_id, item_id),
    FOREIGN KEY (progress_id) REFERENCES plan_progress(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_progress_items_progress ON progress_items(progress_id);

-- ====================
-- Reward Ledger
-- ====================

-- Append-only. The UNIQUE constraint on event_key is the sole
-- concurrency-safety mechanism for awarding points once: crediting is
-- a single conditional insert, never a read-then-write pair.
CREATE TABLE IF NOT EXISTS reward_ledger (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_key TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    action_type TEXT NOT NULL,
    content_type TEXT,
    content_id TEXT,
    day_bucket TEXT NOT NULL,
    points INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reward_ledger_user ON reward_ledger(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_reward_ledger_user_action ON reward_ledger(user_id, action_type, day_bucket);

-- ====================
-- Audit Events
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at DESC);
";

/// Apply the schema to a database connection.
///
/// Idempotent; safe to call on every open.
///
/// # Errors
///
/// Returns an error if schema application fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            CURRENT_SCHEMA_VERSION.to_string(),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_applies_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        // Idempotent on re-apply
        apply_schema(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('plan_progress', 'progress_items', 'reward_ledger', 'events')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_event_key_uniqueness_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let insert = "INSERT INTO reward_ledger
             (event_key, user_id, action_type, day_bucket, points, created_at)
             VALUES ('k1', 'u1', 'plan_completed', '2026-08-25', 50, 0)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
