//! SQLite storage implementation.
//!
//! The main storage backend for the Stride engine. Mutations follow the
//! `MutationContext` pattern for transaction discipline and audit
//! logging; the engine composes progress writes and ledger inserts
//! inside a single transaction so a lifecycle transition and its reward
//! are one unit.
//!
//! Two storage-level mechanisms carry the concurrency story:
//! - `plan_progress.version` checked on every update (optimistic
//!   concurrency; zero affected rows means [`Error::Conflict`])
//! - `UNIQUE(reward_ledger.event_key)` with a single conditional
//!   insert (exactly-once crediting)

use crate::error::{Error, Result};
use crate::model::{ActionType, ContentType, LedgerEntry, PlanProgress, ProgressStatus};
use crate::storage::events::{Event, insert_event};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, tracking side effects.
///
/// Passed to mutation closures to record audit events that are written
/// at the end of the transaction.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation (user id, service name, etc.).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: crate::storage::events::EventType,
    ) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: crate::storage::events::EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }
}

// ==================
// Progress Store
// ==================

/// Get a progress record with its completed item ids.
///
/// Returns `None` when the plan was never started.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_progress(
    conn: &Connection,
    user_id: &str,
    content_type: &ContentType,
    content_id: &str,
) -> Result<Option<PlanProgress>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content_type, content_id, status, total_item_count,
                reward_claimed, version, started_at, completed_at, updated_at
         FROM plan_progress
         WHERE user_id = ?1 AND content_type = ?2 AND content_id = ?3",
    )?;

    let progress = stmt
        .query_row(
            rusqlite::params![user_id, content_type.as_str(), content_id],
            |row| {
                Ok(PlanProgress {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    content_type: ContentType::from_str(&row.get::<_, String>(2)?),
                    content_id: row.get(3)?,
                    status: ProgressStatus::from_str(&row.get::<_, String>(4)?),
                    completed_item_ids: Vec::new(),
                    total_item_count: row.get(5)?,
                    reward_claimed: row.get::<_, i64>(6)? != 0,
                    version: row.get(7)?,
                    started_at: row.get(8)?,
                    completed_at: row.get(9)?,
                    updated_at: row.get(10)?,
                })
            },
        )
        .optional()?;

    let Some(mut progress) = progress else {
        return Ok(None);
    };

    progress.completed_item_ids = completed_item_ids(conn, &progress.id)?;
    Ok(Some(progress))
}

/// Item ids checked off for a progress record, in snapshot order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn completed_item_ids(conn: &Connection, progress_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT item_id FROM progress_items
         WHERE progress_id = ?1 AND completed = 1
         ORDER BY position",
    )?;
    let rows = stmt.query_map([progress_id], |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// All snapshot item ids for a progress record, in order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn snapshot_item_ids(conn: &Connection, progress_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT item_id FROM progress_items WHERE progress_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map([progress_id], |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Insert a fresh progress record with its item snapshot.
///
/// # Errors
///
/// Returns an error if the insert fails, including a uniqueness
/// violation when a record for this (user, content) pair already exists.
pub fn insert_progress(conn: &Connection, progress: &PlanProgress, items: &[String]) -> Result<()> {
    conn.execute(
        "INSERT INTO plan_progress
         (id, user_id, content_type, content_id, status, total_item_count,
          reward_claimed, version, started_at, completed_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            progress.id,
            progress.user_id,
            progress.content_type.as_str(),
            progress.content_id,
            progress.status.as_str(),
            progress.total_item_count,
            i64::from(progress.reward_claimed),
            progress.version,
            progress.started_at,
            progress.completed_at,
            progress.updated_at,
        ],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO progress_items (progress_id, item_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, item_id) in items.iter().enumerate() {
        stmt.execute(rusqlite::params![progress.id, item_id, position as i64])?;
    }

    Ok(())
}

/// Update a progress record, checking the caller's last-read version.
///
/// Bumps `version` by one. A losing writer gets [`Error::Conflict`] and
/// must re-read before retrying; it never silently clobbers the winner.
///
/// # Errors
///
/// Returns `Conflict` if the stored record changed since `expected_version`
/// was read, or a database error if the update fails.
pub fn update_progress_versioned(
    conn: &Connection,
    progress: &PlanProgress,
    expected_version: i64,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    let rows = conn.execute(
        "UPDATE plan_progress
         SET status = ?1, reward_claimed = ?2, completed_at = ?3,
             updated_at = ?4, version = version + 1
         WHERE id = ?5 AND version = ?6",
        rusqlite::params![
            progress.status.as_str(),
            i64::from(progress.reward_claimed),
            progress.completed_at,
            now,
            progress.id,
            expected_version,
        ],
    )?;

    if rows == 0 {
        return Err(Error::Conflict);
    }
    Ok(())
}

/// Set an item's completion flag within a progress record.
///
/// Returns `false` when the item is not part of the start-time snapshot.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn set_item_completed(
    conn: &Connection,
    progress_id: &str,
    item_id: &str,
    completed: bool,
) -> Result<bool> {
    let completed_at = if completed {
        Some(chrono::Utc::now().timestamp_millis())
    } else {
        None
    };
    let rows = conn.execute(
        "UPDATE progress_items SET completed = ?1, completed_at = ?2
         WHERE progress_id = ?3 AND item_id = ?4",
        rusqlite::params![i64::from(completed), completed_at, progress_id, item_id],
    )?;
    Ok(rows > 0)
}

/// Mark every snapshot item complete (force-completion path).
///
/// Already-checked items keep their original `completed_at`.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn set_all_items_completed(conn: &Connection, progress_id: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "UPDATE progress_items SET completed = 1, completed_at = ?1
         WHERE progress_id = ?2 AND completed = 0",
        rusqlite::params![now, progress_id],
    )?;
    Ok(())
}

// ==================
// Reward Ledger
// ==================

/// Conditionally insert a ledger row for an event key.
///
/// Returns `true` when the row landed (first credit) and `false` when
/// the key already existed. This is a single atomic conditional insert;
/// the uniqueness constraint does the exactly-once work, not
/// application code.
///
/// # Errors
///
/// Returns an error if the insert fails for any reason other than a
/// key conflict.
pub fn ledger_insert(conn: &Connection, entry: &LedgerEntry) -> Result<bool> {
    let rows = conn.execute(
        "INSERT INTO reward_ledger
         (event_key, user_id, action_type, content_type, content_id, day_bucket, points, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(event_key) DO NOTHING",
        rusqlite::params![
            entry.event_key,
            entry.user_id,
            entry.action_type.as_str(),
            entry.content_type,
            entry.content_id,
            entry.day_bucket,
            entry.points,
            entry.created_at,
        ],
    )?;
    Ok(rows > 0)
}

/// Lifetime points credited to a user.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn lifetime_points(conn: &Connection, user_id: &str) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(points), 0) FROM reward_ledger WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// Distinct active day buckets for a user's streak-eligible actions,
/// newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn streak_day_buckets(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let eligible: Vec<&str> = [
        ActionType::PlanStarted,
        ActionType::PlanCompleted,
        ActionType::DailyCheckIn,
    ]
    .iter()
    .filter(|a| a.is_streak_eligible())
    .map(ActionType::as_str)
    .collect();

    let placeholders = (2..2 + eligible.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT DISTINCT day_bucket FROM reward_ledger
         WHERE user_id = ?1 AND action_type IN ({placeholders})
         ORDER BY day_bucket DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut params: Vec<&dyn rusqlite::ToSql> = vec![&user_id];
    for action in &eligible {
        params.push(action);
    }

    let rows = stmt.query_map(params.as_slice(), |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Recent ledger entries for a user, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn ledger_entries(conn: &Connection, user_id: &str, limit: u32) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, event_key, user_id, action_type, content_type, content_id,
                day_bucket, points, created_at
         FROM reward_ledger
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![user_id, limit], |row| {
        let action: String = row.get(3)?;
        let entry = match ActionType::from_str(&action) {
            Some(action_type) => Some(LedgerEntry {
                id: row.get(0)?,
                event_key: row.get(1)?,
                user_id: row.get(2)?,
                action_type,
                content_type: row.get(4)?,
                content_id: row.get(5)?,
                day_bucket: row.get(6)?,
                points: row.get(7)?,
                created_at: row.get(8)?,
            }),
            None => None,
        };
        Ok((action, entry))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (action, entry) = row?;
        match entry {
            Some(entry) => entries.push(entry),
            // Row written by a newer schema; skip rather than mislabel
            None => tracing::warn!(action, "skipping ledger row with unknown action type"),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_progress(total: u32) -> PlanProgress {
        PlanProgress::new("user-1", ContentType::Diet, "week-1", total)
    }

    fn sample_entry(key: &str, points: i64) -> LedgerEntry {
        LedgerEntry {
            id: 0,
            event_key: key.to_string(),
            user_id: "user-1".to_string(),
            action_type: ActionType::PlanCompleted,
            content_type: Some("diet".to_string()),
            content_id: Some("week-1".to_string()),
            day_bucket: "2026-08-25".to_string(),
            points,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[test]
    fn test_insert_and_get_progress() {
        let storage = SqliteStorage::open_memory().unwrap();
        let progress = sample_progress(3);
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        insert_progress(storage.conn(), &progress, &items).unwrap();

        let loaded = get_progress(storage.conn(), "user-1", &ContentType::Diet, "week-1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, progress.id);
        assert_eq!(loaded.total_item_count, 3);
        assert!(loaded.completed_item_ids.is_empty());
        assert_eq!(
            snapshot_item_ids(storage.conn(), &loaded.id).unwrap(),
            items
        );

        // Missing record reads as None, not an error
        assert!(
            get_progress(storage.conn(), "user-1", &ContentType::Diet, "week-2")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_duplicate_progress_rejected_by_constraint() {
        let storage = SqliteStorage::open_memory().unwrap();
        insert_progress(storage.conn(), &sample_progress(2), &[]).unwrap();

        let result = insert_progress(storage.conn(), &sample_progress(2), &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_versioned_update_conflict() {
        let storage = SqliteStorage::open_memory().unwrap();
        let mut progress = sample_progress(2);
        insert_progress(storage.conn(), &progress, &["a".to_string(), "b".to_string()]).unwrap();

        // First write with the read version succeeds and bumps it
        progress.status = ProgressStatus::Completed;
        progress.completed_at = Some(chrono::Utc::now().timestamp_millis());
        update_progress_versioned(storage.conn(), &progress, 1).unwrap();

        // Stale writer loses
        let err = update_progress_versioned(storage.conn(), &progress, 1).unwrap_err();
        assert!(matches!(err, Error::Conflict));

        // Fresh read carries the bumped version and wins
        let fresh = get_progress(storage.conn(), "user-1", &ContentType::Diet, "week-1")
            .unwrap()
            .unwrap();
        assert_eq!(fresh.version, 2);
        update_progress_versioned(storage.conn(), &fresh, fresh.version).unwrap();
    }

    #[test]
    fn test_item_toggle_and_unknown_item() {
        let storage = SqliteStorage::open_memory().unwrap();
        let progress = sample_progress(2);
        insert_progress(storage.conn(), &progress, &["a".to_string(), "b".to_string()]).unwrap();

        assert!(set_item_completed(storage.conn(), &progress.id, "a", true).unwrap());
        assert_eq!(
            completed_item_ids(storage.conn(), &progress.id).unwrap(),
            vec!["a"]
        );

        // Toggling off removes membership
        assert!(set_item_completed(storage.conn(), &progress.id, "a", false).unwrap());
        assert!(
            completed_item_ids(storage.conn(), &progress.id)
                .unwrap()
                .is_empty()
        );

        // Outside the snapshot: no row updated
        assert!(!set_item_completed(storage.conn(), &progress.id, "zzz", true).unwrap());
    }

    #[test]
    fn test_ledger_insert_exactly_once() {
        let storage = SqliteStorage::open_memory().unwrap();
        let entry = sample_entry("key-1", 50);

        assert!(ledger_insert(storage.conn(), &entry).unwrap());
        assert!(!ledger_insert(storage.conn(), &entry).unwrap());

        let count: i64 = storage
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM reward_ledger WHERE event_key = 'key-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(lifetime_points(storage.conn(), "user-1").unwrap(), 50);
    }

    #[test]
    fn test_ledger_entries_newest_first() {
        let storage = SqliteStorage::open_memory().unwrap();
        ledger_insert(storage.conn(), &sample_entry("key-1", 10)).unwrap();
        ledger_insert(storage.conn(), &sample_entry("key-2", 20)).unwrap();

        let entries = ledger_entries(storage.conn(), "user-1", 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_key, "key-2");
    }

    #[test]
    fn test_ledger_entries_skip_unknown_action() {
        let storage = SqliteStorage::open_memory().unwrap();
        ledger_insert(storage.conn(), &sample_entry("key-1", 10)).unwrap();

        // Row from a future schema revision with an action this build
        // does not know
        storage
            .conn()
            .execute(
                "INSERT INTO reward_ledger
                 (event_key, user_id, action_type, day_bucket, points, created_at)
                 VALUES ('key-2', 'user-1', 'mega_bonus', '2026-08-25', 99, 1)",
                [],
            )
            .unwrap();

        let entries = ledger_entries(storage.conn(), "user-1", 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_key, "key-1");

        // Unknown rows still count toward lifetime points
        assert_eq!(lifetime_points(storage.conn(), "user-1").unwrap(), 109);
    }

    #[test]
    fn test_mutate_rolls_back_on_error() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        let result: Result<()> = storage.mutate("failing_op", "test", |tx, _ctx| {
            insert_progress(tx, &sample_progress(1), &["a".to_string()])?;
            Err(Error::Other("boom".to_string()))
        });
        assert!(result.is_err());

        assert!(
            get_progress(storage.conn(), "user-1", &ContentType::Diet, "week-1")
                .unwrap()
                .is_none()
        );
    }
}
