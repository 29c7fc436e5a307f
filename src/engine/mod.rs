//! The Stride engine: progress lifecycle, reward dispatch, streaks.
//!
//! # Submodules
//!
//! - [`lifecycle`] - Lifecycle gate and item toggler
//! - [`dispatch`] - Event dispatcher and event keys
//! - [`streak`] - Streak and milestone calculation
//! - [`policy`] - Point values and thresholds

pub mod dispatch;
pub mod lifecycle;
pub mod policy;
pub mod streak;

pub use dispatch::event_key;
pub use lifecycle::{CompleteOutcome, StartOutcome, ToggleOutcome};
pub use policy::RewardPolicy;

use crate::error::Result;
use crate::model::{ContentType, LedgerEntry, PlanProgress, StreakSummary};
use crate::storage::{self, SqliteStorage};

/// Entry point for all progress and reward operations.
///
/// Wraps the storage backend with the lifecycle state machine, the
/// exactly-once dispatcher, and the streak calculator. Every operation
/// is synchronous request/response; retries are always safe to resend.
pub struct Engine {
    storage: SqliteStorage,
    policy: RewardPolicy,
    actor: String,
}

impl Engine {
    /// Create an engine with the default reward policy.
    #[must_use]
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            storage,
            policy: RewardPolicy::default(),
            actor: "engine".to_string(),
        }
    }

    /// Override the reward policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RewardPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the actor recorded in audit events.
    #[must_use]
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    /// Access the underlying storage (read paths, tests).
    #[must_use]
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Get a user's progress on a plan, if it was ever started.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_progress(
        &self,
        user_id: &str,
        content_type: &ContentType,
        content_id: &str,
    ) -> Result<Option<PlanProgress>> {
        storage::get_progress(self.storage.conn(), user_id, content_type, content_id)
    }

    /// Current activity streak for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn current_streak(&self, user_id: &str) -> Result<StreakSummary> {
        let buckets = storage::streak_day_buckets(self.storage.conn(), user_id)?;
        Ok(streak::summarize(
            &buckets,
            chrono::Utc::now().date_naive(),
        ))
    }

    /// Lifetime points credited to a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn lifetime_points(&self, user_id: &str) -> Result<i64> {
        storage::lifetime_points(self.storage.conn(), user_id)
    }

    /// Recent ledger entries for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn ledger(&self, user_id: &str, limit: u32) -> Result<Vec<LedgerEntry>> {
        storage::ledger_entries(self.storage.conn(), user_id, limit)
    }
}
