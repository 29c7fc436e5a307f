//! Plan progress model.
//!
//! A `PlanProgress` tracks one user working through one piece of plan
//! content (a diet week, an exercise program). Item membership is a
//! set snapshotted at start time, so toggling is idempotent and
//! reversible; the lifecycle status is a one-way ladder.

use serde::{Deserialize, Serialize};

/// Kinds of trackable plan content.
///
/// Unknown strings parse as `Other` so new content types can be
/// introduced by collaborators without a lockstep engine release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Diet,
    Exercise,
    Habit,
    Other(String),
}

impl ContentType {
    /// Get the string representation for storage.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Diet => "diet",
            Self::Exercise => "exercise",
            Self::Habit => "habit",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "diet" => Self::Diet,
            "exercise" => Self::Exercise,
            "habit" => Self::Habit,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Lifecycle status of a progress record.
///
/// `not_started` has no variant here: it is represented by the absence
/// of a record. A row only exists once `start` has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    InProgress,
    Completed,
}

impl ProgressStatus {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "completed" => Self::Completed,
            _ => Self::InProgress,
        }
    }
}

/// Progress of one user through one plan.
///
/// One record per (user, content type, content id). Created by `start`,
/// mutated by toggles and completion, never deleted (kept as history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanProgress {
    /// Unique identifier (`prog_` + short uuid)
    pub id: String,

    /// Owning user (opaque, resolved by the caller's auth layer)
    pub user_id: String,

    /// Kind of content being tracked
    pub content_type: ContentType,

    /// Content identifier within its type
    pub content_id: String,

    /// Lifecycle status
    pub status: ProgressStatus,

    /// Item ids checked off so far, in snapshot order
    pub completed_item_ids: Vec<String>,

    /// Item count snapshotted at start time. Immutable afterwards so
    /// the percentage stays stable even if the content is edited later.
    pub total_item_count: u32,

    /// True once the completion reward has been credited. Never cleared.
    pub reward_claimed: bool,

    /// Optimistic-concurrency counter, bumped on every write
    pub version: i64,

    /// Start timestamp (Unix milliseconds), set once
    pub started_at: i64,

    /// Completion timestamp (Unix milliseconds), set once
    pub completed_at: Option<i64>,

    /// Last mutation timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl PlanProgress {
    /// Create a fresh record for a just-started plan.
    #[must_use]
    pub fn new(user_id: &str, content_type: ContentType, content_id: &str, total: u32) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let id = format!("prog_{}", &uuid::Uuid::new_v4().to_string()[..12]);

        Self {
            id,
            user_id: user_id.to_string(),
            content_type,
            content_id: content_id.to_string(),
            status: ProgressStatus::InProgress,
            completed_item_ids: Vec::new(),
            total_item_count: total,
            reward_claimed: false,
            version: 1,
            started_at: now,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Completion percentage (0-100), rounded down.
    #[must_use]
    pub fn percent_complete(&self) -> u32 {
        Self::percent(self.completed_item_ids.len(), self.total_item_count)
    }

    // Widened to u64 so done * 100 cannot overflow for huge plans
    fn percent(done: usize, total: u32) -> u32 {
        if total == 0 {
            return 0;
        }
        let done = u64::try_from(done).unwrap_or(u64::MAX);
        let percent = done.saturating_mul(100) / u64::from(total);
        u32::try_from(percent).unwrap_or(u32::MAX)
    }

    /// Whether every snapshot item is checked off.
    #[must_use]
    pub fn all_items_complete(&self) -> bool {
        self.completed_item_ids.len() >= self.total_item_count as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_progress() {
        let p = PlanProgress::new("user-1", ContentType::Diet, "plan-7", 5);
        assert!(p.id.starts_with("prog_"));
        assert_eq!(p.status, ProgressStatus::InProgress);
        assert_eq!(p.total_item_count, 5);
        assert_eq!(p.version, 1);
        assert!(!p.reward_claimed);
        assert!(p.completed_at.is_none());
    }

    #[test]
    fn test_percent_complete() {
        let mut p = PlanProgress::new("user-1", ContentType::Exercise, "plan-1", 5);
        assert_eq!(p.percent_complete(), 0);

        p.completed_item_ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(p.percent_complete(), 40);

        p.completed_item_ids.extend(["c", "d", "e"].map(String::from));
        assert_eq!(p.percent_complete(), 100);
        assert!(p.all_items_complete());
    }

    #[test]
    fn test_percent_complete_huge_plans() {
        // Counts where done * 100 would overflow u32
        assert_eq!(PlanProgress::percent(50_000_000, 60_000_000), 83);
        assert_eq!(PlanProgress::percent(u32::MAX as usize, u32::MAX), 100);
        assert_eq!(PlanProgress::percent(0, u32::MAX), 0);
    }

    #[test]
    fn test_content_type_round_trip() {
        assert_eq!(ContentType::from_str("diet"), ContentType::Diet);
        assert_eq!(ContentType::from_str("EXERCISE"), ContentType::Exercise);
        assert_eq!(
            ContentType::from_str("yoga"),
            ContentType::Other("yoga".to_string())
        );
        assert_eq!(ContentType::from_str("yoga").as_str(), "yoga");
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            ProgressStatus::from_str("completed"),
            ProgressStatus::Completed
        );
        assert_eq!(
            ProgressStatus::from_str("in_progress"),
            ProgressStatus::InProgress
        );
        assert_eq!(
            ProgressStatus::from_str("garbage"),
            ProgressStatus::InProgress
        );
    }
}
