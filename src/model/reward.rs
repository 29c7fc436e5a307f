//! Reward ledger model and dispatch outcome types.
//!
//! The ledger is append-only: one row per event key, enforced by a
//! uniqueness constraint at write time. That constraint, not any
//! application-level lock, is what makes point crediting exactly-once.

use serde::{Deserialize, Serialize};

/// Gamification-worthy actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// User started a plan (one-shot per plan)
    PlanStarted,
    /// User finished every item of a plan (one-shot per plan)
    PlanCompleted,
    /// User checked in for the day (repeatable, once per UTC day)
    DailyCheckIn,
}

/// How an action's event key is scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// One credit per (user, action, content) — start/complete
    PerContent,
    /// One credit per (user, action, UTC day) — daily check-in
    PerDay,
}

impl ActionType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PlanStarted => "plan_started",
            Self::PlanCompleted => "plan_completed",
            Self::DailyCheckIn => "daily_check_in",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "plan_started" | "start" => Some(Self::PlanStarted),
            "plan_completed" | "complete" => Some(Self::PlanCompleted),
            "daily_check_in" | "check-in" | "checkin" => Some(Self::DailyCheckIn),
            _ => None,
        }
    }

    /// Event-key scope for this action.
    #[must_use]
    pub const fn key_scope(&self) -> KeyScope {
        match self {
            Self::PlanStarted | Self::PlanCompleted => KeyScope::PerContent,
            Self::DailyCheckIn => KeyScope::PerDay,
        }
    }

    /// Whether this action counts toward the activity streak.
    ///
    /// Starting a plan is deliberate but cheap; only finishing work
    /// (completions, daily check-ins) keeps a streak alive.
    #[must_use]
    pub const fn is_streak_eligible(&self) -> bool {
        matches!(self, Self::PlanCompleted | Self::DailyCheckIn)
    }
}

/// One immutable reward ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    /// Deterministic idempotency key (sha-256 hex of the canonical tuple)
    pub event_key: String,
    pub user_id: String,
    pub action_type: ActionType,
    /// Content the action applied to; `None` for per-day actions
    pub content_type: Option<String>,
    pub content_id: Option<String>,
    /// UTC calendar day the action landed on (`YYYY-MM-DD`)
    pub day_bucket: String,
    pub points: i64,
    pub created_at: i64,
}

/// Consecutive-day activity streak derived from the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreakSummary {
    /// Consecutive UTC days (ending today or yesterday) with activity
    pub current: u32,
    /// Longest consecutive run anywhere in the history
    pub longest: u32,
    /// Total distinct active days
    pub total_active_days: u32,
    /// Most recent active day (`YYYY-MM-DD`), if any
    pub last_active_day: Option<String>,
}

/// What kind of threshold a milestone crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    LifetimePoints,
    StreakLength,
}

impl MilestoneKind {
    /// Get the string representation for display and storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LifetimePoints => "lifetime_points",
            Self::StreakLength => "streak_length",
        }
    }
}

/// A threshold crossed for the first time by the current dispatch.
///
/// Reported once, on the crossing call only; later dispatches that sit
/// above the threshold do not re-report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub kind: MilestoneKind,
    pub threshold: u32,
}

/// Result of dispatching a gamification event.
///
/// `already_earned` is a successful idempotent no-op, not a failure:
/// render it as positive confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Points credited by this call (0 when already earned)
    pub points_earned: i64,
    /// True when the event key already existed in the ledger
    pub already_earned: bool,
    /// Lifetime points after this call
    pub total_points: i64,
    /// Activity streak after this call
    pub streak: StreakSummary,
    /// Threshold newly crossed by this call, if any
    pub milestone: Option<Milestone>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_parsing() {
        assert_eq!(
            ActionType::from_str("plan_completed"),
            Some(ActionType::PlanCompleted)
        );
        assert_eq!(ActionType::from_str("complete"), Some(ActionType::PlanCompleted));
        assert_eq!(ActionType::from_str("checkin"), Some(ActionType::DailyCheckIn));
        assert_eq!(ActionType::from_str("nonsense"), None);
    }

    #[test]
    fn test_key_scopes() {
        assert_eq!(ActionType::PlanStarted.key_scope(), KeyScope::PerContent);
        assert_eq!(ActionType::DailyCheckIn.key_scope(), KeyScope::PerDay);
    }

    #[test]
    fn test_streak_eligibility() {
        assert!(!ActionType::PlanStarted.is_streak_eligible());
        assert!(ActionType::PlanCompleted.is_streak_eligible());
        assert!(ActionType::DailyCheckIn.is_streak_eligible());
    }
}
