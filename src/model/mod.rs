//! Data types for the Stride engine.
//!
//! - [`progress`] - Plan progress records and lifecycle status
//! - [`reward`] - Ledger entries, action types, dispatch outcomes

pub mod progress;
pub mod reward;

pub use progress::{ContentType, PlanProgress, ProgressStatus};
pub use reward::{
    ActionType, DispatchOutcome, KeyScope, LedgerEntry, Milestone, MilestoneKind, StreakSummary,
};
