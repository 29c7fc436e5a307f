//! Lifecycle gate and item toggler.
//!
//! The state machine is (no record) → `in_progress` → `completed`,
//! with `completed` terminal. Start is an idempotent no-op when a
//! record exists; toggling before start is a policy rejection
//! (`NotStarted`); and the completion transition plus its reward
//! dispatch happen inside one transaction, so a crash between them
//! cannot leave "completed but unrewarded" or the reverse.

use crate::content::ContentProvider;
use crate::engine::Engine;
use crate::engine::dispatch::dispatch_in_tx;
use crate::error::{Error, Result};
use crate::model::{
    ActionType, ContentType, DispatchOutcome, PlanProgress, ProgressStatus,
};
use crate::storage::{self, events::EventType};
use serde::Serialize;
use std::collections::HashSet;

/// Bounded retries for optimistic-concurrency conflicts. The record is
/// read before the write transaction opens, so a writer in another
/// process can land in between; each retry re-reads fresh state, and a
/// small bound is enough for the rare same-record race.
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Result of a start call.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub progress: PlanProgress,
    /// True when a record already existed; the call changed nothing
    pub already_started: bool,
    /// Start reward, dispatched on first start only
    pub reward: Option<DispatchOutcome>,
}

/// Result of an item toggle.
#[derive(Debug, Clone, Serialize)]
pub struct ToggleOutcome {
    pub progress: PlanProgress,
    /// True when this toggle completed the final item
    pub just_completed: bool,
    /// Completion reward, present only on the completing toggle
    pub reward: Option<DispatchOutcome>,
}

/// Result of an explicit completion call.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteOutcome {
    pub progress: PlanProgress,
    /// True when the plan was already completed; the call changed nothing
    pub already_completed: bool,
    pub reward: Option<DispatchOutcome>,
}

impl Engine {
    /// Start tracking a plan for a user.
    ///
    /// Snapshots the content's item list at call time. Idempotent: if a
    /// record already exists (including one created by a concurrent
    /// start), returns it with `already_started = true` — a retrying
    /// client never sees a failure. The start reward dispatches inside
    /// the same transaction as the insert.
    ///
    /// # Errors
    ///
    /// Returns `DependencyUnavailable` when the content provider cannot
    /// answer, `InvalidArgument` for unknown content, an empty item
    /// list, or duplicate item ids, and database errors otherwise.
    pub fn start_progress(
        &mut self,
        user_id: &str,
        content_type: &ContentType,
        content_id: &str,
        provider: &dyn ContentProvider,
    ) -> Result<StartOutcome> {
        if let Some(existing) = self.get_progress(user_id, content_type, content_id)? {
            tracing::debug!(user = user_id, content = content_id, "already started");
            return Ok(StartOutcome {
                progress: existing,
                already_started: true,
                reward: None,
            });
        }

        let items = provider.item_ids(content_type, content_id)?;
        if items.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "content {content_id} has no items to track"
            )));
        }
        let unique: HashSet<&String> = items.iter().collect();
        if unique.len() != items.len() {
            return Err(Error::InvalidArgument(format!(
                "content {content_id} has duplicate item ids"
            )));
        }

        let total = u32::try_from(items.len())
            .map_err(|_| Error::InvalidArgument("too many items".to_string()))?;
        let progress = PlanProgress::new(user_id, content_type.clone(), content_id, total);

        let policy = &self.policy;
        let actor = self.actor.clone();
        let progress_ref = &progress;
        let result = self.storage.mutate("start_progress", &actor, |tx, ctx| {
            storage::insert_progress(tx, progress_ref, &items)?;
            ctx.record_event("progress", &progress_ref.id, EventType::ProgressStarted);
            dispatch_in_tx(
                tx,
                ctx,
                policy,
                user_id,
                ActionType::PlanStarted,
                Some((content_type, content_id)),
                chrono::Utc::now(),
            )
        });

        match result {
            Ok(reward) => {
                tracing::info!(user = user_id, content = content_id, "progress started");
                Ok(StartOutcome {
                    progress,
                    already_started: false,
                    reward: Some(reward),
                })
            }
            // A concurrent start won the insert race; theirs is the record
            Err(Error::Database(e)) if is_unique_violation(&e) => {
                let existing = self
                    .get_progress(user_id, content_type, content_id)?
                    .ok_or_else(|| Error::Other("start race left no record".to_string()))?;
                Ok(StartOutcome {
                    progress: existing,
                    already_started: true,
                    reward: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Toggle an item's completion within a started plan.
    ///
    /// Flips membership in the completed set. When the toggle checks
    /// off the final item of a not-yet-completed plan, the record
    /// transitions to `completed` and the completion reward dispatches
    /// atomically with it. Toggles after completion remain allowed for
    /// historical accuracy but never revert the status or the reward.
    ///
    /// # Errors
    ///
    /// Returns `NotStarted` if the plan has no record, `InvalidItem`
    /// for an item outside the start-time snapshot, and `Conflict` if
    /// concurrent writers exhausted the retry budget.
    pub fn toggle_progress_item(
        &mut self,
        user_id: &str,
        content_type: &ContentType,
        content_id: &str,
        item_id: &str,
    ) -> Result<ToggleOutcome> {
        let mut attempts = 0;
        loop {
            match self.try_toggle(user_id, content_type, content_id, item_id) {
                Err(Error::Conflict) if attempts < MAX_CONFLICT_RETRIES => {
                    attempts += 1;
                    tracing::debug!(
                        user = user_id,
                        content = content_id,
                        attempt = attempts,
                        "toggle conflict, retrying with fresh read"
                    );
                }
                other => return other,
            }
        }
    }

    fn try_toggle(
        &mut self,
        user_id: &str,
        content_type: &ContentType,
        content_id: &str,
        item_id: &str,
    ) -> Result<ToggleOutcome> {
        // Read before the transaction; the version check at write time
        // catches anything that committed in between.
        let Some(progress) = self.get_progress(user_id, content_type, content_id)? else {
            return Err(Error::NotStarted {
                content_id: content_id.to_string(),
            });
        };

        let was_checked = progress.completed_item_ids.iter().any(|i| i == item_id);
        let now_checked = !was_checked;

        let policy = &self.policy;
        let actor = self.actor.clone();
        let progress = &progress;
        self.storage.mutate("toggle_item", &actor, |tx, ctx| {
            if !storage::set_item_completed(tx, &progress.id, item_id, now_checked)? {
                return Err(Error::InvalidItem {
                    item_id: item_id.to_string(),
                    content_id: content_id.to_string(),
                });
            }

            let mut updated = progress.clone();
            updated.completed_item_ids = storage::completed_item_ids(tx, &progress.id)?;

            let event = if now_checked {
                EventType::ItemChecked
            } else {
                EventType::ItemUnchecked
            };
            ctx.record_change(
                "progress",
                &progress.id,
                event,
                Some(item_id.to_string()),
                Some(format!(
                    "{}/{}",
                    updated.completed_item_ids.len(),
                    updated.total_item_count
                )),
            );

            let mut just_completed = false;
            let mut reward = None;

            // Completion is one-way: reaching 100% transitions and
            // rewards; dropping back below never reverts either.
            if updated.all_items_complete() && updated.status != ProgressStatus::Completed {
                updated.status = ProgressStatus::Completed;
                updated.completed_at = Some(chrono::Utc::now().timestamp_millis());

                let outcome = dispatch_in_tx(
                    tx,
                    ctx,
                    policy,
                    user_id,
                    ActionType::PlanCompleted,
                    Some((content_type, content_id)),
                    chrono::Utc::now(),
                )?;
                updated.reward_claimed = true;
                ctx.record_event("progress", &progress.id, EventType::ProgressCompleted);
                tracing::info!(user = user_id, content = content_id, "plan completed");

                reward = Some(outcome);
                just_completed = true;
            }

            storage::update_progress_versioned(tx, &updated, progress.version)?;
            updated.version = progress.version + 1;

            Ok(ToggleOutcome {
                progress: updated,
                just_completed,
                reward,
            })
        })
    }

    /// Explicitly complete a plan, checking off any remaining items.
    ///
    /// Manual completion is force-completion: it is allowed while
    /// unchecked items remain, marks every snapshot item complete, then
    /// follows the natural-completion path. Calling it on an
    /// already-completed plan is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotStarted` if the plan has no record, and `Conflict`
    /// if concurrent writers exhausted the retry budget.
    pub fn complete_progress(
        &mut self,
        user_id: &str,
        content_type: &ContentType,
        content_id: &str,
    ) -> Result<CompleteOutcome> {
        let mut attempts = 0;
        loop {
            match self.try_complete(user_id, content_type, content_id) {
                Err(Error::Conflict) if attempts < MAX_CONFLICT_RETRIES => {
                    attempts += 1;
                }
                other => return other,
            }
        }
    }

    fn try_complete(
        &mut self,
        user_id: &str,
        content_type: &ContentType,
        content_id: &str,
    ) -> Result<CompleteOutcome> {
        let Some(progress) = self.get_progress(user_id, content_type, content_id)? else {
            return Err(Error::NotStarted {
                content_id: content_id.to_string(),
            });
        };

        if progress.status == ProgressStatus::Completed {
            return Ok(CompleteOutcome {
                progress,
                already_completed: true,
                reward: None,
            });
        }

        let policy = &self.policy;
        let actor = self.actor.clone();
        let progress = &progress;
        self.storage.mutate("complete_progress", &actor, |tx, ctx| {
            storage::set_all_items_completed(tx, &progress.id)?;

            let mut updated = progress.clone();
            updated.completed_item_ids = storage::completed_item_ids(tx, &progress.id)?;
            updated.status = ProgressStatus::Completed;
            updated.completed_at = Some(chrono::Utc::now().timestamp_millis());

            let outcome = dispatch_in_tx(
                tx,
                ctx,
                policy,
                user_id,
                ActionType::PlanCompleted,
                Some((content_type, content_id)),
                chrono::Utc::now(),
            )?;
            updated.reward_claimed = true;

            ctx.record_event("progress", &progress.id, EventType::ProgressForceCompleted);
            tracing::info!(user = user_id, content = content_id, "plan force-completed");

            storage::update_progress_versioned(tx, &updated, progress.version)?;
            updated.version = progress.version + 1;

            Ok(CompleteOutcome {
                progress: updated,
                already_completed: false,
                reward: Some(outcome),
            })
        })
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticCatalog;
    use crate::storage::SqliteStorage;

    fn five_item_setup() -> (Engine, StaticCatalog, ContentType) {
        let engine = Engine::new(SqliteStorage::open_memory().unwrap());
        let diet = ContentType::Diet;
        let catalog = StaticCatalog::single(
            &diet,
            "week-1",
            (1..=5).map(|i| format!("meal-{i}")).collect(),
        );
        (engine, catalog, diet)
    }

    #[test]
    fn test_start_is_idempotent() {
        let (mut engine, catalog, diet) = five_item_setup();

        let first = engine
            .start_progress("u1", &diet, "week-1", &catalog)
            .unwrap();
        assert!(!first.already_started);
        assert_eq!(first.progress.total_item_count, 5);
        let started_at = first.progress.started_at;
        let reward = first.reward.unwrap();
        assert_eq!(reward.points_earned, 10);

        for _ in 0..3 {
            let again = engine
                .start_progress("u1", &diet, "week-1", &catalog)
                .unwrap();
            assert!(again.already_started);
            assert_eq!(again.progress.id, first.progress.id);
            assert_eq!(again.progress.started_at, started_at);
            assert!(again.reward.is_none());
        }

        // Start reward credited once despite the retries
        assert_eq!(engine.lifetime_points("u1").unwrap(), 10);
    }

    #[test]
    fn test_toggle_before_start_rejected_without_side_effects() {
        let (mut engine, _catalog, diet) = five_item_setup();

        let err = engine
            .toggle_progress_item("u1", &diet, "week-1", "meal-1")
            .unwrap_err();
        assert!(matches!(err, Error::NotStarted { .. }));

        assert!(engine.get_progress("u1", &diet, "week-1").unwrap().is_none());
        assert_eq!(engine.lifetime_points("u1").unwrap(), 0);
    }

    #[test]
    fn test_toggle_membership_and_percentage() {
        let (mut engine, catalog, diet) = five_item_setup();
        engine.start_progress("u1", &diet, "week-1", &catalog).unwrap();

        for item in ["meal-1", "meal-2", "meal-3"] {
            engine.toggle_progress_item("u1", &diet, "week-1", item).unwrap();
        }
        // Toggle one back off
        let outcome = engine
            .toggle_progress_item("u1", &diet, "week-1", "meal-2")
            .unwrap();

        assert_eq!(outcome.progress.completed_item_ids, vec!["meal-1", "meal-3"]);
        assert_eq!(outcome.progress.percent_complete(), 40);
        assert_eq!(outcome.progress.status, ProgressStatus::InProgress);
        assert!(!outcome.just_completed);
        assert!(outcome.reward.is_none());
    }

    #[test]
    fn test_unknown_item_rejected() {
        let (mut engine, catalog, diet) = five_item_setup();
        engine.start_progress("u1", &diet, "week-1", &catalog).unwrap();

        let err = engine
            .toggle_progress_item("u1", &diet, "week-1", "dessert-99")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidItem { .. }));
    }

    #[test]
    fn test_final_toggle_completes_and_rewards_once() {
        let (mut engine, catalog, diet) = five_item_setup();
        engine.start_progress("u1", &diet, "week-1", &catalog).unwrap();

        let mut last = None;
        for i in 1..=5 {
            last = Some(
                engine
                    .toggle_progress_item("u1", &diet, "week-1", &format!("meal-{i}"))
                    .unwrap(),
            );
        }

        let outcome = last.unwrap();
        assert!(outcome.just_completed);
        assert_eq!(outcome.progress.status, ProgressStatus::Completed);
        assert!(outcome.progress.reward_claimed);
        assert!(outcome.progress.completed_at.is_some());

        let reward = outcome.reward.unwrap();
        assert!(!reward.already_earned);
        assert_eq!(reward.points_earned, 50);

        // 10 start + 50 complete, exactly once each
        assert_eq!(engine.lifetime_points("u1").unwrap(), 60);
    }

    #[test]
    fn test_uncheck_after_completion_keeps_status_and_reward() {
        let (mut engine, catalog, diet) = five_item_setup();
        engine.start_progress("u1", &diet, "week-1", &catalog).unwrap();
        for i in 1..=5 {
            engine
                .toggle_progress_item("u1", &diet, "week-1", &format!("meal-{i}"))
                .unwrap();
        }

        let unchecked = engine
            .toggle_progress_item("u1", &diet, "week-1", "meal-5")
            .unwrap();
        assert_eq!(unchecked.progress.status, ProgressStatus::Completed);
        assert!(unchecked.progress.reward_claimed);
        assert_eq!(unchecked.progress.completed_item_ids.len(), 4);
        assert!(!unchecked.just_completed);
        assert!(unchecked.reward.is_none());

        // Re-checking it triggers no second completion or reward
        let rechecked = engine
            .toggle_progress_item("u1", &diet, "week-1", "meal-5")
            .unwrap();
        assert!(!rechecked.just_completed);
        assert!(rechecked.reward.is_none());
        assert_eq!(engine.lifetime_points("u1").unwrap(), 60);
    }

    #[test]
    fn test_explicit_complete_is_force_complete_and_idempotent() {
        let (mut engine, catalog, diet) = five_item_setup();
        engine.start_progress("u1", &diet, "week-1", &catalog).unwrap();
        engine
            .toggle_progress_item("u1", &diet, "week-1", "meal-1")
            .unwrap();

        let completed = engine.complete_progress("u1", &diet, "week-1").unwrap();
        assert!(!completed.already_completed);
        assert_eq!(completed.progress.status, ProgressStatus::Completed);
        assert_eq!(completed.progress.completed_item_ids.len(), 5);
        assert_eq!(completed.reward.unwrap().points_earned, 50);

        // Safe to call again after completion
        let again = engine.complete_progress("u1", &diet, "week-1").unwrap();
        assert!(again.already_completed);
        assert!(again.reward.is_none());
        assert_eq!(engine.lifetime_points("u1").unwrap(), 60);
    }

    #[test]
    fn test_complete_after_implicit_completion_is_noop() {
        let (mut engine, catalog, diet) = five_item_setup();
        engine.start_progress("u1", &diet, "week-1", &catalog).unwrap();
        for i in 1..=5 {
            engine
                .toggle_progress_item("u1", &diet, "week-1", &format!("meal-{i}"))
                .unwrap();
        }

        let explicit = engine.complete_progress("u1", &diet, "week-1").unwrap();
        assert!(explicit.already_completed);
        assert_eq!(engine.lifetime_points("u1").unwrap(), 60);
    }

    #[test]
    fn test_complete_before_start_rejected() {
        let (mut engine, _catalog, diet) = five_item_setup();
        let err = engine.complete_progress("u1", &diet, "week-1").unwrap_err();
        assert!(matches!(err, Error::NotStarted { .. }));
    }

    #[test]
    fn test_sequential_toggles_lose_no_update() {
        // Two rapid toggles of different items on the same record: both
        // land, and the version advances once per write.
        let (mut engine, catalog, diet) = five_item_setup();
        engine.start_progress("u1", &diet, "week-1", &catalog).unwrap();

        engine.toggle_progress_item("u1", &diet, "week-1", "meal-1").unwrap();
        let second = engine
            .toggle_progress_item("u1", &diet, "week-1", "meal-2")
            .unwrap();

        assert_eq!(second.progress.completed_item_ids, vec!["meal-1", "meal-2"]);
        assert_eq!(second.progress.version, 3);
    }

    #[test]
    fn test_toggle_writes_against_out_of_band_version() {
        let (mut engine, catalog, diet) = five_item_setup();
        engine.start_progress("u1", &diet, "week-1", &catalog).unwrap();

        // A writer in another process bumps the version between our calls
        engine
            .storage()
            .conn()
            .execute("UPDATE plan_progress SET version = version + 1", [])
            .unwrap();

        // The fresh read picks up the new version and the write lands on it
        let outcome = engine
            .toggle_progress_item("u1", &diet, "week-1", "meal-1")
            .unwrap();
        assert_eq!(outcome.progress.version, 3);
        assert_eq!(outcome.progress.completed_item_ids, vec!["meal-1"]);
    }

    #[test]
    fn test_start_with_empty_items_rejected() {
        let mut engine = Engine::new(SqliteStorage::open_memory().unwrap());
        let diet = ContentType::Diet;
        let catalog = StaticCatalog::single(&diet, "week-1", vec![]);

        let err = engine
            .start_progress("u1", &diet, "week-1", &catalog)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_unknown_content_surfaces_provider_error() {
        let (mut engine, catalog, diet) = five_item_setup();
        let err = engine
            .start_progress("u1", &diet, "week-99", &catalog)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_total_item_count_fixed_at_start() {
        let (mut engine, catalog, diet) = five_item_setup();
        engine.start_progress("u1", &diet, "week-1", &catalog).unwrap();

        // Content grows later; the snapshot keeps the percentage stable
        let mut grown = StaticCatalog::new();
        grown.insert(
            &diet,
            "week-1",
            (1..=8).map(|i| format!("meal-{i}")).collect(),
        );
        let again = engine.start_progress("u1", &diet, "week-1", &grown).unwrap();
        assert!(again.already_started);
        assert_eq!(again.progress.total_item_count, 5);
    }
}
