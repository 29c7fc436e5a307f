//! Event dispatcher: the single entry point for gamification events.
//!
//! Dispatch derives a deterministic event key, then attempts one
//! conditional insert into the reward ledger. A key conflict is a
//! correct, expected outcome (`already_earned`), not an error — the
//! dispatcher is safe to call redundantly, and exactly-once crediting
//! falls out of the ledger's uniqueness constraint rather than any
//! locking in this module.

use crate::engine::policy::RewardPolicy;
use crate::engine::streak;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::model::{ActionType, ContentType, DispatchOutcome, KeyScope, LedgerEntry};
use crate::storage::events::EventType;
use crate::storage::{self, MutationContext};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use sha2::{Digest, Sha256};

/// Derive the idempotency key for one gamification event.
///
/// Pure function, no side effects. One-shot actions key on the content
/// ref; daily actions key on the UTC day bucket. Every field in the
/// versioned canonical string is length-prefixed, so opaque ids that
/// happen to contain the delimiter cannot shift a field boundary and
/// collide with a different event.
#[must_use]
pub fn event_key(
    user_id: &str,
    action: ActionType,
    content: Option<(&ContentType, &str)>,
    day_bucket: &str,
) -> String {
    use std::fmt::Write as _;

    let fields: Vec<&str> = match (action.key_scope(), content) {
        (KeyScope::PerContent, Some((content_type, content_id))) => {
            vec![user_id, action.as_str(), content_type.as_str(), content_id]
        }
        (KeyScope::PerContent, None) | (KeyScope::PerDay, _) => {
            vec![user_id, action.as_str(), day_bucket]
        }
    };

    let mut canonical = String::from("v1");
    for field in fields {
        // Writing to a String cannot fail
        let _ = write!(canonical, "|{}:{field}", field.len());
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Dispatch a gamification event inside an open transaction.
///
/// Reads pre-dispatch aggregates, performs the conditional ledger
/// insert, and reports milestones by comparing pre and post aggregates
/// within this same call — which is what keeps a crossing from being
/// re-reported by later dispatches.
pub(crate) fn dispatch_in_tx(
    conn: &Connection,
    ctx: &mut MutationContext,
    policy: &RewardPolicy,
    user_id: &str,
    action: ActionType,
    content: Option<(&ContentType, &str)>,
    now: DateTime<Utc>,
) -> Result<DispatchOutcome> {
    if action.key_scope() == KeyScope::PerContent && content.is_none() {
        return Err(Error::InvalidArgument(format!(
            "action {} requires a content ref",
            action.as_str()
        )));
    }

    let bucket = streak::day_bucket(now);
    let key = event_key(user_id, action, content, &bucket);

    let pre_points = storage::lifetime_points(conn, user_id)?;
    let pre_streak = streak::summarize(
        &storage::streak_day_buckets(conn, user_id)?,
        now.date_naive(),
    );

    let (content_type, content_id) = match (action.key_scope(), content) {
        (KeyScope::PerContent, Some((t, id))) => {
            (Some(t.as_str().to_string()), Some(id.to_string()))
        }
        _ => (None, None),
    };

    let points = policy.points_for(action);
    let entry = LedgerEntry {
        id: 0,
        event_key: key.clone(),
        user_id: user_id.to_string(),
        action_type: action,
        content_type,
        content_id,
        day_bucket: bucket,
        points,
        created_at: now.timestamp_millis(),
    };

    if !storage::ledger_insert(conn, &entry)? {
        // Key already present: idempotent no-op, rendered as success
        ctx.record_event("reward", &key, EventType::RewardDuplicate);
        tracing::debug!(
            user = user_id,
            action = action.as_str(),
            "reward already earned"
        );
        return Ok(DispatchOutcome {
            points_earned: 0,
            already_earned: true,
            total_points: pre_points,
            streak: pre_streak,
            milestone: None,
        });
    }

    let post_points = pre_points + points;
    let post_streak = streak::summarize(
        &storage::streak_day_buckets(conn, user_id)?,
        now.date_naive(),
    );
    let milestone = streak::milestone_crossed(
        &policy.point_milestones,
        &policy.streak_milestones,
        pre_points,
        post_points,
        pre_streak.current,
        post_streak.current,
    );

    ctx.record_event("reward", &key, EventType::RewardGranted);
    tracing::info!(
        user = user_id,
        action = action.as_str(),
        points,
        "reward granted"
    );

    Ok(DispatchOutcome {
        points_earned: points,
        already_earned: false,
        total_points: post_points,
        streak: post_streak,
        milestone,
    })
}

impl Engine {
    /// Dispatch a gamification event for a user action.
    ///
    /// Credits points exactly once per event key; redundant calls
    /// return `already_earned = true` with zero points, which callers
    /// must render as positive confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure, or `InvalidArgument` when a
    /// one-shot action is dispatched without a content ref.
    pub fn dispatch_action(
        &mut self,
        user_id: &str,
        action: ActionType,
        content_type: &ContentType,
        content_id: &str,
    ) -> Result<DispatchOutcome> {
        self.dispatch_at(user_id, action, content_type, content_id, Utc::now())
    }

    pub(crate) fn dispatch_at(
        &mut self,
        user_id: &str,
        action: ActionType,
        content_type: &ContentType,
        content_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome> {
        let policy = &self.policy;
        let actor = self.actor.clone();
        self.storage
            .mutate("dispatch_action", &actor, |tx, ctx| {
                dispatch_in_tx(
                    tx,
                    ctx,
                    policy,
                    user_id,
                    action,
                    Some((content_type, content_id)),
                    now,
                )
            })
    }
}
