//! Streak and milestone calculation.
//!
//! Pure functions over ledger day buckets; the ledger itself is never
//! written from here. Day bucketing is UTC: a "day" is a UTC calendar
//! day regardless of the client's timezone. A streak counts consecutive
//! days ending today or yesterday — one grace day before a streak is
//! considered broken.

use crate::model::{Milestone, MilestoneKind, StreakSummary};
use chrono::NaiveDate;

/// Format a UTC timestamp as its day bucket (`YYYY-MM-DD`).
#[must_use]
pub fn day_bucket(now: chrono::DateTime<chrono::Utc>) -> String {
    now.date_naive().format("%Y-%m-%d").to_string()
}

/// Summarize a user's activity days into a streak.
///
/// `buckets` are distinct `YYYY-MM-DD` strings in any order; malformed
/// entries are ignored. `today` anchors the consecutive-day count.
#[must_use]
pub fn summarize(buckets: &[String], today: NaiveDate) -> StreakSummary {
    let mut days: Vec<NaiveDate> = buckets
        .iter()
        .filter_map(|b| NaiveDate::parse_from_str(b, "%Y-%m-%d").ok())
        .collect();
    days.sort_unstable();
    days.dedup();

    if days.is_empty() {
        return StreakSummary::default();
    }

    let last = days[days.len() - 1];

    // Longest run anywhere in the history
    let mut longest: u32 = 1;
    let mut run: u32 = 1;
    for pair in days.windows(2) {
        if pair[1] - pair[0] == chrono::Duration::days(1) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 1;
        }
    }

    // Current streak: walk backwards from the most recent day, which
    // must be today or yesterday (grace day) to count at all.
    let current = if today - last <= chrono::Duration::days(1) {
        let mut count: u32 = 1;
        for pair in days.windows(2).rev() {
            if pair[1] - pair[0] == chrono::Duration::days(1) {
                count += 1;
            } else {
                break;
            }
        }
        count
    } else {
        0
    };

    StreakSummary {
        current,
        longest,
        total_active_days: u32::try_from(days.len()).unwrap_or(u32::MAX),
        last_active_day: Some(last.format("%Y-%m-%d").to_string()),
    }
}

/// Highest threshold newly crossed between two aggregate values.
///
/// Crossing means `pre < threshold <= post`, so a dispatch that merely
/// sits above an old threshold reports nothing.
#[must_use]
pub fn crossed(thresholds: &[u32], pre: i64, post: i64) -> Option<u32> {
    thresholds
        .iter()
        .copied()
        .filter(|&t| pre < i64::from(t) && i64::from(t) <= post)
        .max()
}

/// Milestone crossed by a dispatch, comparing pre- and post-dispatch
/// aggregates. When both a points and a streak threshold cross in the
/// same call, the points milestone wins.
#[must_use]
pub fn milestone_crossed(
    point_thresholds: &[u32],
    streak_thresholds: &[u32],
    pre_points: i64,
    post_points: i64,
    pre_streak: u32,
    post_streak: u32,
) -> Option<Milestone> {
    if let Some(threshold) = crossed(point_thresholds, pre_points, post_points) {
        return Some(Milestone {
            kind: MilestoneKind::LifetimePoints,
            threshold,
        });
    }
    crossed(
        streak_thresholds,
        i64::from(pre_streak),
        i64::from(post_streak),
    )
    .map(|threshold| Milestone {
        kind: MilestoneKind::StreakLength,
        threshold,
    })
}
