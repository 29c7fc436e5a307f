//! Reward policy: point values and milestone thresholds.
//!
//! Point values are business configuration, not engine logic. The
//! engine is constructed with a policy; `Default` gives the standard
//! values used by the product.

use crate::model::ActionType;
use serde::{Deserialize, Serialize};

/// Point values and milestone thresholds for reward dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardPolicy {
    /// Points for starting a plan
    pub start_points: i64,
    /// Points for completing every item of a plan
    pub complete_points: i64,
    /// Points for a daily check-in
    pub check_in_points: i64,
    /// Lifetime-point milestones, strictly increasing
    pub point_milestones: Vec<u32>,
    /// Streak-length milestones, strictly increasing
    pub streak_milestones: Vec<u32>,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            start_points: 10,
            complete_points: 50,
            check_in_points: 5,
            point_milestones: vec![100, 500, 1000, 5000],
            streak_milestones: vec![3, 7, 14, 30, 100],
        }
    }
}

impl RewardPolicy {
    /// Point value for an action.
    #[must_use]
    pub const fn points_for(&self, action: ActionType) -> i64 {
        match action {
            ActionType::PlanStarted => self.start_points,
            ActionType::PlanCompleted => self.complete_points,
            ActionType::DailyCheckIn => self.check_in_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.points_for(ActionType::PlanStarted), 10);
        assert_eq!(policy.points_for(ActionType::PlanCompleted), 50);
        assert_eq!(policy.points_for(ActionType::DailyCheckIn), 5);
    }

    #[test]
    fn test_milestones_increasing() {
        let policy = RewardPolicy::default();
        assert!(policy.point_milestones.windows(2).all(|w| w[0] < w[1]));
        assert!(policy.streak_milestones.windows(2).all(|w| w[0] < w[1]));
    }
}
