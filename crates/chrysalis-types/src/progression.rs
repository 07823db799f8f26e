use serde::{Deserialize, Serialize};

use crate::models::LifeStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementKind {
    Participation,
    Contribution,
    Time,
}

/// A single stage requirement with the measured value next to the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementStatus {
    pub kind: RequirementKind,
    pub description: String,
    pub target: u32,
    pub current: u32,
}

impl RequirementStatus {
    pub fn met(&self) -> bool {
        self.current >= self.target
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEligibility {
    pub stage: LifeStage,
    pub eligible: bool,
    pub requirements: Vec<RequirementStatus>,
    pub missing_requirements: Vec<RequirementStatus>,
    /// Whole days since the most recent stage transition; 0 with no
    /// transition history.
    pub time_in_current_stage: u32,
}

/// Progress toward one achievement, as computed by its trigger check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerProgress {
    pub current_value: u32,
    pub target_value: u32,
    /// 0-100.
    pub progress: u8,
}

impl TriggerProgress {
    /// Progress scaled linearly toward the target and capped at 100.
    pub fn scaled(current: u32, target: u32) -> Self {
        let progress = if target == 0 {
            100
        } else {
            ((u64::from(current) * 100) / u64::from(target)).min(100) as u8
        };
        Self {
            current_value: current,
            target_value: target,
            progress,
        }
    }

    /// All-or-nothing progress: 100 once the target is reached, else 0.
    pub fn threshold(current: u32, target: u32) -> Self {
        Self {
            current_value: current,
            target_value: target,
            progress: if current >= target { 100 } else { 0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_progress_caps_at_100() {
        assert_eq!(TriggerProgress::scaled(0, 10).progress, 0);
        assert_eq!(TriggerProgress::scaled(5, 10).progress, 50);
        assert_eq!(TriggerProgress::scaled(10, 10).progress, 100);
        assert_eq!(TriggerProgress::scaled(25, 10).progress, 100);
    }

    #[test]
    fn threshold_progress_is_all_or_nothing() {
        assert_eq!(TriggerProgress::threshold(0, 1).progress, 0);
        assert_eq!(TriggerProgress::threshold(1, 1).progress, 100);
        assert_eq!(TriggerProgress::threshold(7, 1).progress, 100);
    }
}
