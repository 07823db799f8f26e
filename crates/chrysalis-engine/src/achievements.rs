//! Achievement trigger registry and the award path. Each trigger is a
//! pure function of stored counts/timestamps; awarding is two explicit
//! steps (ensure the definition row, then upsert progress) so progress
//! tracking never hides definition creation.

use chrono::{DateTime, Duration, Utc};
use chrysalis_types::models::{Achievement, AchievementType, LifeStage, UserAchievement};
use chrysalis_types::progression::TriggerProgress;
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::ProgressionStore;

/// Static achievement definition; materialized in storage on first
/// award.
#[derive(Debug, Clone, Copy)]
pub struct AchievementDef {
    pub code: &'static str,
    pub achievement_type: AchievementType,
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    FirstMeadowVisit,
    MeadowRegular,
    FirstInitiative,
    CommunityBuilder,
    MetamorphosisBegin,
    FullButterfly,
    ActiveQuarter,
}

impl Trigger {
    pub const ALL: [Trigger; 7] = [
        Trigger::FirstMeadowVisit,
        Trigger::MeadowRegular,
        Trigger::FirstInitiative,
        Trigger::CommunityBuilder,
        Trigger::MetamorphosisBegin,
        Trigger::FullButterfly,
        Trigger::ActiveQuarter,
    ];

    pub fn code(self) -> &'static str {
        self.definition().code
    }

    pub fn definition(self) -> &'static AchievementDef {
        const FIRST_MEADOW_VISIT: AchievementDef = AchievementDef {
            code: "FIRST_MEADOW_VISIT",
            achievement_type: AchievementType::Participation,
            title: "First Steps",
            description: "Attended your first meadow gathering",
        };
        const MEADOW_REGULAR: AchievementDef = AchievementDef {
            code: "MEADOW_REGULAR",
            achievement_type: AchievementType::Participation,
            title: "Regular Participant",
            description: "Attended 10 meadow gatherings",
        };
        const FIRST_INITIATIVE: AchievementDef = AchievementDef {
            code: "FIRST_INITIATIVE",
            achievement_type: AchievementType::Contribution,
            title: "Initiative Taker",
            description: "Started your first community gathering",
        };
        const COMMUNITY_BUILDER: AchievementDef = AchievementDef {
            code: "COMMUNITY_BUILDER",
            achievement_type: AchievementType::Contribution,
            title: "Community Builder",
            description: "Successfully hosted 5 meadow gatherings",
        };
        const METAMORPHOSIS_BEGIN: AchievementDef = AchievementDef {
            code: "METAMORPHOSIS_BEGIN",
            achievement_type: AchievementType::Stage,
            title: "Beginning of Change",
            description: "Started your transformation journey",
        };
        const FULL_BUTTERFLY: AchievementDef = AchievementDef {
            code: "FULL_BUTTERFLY",
            achievement_type: AchievementType::Stage,
            title: "Full Transformation",
            description: "Completed your journey to become a butterfly",
        };
        const ACTIVE_QUARTER: AchievementDef = AchievementDef {
            code: "ACTIVE_QUARTER",
            achievement_type: AchievementType::Milestone,
            title: "Active Quarter",
            description: "Maintained regular participation for 3 months",
        };

        match self {
            Self::FirstMeadowVisit => &FIRST_MEADOW_VISIT,
            Self::MeadowRegular => &MEADOW_REGULAR,
            Self::FirstInitiative => &FIRST_INITIATIVE,
            Self::CommunityBuilder => &COMMUNITY_BUILDER,
            Self::MetamorphosisBegin => &METAMORPHOSIS_BEGIN,
            Self::FullButterfly => &FULL_BUTTERFLY,
            Self::ActiveQuarter => &ACTIVE_QUARTER,
        }
    }

    fn evaluate<S: ProgressionStore>(
        self,
        store: &S,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TriggerProgress, EngineError> {
        match self {
            Self::FirstMeadowVisit => {
                let count = store.count_meadow_participations(user_id)?;
                Ok(TriggerProgress::threshold(count, 1))
            }
            Self::MeadowRegular => {
                let count = store.count_meadow_participations(user_id)?;
                Ok(TriggerProgress::scaled(count, 10))
            }
            Self::FirstInitiative => {
                let count = store.count_hosted_meadows(user_id)?;
                Ok(TriggerProgress::threshold(count, 1))
            }
            Self::CommunityBuilder => {
                let count = store.count_hosted_completed_meadows(user_id)?;
                Ok(TriggerProgress::scaled(count, 5))
            }
            Self::MetamorphosisBegin => {
                let user = store
                    .find_user(user_id)?
                    .ok_or(EngineError::NotFound("user"))?;
                let begun = u32::from(user.current_stage >= LifeStage::Egg);
                Ok(TriggerProgress::threshold(begun, 1))
            }
            Self::FullButterfly => {
                let user = store
                    .find_user(user_id)?
                    .ok_or(EngineError::NotFound("user"))?;
                let arrived = u32::from(user.current_stage == LifeStage::Butterfly);
                Ok(TriggerProgress::threshold(arrived, 1))
            }
            Self::ActiveQuarter => {
                // At least 6 participations over the trailing 3 months.
                let since = now - Duration::days(90);
                let count = store.count_participations_since(user_id, since)?;
                Ok(TriggerProgress::scaled(count, 6))
            }
        }
    }
}

/// Outcome of one trigger check within a batch.
#[derive(Debug)]
pub struct TriggerOutcome {
    pub trigger: Trigger,
    pub result: Result<TriggerCheck, EngineError>,
}

#[derive(Debug, Clone)]
pub struct TriggerCheck {
    pub progress: TriggerProgress,
    /// Set when this check moved the achievement to earned for the
    /// first time; callers use it to notify the user.
    pub newly_earned: Option<Achievement>,
}

/// Run every trigger in the batch; one failing trigger never blocks the
/// others, each outcome is reported individually.
pub fn check_and_award<S: ProgressionStore>(
    store: &S,
    user_id: Uuid,
    triggers: &[Trigger],
    now: DateTime<Utc>,
) -> Vec<TriggerOutcome> {
    triggers
        .iter()
        .map(|&trigger| TriggerOutcome {
            trigger,
            result: check_one(store, user_id, trigger, now),
        })
        .collect()
}

fn check_one<S: ProgressionStore>(
    store: &S,
    user_id: Uuid,
    trigger: Trigger,
    now: DateTime<Utc>,
) -> Result<TriggerCheck, EngineError> {
    let progress = trigger.evaluate(store, user_id, now)?;
    let newly_earned = if progress.progress > 0 {
        record_progress(store, user_id, trigger, progress, now)?
    } else {
        None
    };
    Ok(TriggerCheck {
        progress,
        newly_earned,
    })
}

fn record_progress<S: ProgressionStore>(
    store: &S,
    user_id: Uuid,
    trigger: Trigger,
    progress: TriggerProgress,
    now: DateTime<Utc>,
) -> Result<Option<Achievement>, EngineError> {
    let achievement = store.ensure_achievement(trigger.definition())?;
    let existing = store.find_user_achievement(user_id, achievement.id)?;

    // Recorded progress never moves backwards, and earned_at is set
    // exactly once, when progress first reaches 100.
    let prior = existing.as_ref().map_or(0, |ua| ua.progress);
    let merged = progress.progress.max(prior);
    let already_earned = existing.as_ref().and_then(|ua| ua.earned_at);
    let earned_at = match already_earned {
        Some(at) => Some(at),
        None if merged >= 100 => Some(now),
        None => None,
    };
    let newly_earned = already_earned.is_none() && earned_at.is_some();

    store.upsert_user_achievement(&UserAchievement {
        user_id,
        achievement_id: achievement.id,
        progress: merged,
        earned_at,
        seen_at: existing.as_ref().and_then(|ua| ua.seen_at),
        updated_at: now,
    })?;

    Ok(newly_earned.then_some(achievement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::MemStore;

    fn now() -> DateTime<Utc> {
        "2025-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn earned_at_is_set_exactly_once() {
        let store = MemStore::new();
        let user = store.seed_user(LifeStage::Flower, now());
        store.set_participations(user, 1);

        let first = check_and_award(&store, user, &[Trigger::FirstMeadowVisit], now());
        let check = first[0].result.as_ref().unwrap();
        assert_eq!(check.progress.progress, 100);
        let earned = check.newly_earned.as_ref().expect("first award");
        assert_eq!(earned.code, "FIRST_MEADOW_VISIT");

        let recorded = store
            .find_user_achievement(user, earned.id)
            .unwrap()
            .unwrap();
        let first_earned_at = recorded.earned_at.expect("earned");

        // Re-check later: progress stays 100, earned_at untouched.
        let later = now() + Duration::days(3);
        let second = check_and_award(&store, user, &[Trigger::FirstMeadowVisit], later);
        let check = second[0].result.as_ref().unwrap();
        assert!(check.newly_earned.is_none());

        let recorded = store
            .find_user_achievement(user, earned.id)
            .unwrap()
            .unwrap();
        assert_eq!(recorded.earned_at, Some(first_earned_at));
        assert_eq!(recorded.progress, 100);
    }

    #[test]
    fn progress_accumulates_and_never_regresses() {
        let store = MemStore::new();
        let user = store.seed_user(LifeStage::Flower, now());

        store.set_participations(user, 5);
        check_and_award(&store, user, &[Trigger::MeadowRegular], now());
        let achievement = store
            .achievement_by_code("MEADOW_REGULAR")
            .expect("definition created");
        let recorded = store
            .find_user_achievement(user, achievement.id)
            .unwrap()
            .unwrap();
        assert_eq!(recorded.progress, 50);

        // A stale re-check with a lower measured value must not lower
        // the recorded progress.
        store.set_participations(user, 3);
        check_and_award(&store, user, &[Trigger::MeadowRegular], now());
        let recorded = store
            .find_user_achievement(user, achievement.id)
            .unwrap()
            .unwrap();
        assert_eq!(recorded.progress, 50);
    }

    #[test]
    fn zero_progress_writes_nothing() {
        let store = MemStore::new();
        let user = store.seed_user(LifeStage::Flower, now());

        let outcomes = check_and_award(&store, user, &[Trigger::FirstMeadowVisit], now());
        assert_eq!(outcomes[0].result.as_ref().unwrap().progress.progress, 0);
        assert!(store.achievement_by_code("FIRST_MEADOW_VISIT").is_none());
    }

    #[test]
    fn one_failing_trigger_does_not_block_the_rest() {
        let store = MemStore::new();
        let user = store.seed_user(LifeStage::Flower, now());
        store.set_participations(user, 2);
        store.fail_participation_counts(true);

        let outcomes = check_and_award(
            &store,
            user,
            &[Trigger::FirstMeadowVisit, Trigger::MetamorphosisBegin],
            now(),
        );
        assert!(outcomes[0].result.is_err());
        // The stage trigger still ran and reported.
        let check = outcomes[1].result.as_ref().unwrap();
        assert_eq!(check.progress.progress, 0);
    }

    #[test]
    fn stage_triggers_follow_current_stage() {
        let store = MemStore::new();
        let user = store.seed_user(LifeStage::Larvae, now());

        let outcomes = check_and_award(
            &store,
            user,
            &[Trigger::MetamorphosisBegin, Trigger::FullButterfly],
            now(),
        );
        assert_eq!(outcomes[0].result.as_ref().unwrap().progress.progress, 100);
        assert_eq!(outcomes[1].result.as_ref().unwrap().progress.progress, 0);
    }

    #[test]
    fn active_quarter_counts_only_the_trailing_window() {
        let store = MemStore::new();
        let user = store.seed_user(LifeStage::Egg, now());
        store.set_participations(user, 20);
        store.set_recent_participations(user, 3);

        let outcomes = check_and_award(&store, user, &[Trigger::ActiveQuarter], now());
        let progress = outcomes[0].result.as_ref().unwrap().progress;
        assert_eq!(progress.current_value, 3);
        assert_eq!(progress.progress, 50);
    }

    #[test]
    fn definition_is_created_once_and_reused() {
        let store = MemStore::new();
        let user = store.seed_user(LifeStage::Flower, now());
        store.set_participations(user, 1);

        check_and_award(&store, user, &[Trigger::FirstMeadowVisit], now());
        let first = store.achievement_by_code("FIRST_MEADOW_VISIT").unwrap();

        let other = store.seed_user(LifeStage::Flower, now());
        store.set_participations(other, 1);
        check_and_award(&store, other, &[Trigger::FirstMeadowVisit], now());
        let second = store.achievement_by_code("FIRST_MEADOW_VISIT").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.achievement_count(), 1);
    }
}
