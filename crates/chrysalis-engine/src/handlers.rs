//! Static dispatch from domain events to the achievement triggers they
//! can move. This is a fixed table, not an event bus.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::achievements::{Trigger, TriggerOutcome, check_and_award};
use crate::store::ProgressionStore;

pub const MEADOW_PARTICIPATION_TRIGGERS: &[Trigger] = &[
    Trigger::FirstMeadowVisit,
    Trigger::MeadowRegular,
    Trigger::ActiveQuarter,
];

pub const MEADOW_HOSTING_TRIGGERS: &[Trigger] =
    &[Trigger::FirstInitiative, Trigger::CommunityBuilder];

pub const STAGE_TRANSITION_TRIGGERS: &[Trigger] =
    &[Trigger::MetamorphosisBegin, Trigger::FullButterfly];

pub const PERIODIC_CHECK_TRIGGERS: &[Trigger] = &[Trigger::ActiveQuarter];

pub fn handle_meadow_participation<S: ProgressionStore>(
    store: &S,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<TriggerOutcome> {
    check_and_award(store, user_id, MEADOW_PARTICIPATION_TRIGGERS, now)
}

pub fn handle_meadow_hosting<S: ProgressionStore>(
    store: &S,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<TriggerOutcome> {
    check_and_award(store, user_id, MEADOW_HOSTING_TRIGGERS, now)
}

pub fn handle_stage_transition<S: ProgressionStore>(
    store: &S,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<TriggerOutcome> {
    check_and_award(store, user_id, STAGE_TRANSITION_TRIGGERS, now)
}

pub fn handle_periodic_check<S: ProgressionStore>(
    store: &S,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<TriggerOutcome> {
    check_and_award(store, user_id, PERIODIC_CHECK_TRIGGERS, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::MemStore;
    use chrysalis_types::models::LifeStage;

    fn now() -> DateTime<Utc> {
        "2025-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn participation_handler_checks_its_fixed_trigger_set() {
        let store = MemStore::new();
        let user = store.seed_user(LifeStage::Flower, now());
        store.set_participations(user, 1);
        store.set_recent_participations(user, 1);

        let outcomes = handle_meadow_participation(&store, user, now());
        let triggers: Vec<Trigger> = outcomes.iter().map(|o| o.trigger).collect();
        assert_eq!(
            triggers,
            vec![
                Trigger::FirstMeadowVisit,
                Trigger::MeadowRegular,
                Trigger::ActiveQuarter
            ]
        );
    }

    #[test]
    fn hosting_handler_awards_first_initiative() {
        let store = MemStore::new();
        let user = store.seed_user(LifeStage::Egg, now());
        store.set_hosted(user, 1);

        let outcomes = handle_meadow_hosting(&store, user, now());
        let first = outcomes[0].result.as_ref().unwrap();
        assert_eq!(first.progress.progress, 100);
        assert_eq!(
            first.newly_earned.as_ref().map(|a| a.code.as_str()),
            Some("FIRST_INITIATIVE")
        );
    }

    #[test]
    fn periodic_check_only_reruns_time_based_triggers() {
        let store = MemStore::new();
        let user = store.seed_user(LifeStage::Egg, now());
        let outcomes = handle_periodic_check(&store, user, now());
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].trigger, Trigger::ActiveQuarter);
    }
}
