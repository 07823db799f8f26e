//! Life-stage transitions and eligibility. Stages only move forward
//! through the fixed FLOWER < EGG < LARVAE < PUPA < BUTTERFLY order.

use chrono::{DateTime, Utc};
use chrysalis_types::models::{LifeStage, StageTransition};
use chrysalis_types::progression::{RequirementKind, RequirementStatus, StageEligibility};
use tracing::warn;
use uuid::Uuid;

use crate::error::EngineError;
use crate::handlers;
use crate::store::ProgressionStore;

struct RequirementSpec {
    kind: RequirementKind,
    target: u32,
    description: &'static str,
}

/// Fixed requirement table per target stage.
fn stage_requirements(stage: LifeStage) -> &'static [RequirementSpec] {
    match stage {
        LifeStage::Flower => &[],
        LifeStage::Egg => &[RequirementSpec {
            kind: RequirementKind::Participation,
            target: 1,
            description: "Participate in your first meadow",
        }],
        LifeStage::Larvae => &[
            RequirementSpec {
                kind: RequirementKind::Participation,
                target: 3,
                description: "Participate in at least 3 meadows",
            },
            RequirementSpec {
                kind: RequirementKind::Time,
                target: 7,
                description: "Spend at least 7 days as an egg",
            },
        ],
        LifeStage::Pupa => &[
            RequirementSpec {
                kind: RequirementKind::Participation,
                target: 10,
                description: "Participate in at least 10 meadows",
            },
            RequirementSpec {
                kind: RequirementKind::Contribution,
                target: 1,
                description: "Host at least 1 completed meadow",
            },
            RequirementSpec {
                kind: RequirementKind::Time,
                target: 30,
                description: "Spend at least 30 days as a larvae",
            },
        ],
        LifeStage::Butterfly => &[
            RequirementSpec {
                kind: RequirementKind::Participation,
                target: 20,
                description: "Participate in at least 20 meadows",
            },
            RequirementSpec {
                kind: RequirementKind::Contribution,
                target: 5,
                description: "Successfully host at least 5 meadows",
            },
            RequirementSpec {
                kind: RequirementKind::Time,
                target: 60,
                description: "Spend at least 60 days as a pupa",
            },
        ],
    }
}

/// A committed transition plus the outcome of the best-effort
/// achievement re-check that followed it.
#[derive(Debug)]
pub struct StageAdvance {
    pub transition: StageTransition,
    pub achievements: Vec<crate::achievements::TriggerOutcome>,
}

/// Advance a user to `to_stage`. The transition record and the user's
/// stage update commit together; the achievement re-check afterwards is
/// best-effort and never rolls the committed transition back.
pub fn transition_stage<S: ProgressionStore>(
    store: &S,
    user_id: Uuid,
    to_stage: LifeStage,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<StageAdvance, EngineError> {
    let user = store
        .find_user(user_id)?
        .ok_or(EngineError::NotFound("user"))?;

    if to_stage.order() <= user.current_stage.order() {
        return Err(EngineError::InvalidTransition {
            from: user.current_stage,
            to: to_stage,
        });
    }

    let eligibility = check_stage_eligibility(store, user_id, to_stage, now)?;
    if !eligibility.eligible {
        return Err(EngineError::RequirementsNotMet {
            missing: eligibility.missing_requirements,
        });
    }

    let transition = StageTransition {
        id: Uuid::new_v4(),
        user_id,
        from_stage: user.current_stage,
        to_stage,
        reason,
        created_at: now,
    };
    store.record_stage_transition(&transition)?;

    let achievements = handlers::handle_stage_transition(store, user_id, now);
    for outcome in &achievements {
        if let Err(err) = &outcome.result {
            warn!(
                trigger = outcome.trigger.code(),
                user = %user_id,
                "achievement re-check failed after stage transition: {err}"
            );
        }
    }

    Ok(StageAdvance {
        transition,
        achievements,
    })
}

/// Read-only eligibility evaluation for a target stage. Identical calls
/// with no intervening state change yield identical results.
pub fn check_stage_eligibility<S: ProgressionStore>(
    store: &S,
    user_id: Uuid,
    stage: LifeStage,
    now: DateTime<Utc>,
) -> Result<StageEligibility, EngineError> {
    if store.find_user(user_id)?.is_none() {
        return Err(EngineError::NotFound("user"));
    }

    // Time in stage counts from the newest transition; a user with no
    // history has spent 0 days.
    let time_in_current_stage = store
        .latest_stage_transition(user_id)?
        .map(|t| (now - t.created_at).num_days().max(0) as u32)
        .unwrap_or(0);

    let mut requirements = Vec::new();
    for spec in stage_requirements(stage) {
        let current = match spec.kind {
            RequirementKind::Participation => store.count_meadow_participations(user_id)?,
            RequirementKind::Contribution => store.count_hosted_completed_meadows(user_id)?,
            RequirementKind::Time => time_in_current_stage,
        };
        requirements.push(RequirementStatus {
            kind: spec.kind,
            description: spec.description.to_string(),
            target: spec.target,
            current,
        });
    }

    let missing_requirements: Vec<RequirementStatus> = requirements
        .iter()
        .filter(|r| !r.met())
        .cloned()
        .collect();

    Ok(StageEligibility {
        stage,
        eligible: missing_requirements.is_empty(),
        requirements,
        missing_requirements,
        time_in_current_stage,
    })
}

/// Newest-first transition history.
pub fn stage_history<S: ProgressionStore>(
    store: &S,
    user_id: Uuid,
) -> Result<Vec<StageTransition>, EngineError> {
    if store.find_user(user_id)?.is_none() {
        return Err(EngineError::NotFound("user"));
    }
    Ok(store.stage_history(user_id)?)
}
