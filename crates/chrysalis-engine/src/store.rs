//! Repository traits the engines consume. The concrete SQLite
//! implementation lives in chrysalis-db; engine tests run against an
//! in-memory double.

use chrono::{DateTime, Utc};
use chrysalis_types::models::{Achievement, Proposal, StageTransition, User, UserAchievement, Vote};
use chrysalis_types::voting::TallyResult;
use thiserror::Error;
use uuid::Uuid;

use crate::achievements::AchievementDef;

/// Persistence failure, distinct from the engine's own taxonomy so the
/// caller can apply its retry policy to storage faults alone.
#[derive(Debug, Error)]
#[error("storage failure: {0}")]
pub struct StoreError(anyhow::Error);

impl StoreError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(err.into())
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait VotingStore {
    fn find_proposal(&self, id: Uuid) -> StoreResult<Option<Proposal>>;

    fn insert_proposal(&self, proposal: &Proposal) -> StoreResult<()>;

    /// Full-row update of an editable (DRAFT) proposal.
    fn update_proposal(&self, proposal: &Proposal) -> StoreResult<()>;

    /// Conditional DRAFT -> ACTIVE transition. Returns false when the
    /// proposal was no longer in DRAFT, so a racing second start loses.
    fn set_voting_active(&self, id: Uuid, started_at: DateTime<Utc>) -> StoreResult<bool>;

    /// Conditional ACTIVE -> CLOSED transition writing the permanent
    /// result. Returns false when the proposal was no longer ACTIVE;
    /// the losing close must not overwrite the recorded tally.
    fn set_voting_closed(
        &self,
        id: Uuid,
        closed_at: DateTime<Utc>,
        result: &TallyResult,
    ) -> StoreResult<bool>;

    fn find_votes_for_proposal(&self, proposal_id: Uuid) -> StoreResult<Vec<Vote>>;

    /// Keyed by (proposal, user); last write wins, no vote history.
    fn upsert_vote(&self, vote: &Vote) -> StoreResult<()>;
}

pub trait ProgressionStore {
    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    fn latest_stage_transition(&self, user_id: Uuid) -> StoreResult<Option<StageTransition>>;

    /// Newest first.
    fn stage_history(&self, user_id: Uuid) -> StoreResult<Vec<StageTransition>>;

    /// Appends the transition record AND updates the user's
    /// current_stage/stage_updated_at in a single transaction.
    fn record_stage_transition(&self, transition: &StageTransition) -> StoreResult<()>;

    fn count_meadow_participations(&self, user_id: Uuid) -> StoreResult<u32>;

    fn count_participations_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StoreResult<u32>;

    fn count_hosted_meadows(&self, user_id: Uuid) -> StoreResult<u32>;

    fn count_hosted_completed_meadows(&self, user_id: Uuid) -> StoreResult<u32>;

    /// Idempotent get-or-create of the achievement definition row.
    fn ensure_achievement(&self, def: &AchievementDef) -> StoreResult<Achievement>;

    fn find_user_achievement(
        &self,
        user_id: Uuid,
        achievement_id: Uuid,
    ) -> StoreResult<Option<UserAchievement>>;

    fn upsert_user_achievement(&self, record: &UserAchievement) -> StoreResult<()>;
}
