//! In-memory store double for engine tests. Counts are seeded directly
//! so tests state their preconditions instead of replaying meadow
//! history; fault flags let tests inject storage failures.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use chrysalis_types::models::{
    Achievement, LifeStage, Proposal, StageTransition, User, UserAchievement, Vote, VoteStatus,
};
use chrysalis_types::voting::TallyResult;
use uuid::Uuid;

use crate::achievements::AchievementDef;
use crate::store::{ProgressionStore, StoreError, StoreResult, VotingStore};

#[derive(Default)]
pub struct MemStore {
    proposals: RefCell<HashMap<Uuid, Proposal>>,
    votes: RefCell<HashMap<(Uuid, Uuid), Vote>>,
    users: RefCell<HashMap<Uuid, User>>,
    transitions: RefCell<Vec<StageTransition>>,
    participations: RefCell<HashMap<Uuid, u32>>,
    recent_participations: RefCell<HashMap<Uuid, u32>>,
    hosted: RefCell<HashMap<Uuid, u32>>,
    hosted_completed: RefCell<HashMap<Uuid, u32>>,
    achievements: RefCell<Vec<Achievement>>,
    user_achievements: RefCell<HashMap<(Uuid, Uuid), UserAchievement>>,
    fail_participation_counts: Cell<bool>,
    fail_user_achievement_writes: Cell<bool>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, stage: LifeStage, now: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.users.borrow_mut().insert(
            id,
            User {
                id,
                username: format!("user-{}", &id.to_string()[..8]),
                display_name: "Test User".into(),
                current_stage: stage,
                stage_updated_at: now,
                created_at: now,
            },
        );
        id
    }

    pub fn set_participations(&self, user_id: Uuid, count: u32) {
        self.participations.borrow_mut().insert(user_id, count);
    }

    pub fn set_recent_participations(&self, user_id: Uuid, count: u32) {
        self.recent_participations
            .borrow_mut()
            .insert(user_id, count);
    }

    pub fn set_hosted(&self, user_id: Uuid, count: u32) {
        self.hosted.borrow_mut().insert(user_id, count);
    }

    pub fn set_hosted_completed(&self, user_id: Uuid, count: u32) {
        self.hosted_completed.borrow_mut().insert(user_id, count);
    }

    pub fn push_transition(
        &self,
        user_id: Uuid,
        from_stage: LifeStage,
        to_stage: LifeStage,
        at: DateTime<Utc>,
    ) {
        self.transitions.borrow_mut().push(StageTransition {
            id: Uuid::new_v4(),
            user_id,
            from_stage,
            to_stage,
            reason: None,
            created_at: at,
        });
    }

    pub fn achievement_by_code(&self, code: &str) -> Option<Achievement> {
        self.achievements
            .borrow()
            .iter()
            .find(|a| a.code == code)
            .cloned()
    }

    pub fn achievement_count(&self) -> usize {
        self.achievements.borrow().len()
    }

    pub fn fail_participation_counts(&self, fail: bool) {
        self.fail_participation_counts.set(fail);
    }

    pub fn fail_user_achievement_writes(&self, fail: bool) {
        self.fail_user_achievement_writes.set(fail);
    }
}

impl VotingStore for MemStore {
    fn find_proposal(&self, id: Uuid) -> StoreResult<Option<Proposal>> {
        Ok(self.proposals.borrow().get(&id).cloned())
    }

    fn insert_proposal(&self, proposal: &Proposal) -> StoreResult<()> {
        self.proposals
            .borrow_mut()
            .insert(proposal.id, proposal.clone());
        Ok(())
    }

    fn update_proposal(&self, proposal: &Proposal) -> StoreResult<()> {
        self.proposals
            .borrow_mut()
            .insert(proposal.id, proposal.clone());
        Ok(())
    }

    fn set_voting_active(&self, id: Uuid, started_at: DateTime<Utc>) -> StoreResult<bool> {
        let mut proposals = self.proposals.borrow_mut();
        match proposals.get_mut(&id) {
            Some(p) if p.vote_status == VoteStatus::Draft => {
                p.vote_status = VoteStatus::Active;
                p.start_date = Some(started_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_voting_closed(
        &self,
        id: Uuid,
        closed_at: DateTime<Utc>,
        result: &TallyResult,
    ) -> StoreResult<bool> {
        let mut proposals = self.proposals.borrow_mut();
        match proposals.get_mut(&id) {
            Some(p) if p.vote_status == VoteStatus::Active => {
                p.vote_status = VoteStatus::Closed;
                p.closed_at = Some(closed_at);
                p.result = Some(result.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn find_votes_for_proposal(&self, proposal_id: Uuid) -> StoreResult<Vec<Vote>> {
        Ok(self
            .votes
            .borrow()
            .values()
            .filter(|v| v.proposal_id == proposal_id)
            .cloned()
            .collect())
    }

    fn upsert_vote(&self, vote: &Vote) -> StoreResult<()> {
        self.votes
            .borrow_mut()
            .insert((vote.proposal_id, vote.user_id), vote.clone());
        Ok(())
    }
}

impl ProgressionStore for MemStore {
    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.borrow().get(&id).cloned())
    }

    fn latest_stage_transition(&self, user_id: Uuid) -> StoreResult<Option<StageTransition>> {
        Ok(self
            .transitions
            .borrow()
            .iter()
            .filter(|t| t.user_id == user_id)
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    fn stage_history(&self, user_id: Uuid) -> StoreResult<Vec<StageTransition>> {
        let mut history: Vec<StageTransition> = self
            .transitions
            .borrow()
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }

    fn record_stage_transition(&self, transition: &StageTransition) -> StoreResult<()> {
        // Mirrors the real store's transaction: history row and user
        // stage move together.
        let mut users = self.users.borrow_mut();
        let user = users
            .get_mut(&transition.user_id)
            .ok_or_else(|| StoreError::new(anyhow!("user vanished mid-transition")))?;
        self.transitions.borrow_mut().push(transition.clone());
        user.current_stage = transition.to_stage;
        user.stage_updated_at = transition.created_at;
        Ok(())
    }

    fn count_meadow_participations(&self, user_id: Uuid) -> StoreResult<u32> {
        if self.fail_participation_counts.get() {
            return Err(StoreError::new(anyhow!("participation count unavailable")));
        }
        Ok(*self.participations.borrow().get(&user_id).unwrap_or(&0))
    }

    fn count_participations_since(
        &self,
        user_id: Uuid,
        _since: DateTime<Utc>,
    ) -> StoreResult<u32> {
        if self.fail_participation_counts.get() {
            return Err(StoreError::new(anyhow!("participation count unavailable")));
        }
        Ok(*self
            .recent_participations
            .borrow()
            .get(&user_id)
            .unwrap_or(&0))
    }

    fn count_hosted_meadows(&self, user_id: Uuid) -> StoreResult<u32> {
        Ok(*self.hosted.borrow().get(&user_id).unwrap_or(&0))
    }

    fn count_hosted_completed_meadows(&self, user_id: Uuid) -> StoreResult<u32> {
        Ok(*self.hosted_completed.borrow().get(&user_id).unwrap_or(&0))
    }

    fn ensure_achievement(&self, def: &AchievementDef) -> StoreResult<Achievement> {
        if let Some(existing) = self.achievement_by_code(def.code) {
            return Ok(existing);
        }
        let achievement = Achievement {
            id: Uuid::new_v4(),
            code: def.code.to_string(),
            achievement_type: def.achievement_type,
            title: def.title.to_string(),
            description: def.description.to_string(),
        };
        self.achievements.borrow_mut().push(achievement.clone());
        Ok(achievement)
    }

    fn find_user_achievement(
        &self,
        user_id: Uuid,
        achievement_id: Uuid,
    ) -> StoreResult<Option<UserAchievement>> {
        Ok(self
            .user_achievements
            .borrow()
            .get(&(user_id, achievement_id))
            .cloned())
    }

    fn upsert_user_achievement(&self, record: &UserAchievement) -> StoreResult<()> {
        if self.fail_user_achievement_writes.get() {
            return Err(StoreError::new(anyhow!("achievement write unavailable")));
        }
        self.user_achievements
            .borrow_mut()
            .insert((record.user_id, record.achievement_id), record.clone());
        Ok(())
    }
}
