//! Engine repository traits implemented over the SQLite `Database`.
//! Storage faults surface as `StoreError` so the engines can keep them
//! distinct from their own taxonomy.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use chrysalis_engine::achievements::AchievementDef;
use chrysalis_engine::store::{ProgressionStore, StoreError, StoreResult, VotingStore};
use chrysalis_types::models::{
    Achievement, Proposal, StageTransition, User, UserAchievement, Vote,
};
use chrysalis_types::voting::TallyResult;

use crate::Database;

impl VotingStore for Database {
    fn find_proposal(&self, id: Uuid) -> StoreResult<Option<Proposal>> {
        Ok(self.get_proposal(&id.to_string())?)
    }

    fn insert_proposal(&self, proposal: &Proposal) -> StoreResult<()> {
        Ok(Database::insert_proposal(self, proposal)?)
    }

    fn update_proposal(&self, proposal: &Proposal) -> StoreResult<()> {
        Ok(Database::update_proposal(self, proposal)?)
    }

    fn set_voting_active(&self, id: Uuid, started_at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(Database::set_voting_active(self, &id.to_string(), started_at)?)
    }

    fn set_voting_closed(
        &self,
        id: Uuid,
        closed_at: DateTime<Utc>,
        result: &TallyResult,
    ) -> StoreResult<bool> {
        let result_json = serde_json::to_string(result).map_err(StoreError::new)?;
        Ok(Database::set_voting_closed(
            self,
            &id.to_string(),
            closed_at,
            &result_json,
        )?)
    }

    fn find_votes_for_proposal(&self, proposal_id: Uuid) -> StoreResult<Vec<Vote>> {
        Ok(self.get_votes_for_proposal(&proposal_id.to_string())?)
    }

    fn upsert_vote(&self, vote: &Vote) -> StoreResult<()> {
        Ok(Database::upsert_vote(self, vote)?)
    }
}

impl ProgressionStore for Database {
    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.get_user(&id.to_string())?)
    }

    fn latest_stage_transition(&self, user_id: Uuid) -> StoreResult<Option<StageTransition>> {
        Ok(Database::latest_stage_transition(self, &user_id.to_string())?)
    }

    fn stage_history(&self, user_id: Uuid) -> StoreResult<Vec<StageTransition>> {
        Ok(Database::stage_history(self, &user_id.to_string())?)
    }

    fn record_stage_transition(&self, transition: &StageTransition) -> StoreResult<()> {
        Ok(Database::record_stage_transition(self, transition)?)
    }

    fn count_meadow_participations(&self, user_id: Uuid) -> StoreResult<u32> {
        Ok(Database::count_meadow_participations(
            self,
            &user_id.to_string(),
        )?)
    }

    fn count_participations_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StoreResult<u32> {
        Ok(Database::count_participations_since(
            self,
            &user_id.to_string(),
            since,
        )?)
    }

    fn count_hosted_meadows(&self, user_id: Uuid) -> StoreResult<u32> {
        Ok(Database::count_hosted_meadows(self, &user_id.to_string())?)
    }

    fn count_hosted_completed_meadows(&self, user_id: Uuid) -> StoreResult<u32> {
        Ok(Database::count_hosted_completed_meadows(
            self,
            &user_id.to_string(),
        )?)
    }

    fn ensure_achievement(&self, def: &AchievementDef) -> StoreResult<Achievement> {
        Ok(Database::ensure_achievement(
            self,
            &Uuid::new_v4().to_string(),
            def.code,
            def.achievement_type.as_str(),
            def.title,
            def.description,
        )?)
    }

    fn find_user_achievement(
        &self,
        user_id: Uuid,
        achievement_id: Uuid,
    ) -> StoreResult<Option<UserAchievement>> {
        Ok(self.get_user_achievement(&user_id.to_string(), &achievement_id.to_string())?)
    }

    fn upsert_user_achievement(&self, record: &UserAchievement) -> StoreResult<()> {
        Ok(Database::upsert_user_achievement(self, record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrysalis_engine::{stage, voting};
    use chrysalis_types::api::CreateProposalRequest;
    use chrysalis_types::models::{LifeStage, Meadow, MeadowStatus, MeadowType, VoteType};
    use chrysalis_types::voting::{ProposalContent, VoteChoice};

    fn now() -> DateTime<Utc> {
        "2025-06-01T12:00:00Z".parse().unwrap()
    }

    fn seed_user(db: &Database, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(&id.to_string(), username, "hash", username, now())
            .unwrap();
        id
    }

    fn seed_meadow(db: &Database, host: Uuid, status: MeadowStatus) -> Uuid {
        let meadow = Meadow {
            id: Uuid::new_v4(),
            name: "Morning circle".into(),
            description: "weekly gathering".into(),
            meadow_type: MeadowType::Gathering,
            status,
            host_id: host,
            scheduled_at: now(),
            location: None,
            created_at: now(),
        };
        db.create_meadow(&meadow).unwrap();
        meadow.id
    }

    #[test]
    fn voting_round_trips_through_sqlite() {
        let db = Database::open_in_memory().unwrap();
        let author = seed_user(&db, "author");
        let voter = seed_user(&db, "voter");

        let proposal = voting::create_proposal(
            &db,
            CreateProposalRequest {
                title: "Shared tool shed".into(),
                description: "Buy tools together".into(),
                content: ProposalContent::default(),
                vote_type: VoteType::Simple,
                end_date: None,
                quorum: None,
                threshold: None,
            },
            author,
            now(),
        )
        .unwrap();

        voting::start_voting(&db, proposal.id, author, now()).unwrap();
        voting::cast_vote(
            &db,
            proposal.id,
            voter,
            VoteChoice::Simple { vote: true },
            now(),
        )
        .unwrap();
        // Re-cast overwrites the stored row.
        voting::cast_vote(
            &db,
            proposal.id,
            voter,
            VoteChoice::Simple { vote: false },
            now(),
        )
        .unwrap();
        assert_eq!(db.count_votes(&proposal.id.to_string()).unwrap(), 1);

        let closed = voting::close_voting(&db, proposal.id, author, now()).unwrap();
        assert!(closed.result.is_some());

        // The conditional close makes a second close lose cleanly.
        assert!(matches!(
            voting::close_voting(&db, proposal.id, author, now()),
            Err(chrysalis_engine::EngineError::InvalidState(_))
        ));

        let stored = db.get_proposal(&proposal.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.result, closed.result);
    }

    #[test]
    fn stage_transition_commits_history_and_user_together() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "caterpillar");
        let host = seed_user(&db, "host");

        // One participation makes the user eligible for EGG.
        let meadow = seed_meadow(&db, host, MeadowStatus::Completed);
        db.join_meadow(&meadow.to_string(), &user.to_string(), now())
            .unwrap();

        stage::transition_stage(&db, user, LifeStage::Egg, Some("first meadow".into()), now())
            .unwrap();

        let stored = db.get_user(&user.to_string()).unwrap().unwrap();
        assert_eq!(stored.current_stage, LifeStage::Egg);
        let history = db.stage_history(&user.to_string()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_stage, LifeStage::Flower);
        assert_eq!(history[0].to_stage, LifeStage::Egg);
    }

    #[test]
    fn hosted_counts_distinguish_completed_meadows() {
        let db = Database::open_in_memory().unwrap();
        let host = seed_user(&db, "organizer");
        seed_meadow(&db, host, MeadowStatus::Planned);
        seed_meadow(&db, host, MeadowStatus::Completed);

        assert_eq!(db.count_hosted_meadows(&host.to_string()).unwrap(), 2);
        assert_eq!(
            db.count_hosted_completed_meadows(&host.to_string()).unwrap(),
            1
        );
        // Hosting enrolls the host as participant too.
        assert_eq!(
            db.count_meadow_participations(&host.to_string()).unwrap(),
            2
        );
    }

    #[test]
    fn ensure_achievement_is_idempotent_by_code() {
        let db = Database::open_in_memory().unwrap();
        let def = chrysalis_engine::achievements::Trigger::FirstMeadowVisit.definition();

        let first = ProgressionStore::ensure_achievement(&db, def).unwrap();
        let second = ProgressionStore::ensure_achievement(&db, def).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.code, "FIRST_MEADOW_VISIT");
    }

    #[test]
    fn mark_achievement_seen_requires_an_earned_row() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "seer");
        let def = chrysalis_engine::achievements::Trigger::FirstMeadowVisit.definition();
        let achievement = ProgressionStore::ensure_achievement(&db, def).unwrap();

        db.upsert_user_achievement(&UserAchievement {
            user_id: user,
            achievement_id: achievement.id,
            progress: 40,
            earned_at: None,
            seen_at: None,
            updated_at: now(),
        })
        .unwrap();

        // Not earned yet: nothing to acknowledge.
        assert!(
            !db.mark_achievement_seen(&user.to_string(), &achievement.id.to_string(), now())
                .unwrap()
        );

        db.upsert_user_achievement(&UserAchievement {
            user_id: user,
            achievement_id: achievement.id,
            progress: 100,
            earned_at: Some(now()),
            seen_at: None,
            updated_at: now(),
        })
        .unwrap();

        assert!(
            db.mark_achievement_seen(&user.to_string(), &achievement.id.to_string(), now())
                .unwrap()
        );
        // Flips only once.
        assert!(
            !db.mark_achievement_seen(&user.to_string(), &achievement.id.to_string(), now())
                .unwrap()
        );
    }

    #[test]
    fn leave_meadow_never_removes_the_host() {
        let db = Database::open_in_memory().unwrap();
        let host = seed_user(&db, "host");
        let guest = seed_user(&db, "guest");
        let meadow = seed_meadow(&db, host, MeadowStatus::Planned);

        db.join_meadow(&meadow.to_string(), &guest.to_string(), now())
            .unwrap();
        assert!(
            db.leave_meadow(&meadow.to_string(), &guest.to_string())
                .unwrap()
        );
        assert!(
            !db.leave_meadow(&meadow.to_string(), &host.to_string())
                .unwrap()
        );
    }
}
