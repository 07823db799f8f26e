//! Proposal lifecycle and vote casting. Public functions take the
//! store and an explicit `now`; callers pass `Utc::now()`.

use chrono::{DateTime, Utc};
use chrysalis_types::api::{CreateProposalRequest, UpdateProposalRequest};
use chrysalis_types::models::{Proposal, Vote, VoteStatus, VoteType};
use chrysalis_types::voting::VoteChoice;
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::VotingStore;
use crate::tally;

pub fn create_proposal<S: VotingStore>(
    store: &S,
    input: CreateProposalRequest,
    author_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Proposal, EngineError> {
    let proposal = Proposal {
        id: Uuid::new_v4(),
        title: input.title,
        description: input.description,
        content: input.content,
        vote_type: input.vote_type,
        vote_status: VoteStatus::Draft,
        start_date: None,
        end_date: input.end_date,
        quorum: input.quorum,
        threshold: input.threshold,
        result: None,
        author_id,
        created_at: now,
        closed_at: None,
    };
    store.insert_proposal(&proposal)?;
    Ok(proposal)
}

pub fn update_proposal<S: VotingStore>(
    store: &S,
    id: Uuid,
    patch: UpdateProposalRequest,
    user_id: Uuid,
) -> Result<Proposal, EngineError> {
    let mut proposal = store
        .find_proposal(id)?
        .ok_or(EngineError::NotFound("proposal"))?;

    if proposal.author_id != user_id {
        return Err(EngineError::Authorization(
            "only the author may edit a proposal",
        ));
    }
    // Ballot integrity: nothing about a proposal may change once voting
    // has started.
    if proposal.vote_status != VoteStatus::Draft {
        return Err(EngineError::InvalidState(
            "proposal can no longer be edited once voting has started",
        ));
    }

    if let Some(title) = patch.title {
        proposal.title = title;
    }
    if let Some(description) = patch.description {
        proposal.description = description;
    }
    if let Some(content) = patch.content {
        proposal.content = content;
    }
    if let Some(vote_type) = patch.vote_type {
        proposal.vote_type = vote_type;
    }
    if let Some(end_date) = patch.end_date {
        proposal.end_date = Some(end_date);
    }
    if let Some(quorum) = patch.quorum {
        proposal.quorum = Some(quorum);
    }
    if let Some(threshold) = patch.threshold {
        proposal.threshold = Some(threshold);
    }

    store.update_proposal(&proposal)?;
    Ok(proposal)
}

pub fn start_voting<S: VotingStore>(
    store: &S,
    id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Proposal, EngineError> {
    let mut proposal = store
        .find_proposal(id)?
        .ok_or(EngineError::NotFound("proposal"))?;

    if proposal.author_id != user_id {
        return Err(EngineError::Authorization(
            "only the author may start voting",
        ));
    }
    if proposal.vote_status != VoteStatus::Draft {
        return Err(EngineError::InvalidState(
            "voting has already started or closed",
        ));
    }

    // Conditional update; a racing second start finds the row no longer
    // in DRAFT and loses.
    if !store.set_voting_active(id, now)? {
        return Err(EngineError::InvalidState(
            "voting has already started or closed",
        ));
    }

    proposal.vote_status = VoteStatus::Active;
    proposal.start_date = Some(now);
    Ok(proposal)
}

pub fn cast_vote<S: VotingStore>(
    store: &S,
    proposal_id: Uuid,
    user_id: Uuid,
    choice: VoteChoice,
    now: DateTime<Utc>,
) -> Result<Vote, EngineError> {
    let proposal = store
        .find_proposal(proposal_id)?
        .ok_or(EngineError::NotFound("proposal"))?;

    if proposal.vote_status != VoteStatus::Active {
        return Err(EngineError::InvalidState(
            "voting is not active for this proposal",
        ));
    }
    if let Some(end_date) = proposal.end_date {
        if end_date < now {
            return Err(EngineError::InvalidState("voting period has ended"));
        }
    }

    validate_choice(&choice, proposal.vote_type)?;

    let vote = Vote {
        proposal_id,
        user_id,
        choice,
        cast_at: now,
    };
    // Upsert keyed by (proposal, user): re-casting overwrites.
    store.upsert_vote(&vote)?;
    Ok(vote)
}

pub fn close_voting<S: VotingStore>(
    store: &S,
    proposal_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Proposal, EngineError> {
    let mut proposal = store
        .find_proposal(proposal_id)?
        .ok_or(EngineError::NotFound("proposal"))?;

    if proposal.author_id != user_id {
        return Err(EngineError::Authorization(
            "only the author may close voting",
        ));
    }
    if proposal.vote_status != VoteStatus::Active {
        return Err(EngineError::InvalidState("voting is not active"));
    }

    let votes = store.find_votes_for_proposal(proposal_id)?;
    let result = tally::tally(&proposal, &votes);

    // Check-and-set on ACTIVE: whichever close commits first writes the
    // permanent result, the loser reports the state violation.
    if !store.set_voting_closed(proposal_id, now, &result)? {
        return Err(EngineError::InvalidState("voting is not active"));
    }

    proposal.vote_status = VoteStatus::Closed;
    proposal.closed_at = Some(now);
    proposal.result = Some(result);
    Ok(proposal)
}

fn validate_choice(choice: &VoteChoice, vote_type: VoteType) -> Result<(), EngineError> {
    if choice.kind() != vote_type {
        return Err(EngineError::Validation(format!(
            "expected a {} ballot, got a {} ballot",
            vote_type.as_str(),
            choice.kind().as_str(),
        )));
    }
    if let VoteChoice::Weighted { weight } = choice {
        if !weight.is_finite() || !(0.0..=1.0).contains(weight) {
            return Err(EngineError::Validation(
                "weight must be between 0 and 1".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::MemStore;
    use chrysalis_types::voting::{ProposalContent, TallyResult};

    fn create_input(vote_type: VoteType) -> CreateProposalRequest {
        CreateProposalRequest {
            title: "Community garden".into(),
            description: "Plant a shared garden".into(),
            content: ProposalContent::default(),
            vote_type,
            end_date: None,
            quorum: None,
            threshold: None,
        }
    }

    fn now() -> DateTime<Utc> {
        "2025-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn created_proposal_starts_in_draft_without_result() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();
        assert_eq!(p.vote_status, VoteStatus::Draft);
        assert!(p.result.is_none());
        assert!(p.start_date.is_none());

        let loaded = store.find_proposal(p.id).unwrap().unwrap();
        assert_eq!(loaded.vote_status, VoteStatus::Draft);
    }

    #[test]
    fn only_the_author_may_edit() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();

        let err = update_proposal(
            &store,
            p.id,
            UpdateProposalRequest {
                title: Some("hijacked".into()),
                ..Default::default()
            },
            Uuid::new_v4(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Authorization(_)));
    }

    #[test]
    fn editing_after_start_is_rejected() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();
        start_voting(&store, p.id, author, now()).unwrap();

        let err = update_proposal(
            &store,
            p.id,
            UpdateProposalRequest {
                description: Some("rewrite".into()),
                ..Default::default()
            },
            author,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn draft_edits_apply_patch_fields() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();

        let updated = update_proposal(
            &store,
            p.id,
            UpdateProposalRequest {
                title: Some("Bigger garden".into()),
                quorum: Some(4),
                ..Default::default()
            },
            author,
        )
        .unwrap();
        assert_eq!(updated.title, "Bigger garden");
        assert_eq!(updated.quorum, Some(4));
        assert_eq!(updated.description, "Plant a shared garden");
    }

    #[test]
    fn start_voting_is_author_only_and_one_way() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();

        let err = start_voting(&store, p.id, Uuid::new_v4(), now()).unwrap_err();
        assert!(matches!(err, EngineError::Authorization(_)));

        let started = start_voting(&store, p.id, author, now()).unwrap();
        assert_eq!(started.vote_status, VoteStatus::Active);
        assert_eq!(started.start_date, Some(now()));

        let err = start_voting(&store, p.id, author, now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn casting_on_draft_or_closed_fails_with_invalid_state() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let voter = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();

        let err = cast_vote(
            &store,
            p.id,
            voter,
            VoteChoice::Simple { vote: true },
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));

        start_voting(&store, p.id, author, now()).unwrap();
        close_voting(&store, p.id, author, now()).unwrap();

        let err = cast_vote(
            &store,
            p.id,
            voter,
            VoteChoice::Simple { vote: true },
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn casting_on_missing_proposal_fails_with_not_found() {
        let store = MemStore::new();
        let err = cast_vote(
            &store,
            Uuid::new_v4(),
            Uuid::new_v4(),
            VoteChoice::Simple { vote: true },
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn casting_after_end_date_fails() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let mut input = create_input(VoteType::Simple);
        input.end_date = Some("2025-06-02T00:00:00Z".parse().unwrap());
        let p = create_proposal(&store, input, author, now()).unwrap();
        start_voting(&store, p.id, author, now()).unwrap();

        let late = "2025-06-03T00:00:00Z".parse().unwrap();
        let err = cast_vote(
            &store,
            p.id,
            Uuid::new_v4(),
            VoteChoice::Simple { vote: true },
            late,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn choice_shape_must_match_vote_type() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();
        start_voting(&store, p.id, author, now()).unwrap();

        let err = cast_vote(
            &store,
            p.id,
            Uuid::new_v4(),
            VoteChoice::Ranked {
                rankings: vec![1, 2],
            },
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn weight_outside_unit_interval_is_rejected() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Weighted), author, now()).unwrap();
        start_voting(&store, p.id, author, now()).unwrap();

        for weight in [-0.1, 1.1, f64::NAN] {
            let err = cast_vote(
                &store,
                p.id,
                Uuid::new_v4(),
                VoteChoice::Weighted { weight },
                now(),
            )
            .unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)));
        }

        cast_vote(
            &store,
            p.id,
            Uuid::new_v4(),
            VoteChoice::Weighted { weight: 1.0 },
            now(),
        )
        .unwrap();
    }

    #[test]
    fn recasting_overwrites_instead_of_duplicating() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let voter = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();
        start_voting(&store, p.id, author, now()).unwrap();

        cast_vote(&store, p.id, voter, VoteChoice::Simple { vote: true }, now()).unwrap();
        cast_vote(
            &store,
            p.id,
            voter,
            VoteChoice::Simple { vote: false },
            now(),
        )
        .unwrap();

        let votes = store.find_votes_for_proposal(p.id).unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].choice, VoteChoice::Simple { vote: false });
    }

    #[test]
    fn closing_writes_the_result_exactly_once() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();
        start_voting(&store, p.id, author, now()).unwrap();
        for _ in 0..3 {
            cast_vote(
                &store,
                p.id,
                Uuid::new_v4(),
                VoteChoice::Simple { vote: true },
                now(),
            )
            .unwrap();
        }

        let closed = close_voting(&store, p.id, author, now()).unwrap();
        assert_eq!(closed.vote_status, VoteStatus::Closed);
        assert_eq!(closed.closed_at, Some(now()));
        assert!(matches!(closed.result, Some(TallyResult::Simple(_))));

        // Result is null iff not CLOSED, and closing twice fails.
        let stored = store.find_proposal(p.id).unwrap().unwrap();
        assert!(stored.result.is_some());
        let err = close_voting(&store, p.id, author, now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn close_is_author_only() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();
        start_voting(&store, p.id, author, now()).unwrap();

        let err = close_voting(&store, p.id, Uuid::new_v4(), now()).unwrap_err();
        assert!(matches!(err, EngineError::Authorization(_)));
    }

    #[test]
    fn quorum_failure_is_recorded_as_the_permanent_result() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let mut input = create_input(VoteType::Simple);
        input.quorum = Some(10);
        let p = create_proposal(&store, input, author, now()).unwrap();
        start_voting(&store, p.id, author, now()).unwrap();
        for _ in 0..5 {
            cast_vote(
                &store,
                p.id,
                Uuid::new_v4(),
                VoteChoice::Simple { vote: true },
                now(),
            )
            .unwrap();
        }

        let closed = close_voting(&store, p.id, author, now()).unwrap();
        assert_eq!(
            closed.result,
            Some(TallyResult::QuorumNotMet {
                quorum: 10,
                total_votes: 5
            })
        );
    }

    #[test]
    fn result_stays_null_until_closed() {
        let store = MemStore::new();
        let author = Uuid::new_v4();
        let p = create_proposal(&store, create_input(VoteType::Simple), author, now()).unwrap();
        assert!(store.find_proposal(p.id).unwrap().unwrap().result.is_none());

        start_voting(&store, p.id, author, now()).unwrap();
        assert!(store.find_proposal(p.id).unwrap().unwrap().result.is_none());

        close_voting(&store, p.id, author, now()).unwrap();
        assert!(store.find_proposal(p.id).unwrap().unwrap().result.is_some());
    }
}
