use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use chrysalis_engine::{EngineError, voting};
use chrysalis_types::api::{
    CastVoteRequest, Claims, CreateProposalRequest, ProposalQuery, UpdateProposalRequest,
};
use chrysalis_types::events::GatewayEvent;
use chrysalis_types::voting::{TallyResult, VoteChoice};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn create_proposal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateProposalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let proposal = blocking(move || {
        Ok(voting::create_proposal(
            &state.db,
            req,
            claims.sub,
            chrono::Utc::now(),
        )?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(proposal)))
}

pub async fn list_proposals(
    State(state): State<AppState>,
    Query(query): Query<ProposalQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let proposals = blocking(move || {
        state
            .db
            .list_proposals(query.vote_status.as_deref(), query.search.as_deref())
            .map_err(ApiError::internal)
    })
    .await?;

    Ok(Json(proposals))
}

pub async fn get_proposal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let proposal = blocking(move || {
        state
            .db
            .get_proposal(&id.to_string())
            .map_err(ApiError::internal)?
            .ok_or_else(|| ApiError::Engine(EngineError::NotFound("proposal")))
    })
    .await?;

    Ok(Json(proposal))
}

pub async fn update_proposal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(patch): Json<UpdateProposalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let proposal =
        blocking(move || Ok(voting::update_proposal(&state.db, id, patch, claims.sub)?)).await?;

    Ok(Json(proposal))
}

pub async fn start_voting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    let proposal = blocking(move || {
        Ok(voting::start_voting(
            &state.db,
            id,
            claims.sub,
            chrono::Utc::now(),
        )?)
    })
    .await?;

    registry.broadcast(GatewayEvent::ProposalOpened {
        proposal_id: proposal.id,
        title: proposal.title.clone(),
    });

    Ok(Json(proposal))
}

pub async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CastVoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Decode the free-form ballot into the typed union here, at the
    // boundary; the engine only ever sees a well-formed choice.
    let choice: VoteChoice = serde_json::from_value(req.choice)
        .map_err(|e| EngineError::Validation(format!("malformed ballot: {e}")))?;

    let registry = state.registry.clone();
    let (vote, total_votes) = blocking(move || {
        let vote = voting::cast_vote(&state.db, id, claims.sub, choice, chrono::Utc::now())?;
        let total = state
            .db
            .count_votes(&id.to_string())
            .map_err(ApiError::internal)?;
        Ok((vote, total))
    })
    .await?;

    registry.broadcast(GatewayEvent::VoteCast {
        proposal_id: id,
        total_votes,
    });

    Ok((StatusCode::CREATED, Json(vote)))
}

pub async fn close_voting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    let proposal = blocking(move || {
        Ok(voting::close_voting(
            &state.db,
            id,
            claims.sub,
            chrono::Utc::now(),
        )?)
    })
    .await?;

    registry.broadcast(GatewayEvent::ProposalClosed {
        proposal_id: proposal.id,
        title: proposal.title.clone(),
        result_kind: proposal
            .result
            .as_ref()
            .map(result_kind)
            .unwrap_or("unknown")
            .to_string(),
    });

    Ok(Json(proposal))
}

fn result_kind(result: &TallyResult) -> &'static str {
    match result {
        TallyResult::QuorumNotMet { .. } => "quorum_not_met",
        TallyResult::Simple(_) => "simple",
        TallyResult::RankedChoice(_) => "ranked_choice",
        TallyResult::Weighted(_) => "weighted",
        TallyResult::Approval(_) => "approval",
    }
}
