use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use chrysalis_engine::{EngineError, achievements::TriggerOutcome, handlers};
use chrysalis_gateway::registry::Registry;
use chrysalis_types::api::{Claims, CreateMeadowRequest, MeadowQuery};
use chrysalis_types::events::{GatewayEvent, MeadowActivityKind};
use chrysalis_types::models::{Meadow, MeadowStatus};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn create_meadow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMeadowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    let meadow = Meadow {
        id: Uuid::new_v4(),
        name: req.name,
        description: req.description,
        meadow_type: req.meadow_type,
        status: MeadowStatus::Planned,
        host_id: claims.sub,
        scheduled_at: req.scheduled_at,
        location: req.location,
        created_at: chrono::Utc::now(),
    };

    let db_state = state.clone();
    let (meadow, outcomes) = blocking(move || {
        db_state
            .db
            .create_meadow(&meadow)
            .map_err(ApiError::internal)?;
        // Creating a meadow is the host's first participation in it and
        // counts as an initiative.
        let mut outcomes =
            handlers::handle_meadow_participation(&db_state.db, meadow.host_id, chrono::Utc::now());
        outcomes.extend(handlers::handle_meadow_hosting(
            &db_state.db,
            meadow.host_id,
            chrono::Utc::now(),
        ));
        Ok((meadow, outcomes))
    })
    .await?;

    registry.broadcast(GatewayEvent::MeadowActivity {
        meadow_id: meadow.id,
        user_id: claims.sub,
        activity: MeadowActivityKind::Created,
    });
    notify_unlocks(&registry, claims.sub, &outcomes).await;

    Ok((StatusCode::CREATED, Json(meadow)))
}

pub async fn list_meadows(
    State(state): State<AppState>,
    Query(query): Query<MeadowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let meadows = blocking(move || {
        state
            .db
            .list_meadows(query.status.as_deref(), query.meadow_type.as_deref())
            .map_err(ApiError::internal)
    })
    .await?;

    Ok(Json(meadows))
}

pub async fn get_meadow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (meadow, participants) = blocking(move || {
        let meadow = state
            .db
            .get_meadow(&id.to_string())
            .map_err(ApiError::internal)?
            .ok_or_else(|| ApiError::Engine(EngineError::NotFound("meadow")))?;
        let participants = state
            .db
            .meadow_participants(&id.to_string())
            .map_err(ApiError::internal)?;
        Ok((meadow, participants))
    })
    .await?;

    Ok(Json(json!({ "meadow": meadow, "participants": participants })))
}

pub async fn join_meadow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    let db_state = state.clone();
    let outcomes = blocking(move || {
        if db_state
            .db
            .get_meadow(&id.to_string())
            .map_err(ApiError::internal)?
            .is_none()
        {
            return Err(ApiError::Engine(EngineError::NotFound("meadow")));
        }
        let joined = db_state
            .db
            .join_meadow(&id.to_string(), &claims.sub.to_string(), chrono::Utc::now())
            .map_err(ApiError::internal)?;
        if !joined {
            return Err(ApiError::Engine(EngineError::InvalidState(
                "already a participant of this meadow",
            )));
        }
        Ok(handlers::handle_meadow_participation(
            &db_state.db,
            claims.sub,
            chrono::Utc::now(),
        ))
    })
    .await?;

    registry.broadcast(GatewayEvent::MeadowActivity {
        meadow_id: id,
        user_id: claims.sub,
        activity: MeadowActivityKind::Joined,
    });
    notify_unlocks(&registry, claims.sub, &outcomes).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave_meadow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    blocking(move || {
        let left = state
            .db
            .leave_meadow(&id.to_string(), &claims.sub.to_string())
            .map_err(ApiError::internal)?;
        if !left {
            return Err(ApiError::Engine(EngineError::InvalidState(
                "not a removable participant of this meadow",
            )));
        }
        Ok(())
    })
    .await?;

    registry.broadcast(GatewayEvent::MeadowActivity {
        meadow_id: id,
        user_id: claims.sub,
        activity: MeadowActivityKind::Left,
    });

    Ok(StatusCode::NO_CONTENT)
}

/// Host-only. Completion is what makes a hosting count toward the
/// contribution requirements, so the hosting triggers re-run here.
pub async fn complete_meadow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    let db_state = state.clone();
    let outcomes = blocking(move || {
        let meadow = db_state
            .db
            .get_meadow(&id.to_string())
            .map_err(ApiError::internal)?
            .ok_or_else(|| ApiError::Engine(EngineError::NotFound("meadow")))?;
        if meadow.host_id != claims.sub {
            return Err(ApiError::Engine(EngineError::Authorization(
                "only the host may complete a meadow",
            )));
        }
        let completed = db_state
            .db
            .complete_meadow(&id.to_string(), &claims.sub.to_string())
            .map_err(ApiError::internal)?;
        if !completed {
            return Err(ApiError::Engine(EngineError::InvalidState(
                "meadow is already completed",
            )));
        }
        Ok(handlers::handle_meadow_hosting(
            &db_state.db,
            claims.sub,
            chrono::Utc::now(),
        ))
    })
    .await?;

    registry.broadcast(GatewayEvent::MeadowActivity {
        meadow_id: id,
        user_id: claims.sub,
        activity: MeadowActivityKind::Completed,
    });
    notify_unlocks(&registry, claims.sub, &outcomes).await;

    Ok(StatusCode::NO_CONTENT)
}

async fn notify_unlocks(registry: &Registry, user_id: Uuid, outcomes: &[TriggerOutcome]) {
    for outcome in outcomes {
        if let Ok(check) = &outcome.result {
            if let Some(achievement) = &check.newly_earned {
                registry
                    .send_to_user(
                        user_id,
                        GatewayEvent::AchievementUnlocked {
                            achievement_id: achievement.id,
                            code: achievement.code.clone(),
                            title: achievement.title.clone(),
                        },
                    )
                    .await;
            }
        }
    }
}
