use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use chrysalis_engine::stage;
use chrysalis_types::api::{Claims, EligibilityQuery, TransitionStageRequest};
use chrysalis_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn transition_stage(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TransitionStageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    let advance = blocking(move || {
        Ok(stage::transition_stage(
            &state.db,
            claims.sub,
            req.to_stage,
            req.reason,
            chrono::Utc::now(),
        )?)
    })
    .await?;

    registry.broadcast(GatewayEvent::StageAdvanced {
        user_id: advance.transition.user_id,
        username: claims.username.clone(),
        from_stage: advance.transition.from_stage,
        to_stage: advance.transition.to_stage,
    });

    // Targeted unlock notifications for achievements this transition
    // earned.
    for outcome in &advance.achievements {
        if let Ok(check) = &outcome.result {
            if let Some(achievement) = &check.newly_earned {
                registry
                    .send_to_user(
                        claims.sub,
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

    Ok((StatusCode::CREATED, Json(advance.transition)))
}

pub async fn check_eligibility(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<EligibilityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let eligibility = blocking(move || {
        Ok(stage::check_stage_eligibility(
            &state.db,
            claims.sub,
            query.stage,
            chrono::Utc::now(),
        )?)
    })
    .await?;

    Ok(Json(eligibility))
}

pub async fn stage_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let history = blocking(move || Ok(stage::stage_history(&state.db, claims.sub)?)).await?;

    Ok(Json(history))
}
