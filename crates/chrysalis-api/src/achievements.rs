use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use chrysalis_engine::handlers;
use chrysalis_types::api::{Claims, UserAchievementView};
use chrysalis_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn list_achievements(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(move || {
        state
            .db
            .list_user_achievements(&claims.sub.to_string())
            .map_err(ApiError::internal)
    })
    .await?;

    let views: Vec<UserAchievementView> = rows
        .into_iter()
        .map(|(achievement, ua)| UserAchievementView::new(achievement, &ua))
        .collect();

    Ok(Json(views))
}

pub async fn mark_seen(
    State(state): State<AppState>,
    Path(achievement_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let acknowledged = blocking(move || {
        state
            .db
            .mark_achievement_seen(
                &claims.sub.to_string(),
                &achievement_id.to_string(),
                chrono::Utc::now(),
            )
            .map_err(ApiError::internal)
    })
    .await?;

    Ok(Json(json!({ "acknowledged": acknowledged })))
}

/// Re-runs the time-based achievement checks for the calling user.
/// Scheduling is the caller's concern; the engine never runs its own
/// background jobs.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    let outcomes = blocking(move || {
        Ok(handlers::handle_periodic_check(
            &state.db,
            claims.sub,
            chrono::Utc::now(),
        ))
    })
    .await?;

    let mut checked = Vec::new();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(check) => {
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
                checked.push(json!({
                    "trigger": outcome.trigger.code(),
                    "progress": check.progress,
                }));
            }
            Err(err) => checked.push(json!({
                "trigger": outcome.trigger.code(),
                "error": err.to_string(),
            })),
        }
    }

    Ok(Json(json!({ "checked": checked })))
}
