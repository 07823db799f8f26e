use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use chrysalis_engine::EngineError;

/// Engine and infrastructure failures mapped to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Internal(anyhow::Error),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl ApiError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Engine(err) => engine_response(err),
            Self::Internal(err) => {
                error!("internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

fn engine_response(err: EngineError) -> Response {
    match &err {
        EngineError::NotFound(_) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": err.to_string() }))).into_response()
        }
        EngineError::Authorization(_) => {
            (StatusCode::FORBIDDEN, Json(json!({ "error": err.to_string() }))).into_response()
        }
        EngineError::InvalidState(_) | EngineError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, Json(json!({ "error": err.to_string() }))).into_response()
        }
        EngineError::RequirementsNotMet { missing } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": err.to_string(),
                "missing_requirements": missing,
            })),
        )
            .into_response(),
        EngineError::Validation(_) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response()
        }
        EngineError::Storage(storage) => {
            error!("storage error: {storage}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "storage failure" })),
            )
                .into_response()
        }
    }
}

/// Run blocking storage/engine work off the async runtime.
pub async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(anyhow::anyhow!("spawn_blocking join error: {e}")))?
}
