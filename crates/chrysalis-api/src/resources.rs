use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use chrysalis_engine::EngineError;
use chrysalis_types::api::{Claims, CreateCategoryRequest, CreateResourceRequest, ResourceQuery};
use chrysalis_types::models::{AccessLevel, Resource};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn create_resource(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateResourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resource = Resource {
        id: Uuid::new_v4(),
        title: req.title,
        description: req.description,
        resource_type: req.resource_type,
        url: req.url,
        body: req.body,
        access: req.access.unwrap_or(AccessLevel::Public),
        stage: req.stage,
        author_id: claims.sub,
        meadow_id: req.meadow_id,
        categories: req.categories,
        created_at: chrono::Utc::now(),
    };

    let resource = blocking(move || {
        // Meadow-scoped resources may only be added by participants.
        if let Some(meadow_id) = resource.meadow_id {
            if state
                .db
                .get_meadow(&meadow_id.to_string())
                .map_err(ApiError::internal)?
                .is_none()
            {
                return Err(ApiError::Engine(EngineError::NotFound("meadow")));
            }
            let is_participant = state
                .db
                .is_meadow_participant(&meadow_id.to_string(), &resource.author_id.to_string())
                .map_err(ApiError::internal)?;
            if !is_participant {
                return Err(ApiError::Engine(EngineError::Authorization(
                    "only participants may add resources to a meadow",
                )));
            }
        }
        state
            .db
            .create_resource(&resource)
            .map_err(ApiError::internal)?;
        Ok(resource)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(resource)))
}

pub async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<ResourceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let resources = blocking(move || {
        state
            .db
            .list_resources(query.category.as_deref(), query.search.as_deref())
            .map_err(ApiError::internal)
    })
    .await?;

    Ok(Json(resources))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let categories =
        blocking(move || state.db.list_categories().map_err(ApiError::internal)).await?;

    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Engine(EngineError::Validation(
            "category name must not be empty".into(),
        )));
    }

    let category = blocking(move || {
        state
            .db
            .create_category(&Uuid::new_v4().to_string(), &name)
            .map_err(ApiError::internal)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(category)))
}
