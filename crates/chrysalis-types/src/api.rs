use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    AccessLevel, Achievement, LifeStage, MeadowType, ResourceType, UserAchievement, VoteType,
};
use crate::voting::ProposalContent;

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the WebSocket Identify
/// handshake. Canonical definition lives here so both layers agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub current_stage: LifeStage,
    pub token: String,
}

// -- Proposals --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProposalRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub content: ProposalContent,
    pub vote_type: VoteType,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub quorum: Option<u32>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Partial update; only present fields change. Rejected once the
/// proposal has left DRAFT.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProposalRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<ProposalContent>,
    #[serde(default)]
    pub vote_type: Option<VoteType>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub quorum: Option<u32>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// The raw ballot body; decoded into a typed `VoteChoice` at the API
/// boundary so the engine never sees free-form JSON.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CastVoteRequest {
    pub choice: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProposalQuery {
    #[serde(default)]
    pub vote_status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

// -- Stages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionStageRequest {
    pub to_stage: LifeStage,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EligibilityQuery {
    pub stage: LifeStage,
}

// -- Achievements --

/// A user's progress row joined with its achievement definition.
#[derive(Debug, Clone, Serialize)]
pub struct UserAchievementView {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub progress: u8,
    pub earned_at: Option<DateTime<Utc>>,
    pub seen_at: Option<DateTime<Utc>>,
}

impl UserAchievementView {
    pub fn new(achievement: Achievement, ua: &UserAchievement) -> Self {
        Self {
            achievement,
            progress: ua.progress,
            earned_at: ua.earned_at,
            seen_at: ua.seen_at,
        }
    }
}

// -- Meadows --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMeadowRequest {
    pub name: String,
    pub description: String,
    pub meadow_type: MeadowType,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MeadowQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub meadow_type: Option<String>,
}

// -- Resources --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateResourceRequest {
    pub title: String,
    pub description: String,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub access: Option<AccessLevel>,
    #[serde(default)]
    pub stage: Option<LifeStage>,
    #[serde(default)]
    pub meadow_id: Option<Uuid>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}
