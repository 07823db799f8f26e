//! Database row types — these map directly to SQLite rows.
//! Distinct from the chrysalis-types API models to keep the DB layer
//! independent; `into_model` conversions parse the TEXT columns.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use chrysalis_types::models::{
    AccessLevel, Achievement, AchievementType, LifeStage, Meadow, MeadowParticipant, MeadowStatus,
    MeadowType, ParticipantRole, Proposal, Resource, ResourceType, StageTransition, User,
    UserAchievement, Vote, VoteStatus, VoteType,
};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub current_stage: String,
    pub stage_updated_at: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            username: self.username,
            display_name: self.display_name,
            current_stage: parse_stage(&self.current_stage)?,
            stage_updated_at: parse_timestamp(&self.stage_updated_at)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct ProposalRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub vote_type: String,
    pub vote_status: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub quorum: Option<u32>,
    pub threshold: Option<f64>,
    pub result: Option<String>,
    pub author_id: String,
    pub created_at: String,
    pub closed_at: Option<String>,
}

impl ProposalRow {
    pub fn into_model(self) -> Result<Proposal> {
        Ok(Proposal {
            id: parse_uuid(&self.id)?,
            title: self.title,
            description: self.description,
            content: serde_json::from_str(&self.content)
                .with_context(|| format!("corrupt proposal content for '{}'", self.id))?,
            vote_type: VoteType::parse(&self.vote_type)
                .ok_or_else(|| anyhow!("corrupt vote_type '{}'", self.vote_type))?,
            vote_status: VoteStatus::parse(&self.vote_status)
                .ok_or_else(|| anyhow!("corrupt vote_status '{}'", self.vote_status))?,
            start_date: self.start_date.as_deref().map(parse_timestamp).transpose()?,
            end_date: self.end_date.as_deref().map(parse_timestamp).transpose()?,
            quorum: self.quorum,
            threshold: self.threshold,
            result: self
                .result
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .with_context(|| format!("corrupt result for proposal '{}'", self.id))?,
            author_id: parse_uuid(&self.author_id)?,
            created_at: parse_timestamp(&self.created_at)?,
            closed_at: self.closed_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

pub struct VoteRow {
    pub proposal_id: String,
    pub user_id: String,
    pub choice: String,
    pub cast_at: String,
}

impl VoteRow {
    pub fn into_model(self) -> Result<Vote> {
        Ok(Vote {
            proposal_id: parse_uuid(&self.proposal_id)?,
            user_id: parse_uuid(&self.user_id)?,
            choice: serde_json::from_str(&self.choice).with_context(|| {
                format!("corrupt vote choice for proposal '{}'", self.proposal_id)
            })?,
            cast_at: parse_timestamp(&self.cast_at)?,
        })
    }
}

pub struct StageTransitionRow {
    pub id: String,
    pub user_id: String,
    pub from_stage: String,
    pub to_stage: String,
    pub reason: Option<String>,
    pub created_at: String,
}

impl StageTransitionRow {
    pub fn into_model(self) -> Result<StageTransition> {
        Ok(StageTransition {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            from_stage: parse_stage(&self.from_stage)?,
            to_stage: parse_stage(&self.to_stage)?,
            reason: self.reason,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct AchievementRow {
    pub id: String,
    pub code: String,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
}

impl AchievementRow {
    pub fn into_model(self) -> Result<Achievement> {
        Ok(Achievement {
            id: parse_uuid(&self.id)?,
            code: self.code,
            achievement_type: AchievementType::parse(&self.achievement_type)
                .ok_or_else(|| anyhow!("corrupt achievement type '{}'", self.achievement_type))?,
            title: self.title,
            description: self.description,
        })
    }
}

pub struct UserAchievementRow {
    pub user_id: String,
    pub achievement_id: String,
    pub progress: u8,
    pub earned_at: Option<String>,
    pub seen_at: Option<String>,
    pub updated_at: String,
}

impl UserAchievementRow {
    pub fn into_model(self) -> Result<UserAchievement> {
        Ok(UserAchievement {
            user_id: parse_uuid(&self.user_id)?,
            achievement_id: parse_uuid(&self.achievement_id)?,
            progress: self.progress,
            earned_at: self.earned_at.as_deref().map(parse_timestamp).transpose()?,
            seen_at: self.seen_at.as_deref().map(parse_timestamp).transpose()?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

pub struct MeadowRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub meadow_type: String,
    pub status: String,
    pub host_id: String,
    pub scheduled_at: String,
    pub location: Option<String>,
    pub created_at: String,
}

impl MeadowRow {
    pub fn into_model(self) -> Result<Meadow> {
        Ok(Meadow {
            id: parse_uuid(&self.id)?,
            name: self.name,
            description: self.description,
            meadow_type: MeadowType::parse(&self.meadow_type)
                .ok_or_else(|| anyhow!("corrupt meadow_type '{}'", self.meadow_type))?,
            status: MeadowStatus::parse(&self.status)
                .ok_or_else(|| anyhow!("corrupt meadow status '{}'", self.status))?,
            host_id: parse_uuid(&self.host_id)?,
            scheduled_at: parse_timestamp(&self.scheduled_at)?,
            location: self.location,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct MeadowParticipantRow {
    pub meadow_id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: String,
}

impl MeadowParticipantRow {
    pub fn into_model(self) -> Result<MeadowParticipant> {
        Ok(MeadowParticipant {
            meadow_id: parse_uuid(&self.meadow_id)?,
            user_id: parse_uuid(&self.user_id)?,
            role: ParticipantRole::parse(&self.role)
                .ok_or_else(|| anyhow!("corrupt participant role '{}'", self.role))?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct ResourceRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub resource_type: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub access: String,
    pub stage: Option<String>,
    pub author_id: String,
    pub meadow_id: Option<String>,
    pub created_at: String,
}

impl ResourceRow {
    pub fn into_model(self, categories: Vec<String>) -> Result<Resource> {
        Ok(Resource {
            id: parse_uuid(&self.id)?,
            title: self.title,
            description: self.description,
            resource_type: ResourceType::parse(&self.resource_type)
                .ok_or_else(|| anyhow!("corrupt resource_type '{}'", self.resource_type))?,
            url: self.url,
            body: self.body,
            access: AccessLevel::parse(&self.access)
                .ok_or_else(|| anyhow!("corrupt access level '{}'", self.access))?,
            stage: self.stage.as_deref().map(parse_stage).transpose()?,
            author_id: parse_uuid(&self.author_id)?,
            meadow_id: self.meadow_id.as_deref().map(parse_uuid).transpose()?,
            categories,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("corrupt uuid '{s}'"))
}

pub fn parse_stage(s: &str) -> Result<LifeStage> {
    LifeStage::parse(s).ok_or_else(|| anyhow!("corrupt life stage '{s}'"))
}

/// SQLite defaults store timestamps as "YYYY-MM-DD HH:MM:SS" without
/// a timezone; application writes use RFC 3339. Accept both.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{s}'"))
}
