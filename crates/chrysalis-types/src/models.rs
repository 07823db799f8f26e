use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::voting::{ProposalContent, TallyResult, VoteChoice};

/// Life stages a member moves through, in metamorphosis order.
/// FLOWER is the pre-stage every account starts in; transitions only
/// ever move forward through this sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifeStage {
    Flower,
    Egg,
    Larvae,
    Pupa,
    Butterfly,
}

impl LifeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flower => "FLOWER",
            Self::Egg => "EGG",
            Self::Larvae => "LARVAE",
            Self::Pupa => "PUPA",
            Self::Butterfly => "BUTTERFLY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FLOWER" => Some(Self::Flower),
            "EGG" => Some(Self::Egg),
            "LARVAE" => Some(Self::Larvae),
            "PUPA" => Some(Self::Pupa),
            "BUTTERFLY" => Some(Self::Butterfly),
            _ => None,
        }
    }

    /// Position in the fixed stage sequence (FLOWER = 0).
    pub fn order(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteType {
    Simple,
    Ranked,
    Weighted,
    Approval,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "SIMPLE",
            Self::Ranked => "RANKED",
            Self::Weighted => "WEIGHTED",
            Self::Approval => "APPROVAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SIMPLE" => Some(Self::Simple),
            "RANKED" => Some(Self::Ranked),
            "WEIGHTED" => Some(Self::Weighted),
            "APPROVAL" => Some(Self::Approval),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteStatus {
    Draft,
    Active,
    Closed,
    Archived,
}

impl VoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Closed => "CLOSED",
            Self::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "ACTIVE" => Some(Self::Active),
            "CLOSED" => Some(Self::Closed),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeadowType {
    Gathering,
    Workshop,
    Assembly,
}

impl MeadowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gathering => "GATHERING",
            Self::Workshop => "WORKSHOP",
            Self::Assembly => "ASSEMBLY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GATHERING" => Some(Self::Gathering),
            "WORKSHOP" => Some(Self::Workshop),
            "ASSEMBLY" => Some(Self::Assembly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeadowStatus {
    Planned,
    Active,
    Completed,
    Cancelled,
}

impl MeadowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PLANNED" => Some(Self::Planned),
            "ACTIVE" => Some(Self::Active),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantRole {
    Host,
    Participant,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "HOST",
            Self::Participant => "PARTICIPANT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HOST" => Some(Self::Host),
            "PARTICIPANT" => Some(Self::Participant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AchievementType {
    Participation,
    Contribution,
    Stage,
    Milestone,
}

impl AchievementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Participation => "PARTICIPATION",
            Self::Contribution => "CONTRIBUTION",
            Self::Stage => "STAGE",
            Self::Milestone => "MILESTONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PARTICIPATION" => Some(Self::Participation),
            "CONTRIBUTION" => Some(Self::Contribution),
            "STAGE" => Some(Self::Stage),
            "MILESTONE" => Some(Self::Milestone),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Article,
    Video,
    Document,
    Link,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "ARTICLE",
            Self::Video => "VIDEO",
            Self::Document => "DOCUMENT",
            Self::Link => "LINK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ARTICLE" => Some(Self::Article),
            "VIDEO" => Some(Self::Video),
            "DOCUMENT" => Some(Self::Document),
            "LINK" => Some(Self::Link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    Public,
    Members,
    Stage,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Members => "MEMBERS",
            Self::Stage => "STAGE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PUBLIC" => Some(Self::Public),
            "MEMBERS" => Some(Self::Members),
            "STAGE" => Some(Self::Stage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub current_stage: LifeStage,
    pub stage_updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub content: ProposalContent,
    pub vote_type: VoteType,
    pub vote_status: VoteStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Minimum number of votes before the tally is meaningful.
    pub quorum: Option<u32>,
    /// Passing percentage, 0-100.
    pub threshold: Option<f64>,
    /// Populated exactly once, when voting closes.
    pub result: Option<TallyResult>,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: Uuid,
    pub user_id: Uuid,
    pub choice: VoteChoice,
    pub cast_at: DateTime<Utc>,
}

/// Append-only record of a stage change. The newest record for a user
/// determines their time in the current stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTransition {
    pub id: Uuid,
    pub user_id: Uuid,
    pub from_stage: LifeStage,
    pub to_stage: LifeStage,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: Uuid,
    pub code: String,
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
    pub user_id: Uuid,
    pub achievement_id: Uuid,
    /// 0-100; never moves backwards.
    pub progress: u8,
    pub earned_at: Option<DateTime<Utc>>,
    pub seen_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meadow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub meadow_type: MeadowType,
    pub status: MeadowStatus,
    pub host_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeadowParticipant {
    pub meadow_id: Uuid,
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub resource_type: ResourceType,
    pub url: Option<String>,
    pub body: Option<String>,
    pub access: AccessLevel,
    /// Minimum stage when access is STAGE.
    pub stage: Option<LifeStage>,
    pub author_id: Uuid,
    pub meadow_id: Option<Uuid>,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCategory {
    pub id: Uuid,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_total_and_fixed() {
        assert!(LifeStage::Flower < LifeStage::Egg);
        assert!(LifeStage::Egg < LifeStage::Larvae);
        assert!(LifeStage::Larvae < LifeStage::Pupa);
        assert!(LifeStage::Pupa < LifeStage::Butterfly);
        assert_eq!(LifeStage::Flower.order(), 0);
        assert_eq!(LifeStage::Butterfly.order(), 4);
    }

    #[test]
    fn enums_round_trip_through_db_strings() {
        for stage in [
            LifeStage::Flower,
            LifeStage::Egg,
            LifeStage::Larvae,
            LifeStage::Pupa,
            LifeStage::Butterfly,
        ] {
            assert_eq!(LifeStage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(LifeStage::parse("MOTH"), None);

        for vt in [
            VoteType::Simple,
            VoteType::Ranked,
            VoteType::Weighted,
            VoteType::Approval,
        ] {
            assert_eq!(VoteType::parse(vt.as_str()), Some(vt));
        }
    }
}
