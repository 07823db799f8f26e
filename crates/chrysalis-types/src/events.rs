use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::LifeStage;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A user came online or went offline
    PresenceUpdate {
        user_id: Uuid,
        username: String,
        online: bool,
    },

    /// A proposal left DRAFT and is open for voting
    ProposalOpened { proposal_id: Uuid, title: String },

    /// Voting closed and the result is final
    ProposalClosed {
        proposal_id: Uuid,
        title: String,
        /// Tally kind tag; the full result is fetched over REST.
        result_kind: String,
    },

    /// Someone voted. Carries the running vote count, never the choice.
    VoteCast { proposal_id: Uuid, total_votes: u32 },

    /// A member advanced to a new life stage
    StageAdvanced {
        user_id: Uuid,
        username: String,
        from_stage: LifeStage,
        to_stage: LifeStage,
    },

    /// Targeted notification: the receiving user unlocked an achievement
    AchievementUnlocked {
        achievement_id: Uuid,
        code: String,
        title: String,
    },

    /// Meadow membership or lifecycle change
    MeadowActivity {
        meadow_id: Uuid,
        user_id: Uuid,
        activity: MeadowActivityKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeadowActivityKind {
    Created,
    Joined,
    Left,
    Completed,
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = GatewayEvent::VoteCast {
            proposal_id: Uuid::nil(),
            total_votes: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "VoteCast");
        assert_eq!(json["data"]["total_votes"], 3);
    }
}
