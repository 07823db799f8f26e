use serde::{Deserialize, Serialize};

/// Free-form proposal body. `options` is the ballot option list for
/// RANKED and APPROVAL proposals; SIMPLE and WEIGHTED proposals usually
/// leave it empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

/// A ballot, one variant per vote type. The wire shape is the bare JSON
/// object (`{"vote": true}`, `{"rankings": [2, 1, 3]}`, ...); the field
/// names are disjoint so untagged deserialization is unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoteChoice {
    Simple {
        vote: bool,
    },
    /// One rank per option, index-aligned with the proposal's option
    /// list; lower rank means more preferred.
    Ranked {
        rankings: Vec<u32>,
    },
    /// Continuous support in [0, 1].
    Weighted {
        weight: f64,
    },
    /// The subset of option strings the voter approves of.
    Approval {
        approved: Vec<String>,
    },
}

impl VoteChoice {
    pub fn kind(&self) -> crate::models::VoteType {
        match self {
            Self::Simple { .. } => crate::models::VoteType::Simple,
            Self::Ranked { .. } => crate::models::VoteType::Ranked,
            Self::Weighted { .. } => crate::models::VoteType::Weighted,
            Self::Approval { .. } => crate::models::VoteType::Approval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
}

/// Permanent record written when voting closes, discriminated by tally
/// kind. Never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TallyResult {
    /// Fewer votes than the configured quorum; no type-specific tally
    /// was run.
    QuorumNotMet { quorum: u32, total_votes: u32 },
    Simple(SimpleTally),
    RankedChoice(RankedTally),
    Weighted(WeightedTally),
    Approval(ApprovalTally),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleTally {
    pub verdict: Verdict,
    pub total_votes: u32,
    pub yes_votes: u32,
    pub no_votes: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTally {
    pub total_votes: u32,
    pub rounds: Vec<RankedRound>,
    pub winner: Option<String>,
}

/// One instant-runoff round: per-option first-preference counts among
/// continuing options, the option eliminated at the end of the round
/// (none on the final round), and how many ballots were exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRound {
    pub counts: Vec<OptionCount>,
    pub eliminated: Option<String>,
    pub exhausted: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionCount {
    pub option: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTally {
    /// Only present when the proposal configured a threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    pub total_votes: u32,
    pub total_weight: f64,
    pub average_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalTally {
    pub total_votes: u32,
    /// Ranked by approval count, descending.
    pub options: Vec<ApprovalCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalCount {
    pub option: String,
    pub count: u32,
    /// Share of all voters approving this option, 0-100.
    pub percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_variants_deserialize_from_bare_objects() {
        let simple: VoteChoice = serde_json::from_str(r#"{"vote": true}"#).unwrap();
        assert_eq!(simple, VoteChoice::Simple { vote: true });

        let ranked: VoteChoice = serde_json::from_str(r#"{"rankings": [2, 1, 3]}"#).unwrap();
        assert_eq!(
            ranked,
            VoteChoice::Ranked {
                rankings: vec![2, 1, 3]
            }
        );

        let weighted: VoteChoice = serde_json::from_str(r#"{"weight": 0.75}"#).unwrap();
        assert_eq!(weighted, VoteChoice::Weighted { weight: 0.75 });

        let approval: VoteChoice = serde_json::from_str(r#"{"approved": ["a", "c"]}"#).unwrap();
        assert_eq!(
            approval,
            VoteChoice::Approval {
                approved: vec!["a".into(), "c".into()]
            }
        );
    }

    #[test]
    fn malformed_choice_is_rejected() {
        assert!(serde_json::from_str::<VoteChoice>(r#"{"vote": "yes"}"#).is_err());
        assert!(serde_json::from_str::<VoteChoice>(r#"{"ballot": 1}"#).is_err());
        assert!(serde_json::from_str::<VoteChoice>(r#"{"rankings": "first"}"#).is_err());
    }

    #[test]
    fn tally_result_is_tagged_by_kind() {
        let result = TallyResult::QuorumNotMet {
            quorum: 10,
            total_votes: 5,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "quorum_not_met");
        assert_eq!(json["quorum"], 10);

        let back: TallyResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
