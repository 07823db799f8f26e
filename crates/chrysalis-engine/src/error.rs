use chrysalis_types::models::LifeStage;
use chrysalis_types::progression::RequirementStatus;
use thiserror::Error;

pub use crate::store::StoreError;

/// Engine failure taxonomy. Authorization and state-machine violations
/// are caller-logic errors and are never retried; `Storage` wraps
/// persistence failures whose retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not authorized: {0}")]
    Authorization(&'static str),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("invalid stage transition: {} -> {}", from.as_str(), to.as_str())]
    InvalidTransition { from: LifeStage, to: LifeStage },

    #[error("requirements not met ({} missing)", missing.len())]
    RequirementsNotMet { missing: Vec<RequirementStatus> },

    #[error("invalid vote: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
