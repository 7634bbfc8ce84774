use thiserror::Error;

use crate::store::StoreError;

/// Structural failures surfaced to callers of the session state machine.
///
/// Grading and mastery failures never appear here: grading always degrades to a
/// fallback result and a failed mastery update only drops that one skill.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("assessment session not found: {0}")]
    SessionNotFound(String),
    #[error("step not found: {0}")]
    StepNotFound(String),
    #[error("assessment session already completed: {0}")]
    SessionAlreadyCompleted(String),
    #[error("assessment session was abandoned: {0}")]
    SessionAbandoned(String),
    #[error("invalid step catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("step catalog is empty")]
    Empty,
    #[error("duplicate step id: {0}")]
    DuplicateId(String),
    #[error("step id {0} is reserved for completed sessions")]
    ReservedId(String),
    #[error("duplicate step order {order} on step {step_id}")]
    DuplicateOrder { step_id: String, order: u32 },
    #[error("step {step_id} references unknown skill {skill_key}")]
    UnknownSkill { step_id: String, skill_key: String },
    #[error("step {step_id} has a skip rule on {depends_on}, which is not an earlier step")]
    InvalidSkipDependency { step_id: String, depends_on: String },
    #[error("step {step_id} has a SCORE_GT skip rule without a value")]
    MissingSkipValue { step_id: String },
    #[error("step {step_id}: {message}")]
    InvalidPayload { step_id: String, message: String },
    #[error("failed to load catalog: {0}")]
    Load(String),
}

/// Collaborator failures inside the grading boundary. Always recovered locally.
#[derive(Debug, Error)]
pub enum GradingError {
    #[error("grading collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("grading collaborator returned a malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum ProfileExtractionError {
    #[error("assessment session not found: {0}")]
    SessionNotFound(String),
    #[error("assessment session {0} is not completed")]
    NotCompleted(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq)]
pub enum RecommendationError {
    #[error("invalid recommendation weights: {0}")]
    InvalidWeights(String),
}
