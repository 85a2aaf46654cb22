use docfollow_gateway::GatewayError;
use docfollow_persist::PersistError;
use docfollow_types::DecisionError;
use thiserror::Error;

use crate::booking::BookingError;

/// Failure of a drafting-agent call.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Drafting agent timed out after {0}s")]
    Timeout(u64),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("Invalid agent response: {0}")]
    InvalidResponse(String),
}

impl AgentError {
    /// Timeouts are worth retrying, malformed output is not
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Llm(_))
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Drafting agent unavailable: no LLM credentials configured")]
    AgentUnavailable,

    #[error("Messaging gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Drafting agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Appointment booking failed: {0}")]
    Booking(#[from] BookingError),

    #[error("Persistence error: {0}")]
    Persist(PersistError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<PersistError> for EngineError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::NotFound { entity, id } => Self::NotFound { entity, id },
            PersistError::InvalidObjectId(id) => Self::InvalidInput(format!("Invalid id: {}", id)),
            PersistError::Duplicate(what) => Self::Conflict(format!("Duplicate {}", what)),
            other => Self::Persist(other),
        }
    }
}

impl From<DecisionError> for EngineError {
    fn from(err: DecisionError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
