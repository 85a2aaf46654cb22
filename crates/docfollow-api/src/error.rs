use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docfollow_engine::EngineError;
use docfollow_persist::PersistError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    /// Messaging gateway, LLM or calendar failure
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { .. } => Self::NotFound(err.to_string()),
            EngineError::InvalidInput(msg) => Self::BadRequest(msg),
            EngineError::Conflict(msg) => Self::Conflict(msg),
            EngineError::AgentUnavailable => Self::Unavailable(err.to_string()),
            EngineError::Gateway(_) | EngineError::Agent(_) | EngineError::Booking(_) => {
                Self::Upstream(err.to_string())
            }
            EngineError::Persist(e) => Self::Storage(e.to_string()),
        }
    }
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        EngineError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream dependency failed");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use docfollow_gateway::GatewayError;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_engine_error_statuses() {
        assert_eq!(
            status_of(EngineError::not_found("Followup", "f1")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(EngineError::InvalidInput("bad decision".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(EngineError::Conflict("changed".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(EngineError::AgentUnavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(EngineError::Gateway(GatewayError::NotConfigured)),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_persist_error_statuses() {
        assert_eq!(
            status_of(PersistError::InvalidObjectId("xyz".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PersistError::Internal("pool closed".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_message_is_surfaced() {
        let err: ApiError = EngineError::Gateway(GatewayError::Api {
            status: 400,
            message: "invalid To number".to_string(),
        })
        .into();
        assert!(err.to_string().contains("invalid To number"));
    }
}
