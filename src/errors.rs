// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutfitError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Model is still loading: {0}")]
    ModelLoading(String),

    #[error("Unexpected response format: {0}")]
    Parse(String),

    #[error("External call timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Content rejected by safety policy: {0}")]
    ContentRejected(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl OutfitError {
    /// Whether a failed external call may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OutfitError::ExternalService(_)
                | OutfitError::ModelLoading(_)
                | OutfitError::Parse(_)
                | OutfitError::Timeout(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutfitError::Validation(_) => "validation_error",
            OutfitError::ExternalService(_) => "external_service_error",
            OutfitError::ModelLoading(_) => "model_loading",
            OutfitError::Parse(_) => "parse_error",
            OutfitError::Timeout(_) => "timeout",
            OutfitError::Configuration(_) => "configuration_error",
            OutfitError::ContentRejected(_) => "content_rejected",
            OutfitError::Cache(_) => "cache_error",
        }
    }
}

impl ResponseError for OutfitError {
    fn status_code(&self) -> StatusCode {
        match self {
            OutfitError::Validation(_) => StatusCode::BAD_REQUEST,
            OutfitError::ContentRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OutfitError::Configuration(_) | OutfitError::Cache(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            OutfitError::ExternalService(_) | OutfitError::Parse(_) => StatusCode::BAD_GATEWAY,
            OutfitError::ModelLoading(_) => StatusCode::SERVICE_UNAVAILABLE,
            OutfitError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind()
        }))
    }
}
