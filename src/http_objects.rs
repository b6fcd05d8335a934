use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::error::BuildError;
use crate::orchestrator::BuildOutcome;

/// API error body: a message plus the pipeline stage that failed.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    #[serde(skip)]
    status_code: StatusCode,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
}

impl ApiError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            error: message.to_string(),
            stage: None,
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal_error_str(message: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("API Error: {} - {}", self.status_code, self.error);
        (self.status_code, Json(self)).into_response()
    }
}

impl From<BuildError> for ApiError {
    fn from(e: BuildError) -> Self {
        let status_code = match &e {
            BuildError::InvalidName(_)
            | BuildError::MissingField(_)
            | BuildError::Archive(_)
            | BuildError::PathEscape(_) => StatusCode::BAD_REQUEST,
            BuildError::ImageNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status_code,
            error: e.to_string(),
            stage: Some(e.stage()),
        }
    }
}

/// Successful build response: the tuple the metadata catalog registers.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BuildResponse {
    pub name: String,
    pub image: String,
    pub runtime: String,
}

impl From<BuildOutcome> for BuildResponse {
    fn from(outcome: BuildOutcome) -> Self {
        Self {
            name: outcome.name,
            image: outcome.image,
            runtime: outcome.runtime,
        }
    }
}
