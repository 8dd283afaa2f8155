use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Requests the matcher refuses outright, as opposed to a soft miss.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("match request has no type")]
    MissingType,
    #[error("unsupported match type {0}")]
    UnsupportedType(i64),
    #[error("episode match needs grandparentTitle plus index and parentIndex, or date")]
    InvalidEpisodeRequest,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("unknown metadata key `{0}`")]
    UnknownKey(String),
    #[error("metadata `{0}` not found")]
    NotFound(String),
    #[error("upstream request failed: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Match(MatchError::InvalidEpisodeRequest) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "invalid_request")
            }
            AppError::Match(_) => (StatusCode::INTERNAL_SERVER_ERROR, "unsupported_type"),
            AppError::InvalidBody(_) => (StatusCode::BAD_REQUEST, "invalid_body"),
            AppError::UnknownKey(_) | AppError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        let body = json!({ "error": code, "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}
