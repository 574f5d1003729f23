//! API error classification
//!
//! Handlers return `ApiError`; this is the only place a failure becomes a
//! status code. Error responses never carry a body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::crawler::CrawlerError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed client parameter
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Wrong verb for an existing route
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Anything else: I/O, encoding, signing, crawler failures
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CrawlerError> for ApiError {
    fn from(e: CrawlerError) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(e) => error!("Request failed: {:?}", e),
            other => debug!("Rejected request: {}", other),
        }
        self.status().into_response()
    }
}

/// Fallback for known paths hit with the wrong method
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
