//! Error kinds surfaced by the recommender and their HTTP rendering.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use beer_catalog::CatalogError;
use knn_model::OracleError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommendError {
    /// Unknown beer name/id or a beer the model has never seen
    #[error("{0}")]
    NotFound(String),

    /// Malformed or incomplete request body
    #[error("{0}")]
    BadRequest(String),

    /// The model raised while scoring
    #[error("prediction failed: {0}")]
    Oracle(String),

    #[error("ranking did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    /// Model and catalog disagree about which beers exist
    #[error("catalog and model are out of sync: {0}")]
    Inconsistent(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RecommendError {
    /// Machine-readable kind included in error responses
    pub fn kind(&self) -> &'static str {
        match self {
            RecommendError::NotFound(_) => "NOT_FOUND",
            RecommendError::BadRequest(_) => "BAD_REQUEST",
            RecommendError::Oracle(_) => "ORACLE_FAILURE",
            RecommendError::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            RecommendError::Inconsistent(_) | RecommendError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RecommendError::NotFound(_) => StatusCode::NOT_FOUND,
            RecommendError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RecommendError::Oracle(_) => StatusCode::BAD_GATEWAY,
            RecommendError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            RecommendError::Inconsistent(_) | RecommendError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<CatalogError> for RecommendError {
    fn from(err: CatalogError) -> Self {
        if err.is_not_found() {
            RecommendError::NotFound(err.to_string())
        } else {
            RecommendError::Internal(err.to_string())
        }
    }
}

impl From<OracleError> for RecommendError {
    fn from(err: OracleError) -> Self {
        if err.is_not_found() {
            RecommendError::NotFound(err.to_string())
        } else {
            RecommendError::Oracle(err.to_string())
        }
    }
}

impl IntoResponse for RecommendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;
