//! Request-level error type for the `psql-management` service.
//!
//! Every handler returns `Result<_, ApiError>`; the [`IntoResponse`] impl is
//! the single place where error kinds map onto HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request fields. No connection was attempted.
    #[error("{0}")]
    Validation(String),

    /// The target database does not exist on the server.
    #[error("Database '{0}' does not exist.")]
    NotFound(String),

    /// Ad-hoc read query failed to execute.
    #[error("Query failed: {0}")]
    BadRequest(String),

    /// A result set carried the same column name twice.
    #[error("Column '{0}' appears more than once in the result set.")]
    DuplicateColumn(String),

    /// Connection or statement failure reported by the driver.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        // ---
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::DuplicateColumn(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();
        match &self {
            ApiError::Database(e) => {
                tracing::error!("Database operation failed: {}", e);
                (status, Json("Internal server error".to_string())).into_response()
            }
            other => {
                tracing::warn!("Request rejected ({}): {}", status, other);
                (status, Json(other.to_string())).into_response()
            }
        }
    }
}
