//! ==============================================================================
//! error.rs - gateway error type
//! ==============================================================================
//!
//! purpose:
//!     one error enum for every request path. each variant knows which http
//!     status it maps to, so handlers can just `?` and return.
//!
//! relationships:
//!     - used by: store.rs (upstream failures), api/handlers.rs, auth.rs
//!
//! ==============================================================================

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// datastore answered with a non-2xx status
    #[error("upstream store returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// malformed input, rejected before any store call
    #[error("validation error: {0}")]
    Validation(String),

    /// rejected sign-in; the reason is logged, never sent
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// transport failure talking to the datastore
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            // an unparseable upstream code still has to go somewhere
            Error::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::Upstream { .. } => "UPSTREAM_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Http(_) => "HTTP_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// body that failed to deserialize, reported like any other validation error
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        // the login screen reads `error`, not the usual envelope
        if let Error::Unauthorized(reason) = &self {
            tracing::error!(status = %status, reason = %reason, "sign-in rejected");
            return (status, Json(json!({ "error": "Invalid credentials" }))).into_response();
        }

        let message = match &self {
            // pass the store's body through untouched
            Error::Upstream { body, .. } => body.clone(),
            other => other.to_string(),
        };

        tracing::error!(
            status = %status,
            error_code = self.code(),
            message = %message,
            "request error"
        );

        let body = Json(json!({
            "status": "error",
            "error_code": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
