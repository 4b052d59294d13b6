//! API error taxonomy and its HTTP mapping.
//!
//! Authorization and validation failures become structured JSON responses at
//! the handler boundary. Store failures are logged here and surface as a
//! generic 500 so internals never leak to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::store::{ConflictField, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Login failure. One variant for unknown email and wrong password, so
    /// the response cannot be used to enumerate accounts.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthenticated,

    /// Valid session, unconfirmed email. Distinct from `Unauthenticated` so
    /// clients can prompt re-verification instead of re-login.
    #[error("email not verified")]
    Unverified,

    #[error("forbidden")]
    Forbidden,

    /// Expired token. Collapses into the same response as `TokenInvalid`.
    #[error("token expired")]
    TokenExpired,

    #[error("token invalid")]
    TokenInvalid,

    #[error("email already taken")]
    ConflictEmailTaken,

    #[error("username already taken")]
    ConflictUsernameTaken,

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Unexpected internal failure outside the store, same generic 5xx.
    pub(crate) fn internal(source: anyhow::Error) -> Self {
        Self::StoreUnavailable(source)
    }
}

/// JSON body attached to every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(ConflictField::Email) => Self::ConflictEmailTaken,
            StoreError::Conflict(ConflictField::Username) => Self::ConflictUsernameTaken,
            StoreError::Conflict(ConflictField::ShortId) => {
                Self::StoreUnavailable(anyhow::anyhow!("unretried short id collision"))
            }
            StoreError::Unavailable(source) => Self::StoreUnavailable(source),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::StoreUnavailable(source) = &self {
            tracing::error!(error = ?source, "store failure");
        }

        let (status, error) = match &self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::Unverified => (StatusCode::FORBIDDEN, "unverified"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            // One signal for every token failure mode.
            Self::TokenExpired | Self::TokenInvalid => (StatusCode::UNAUTHORIZED, "invalid_token"),
            Self::ConflictEmailTaken | Self::ConflictUsernameTaken => {
                (StatusCode::CONFLICT, "conflict")
            }
            Self::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::StoreUnavailable(_) => (StatusCode::INTERNAL_SERVER_ERROR, "unavailable"),
        };

        let message = match &self {
            Self::InvalidCredentials => "Invalid credentials".to_string(),
            Self::Unauthenticated => "Authentication required".to_string(),
            Self::Unverified => "Email not verified".to_string(),
            Self::Forbidden => "Forbidden".to_string(),
            Self::TokenExpired | Self::TokenInvalid => "Invalid or expired token".to_string(),
            Self::ConflictEmailTaken => "Email already taken".to_string(),
            Self::ConflictUsernameTaken => "Username already taken".to_string(),
            Self::NotFound => "Not found".to_string(),
            Self::BadRequest(message) => message.clone(),
            Self::StoreUnavailable(_) => "Service unavailable".to_string(),
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}
