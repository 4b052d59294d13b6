//! Email verification endpoints.

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiError;
use crate::store::CredentialChanges;

use super::gates::{require_session, require_token};
use super::register::send_verification_mail;
use super::state::AppState;
use super::token::TokenPurpose;
use super::types::{MessageResponse, VerificationMailResponse, VerifyEmailRequest};

/// Consume an emailed verification token and activate the account.
///
/// The token must verify for the verify-email purpose and name the session
/// identity, so a stolen link alone cannot activate someone else's account.
/// Nothing is mutated on any failure path.
#[utoipa::path(
    post,
    path = "/users/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 401, description = "No session or bad token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Token names another account", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn verify_email(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> Result<Response, ApiError> {
    let identity = require_session(&state, &headers).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };
    let token = request.token.trim();
    if token.is_empty() {
        return Err(ApiError::bad_request("Missing token"));
    }

    require_token(&state, token, TokenPurpose::VerifyEmail, &identity)?;

    // Re-checked against current state: a token outliving its purpose is a
    // no-op, not an error.
    if identity.verified {
        return Ok((
            StatusCode::OK,
            Json(MessageResponse {
                message: "Account already verified".to_string(),
            }),
        )
            .into_response());
    }

    state
        .credentials()
        .update_fields(
            identity.id,
            CredentialChanges {
                verified: Some(true),
                ..CredentialChanges::default()
            },
        )
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(user_id = %identity.id, "email verified");

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Account verified".to_string(),
        }),
    )
        .into_response())
}

/// Issue a fresh verification token and re-send the activation mail.
#[utoipa::path(
    post,
    path = "/users/resend-verification",
    responses(
        (status = 200, description = "Mail queued", body = VerificationMailResponse),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn resend_verification(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let identity = require_session(&state, &headers).await?;

    if identity.verified {
        return Ok((
            StatusCode::OK,
            Json(MessageResponse {
                message: "Account already verified".to_string(),
            }),
        )
            .into_response());
    }

    let verification_mail_sent = send_verification_mail(&state, &identity).await;
    Ok((
        StatusCode::OK,
        Json(VerificationMailResponse {
            verification_mail_sent,
        }),
    )
        .into_response())
}
