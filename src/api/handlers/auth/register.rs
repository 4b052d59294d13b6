//! Account registration.

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::api::handlers::{normalize_email, valid_email, MIN_PASSWORD_LEN};
use crate::store::NewCredential;

use super::password;
use super::state::AppState;
use super::token::TokenPurpose;
use super::types::{IdentityResponse, RegisterRequest, RegisterResponse};

/// Create a credential and send the activation mail.
///
/// The email/username pre-checks give friendlier conflict errors, but the
/// store's unique constraints remain the source of truth for races.
#[utoipa::path(
    post,
    path = "/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 409, description = "Email or username taken", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn register(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    let username = request.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::bad_request("Missing username"));
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password too short"));
    }
    let first_name = request.first_name.trim().to_string();
    let last_name = request.last_name.trim().to_string();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::bad_request("Missing name"));
    }

    if state.credentials().find_by_email(&email).await?.is_some() {
        return Err(ApiError::ConflictEmailTaken);
    }
    if state
        .credentials()
        .find_by_username(&username)
        .await?
        .is_some()
    {
        return Err(ApiError::ConflictUsernameTaken);
    }

    let password_hash = password::hash(&request.password).map_err(ApiError::internal)?;
    let credential = state
        .credentials()
        .insert(NewCredential {
            email,
            username,
            password_hash,
            first_name,
            last_name,
        })
        .await?;

    info!(user_id = %credential.id, "account registered");

    let verification_mail_sent = send_verification_mail(&state, &credential).await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: IdentityResponse::from_credential(&credential),
            verification_mail_sent,
        }),
    ))
}

/// Issue a verification token and hand the activation mail to the mailer.
/// Failures are logged, never fatal: the account already exists and the
/// mail can be re-sent.
pub(super) async fn send_verification_mail(
    state: &AppState,
    credential: &crate::store::Credential,
) -> bool {
    let issued = match state.signer().issue(
        credential.id,
        TokenPurpose::VerifyEmail,
        state.config().verify_token_ttl_seconds(),
    ) {
        Ok(issued) => issued,
        Err(err) => {
            warn!(user_id = %credential.id, "failed to issue verification token: {err:#}");
            return false;
        }
    };

    let verify_url =
        crate::api::email::build_verify_url(state.config().frontend_base_url(), &issued.token);
    let message = crate::api::email::verification_message(
        &credential.email,
        &credential.display_name(),
        &verify_url,
    );

    match state.mailer().send(&message) {
        Ok(()) => {
            info!(user_id = %credential.id, "verification mail sent");
            true
        }
        Err(err) => {
            warn!(user_id = %credential.id, "failed to send verification mail: {err:#}");
            false
        }
    }
}
