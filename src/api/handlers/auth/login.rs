//! Email/password login.

use anyhow::anyhow;
use axum::extract::Extension;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::error::ApiError;
use crate::api::handlers::normalize_email;

use super::password;
use super::session::session_cookie;
use super::state::AppState;
use super::token::TokenPurpose;
use super::types::{IdentityResponse, LoginRequest, LoginResponse};

/// Validate email/password, establish a session, and issue an access token.
///
/// Unknown email and wrong password produce byte-identical responses, so
/// the endpoint cannot be used to enumerate accounts.
#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Invalid credentials", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };

    let email = normalize_email(&request.email);
    let Some(credential) = state.credentials().find_by_email(&email).await? else {
        debug!("login rejected for unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    if !password::verify(&request.password, &credential.password_hash) {
        debug!(user_id = %credential.id, "login rejected for bad password");
        return Err(ApiError::InvalidCredentials);
    }

    let session_token = state.sessions().create(credential.id).await?;
    let cookie = session_cookie(state.config(), &session_token)
        .map_err(|err| ApiError::internal(anyhow!(err)))?;

    let issued = state
        .signer()
        .issue(
            credential.id,
            TokenPurpose::Access,
            state.config().access_token_ttl_seconds(),
        )
        .map_err(ApiError::internal)?;

    info!(user_id = %credential.id, "login");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((
        StatusCode::OK,
        headers,
        Json(LoginResponse {
            user: IdentityResponse::from_credential(&credential),
            token: issued.token,
            expires_at: issued.expires_at,
        }),
    ))
}
