//! Profile, preferences, and admin account management.

use axum::extract::{Extension, Path};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::{normalize_email, valid_email, MIN_PASSWORD_LEN};
use crate::store::CredentialChanges;

use super::auth::gates::{require_admin, require_bearer, require_session, require_token};
use super::auth::password;
use super::auth::session::clear_session_cookie;
use super::auth::token::TokenPurpose;
use super::auth::types::{
    IdentityResponse, NameResponse, PublicProfileResponse, SettingsResponse, UpdateEmailRequest,
    UpdatePasswordRequest, UpdateSettingsRequest, UpdateTierRequest,
};
use super::auth::AppState;

/// First/last name plus the verified flag, for the profile header.
#[utoipa::path(
    get,
    path = "/users/name",
    responses(
        (status = 200, description = "Caller's name", body = NameResponse),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn name(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Json<NameResponse>, ApiError> {
    let identity = require_session(&state, &headers).await?;
    Ok(Json(NameResponse {
        first_name: identity.first_name,
        last_name: identity.last_name,
        verified: identity.verified,
    }))
}

#[utoipa::path(
    get,
    path = "/users/settings",
    responses(
        (status = 200, description = "Caller's preferences", body = SettingsResponse),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn settings(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let identity = require_session(&state, &headers).await?;
    Ok(Json(SettingsResponse {
        dark_mode: identity.preferences.dark_mode,
        display_real_name: identity.preferences.display_real_name,
    }))
}

/// Partial preferences update. Omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/users/settings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Updated preferences", body = SettingsResponse),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn update_settings(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<UpdateSettingsRequest>>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let identity = require_session(&state, &headers).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };

    let updated = state
        .credentials()
        .update_fields(
            identity.id,
            CredentialChanges {
                dark_mode: request.dark_mode,
                display_real_name: request.display_real_name,
                ..CredentialChanges::default()
            },
        )
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(SettingsResponse {
        dark_mode: updated.preferences.dark_mode,
        display_real_name: updated.preferences.display_real_name,
    }))
}

/// Change the account email. Requires the current password; the verified
/// flag is left alone (one-way transition, never reset).
#[utoipa::path(
    put,
    path = "/users/settings/email",
    request_body = UpdateEmailRequest,
    responses(
        (status = 200, description = "Updated identity", body = IdentityResponse),
        (status = 401, description = "No session or wrong password", body = crate::api::error::ErrorBody),
        (status = 409, description = "Email taken", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn update_email(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<UpdateEmailRequest>>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let identity = require_session(&state, &headers).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if !password::verify(&request.password, &identity.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }
    if email == identity.email {
        return Ok(Json(IdentityResponse::from_credential(&identity)));
    }

    // Friendly pre-check; the store's unique index is the real guard.
    if state.credentials().find_by_email(&email).await?.is_some() {
        return Err(ApiError::ConflictEmailTaken);
    }

    let updated = state
        .credentials()
        .update_fields(
            identity.id,
            CredentialChanges {
                email: Some(email),
                ..CredentialChanges::default()
            },
        )
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(user_id = %updated.id, "email changed");
    Ok(Json(IdentityResponse::from_credential(&updated)))
}

/// Change the account password. Requires the current password.
#[utoipa::path(
    put,
    path = "/users/settings/password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Updated identity", body = IdentityResponse),
        (status = 401, description = "No session or wrong password", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn update_password(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<UpdatePasswordRequest>>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let identity = require_session(&state, &headers).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };

    if !password::verify(&request.current_password, &identity.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }
    if request.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password too short"));
    }

    let password_hash = password::hash(&request.new_password).map_err(ApiError::internal)?;
    let updated = state
        .credentials()
        .update_fields(
            identity.id,
            CredentialChanges {
                password_hash: Some(password_hash),
                ..CredentialChanges::default()
            },
        )
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(user_id = %updated.id, "password changed");
    Ok(Json(IdentityResponse::from_credential(&updated)))
}

/// Delete the calling account with its blogs, comments, and sessions.
#[utoipa::path(
    delete,
    path = "/users/me",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn delete_account(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let identity = require_session(&state, &headers).await?;

    // Comments on the user's blogs go first so nothing dangles.
    let authored = state.blogs().list_by_author(identity.id, true).await?;
    for blog in &authored {
        state.comments().delete_for_blog(blog.id).await?;
    }
    state.blogs().delete_by_author(identity.id).await?;
    state.comments().delete_by_author(identity.id).await?;
    state.sessions().destroy_for_user(identity.id).await?;
    state.credentials().delete(identity.id).await?;

    info!(user_id = %identity.id, "account deleted");

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    Ok((StatusCode::NO_CONTENT, response_headers).into_response())
}

/// Public projection of any account.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Public profile", body = PublicProfileResponse),
        (status = 404, description = "No such user", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn public_profile(
    Path(id): Path<String>,
    state: Extension<Arc<AppState>>,
) -> Result<Json<PublicProfileResponse>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::NotFound)?;
    let credential = state
        .credentials()
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(PublicProfileResponse::from_credential(&credential)))
}

/// All accounts, without password hashes. Admin tier plus a valid access
/// token naming the caller.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All accounts", body = [IdentityResponse]),
        (status = 401, description = "No session or bad token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::api::error::ErrorBody)
    ),
    tag = "admin"
)]
pub async fn list_users(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Json<Vec<IdentityResponse>>, ApiError> {
    let identity = require_session(&state, &headers).await?;
    require_admin(&identity)?;
    let bearer = require_bearer(&headers)?;
    require_token(&state, &bearer, TokenPurpose::Access, &identity)?;

    let all = state.credentials().list().await?;
    Ok(Json(
        all.iter().map(IdentityResponse::from_credential).collect(),
    ))
}

/// Promote or demote an account between member and admin tiers.
#[utoipa::path(
    put,
    path = "/users/{id}/status",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateTierRequest,
    responses(
        (status = 200, description = "Updated identity", body = IdentityResponse),
        (status = 401, description = "No session or bad token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such user", body = crate::api::error::ErrorBody)
    ),
    tag = "admin"
)]
pub async fn update_tier(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<UpdateTierRequest>>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let identity = require_session(&state, &headers).await?;
    require_admin(&identity)?;
    let bearer = require_bearer(&headers)?;
    require_token(&state, &bearer, TokenPurpose::Access, &identity)?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };

    let id = Uuid::parse_str(&id).map_err(|_| ApiError::NotFound)?;
    let updated = state
        .credentials()
        .update_fields(
            id,
            CredentialChanges {
                tier: Some(request.tier),
                ..CredentialChanges::default()
            },
        )
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(user_id = %updated.id, tier = updated.tier.as_str(), "tier changed");
    Ok(Json(IdentityResponse::from_credential(&updated)))
}
