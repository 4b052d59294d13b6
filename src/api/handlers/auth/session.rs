//! Session cookies, the logout endpoint, and the pluggable identity
//! resolution strategies.

use async_trait::async_trait;
use axum::extract::Extension;
use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use std::sync::Arc;
use tracing::error;

use crate::api::error::ApiError;
use crate::store::{Credential, CredentialStore, SessionStore};

use super::state::{AppState, AuthConfig};
use super::token::{TokenPurpose, TokenSigner};

pub(crate) const SESSION_COOKIE_NAME: &str = "blogga_session";

/// Build the `Set-Cookie` value carrying a fresh session token.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    // Only mark cookies secure when the frontend is served over HTTPS.
    let secure = config.session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Expire the session cookie immediately.
pub(crate) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let Some(val) = parts.next() else {
            continue;
        };
        if key == SESSION_COOKIE_NAME {
            return Some(val.trim().to_string());
        }
    }
    None
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Destroy the current session and clear its cookie.
///
/// Idempotent: a missing or already destroyed session still gets a 204
/// and a cleared cookie.
#[utoipa::path(
    post,
    path = "/users/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "users"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(err) = state.sessions().destroy(&token).await {
            error!("failed to destroy session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers)
}

/// A strategy that resolves request headers to a full credential.
///
/// Strategies report `Ok(None)` for anything non-resolvable, so a caller can
/// fall through to the next strategy. Only store failures surface as errors.
#[async_trait]
pub(crate) trait Authenticator: Send + Sync {
    async fn identify(&self, headers: &HeaderMap) -> Result<Option<Credential>, ApiError>;
}

/// Cookie strategy: session token, session store, then credential re-fetch.
pub(crate) struct SessionAuthenticator<'a> {
    sessions: &'a dyn SessionStore,
    credentials: &'a dyn CredentialStore,
}

impl<'a> SessionAuthenticator<'a> {
    pub(crate) fn new(
        sessions: &'a dyn SessionStore,
        credentials: &'a dyn CredentialStore,
    ) -> Self {
        Self {
            sessions,
            credentials,
        }
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator<'_> {
    async fn identify(&self, headers: &HeaderMap) -> Result<Option<Credential>, ApiError> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(None);
        };
        // Resolving also renews the rolling expiry window.
        let Some(user_id) = self.sessions.resolve(&token).await? else {
            return Ok(None);
        };
        // Re-fetch per request so tier and verified are always current.
        Ok(self.credentials.find_by_id(user_id).await?)
    }
}

/// Bearer strategy: access token, signature check, then credential re-fetch.
pub(crate) struct TokenAuthenticator<'a> {
    signer: &'a TokenSigner,
    credentials: &'a dyn CredentialStore,
}

impl<'a> TokenAuthenticator<'a> {
    pub(crate) fn new(signer: &'a TokenSigner, credentials: &'a dyn CredentialStore) -> Self {
        Self {
            signer,
            credentials,
        }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator<'_> {
    async fn identify(&self, headers: &HeaderMap) -> Result<Option<Credential>, ApiError> {
        let Some(token) = extract_bearer_token(headers) else {
            return Ok(None);
        };
        let Ok(subject) = self.signer.verify(&token, TokenPurpose::Access) else {
            return Ok(None);
        };
        Ok(self.credentials.find_by_id(subject).await?)
    }
}
