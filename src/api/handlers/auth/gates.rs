//! Authorization gates, evaluated in a fixed order before protected work.
//!
//! Order is session, then verification, then admin tier, then token. Each
//! gate short-circuits with its own error so a client can distinguish
//! re-login from re-verification from outright denial.

use axum::http::HeaderMap;

use crate::api::error::ApiError;
use crate::store::Credential;

use super::session::{
    extract_bearer_token, Authenticator, SessionAuthenticator, TokenAuthenticator,
};
use super::state::AppState;
use super::token::TokenPurpose;

/// Resolve the request to a live credential, cookie strategy first.
pub(crate) async fn require_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Credential, ApiError> {
    let by_cookie = SessionAuthenticator::new(state.sessions(), state.credentials());
    let by_bearer = TokenAuthenticator::new(state.signer(), state.credentials());
    let strategies: [&dyn Authenticator; 2] = [&by_cookie, &by_bearer];

    for strategy in strategies {
        if let Some(credential) = strategy.identify(headers).await? {
            return Ok(credential);
        }
    }
    Err(ApiError::Unauthenticated)
}

/// The resolved identity must have completed email verification.
pub(crate) fn require_verified(credential: &Credential) -> Result<(), ApiError> {
    if credential.verified {
        Ok(())
    } else {
        Err(ApiError::Unverified)
    }
}

/// The resolved identity must sit in the admin tier.
pub(crate) fn require_admin(credential: &Credential) -> Result<(), ApiError> {
    if credential.tier.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// A presented token must verify for `purpose` and name the caller.
///
/// The subject comparison stops a token minted for one account being
/// replayed alongside a session belonging to another.
pub(crate) fn require_token(
    state: &AppState,
    token: &str,
    purpose: TokenPurpose,
    identity: &Credential,
) -> Result<(), ApiError> {
    let subject = state.signer().verify(token, purpose)?;
    if subject != identity.id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// Pull the bearer token for a token-gated route. Absence reads as an
/// invalid token, not a missing session.
pub(crate) fn require_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    extract_bearer_token(headers).ok_or(ApiError::TokenInvalid)
}
