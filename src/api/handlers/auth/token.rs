//! Stateless identity tokens (HS256 JWT).
//!
//! Flow Overview:
//! 1) Build subject + purpose claims with unix-second timestamps.
//! 2) Sign with the process-wide HMAC secret held by [`TokenSigner`].
//! 3) Verify against an explicit clock so expiry is testable.
//!
//! Tokens are never persisted and cannot be revoked; gates re-check the
//! subject against the credential store before applying side effects.

use anyhow::{anyhow, Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::domain::unix_now;

const MIN_SECRET_BYTES: usize = 32;
const TOKEN_ISSUER: &str = "blogga";

/// What a token is good for. Purpose is a signed claim, so a verification
/// link can never double as bearer authentication or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    /// Issued at login; bearer authentication and the admin second factor.
    Access,
    /// Issued for the email-verification link.
    VerifyEmail,
}

impl TokenPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::VerifyEmail => "verify-email",
        }
    }
}

/// Internal verification failure. Both variants collapse to one signal at
/// the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            TokenError::Invalid => Self::TokenInvalid,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    purpose: String,
    iss: String,
    iat: i64,
    exp: i64,
}

/// Token plus its absolute expiry, returned to callers that surface the
/// expiry (login responses).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Process-wide token signer. Built once at startup from explicit config;
/// verification never reads ambient state.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    /// Builds a signer from the shared HMAC secret.
    ///
    /// # Errors
    ///
    /// Rejects secrets under 32 bytes; forgery resistance needs the full
    /// 256 bits of entropy.
    pub fn new(secret: &SecretString) -> Result<Self> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(anyhow!(
                "token secret must be at least {MIN_SECRET_BYTES} bytes"
            ));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        })
    }

    /// Issues a signed token for `subject`, expiring `ttl_seconds` from now.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-positive ttl or a signing failure.
    pub fn issue(
        &self,
        subject: Uuid,
        purpose: TokenPurpose,
        ttl_seconds: i64,
    ) -> Result<IssuedToken> {
        if ttl_seconds <= 0 {
            return Err(anyhow!("token ttl must be positive"));
        }

        let now = unix_now();
        let claims = Claims {
            sub: subject.to_string(),
            purpose: purpose.as_str().to_string(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now,
            exp: now + ttl_seconds,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("failed to sign token")?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Verifies a token for the expected purpose against the real clock.
    ///
    /// # Errors
    ///
    /// [`TokenError::Expired`] past the expiry instant, [`TokenError::Invalid`]
    /// for every other failure (bad signature, malformed, wrong purpose or
    /// issuer, non-UUID subject).
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<Uuid, TokenError> {
        self.verify_at(token, purpose, unix_now())
    }

    /// Verification against a caller-supplied clock. A token is valid
    /// strictly before its expiry instant.
    pub fn verify_at(
        &self,
        token: &str,
        purpose: TokenPurpose,
        now_unix_seconds: i64,
    ) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the supplied clock.
        validation.validate_exp = false;
        validation.set_issuer(&[TOKEN_ISSUER]);

        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(|_| TokenError::Invalid)?;

        if data.claims.purpose != purpose.as_str() {
            return Err(TokenError::Invalid);
        }
        if data.claims.exp <= now_unix_seconds {
            return Err(TokenError::Expired);
        }

        Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::Invalid)
    }
}
