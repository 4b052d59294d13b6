//! Shared fixtures for handler tests. Everything runs over the in-memory
//! stores, so tests need no database.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use secrecy::SecretString;
use uuid::Uuid;

use crate::api::email::{MailMessage, Mailer};
use crate::store::memory::{
    MemoryBlogStore, MemoryCommentStore, MemoryCredentialStore, MemorySessionStore,
};
use crate::store::{CredentialChanges, NewCredential, UserTier};

use super::password;
use super::state::{AppState, AuthConfig};
use super::token::TokenSigner;

pub(crate) const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

/// Mailer that records messages instead of delivering them.
#[derive(Default)]
pub(crate) struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    pub(crate) fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &MailMessage) -> Result<()> {
        self.sent.lock().expect("mailer lock").push(message.clone());
        Ok(())
    }
}

/// Mailer that fails every delivery, for the mail-is-non-fatal paths.
pub(crate) struct FailingMailer;

impl Mailer for FailingMailer {
    fn send(&self, _message: &MailMessage) -> Result<()> {
        anyhow::bail!("smtp unreachable")
    }
}

/// Mint a token with explicit timestamps, bypassing the signer's clock.
pub(crate) fn forge_token(subject: Uuid, purpose: &str, iat: i64, exp: i64) -> String {
    #[derive(serde::Serialize)]
    struct RawClaims<'a> {
        sub: String,
        purpose: &'a str,
        iss: &'a str,
        iat: i64,
        exp: i64,
    }

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &RawClaims {
            sub: subject.to_string(),
            purpose,
            iss: "blogga",
            iat,
            exp,
        },
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("encode token")
}

/// Collect a response body and parse it as JSON.
pub(crate) async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("collect body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(crate) fn memory_state() -> AppState {
    memory_state_with(
        AuthConfig::new("https://blogga.dev".to_string()),
        Arc::new(RecordingMailer::default()),
    )
}

pub(crate) fn memory_state_with(config: AuthConfig, mailer: Arc<dyn Mailer>) -> AppState {
    let session_ttl = config.session_ttl_seconds();
    let signer = TokenSigner::new(&SecretString::from(TEST_SECRET)).expect("signer");
    AppState::new(
        config,
        signer,
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MemorySessionStore::new(session_ttl)),
        Arc::new(MemoryBlogStore::new()),
        Arc::new(MemoryCommentStore::new()),
        mailer,
    )
}

/// Insert a member-tier, unverified credential and return its id.
pub(crate) async fn seed_user(state: &AppState, email: &str, username: &str, plain: &str) -> Uuid {
    let credential = state
        .credentials()
        .insert(NewCredential {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: password::hash(plain).expect("hash password"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
        })
        .await
        .expect("seed credential");
    credential.id
}

pub(crate) async fn set_tier(state: &AppState, id: Uuid, tier: UserTier) {
    state
        .credentials()
        .update_fields(
            id,
            CredentialChanges {
                tier: Some(tier),
                ..CredentialChanges::default()
            },
        )
        .await
        .expect("update tier");
}

pub(crate) async fn mark_verified(state: &AppState, id: Uuid) {
    state
        .credentials()
        .update_fields(
            id,
            CredentialChanges {
                verified: Some(true),
                ..CredentialChanges::default()
            },
        )
        .await
        .expect("mark verified");
}
