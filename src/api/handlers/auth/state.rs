//! Auth configuration and shared application state.

use std::sync::Arc;

use crate::api::email::Mailer;
use crate::store::{BlogStore, CommentStore, CredentialStore, SessionStore};

use super::token::TokenSigner;

const DEFAULT_VERIFY_TOKEN_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    verify_token_ttl_seconds: i64,
    access_token_ttl_seconds: i64,
    session_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            verify_token_ttl_seconds: DEFAULT_VERIFY_TOKEN_TTL_SECONDS,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_verify_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.verify_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn verify_token_ttl_seconds(&self) -> i64 {
        self.verify_token_ttl_seconds
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Everything handlers need, injected as one `Extension<Arc<AppState>>`.
/// Stores sit behind trait objects so the same handlers run against
/// Postgres in production and the memory stores in tests.
pub struct AppState {
    config: AuthConfig,
    signer: TokenSigner,
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    blogs: Arc<dyn BlogStore>,
    comments: Arc<dyn CommentStore>,
    mailer: Arc<dyn Mailer>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        signer: TokenSigner,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        blogs: Arc<dyn BlogStore>,
        comments: Arc<dyn CommentStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            signer,
            credentials,
            sessions,
            blogs,
            comments,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    #[must_use]
    pub fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn blogs(&self) -> &dyn BlogStore {
        self.blogs.as_ref()
    }

    #[must_use]
    pub fn comments(&self) -> &dyn CommentStore {
        self.comments.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogMailer;
    use crate::store::memory::{
        MemoryBlogStore, MemoryCommentStore, MemoryCredentialStore, MemorySessionStore,
    };
    use secrecy::SecretString;

    #[test]
    fn test_auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://blogga.dev".to_string());

        assert_eq!(config.frontend_base_url(), "https://blogga.dev");
        assert_eq!(
            config.verify_token_ttl_seconds(),
            super::DEFAULT_VERIFY_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.access_token_ttl_seconds(),
            super::DEFAULT_ACCESS_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert!(config.session_cookie_secure());

        let config = config
            .with_verify_token_ttl_seconds(120)
            .with_access_token_ttl_seconds(3600)
            .with_session_ttl_seconds(1800);

        assert_eq!(config.verify_token_ttl_seconds(), 120);
        assert_eq!(config.access_token_ttl_seconds(), 3600);
        assert_eq!(config.session_ttl_seconds(), 1800);
    }

    #[test]
    fn test_plain_http_frontend_disables_secure_cookie() {
        let config = AuthConfig::new("http://localhost:8080".to_string());
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn test_app_state_constructs_over_memory_stores() {
        let config = AuthConfig::new("http://localhost:8080".to_string());
        let signer = TokenSigner::new(&SecretString::from(
            "0123456789abcdef0123456789abcdef",
        ))
        .expect("signer");

        let state = AppState::new(
            config,
            signer,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemorySessionStore::new(3600)),
            Arc::new(MemoryBlogStore::new()),
            Arc::new(MemoryCommentStore::new()),
            Arc::new(LogMailer),
        );

        assert_eq!(state.config().session_ttl_seconds(), 3600 * 24);
    }
}
