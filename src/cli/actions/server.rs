//! The server action: build state from validated arguments and serve.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::api;
use crate::api::email::LogMailer;
use crate::api::handlers::auth::token::TokenSigner;
use crate::api::handlers::auth::{AppState, AuthConfig};
use crate::store::memory::{
    MemoryBlogStore, MemoryCommentStore, MemoryCredentialStore, MemorySessionStore,
};
use crate::store::postgres::{PgBlogStore, PgCommentStore, PgCredentialStore, PgSessionStore};

/// Validated server arguments, produced by the dispatcher.
#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub memory_store: bool,
    pub token_secret: SecretString,
    pub frontend_url: String,
    pub access_token_ttl_seconds: i64,
    pub verify_token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
}

/// Run the server until shutdown.
///
/// # Errors
///
/// Fails fast on an invalid frontend URL, an undersized token secret, or
/// an unreachable database.
pub async fn handle(args: Args) -> Result<()> {
    // Fail fast on config errors before touching the network.
    Url::parse(&args.frontend_url)
        .with_context(|| format!("Invalid frontend base URL: {}", args.frontend_url))?;
    let signer = TokenSigner::new(&args.token_secret)?;

    let config = AuthConfig::new(args.frontend_url)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_verify_token_ttl_seconds(args.verify_token_ttl_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds);

    let state = if args.memory_store {
        warn!("running on in-memory stores; all data is lost on shutdown");
        Arc::new(AppState::new(
            config,
            signer,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemorySessionStore::new(args.session_ttl_seconds)),
            Arc::new(MemoryBlogStore::new()),
            Arc::new(MemoryCommentStore::new()),
            Arc::new(LogMailer),
        ))
    } else {
        let dsn = args.dsn.context("missing required argument: --dsn")?;
        let pool = api::connect_pool(&dsn).await?;
        info!("connected to Postgres");
        Arc::new(AppState::new(
            config,
            signer,
            Arc::new(PgCredentialStore::new(pool.clone())),
            Arc::new(PgSessionStore::new(pool.clone(), args.session_ttl_seconds)),
            Arc::new(PgBlogStore::new(pool.clone())),
            Arc::new(PgCommentStore::new(pool)),
            Arc::new(LogMailer),
        ))
    };

    api::serve(args.port, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_args(secret: &str, frontend_url: &str) -> Args {
        Args {
            port: 0,
            dsn: None,
            memory_store: true,
            token_secret: SecretString::from(secret),
            frontend_url: frontend_url.to_string(),
            access_token_ttl_seconds: 86400,
            verify_token_ttl_seconds: 600,
            session_ttl_seconds: 86400,
        }
    }

    #[tokio::test]
    async fn test_handle_rejects_short_token_secret() {
        let result = handle(memory_args("too-short", "http://localhost:3000")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_handle_rejects_invalid_frontend_url() {
        let result = handle(memory_args(
            "0123456789abcdef0123456789abcdef",
            "not a url",
        ))
        .await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid frontend base URL"));
    }
}
