//! Map validated CLI matches to an action.

use anyhow::{Context, Result};
use secrecy::SecretString;

use crate::cli::actions::{server, Action};

/// Build the server action from parsed arguments.
///
/// # Errors
///
/// Returns an error when required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let token_secret = matches
        .get_one::<String>("token-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --token-secret")?;
    let frontend_url = matches
        .get_one::<String>("frontend-url")
        .cloned()
        .context("missing required argument: --frontend-url")?;

    Ok(Action::Server(server::Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches.get_one::<String>("dsn").cloned(),
        memory_store: matches.get_flag("memory-store"),
        token_secret,
        frontend_url,
        access_token_ttl_seconds: matches
            .get_one::<i64>("access-token-ttl")
            .copied()
            .unwrap_or(86400),
        verify_token_ttl_seconds: matches
            .get_one::<i64>("verify-token-ttl")
            .copied()
            .unwrap_or(600),
        session_ttl_seconds: matches
            .get_one::<i64>("session-ttl")
            .copied()
            .unwrap_or(86400),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn test_handler_builds_server_args() {
        let matches = commands::new().get_matches_from(vec![
            "blogga",
            "--dsn",
            "postgres://localhost/blogga",
            "--token-secret",
            "0123456789abcdef0123456789abcdef",
            "--port",
            "9000",
            "--verify-token-ttl",
            "120",
        ]);

        let Action::Server(args) = handler(&matches).expect("action");
        assert_eq!(args.port, 9000);
        assert_eq!(args.dsn.as_deref(), Some("postgres://localhost/blogga"));
        assert!(!args.memory_store);
        assert_eq!(
            args.token_secret.expose_secret(),
            "0123456789abcdef0123456789abcdef"
        );
        assert_eq!(args.frontend_url, "http://localhost:3000");
        assert_eq!(args.verify_token_ttl_seconds, 120);
        assert_eq!(args.access_token_ttl_seconds, 86400);
        assert_eq!(args.session_ttl_seconds, 86400);
    }

    #[test]
    fn test_handler_memory_store_without_dsn() {
        let matches = commands::new().get_matches_from(vec![
            "blogga",
            "--memory-store",
            "--token-secret",
            "0123456789abcdef0123456789abcdef",
        ]);

        let Action::Server(args) = handler(&matches).expect("action");
        assert!(args.memory_store);
        assert_eq!(args.dsn, None);
    }
}
