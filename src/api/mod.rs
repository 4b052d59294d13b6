//! HTTP surface: router construction, middleware layers, and the server
//! entry point.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{delete, get, post, put},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

use crate::api::handlers::auth::AppState;
use crate::api::handlers::{auth, blogs, comments, health, users};

pub mod email;
pub mod error;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Connect the Postgres pool used by the production stores.
///
/// # Errors
///
/// Returns an error when the database is unreachable.
pub async fn connect_pool(dsn: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")
}

/// Build the full application router over `state`.
///
/// # Errors
///
/// Fails when the configured frontend base URL cannot be turned into a
/// CORS origin.
pub fn router(state: Arc<AppState>) -> Result<Router> {
    let origin = frontend_origin(state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true);

    let app = Router::new()
        .route("/health", get(health::health))
        // account lifecycle
        .route("/users/register", post(auth::register::register))
        .route("/users/login", post(auth::login::login))
        .route("/users/logout", post(auth::session::logout))
        .route("/users/verify-email", post(auth::verification::verify_email))
        .route(
            "/users/resend-verification",
            post(auth::verification::resend_verification),
        )
        // profile and settings
        .route("/users", get(users::list_users))
        .route("/users/name", get(users::name))
        .route(
            "/users/settings",
            get(users::settings).put(users::update_settings),
        )
        .route("/users/settings/email", put(users::update_email))
        .route("/users/settings/password", put(users::update_password))
        .route("/users/me", delete(users::delete_account))
        .route("/users/:id", get(users::public_profile))
        .route("/users/:id/status", put(users::update_tier))
        // content
        .route("/blogs", get(blogs::list_blogs).post(blogs::create_blog))
        .route(
            "/blogs/:short_id",
            get(blogs::get_blog)
                .put(blogs::update_blog)
                .delete(blogs::delete_blog),
        )
        .route(
            "/blogs/:short_id/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/blogs/:short_id/comments/:comment_id",
            delete(comments::delete_comment),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        );

    Ok(app)
}

/// Bind and serve until ctrl-c.
///
/// # Errors
///
/// Returns an error when the listener cannot bind or the server fails.
pub async fn serve(port: u16, state: Arc<AppState>) -> Result<()> {
    let app = router(state)?;
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontend_origin_strips_path() {
        let origin = frontend_origin("https://blogga.dev/app/").expect("origin");
        assert_eq!(origin.to_str().unwrap(), "https://blogga.dev");
    }

    #[test]
    fn test_frontend_origin_keeps_explicit_port() {
        let origin = frontend_origin("http://localhost:5173").expect("origin");
        assert_eq!(origin.to_str().unwrap(), "http://localhost:5173");
    }

    #[test]
    fn test_frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
        assert!(frontend_origin("mailto:someone@example.com").is_err());
    }
}
