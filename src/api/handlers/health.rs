//! Health endpoint backed by a store reachability probe.

use axum::body::Body;
use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

use super::auth::AppState;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    name: String,
    version: String,
    store: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store is reachable", body = Health),
        (status = 503, description = "Store is unreachable", body = Health)
    ),
    tag = "health"
)]
pub async fn health(method: Method, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let result = state.credentials().ping().await;
    if let Err(err) = &result {
        error!("store ping failed: {err}");
    }

    let health = Health {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: if result.is_ok() { "ok" } else { "error" }.to_string(),
    };

    // HEAD requests get the status and headers without a body.
    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let mut headers = HeaderMap::new();
    match format!("{}:{}", health.name, health.version).parse::<HeaderValue>() {
        Ok(value) => {
            debug!("x-app header: {value:?}");
            headers.insert("x-app", value);
        }
        Err(err) => error!("failed to build x-app header: {err}"),
    }

    if result.is_ok() {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}
