//! Comments on published blogs.

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::domain::BlogStatus;
use crate::store::{BlogRecord, NewComment};

use super::auth::gates::require_session;
use super::auth::types::{CommentResponse, CreateCommentRequest};
use super::auth::AppState;

/// Fetch the blog behind a comment route. Drafts read as missing to
/// everyone but their author, same as the blog routes.
async fn readable_blog(
    state: &AppState,
    short_id: &str,
    viewer: Option<Uuid>,
) -> Result<BlogRecord, ApiError> {
    let record = state
        .blogs()
        .find_by_short_id(short_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if record.status == BlogStatus::Draft && viewer != Some(record.author_id) {
        return Err(ApiError::NotFound);
    }
    Ok(record)
}

/// Comments on one blog, oldest first.
#[utoipa::path(
    get,
    path = "/blogs/{short_id}/comments",
    params(("short_id" = String, Path, description = "Blog short id")),
    responses(
        (status = 200, description = "Comments", body = [CommentResponse]),
        (status = 404, description = "No such blog", body = crate::api::error::ErrorBody)
    ),
    tag = "comments"
)]
pub async fn list_comments(
    Path(short_id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let viewer = match require_session(&state, &headers).await {
        Ok(identity) => Some(identity.id),
        Err(ApiError::Unauthenticated) => None,
        Err(err) => return Err(err),
    };
    let blog = readable_blog(&state, &short_id, viewer).await?;

    let records = state.comments().list_for_blog(blog.id).await?;
    let mut names: HashMap<Uuid, String> = HashMap::new();
    let mut comments = Vec::with_capacity(records.len());
    for record in &records {
        let name = match names.get(&record.author_id) {
            Some(name) => name.clone(),
            None => {
                let name = state
                    .credentials()
                    .find_by_id(record.author_id)
                    .await?
                    .map_or_else(|| "[deleted]".to_string(), |author| author.display_name());
                names.insert(record.author_id, name.clone());
                name
            }
        };
        comments.push(CommentResponse::from_record(record, name));
    }

    Ok(Json(comments))
}

/// Add a comment. Any signed-in user may comment on a published blog.
#[utoipa::path(
    post,
    path = "/blogs/{short_id}/comments",
    params(("short_id" = String, Path, description = "Blog short id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such blog", body = crate::api::error::ErrorBody)
    ),
    tag = "comments"
)]
pub async fn create_comment(
    Path(short_id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<CreateCommentRequest>>,
) -> Result<Response, ApiError> {
    let identity = require_session(&state, &headers).await?;
    let blog = readable_blog(&state, &short_id, Some(identity.id)).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };
    let body = request.body.trim().to_string();
    if body.is_empty() {
        return Err(ApiError::bad_request("Missing comment body"));
    }

    let record = state
        .comments()
        .insert(NewComment {
            blog_id: blog.id,
            author_id: identity.id,
            body,
        })
        .await?;

    info!(user_id = %identity.id, short_id = %blog.short_id, "comment created");
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse::from_record(&record, identity.display_name())),
    )
        .into_response())
}

/// Remove a comment. Comment author or admin.
#[utoipa::path(
    delete,
    path = "/blogs/{short_id}/comments/{comment_id}",
    params(
        ("short_id" = String, Path, description = "Blog short id"),
        ("comment_id" = String, Path, description = "Comment id")
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not the author or an admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such blog or comment", body = crate::api::error::ErrorBody)
    ),
    tag = "comments"
)]
pub async fn delete_comment(
    Path((short_id, comment_id)): Path<(String, String)>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    let identity = require_session(&state, &headers).await?;
    let blog = readable_blog(&state, &short_id, Some(identity.id)).await?;

    let comment_id = Uuid::parse_str(&comment_id).map_err(|_| ApiError::NotFound)?;
    let comment = state
        .comments()
        .find_by_id(comment_id)
        .await?
        .filter(|comment| comment.blog_id == blog.id)
        .ok_or(ApiError::NotFound)?;

    if comment.author_id != identity.id && !identity.tier.is_admin() {
        return Err(ApiError::Forbidden);
    }

    state.comments().delete(comment.id).await?;
    info!(user_id = %identity.id, short_id = %blog.short_id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
