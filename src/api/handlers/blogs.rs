//! Blog CRUD, pagination, and the publish state machine.

use axum::extract::{Extension, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::{MIN_BLOG_BODY_LEN, MIN_TITLE_LEN};
use crate::domain::{generate_short_id, transition_effects, unix_now, BlogStatus};
use crate::store::{BlogChanges, BlogRecord, Credential, NewBlog, StoreError};

use super::auth::gates::{require_session, require_verified};
use super::auth::types::{
    BlogDetail, BlogListResponse, BlogSummary, CreateBlogRequest, ListBlogsQuery,
    UpdateBlogRequest,
};
use super::auth::AppState;

const DEFAULT_PER_PAGE: i64 = 5;
const MAX_PER_PAGE: i64 = 50;
const SHORT_ID_ATTEMPTS: usize = 5;

/// Resolve an author id to its display name, honoring the author's
/// preference. Deleted authors read as "[deleted]".
async fn author_name(state: &AppState, author_id: Uuid) -> Result<String, ApiError> {
    Ok(state
        .credentials()
        .find_by_id(author_id)
        .await?
        .map_or_else(|| "[deleted]".to_string(), |author| author.display_name()))
}

/// Like [`author_name`], but caches lookups across one listing.
async fn cached_author_name(
    state: &AppState,
    cache: &mut HashMap<Uuid, String>,
    author_id: Uuid,
) -> Result<String, ApiError> {
    if let Some(name) = cache.get(&author_id) {
        return Ok(name.clone());
    }
    let name = author_name(state, author_id).await?;
    cache.insert(author_id, name.clone());
    Ok(name)
}

/// Published blogs, newest first, with pagination meta.
///
/// A page past the end clamps to the last page rather than returning an
/// empty list, so stale pagination links stay useful.
#[utoipa::path(
    get,
    path = "/blogs",
    params(ListBlogsQuery),
    responses(
        (status = 200, description = "Published blogs", body = BlogListResponse)
    ),
    tag = "blogs"
)]
pub async fn list_blogs(
    state: Extension<Arc<AppState>>,
    query: Option<Query<ListBlogsQuery>>,
) -> Result<Json<BlogListResponse>, ApiError> {
    let query = query.map_or_else(ListBlogsQuery::default, |Query(query)| query);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let requested_page = query.page.unwrap_or(1).max(1);

    let total = i64::try_from(state.blogs().count_published().await?)
        .map_err(|_| ApiError::internal(anyhow::anyhow!("published count overflow")))?;
    let total_pages = if total == 0 {
        0
    } else {
        (total + per_page - 1) / per_page
    };
    let page = requested_page.min(total_pages.max(1));

    #[allow(clippy::cast_sign_loss)]
    let records = state
        .blogs()
        .list_published(((page - 1) * per_page) as u64, per_page as u64)
        .await?;

    let mut names = HashMap::new();
    let mut blogs = Vec::with_capacity(records.len());
    for record in &records {
        let name = cached_author_name(&state, &mut names, record.author_id).await?;
        blogs.push(BlogSummary::from_record(record, name));
    }

    Ok(Json(BlogListResponse {
        blogs,
        total,
        page,
        per_page,
        total_pages,
    }))
}

/// Create a blog as draft or published. Authors must be verified.
#[utoipa::path(
    post,
    path = "/blogs",
    request_body = CreateBlogRequest,
    responses(
        (status = 201, description = "Blog created", body = BlogSummary),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody),
        (status = 403, description = "Email not verified", body = crate::api::error::ErrorBody)
    ),
    tag = "blogs"
)]
pub async fn create_blog(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<CreateBlogRequest>>,
) -> Result<Response, ApiError> {
    let identity = require_session(&state, &headers).await?;
    require_verified(&identity)?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };
    let title = request.title.trim().to_string();
    if title.len() < MIN_TITLE_LEN {
        return Err(ApiError::bad_request("Title too short"));
    }
    if request.body.len() < MIN_BLOG_BODY_LEN {
        return Err(ApiError::bad_request("Body too short"));
    }

    // Short id collisions are rare; regenerate and retry a few times with
    // the store's unique constraint as the guard.
    let mut last_err = None;
    for _ in 0..SHORT_ID_ATTEMPTS {
        let result = state
            .blogs()
            .insert(NewBlog {
                short_id: generate_short_id(),
                title: title.clone(),
                body: request.body.clone(),
                author_id: identity.id,
                status: request.status,
            })
            .await;

        match result {
            Ok(record) => {
                info!(user_id = %identity.id, short_id = %record.short_id, "blog created");
                let summary = BlogSummary::from_record(&record, identity.display_name());
                return Ok((StatusCode::CREATED, Json(summary)).into_response());
            }
            Err(err @ StoreError::Conflict(_)) => last_err = Some(err),
            Err(err) => return Err(err.into()),
        }
    }

    Err(last_err
        .map_or_else(|| ApiError::internal(anyhow::anyhow!("short id retries exhausted")), Into::into))
}

/// Resolve the caller, treating an anonymous request as no identity rather
/// than a failure. Store errors still propagate.
async fn optional_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Credential>, ApiError> {
    match require_session(state, headers).await {
        Ok(identity) => Ok(Some(identity)),
        Err(ApiError::Unauthenticated) => Ok(None),
        Err(err) => Err(err),
    }
}

fn is_owner(record: &BlogRecord, viewer: Option<&Credential>) -> bool {
    viewer.is_some_and(|viewer| viewer.id == record.author_id)
}

/// One blog by short id. Drafts are visible only to their author and read
/// as missing to everyone else.
#[utoipa::path(
    get,
    path = "/blogs/{short_id}",
    params(("short_id" = String, Path, description = "Blog short id")),
    responses(
        (status = 200, description = "Blog", body = BlogDetail),
        (status = 404, description = "No such blog", body = crate::api::error::ErrorBody)
    ),
    tag = "blogs"
)]
pub async fn get_blog(
    Path(short_id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Json<BlogDetail>, ApiError> {
    let record = state
        .blogs()
        .find_by_short_id(&short_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let viewer = optional_identity(&state, &headers).await?;
    let owner = is_owner(&record, viewer.as_ref());

    if record.status == BlogStatus::Draft && !owner {
        return Err(ApiError::NotFound);
    }

    let name = author_name(&state, record.author_id).await?;
    Ok(Json(BlogDetail::from_record(&record, name, owner)))
}

/// Update a blog's content or status. Author only; timestamps follow the
/// publish state machine.
#[utoipa::path(
    put,
    path = "/blogs/{short_id}",
    params(("short_id" = String, Path, description = "Blog short id")),
    request_body = UpdateBlogRequest,
    responses(
        (status = 200, description = "Updated blog", body = BlogSummary),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not the author", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such blog", body = crate::api::error::ErrorBody)
    ),
    tag = "blogs"
)]
pub async fn update_blog(
    Path(short_id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<UpdateBlogRequest>>,
) -> Result<Json<BlogSummary>, ApiError> {
    let identity = require_session(&state, &headers).await?;
    let record = state
        .blogs()
        .find_by_short_id(&short_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if record.author_id != identity.id {
        return Err(ApiError::Forbidden);
    }

    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };
    if let Some(title) = &request.title {
        if title.trim().len() < MIN_TITLE_LEN {
            return Err(ApiError::bad_request("Title too short"));
        }
    }
    if let Some(body) = &request.body {
        if body.len() < MIN_BLOG_BODY_LEN {
            return Err(ApiError::bad_request("Body too short"));
        }
    }

    let content_changed = request
        .title
        .as_ref()
        .is_some_and(|title| title.trim() != record.title)
        || request.body.as_ref().is_some_and(|body| *body != record.body);
    let next_status = request.status.unwrap_or(record.status);
    let effects = transition_effects(
        record.status,
        next_status,
        record.published_at.is_some(),
        content_changed,
        unix_now(),
    );

    let updated = state
        .blogs()
        .update(
            record.id,
            BlogChanges {
                title: request.title.map(|title| title.trim().to_string()),
                body: request.body,
                status: Some(next_status),
                published_at: effects.set_published_at,
                last_edited: effects.set_last_edited,
            },
        )
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(user_id = %identity.id, short_id = %updated.short_id, "blog updated");
    Ok(Json(BlogSummary::from_record(
        &updated,
        identity.display_name(),
    )))
}

/// Delete a blog and its comments. Author or admin.
#[utoipa::path(
    delete,
    path = "/blogs/{short_id}",
    params(("short_id" = String, Path, description = "Blog short id")),
    responses(
        (status = 204, description = "Blog deleted"),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not the author or an admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such blog", body = crate::api::error::ErrorBody)
    ),
    tag = "blogs"
)]
pub async fn delete_blog(
    Path(short_id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    let identity = require_session(&state, &headers).await?;
    let record = state
        .blogs()
        .find_by_short_id(&short_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if record.author_id != identity.id && !identity.tier.is_admin() {
        return Err(ApiError::Forbidden);
    }

    state.comments().delete_for_blog(record.id).await?;
    state.blogs().delete(record.id).await?;

    info!(user_id = %identity.id, short_id = %record.short_id, "blog deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::auth::session::SESSION_COOKIE_NAME;
    use super::super::auth::testing::{mark_verified, memory_state, seed_user, set_tier};
    use super::super::auth::types::CreateBlogRequest;
    use super::*;
    use crate::store::UserTier;
    use axum::http::header::COOKIE;
    use axum::http::HeaderValue;

    const BODY: &str = "A body long enough to clear the fifty character minimum for blogs.";

    async fn session_headers(state: &AppState, id: Uuid) -> HeaderMap {
        let token = state.sessions().create(id).await.expect("session");
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={token}")).unwrap(),
        );
        headers
    }

    async fn verified_author(state: &AppState) -> (Uuid, HeaderMap) {
        let id = seed_user(state, "ada@example.com", "ada", "s3cret!pw").await;
        mark_verified(state, id).await;
        let headers = session_headers(state, id).await;
        (id, headers)
    }

    fn blog_payload(title: &str, status: BlogStatus) -> Option<Json<CreateBlogRequest>> {
        Some(Json(CreateBlogRequest {
            title: title.to_string(),
            body: BODY.to_string(),
            status,
        }))
    }

    async fn create(state: &Arc<AppState>, headers: &HeaderMap, title: &str, status: BlogStatus) -> String {
        let response = create_blog(
            headers.clone(),
            Extension(state.clone()),
            blog_payload(title, status),
        )
        .await
        .expect("create blog");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = super::super::auth::testing::body_json(response).await;
        body["short_id"].as_str().expect("short id").to_string()
    }

    #[tokio::test]
    async fn test_create_blog_requires_verified_author() {
        let state = Arc::new(memory_state());
        let id = seed_user(&state, "ada@example.com", "ada", "s3cret!pw").await;
        let headers = session_headers(&state, id).await;

        let err = create_blog(
            headers.clone(),
            Extension(state.clone()),
            blog_payload("My first post", BlogStatus::Draft),
        )
        .await
        .expect_err("unverified author");
        assert!(matches!(err, ApiError::Unverified));

        mark_verified(&state, id).await;
        let short_id = create(&state, &headers, "My first post", BlogStatus::Draft).await;
        assert_eq!(short_id.len(), crate::domain::SHORT_ID_LEN);
    }

    #[tokio::test]
    async fn test_create_blog_validates_lengths() {
        let state = Arc::new(memory_state());
        let (_, headers) = verified_author(&state).await;

        let err = create_blog(
            headers.clone(),
            Extension(state.clone()),
            blog_payload("ab", BlogStatus::Draft),
        )
        .await
        .expect_err("short title");
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = create_blog(
            headers,
            Extension(state),
            Some(Json(CreateBlogRequest {
                title: "Valid title".to_string(),
                body: "too short".to_string(),
                status: BlogStatus::Draft,
            })),
        )
        .await
        .expect_err("short body");
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_published_blog_is_publicly_readable() {
        let state = Arc::new(memory_state());
        let (_, headers) = verified_author(&state).await;
        let short_id = create(&state, &headers, "Hello world", BlogStatus::Published).await;

        let detail = get_blog(
            Path(short_id),
            HeaderMap::new(),
            Extension(state),
        )
        .await
        .expect("public read");
        assert_eq!(detail.title, "Hello world");
        assert_eq!(detail.author, "ada");
        assert!(!detail.is_owner);
        assert!(detail.published_at.is_some());
    }

    #[tokio::test]
    async fn test_draft_is_visible_only_to_its_author() {
        let state = Arc::new(memory_state());
        let (_, headers) = verified_author(&state).await;
        let short_id = create(&state, &headers, "Work in progress", BlogStatus::Draft).await;

        let err = get_blog(
            Path(short_id.clone()),
            HeaderMap::new(),
            Extension(state.clone()),
        )
        .await
        .expect_err("anonymous draft read");
        assert!(matches!(err, ApiError::NotFound));

        let other = seed_user(&state, "eve@example.com", "eve", "s3cret!pw").await;
        let other_headers = session_headers(&state, other).await;
        let err = get_blog(Path(short_id.clone()), other_headers, Extension(state.clone()))
            .await
            .expect_err("foreign draft read");
        assert!(matches!(err, ApiError::NotFound));

        let detail = get_blog(Path(short_id), headers, Extension(state))
            .await
            .expect("author draft read");
        assert!(detail.is_owner);
    }

    #[tokio::test]
    async fn test_list_blogs_paginates_and_clamps() {
        let state = Arc::new(memory_state());
        let (_, headers) = verified_author(&state).await;
        for n in 0..7 {
            create(&state, &headers, &format!("Post {n}"), BlogStatus::Published).await;
        }
        create(&state, &headers, "Hidden draft", BlogStatus::Draft).await;

        let listing = list_blogs(
            Extension(state.clone()),
            Some(Query(ListBlogsQuery {
                page: Some(1),
                per_page: Some(5),
            })),
        )
        .await
        .expect("page 1");
        assert_eq!(listing.total, 7);
        assert_eq!(listing.total_pages, 2);
        assert_eq!(listing.blogs.len(), 5);

        let listing = list_blogs(
            Extension(state.clone()),
            Some(Query(ListBlogsQuery {
                page: Some(2),
                per_page: Some(5),
            })),
        )
        .await
        .expect("page 2");
        assert_eq!(listing.blogs.len(), 2);

        // Past the end clamps to the last page.
        let listing = list_blogs(
            Extension(state.clone()),
            Some(Query(ListBlogsQuery {
                page: Some(99),
                per_page: Some(5),
            })),
        )
        .await
        .expect("clamped page");
        assert_eq!(listing.page, 2);
        assert_eq!(listing.blogs.len(), 2);

        // Defaults: page 1, five per page.
        let listing = list_blogs(Extension(state), None).await.expect("defaults");
        assert_eq!(listing.page, 1);
        assert_eq!(listing.per_page, 5);
    }

    #[tokio::test]
    async fn test_list_blogs_empty_store() {
        let state = Arc::new(memory_state());
        let listing = list_blogs(Extension(state), None).await.expect("empty");
        assert_eq!(listing.total, 0);
        assert_eq!(listing.total_pages, 0);
        assert_eq!(listing.page, 1);
        assert!(listing.blogs.is_empty());
    }

    #[tokio::test]
    async fn test_update_blog_first_publish_sets_published_at() {
        let state = Arc::new(memory_state());
        let (_, headers) = verified_author(&state).await;
        let short_id = create(&state, &headers, "Draft first", BlogStatus::Draft).await;

        let updated = update_blog(
            Path(short_id.clone()),
            headers.clone(),
            Extension(state.clone()),
            Some(Json(UpdateBlogRequest {
                status: Some(BlogStatus::Published),
                ..UpdateBlogRequest::default()
            })),
        )
        .await
        .expect("publish");
        let first_published_at = updated.published_at.expect("published_at");
        assert_eq!(updated.last_edited, None);

        // Unpublish, then publish again: the original timestamp survives.
        update_blog(
            Path(short_id.clone()),
            headers.clone(),
            Extension(state.clone()),
            Some(Json(UpdateBlogRequest {
                status: Some(BlogStatus::Draft),
                ..UpdateBlogRequest::default()
            })),
        )
        .await
        .expect("unpublish");
        let republished = update_blog(
            Path(short_id),
            headers,
            Extension(state),
            Some(Json(UpdateBlogRequest {
                status: Some(BlogStatus::Published),
                ..UpdateBlogRequest::default()
            })),
        )
        .await
        .expect("republish");
        assert_eq!(republished.published_at, Some(first_published_at));
    }

    #[tokio::test]
    async fn test_update_blog_edit_while_published_sets_last_edited() {
        let state = Arc::new(memory_state());
        let (_, headers) = verified_author(&state).await;
        let short_id = create(&state, &headers, "Live post", BlogStatus::Published).await;

        let updated = update_blog(
            Path(short_id),
            headers,
            Extension(state),
            Some(Json(UpdateBlogRequest {
                body: Some(format!("{BODY} Now with an edit.")),
                ..UpdateBlogRequest::default()
            })),
        )
        .await
        .expect("edit");
        assert!(updated.last_edited.is_some());
    }

    #[tokio::test]
    async fn test_update_blog_is_author_only() {
        let state = Arc::new(memory_state());
        let (_, headers) = verified_author(&state).await;
        let short_id = create(&state, &headers, "Mine", BlogStatus::Published).await;

        let other = seed_user(&state, "eve@example.com", "eve", "s3cret!pw").await;
        let other_headers = session_headers(&state, other).await;
        let err = update_blog(
            Path(short_id),
            other_headers,
            Extension(state),
            Some(Json(UpdateBlogRequest {
                title: Some("Stolen".to_string()),
                ..UpdateBlogRequest::default()
            })),
        )
        .await
        .expect_err("foreign update");
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[tokio::test]
    async fn test_delete_blog_author_or_admin() {
        let state = Arc::new(memory_state());
        let (_, headers) = verified_author(&state).await;
        let short_id = create(&state, &headers, "Expendable", BlogStatus::Published).await;

        let other = seed_user(&state, "eve@example.com", "eve", "s3cret!pw").await;
        let other_headers = session_headers(&state, other).await;
        let err = delete_blog(
            Path(short_id.clone()),
            other_headers.clone(),
            Extension(state.clone()),
        )
        .await
        .expect_err("member delete");
        assert!(matches!(err, ApiError::Forbidden));

        set_tier(&state, other, UserTier::Admin).await;
        let status = delete_blog(Path(short_id.clone()), other_headers, Extension(state.clone()))
            .await
            .expect("admin delete");
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state
            .blogs()
            .find_by_short_id(&short_id)
            .await
            .expect("lookup")
            .is_none());
    }
}
