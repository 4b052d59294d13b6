//! `OpenAPI` document covering every routed endpoint. Dumped as JSON by the
//! `openapi` binary.

use utoipa::OpenApi;

use crate::api::error::ErrorBody;
use crate::api::handlers::auth::types::{
    BlogDetail, BlogListResponse, BlogSummary, CommentResponse, CreateBlogRequest,
    CreateCommentRequest, IdentityResponse, LoginRequest, LoginResponse, MessageResponse,
    NameResponse, PublicProfileResponse, RegisterRequest, RegisterResponse, SettingsResponse,
    UpdateBlogRequest, UpdateEmailRequest, UpdatePasswordRequest, UpdateSettingsRequest,
    UpdateTierRequest, VerificationMailResponse, VerifyEmailRequest,
};
use crate::api::handlers::health::Health;
use crate::domain::BlogStatus;
use crate::store::UserTier;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "blogga",
        description = "Multi-tenant blog platform backend",
        license(name = "BSD-3-Clause", identifier = "BSD-3-Clause")
    ),
    paths(
        crate::api::handlers::health::health,
        crate::api::handlers::auth::register::register,
        crate::api::handlers::auth::login::login,
        crate::api::handlers::auth::session::logout,
        crate::api::handlers::auth::verification::verify_email,
        crate::api::handlers::auth::verification::resend_verification,
        crate::api::handlers::users::name,
        crate::api::handlers::users::settings,
        crate::api::handlers::users::update_settings,
        crate::api::handlers::users::update_email,
        crate::api::handlers::users::update_password,
        crate::api::handlers::users::delete_account,
        crate::api::handlers::users::public_profile,
        crate::api::handlers::users::list_users,
        crate::api::handlers::users::update_tier,
        crate::api::handlers::blogs::list_blogs,
        crate::api::handlers::blogs::create_blog,
        crate::api::handlers::blogs::get_blog,
        crate::api::handlers::blogs::update_blog,
        crate::api::handlers::blogs::delete_blog,
        crate::api::handlers::comments::list_comments,
        crate::api::handlers::comments::create_comment,
        crate::api::handlers::comments::delete_comment,
    ),
    components(schemas(
        ErrorBody,
        Health,
        RegisterRequest,
        RegisterResponse,
        LoginRequest,
        LoginResponse,
        IdentityResponse,
        VerifyEmailRequest,
        VerificationMailResponse,
        MessageResponse,
        NameResponse,
        SettingsResponse,
        UpdateSettingsRequest,
        UpdateEmailRequest,
        UpdatePasswordRequest,
        UpdateTierRequest,
        PublicProfileResponse,
        CreateBlogRequest,
        UpdateBlogRequest,
        BlogSummary,
        BlogDetail,
        BlogListResponse,
        CreateCommentRequest,
        CommentResponse,
        UserTier,
        BlogStatus,
    )),
    tags(
        (name = "health", description = "Liveness and store reachability"),
        (name = "users", description = "Accounts, sessions, and email verification"),
        (name = "admin", description = "Admin-gated account management"),
        (name = "blogs", description = "Blog authoring and reading"),
        (name = "comments", description = "Comments on published blogs"),
    )
)]
struct ApiDoc;

/// The generated `OpenAPI` document.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_covers_the_routed_surface() {
        let doc = openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/health",
            "/users/register",
            "/users/login",
            "/users/logout",
            "/users/verify-email",
            "/users/resend-verification",
            "/users",
            "/users/name",
            "/users/settings",
            "/users/settings/email",
            "/users/settings/password",
            "/users/me",
            "/users/{id}",
            "/users/{id}/status",
            "/blogs",
            "/blogs/{short_id}",
            "/blogs/{short_id}/comments",
            "/blogs/{short_id}/comments/{comment_id}",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }

    #[test]
    fn test_openapi_serializes_to_json() {
        let json = serde_json::to_value(openapi()).expect("serialize");
        assert_eq!(json["info"]["title"], "blogga");
        assert!(json["components"]["schemas"]["LoginResponse"].is_object());
    }
}
