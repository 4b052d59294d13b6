//! Request/response types for the account and content endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::BlogStatus;
use crate::store::{BlogRecord, CommentRecord, Credential, UserTier};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Credential projection safe to return to its owner. Never carries the
/// password hash.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct IdentityResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub tier: UserTier,
    pub verified: bool,
    pub created_at: i64,
}

impl IdentityResponse {
    pub(crate) fn from_credential(credential: &Credential) -> Self {
        Self {
            id: credential.id.to_string(),
            email: credential.email.clone(),
            username: credential.username.clone(),
            first_name: credential.first_name.clone(),
            last_name: credential.last_name.clone(),
            tier: credential.tier,
            verified: credential.verified,
            created_at: credential.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub user: IdentityResponse,
    /// Delivery is best-effort; a false value means the account exists but
    /// the activation mail needs a resend.
    pub verification_mail_sent: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub user: IdentityResponse,
    pub token: String,
    pub expires_at: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerificationMailResponse {
    pub verification_mail_sent: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct NameResponse {
    pub first_name: String,
    pub last_name: String,
    pub verified: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SettingsResponse {
    pub dark_mode: bool,
    pub display_real_name: bool,
}

/// Partial preferences update. Omitted fields keep their value.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct UpdateSettingsRequest {
    pub dark_mode: Option<bool>,
    pub display_real_name: Option<bool>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdateEmailRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdateTierRequest {
    pub tier: UserTier,
}

/// What anyone may see about an account.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PublicProfileResponse {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub member_since: i64,
}

impl PublicProfileResponse {
    pub(crate) fn from_credential(credential: &Credential) -> Self {
        Self {
            id: credential.id.to_string(),
            username: credential.username.clone(),
            display_name: credential.display_name(),
            member_since: credential.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateBlogRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub status: BlogStatus,
}

/// Partial blog update. Omitted fields keep their value.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct UpdateBlogRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<BlogStatus>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BlogSummary {
    pub short_id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub author_id: String,
    pub status: BlogStatus,
    pub created_at: i64,
    pub published_at: Option<i64>,
    pub last_edited: Option<i64>,
}

impl BlogSummary {
    pub(crate) fn from_record(blog: &BlogRecord, author_name: String) -> Self {
        Self {
            short_id: blog.short_id.clone(),
            title: blog.title.clone(),
            body: blog.body.clone(),
            author: author_name,
            author_id: blog.author_id.to_string(),
            status: blog.status,
            created_at: blog.created_at,
            published_at: blog.published_at,
            last_edited: blog.last_edited,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BlogDetail {
    pub short_id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub author_id: String,
    pub status: BlogStatus,
    pub created_at: i64,
    pub published_at: Option<i64>,
    pub last_edited: Option<i64>,
    /// True when the request is authenticated as the blog's author.
    pub is_owner: bool,
}

impl BlogDetail {
    pub(crate) fn from_record(blog: &BlogRecord, author_name: String, is_owner: bool) -> Self {
        Self {
            short_id: blog.short_id.clone(),
            title: blog.title.clone(),
            body: blog.body.clone(),
            author: author_name,
            author_id: blog.author_id.to_string(),
            status: blog.status,
            created_at: blog.created_at,
            published_at: blog.published_at,
            last_edited: blog.last_edited,
            is_owner,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BlogListResponse {
    pub blogs: Vec<BlogSummary>,
    pub total: i64,
    /// Requested page after clamping to the last available page.
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct ListBlogsQuery {
    /// 1-based page number.
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateCommentRequest {
    pub body: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CommentResponse {
    pub id: String,
    pub author: String,
    pub author_id: String,
    pub body: String,
    pub created_at: i64,
}

impl CommentResponse {
    pub(crate) fn from_record(comment: &CommentRecord, author_name: String) -> Self {
        Self {
            id: comment.id.to_string(),
            author: author_name,
            author_id: comment.author_id.to_string(),
            body: comment.body.clone(),
            created_at: comment.created_at,
        }
    }
}
