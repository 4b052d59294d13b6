//! Store contracts: credentials, sessions, blogs, comments.
//!
//! Handlers depend on these traits only; `memory` backs tests and the
//! `--memory-store` mode, `postgres` is the production implementation.
//! Uniqueness lives here: handler pre-checks shape friendly errors, but a
//! store insert is the correctness boundary and reports the conflicting
//! field.

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::BlogStatus;

pub mod memory;
pub mod postgres;

/// Account tier of a credential. Stored and serialized lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    Member,
    Admin,
}

impl UserTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "member" => Some(Self::Member),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Per-user display preferences. Both flags default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Preferences {
    pub dark_mode: bool,
    pub display_real_name: bool,
}

/// Persisted user identity. The password digest is a bcrypt string and is
/// never returned by the HTTP surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub tier: UserTier,
    pub verified: bool,
    pub preferences: Preferences,
    pub created_at: i64,
}

impl Credential {
    /// Name shown next to this user's content, per their preference.
    #[must_use]
    pub fn display_name(&self) -> String {
        crate::domain::display_name(
            &self.first_name,
            &self.last_name,
            &self.username,
            self.preferences.display_real_name,
        )
    }
}

/// Input for credential creation. The store assigns the id and creation
/// time; new accounts start as unverified members with default preferences.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

/// Partial credential update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct CredentialChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub tier: Option<UserTier>,
    pub verified: Option<bool>,
    pub dark_mode: Option<bool>,
    pub display_real_name: Option<bool>,
}

/// Persisted blog entry. `published_at` is set on the first publish and
/// survives a later return to draft; `last_edited` tracks content changes
/// made while published.
#[derive(Debug, Clone, PartialEq)]
pub struct BlogRecord {
    pub id: Uuid,
    pub short_id: String,
    pub title: String,
    pub body: String,
    pub author_id: Uuid,
    pub status: BlogStatus,
    pub created_at: i64,
    pub published_at: Option<i64>,
    pub last_edited: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewBlog {
    pub short_id: String,
    pub title: String,
    pub body: String,
    pub author_id: Uuid,
    pub status: BlogStatus,
}

/// Partial blog update. Timestamps here are only ever set, never cleared.
#[derive(Debug, Clone, Default)]
pub struct BlogChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<BlogStatus>,
    pub published_at: Option<i64>,
    pub last_edited: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub blog_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
}

/// Field behind a uniqueness conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Email,
    Username,
    ShortId,
}

impl std::fmt::Display for ConflictField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Username => write!(f, "username"),
            Self::ShortId => write!(f, "short id"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already taken")]
    Conflict(ConflictField),
    #[error("store unavailable")]
    Unavailable(#[source] anyhow::Error),
}

impl StoreError {
    pub(crate) fn unavailable<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Unavailable(err.into())
    }
}

/// Credential persistence. Email lookups are case-insensitive; callers
/// normalize to lowercase before storage so lookups stay index-friendly.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Credential>, StoreError>;

    /// Inserts a new credential. A uniqueness violation surfaces as
    /// [`StoreError::Conflict`] naming the offending field.
    async fn insert(&self, new: NewCredential) -> Result<Credential, StoreError>;

    /// Applies a partial update, returning the updated credential or `None`
    /// when the id no longer exists.
    async fn update_fields(
        &self,
        id: Uuid,
        changes: CredentialChanges,
    ) -> Result<Option<Credential>, StoreError>;

    /// Deletes a credential. Deleting an absent id is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// All credentials, newest first. Admin surface only.
    async fn list(&self) -> Result<Vec<Credential>, StoreError>;

    /// Cheap reachability probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Server-side sessions with a rolling expiry window.
///
/// `create` returns the raw session token exactly once; implementations
/// persist only its SHA-256 hash.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: Uuid) -> Result<String, StoreError>;

    /// Resolves a raw session token to its user id and renews the expiry
    /// window. Expired or unknown tokens resolve to `None`.
    async fn resolve(&self, session_token: &str) -> Result<Option<Uuid>, StoreError>;

    /// Destroys a session. Idempotent: destroying an absent or already
    /// destroyed session succeeds.
    async fn destroy(&self, session_token: &str) -> Result<(), StoreError>;

    /// Destroys every session belonging to `user_id` (account deletion).
    async fn destroy_for_user(&self, user_id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BlogStore: Send + Sync {
    /// Inserts a blog. A short id collision surfaces as
    /// [`StoreError::Conflict`] so callers can regenerate and retry.
    async fn insert(&self, blog: NewBlog) -> Result<BlogRecord, StoreError>;

    async fn find_by_short_id(&self, short_id: &str) -> Result<Option<BlogRecord>, StoreError>;

    /// Published blogs, newest first (id ascending as tiebreak).
    async fn list_published(&self, offset: u64, limit: u64)
        -> Result<Vec<BlogRecord>, StoreError>;

    async fn count_published(&self) -> Result<u64, StoreError>;

    /// Blogs by one author, newest first, optionally including drafts.
    async fn list_by_author(
        &self,
        author_id: Uuid,
        include_drafts: bool,
    ) -> Result<Vec<BlogRecord>, StoreError>;

    async fn update(&self, id: Uuid, changes: BlogChanges)
        -> Result<Option<BlogRecord>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn delete_by_author(&self, author_id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(&self, comment: NewComment) -> Result<CommentRecord, StoreError>;

    /// Comments on one blog, oldest first.
    async fn list_for_blog(&self, blog_id: Uuid) -> Result<Vec<CommentRecord>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn delete_for_blog(&self, blog_id: Uuid) -> Result<(), StoreError>;

    async fn delete_by_author(&self, author_id: Uuid) -> Result<(), StoreError>;
}

/// Generates a 256-bit URL-safe session token.
///
/// # Errors
///
/// Returns [`StoreError::Unavailable`] when the OS RNG fails.
pub(crate) fn generate_session_token() -> Result<String, StoreError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| StoreError::unavailable(anyhow::anyhow!("rng failure: {err}")))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Digest stored in place of the raw session token.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
