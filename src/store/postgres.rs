//! Postgres store implementations.
//!
//! Schema lives in `sql/schema.sql`. Timestamps are unix seconds in BIGINT
//! columns and always come from the application clock, so session expiry
//! math never mixes clock sources.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::{unix_now, BlogStatus};

use super::{
    generate_session_token, hash_session_token, BlogChanges, BlogRecord, BlogStore, CommentRecord,
    CommentStore, ConflictField, Credential, CredentialChanges, CredentialStore, NewBlog,
    NewComment, NewCredential, Preferences, SessionStore, StoreError, UserTier,
};

const SESSION_INSERT_ATTEMPTS: usize = 3;

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgSessionStore {
    pool: PgPool,
    ttl_seconds: i64,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool, ttl_seconds: i64) -> Self {
        Self { pool, ttl_seconds }
    }
}

pub struct PgBlogStore {
    pool: PgPool,
}

impl PgBlogStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a unique violation (SQLSTATE 23505) to the field behind it, going by
/// the constraint names declared in `sql/schema.sql`.
fn conflict_field(err: &sqlx::Error) -> Option<ConflictField> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    match db_err.constraint() {
        Some("users_email_key") => Some(ConflictField::Email),
        Some("users_username_key") => Some(ConflictField::Username),
        Some("blogs_short_id_key") => Some(ConflictField::ShortId),
        _ => None,
    }
}

fn db_unavailable(err: sqlx::Error, what: &'static str) -> StoreError {
    StoreError::Unavailable(anyhow::Error::new(err).context(what))
}

fn credential_from_row(row: &sqlx::postgres::PgRow) -> Result<Credential, StoreError> {
    let tier_raw: String = row.get("tier");
    let tier = UserTier::parse(&tier_raw)
        .ok_or_else(|| StoreError::unavailable(anyhow::anyhow!("unknown tier: {tier_raw}")))?;

    Ok(Credential {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        tier,
        verified: row.get("verified"),
        preferences: Preferences {
            dark_mode: row.get("dark_mode"),
            display_real_name: row.get("display_real_name"),
        },
        created_at: row.get("created_at"),
    })
}

fn blog_from_row(row: &sqlx::postgres::PgRow) -> Result<BlogRecord, StoreError> {
    let status_raw: String = row.get("status");
    let status = BlogStatus::parse(&status_raw).ok_or_else(|| {
        StoreError::unavailable(anyhow::anyhow!("unknown blog status: {status_raw}"))
    })?;

    Ok(BlogRecord {
        id: row.get("id"),
        short_id: row.get("short_id"),
        title: row.get("title"),
        body: row.get("body"),
        author_id: row.get("author_id"),
        status,
        created_at: row.get("created_at"),
        published_at: row.get("published_at"),
        last_edited: row.get("last_edited"),
    })
}

fn comment_from_row(row: &sqlx::postgres::PgRow) -> CommentRecord {
    CommentRecord {
        id: row.get("id"),
        blog_id: row.get("blog_id"),
        author_id: row.get("author_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        let query = r"
            SELECT id, email, username, password_hash, first_name, last_name,
                   tier, verified, dark_mode, display_real_name, created_at
            FROM users
            WHERE LOWER(email) = LOWER($1)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to lookup credential by email"))?;

        row.as_ref().map(credential_from_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let query = r"
            SELECT id, email, username, password_hash, first_name, last_name,
                   tier, verified, dark_mode, display_real_name, created_at
            FROM users
            WHERE username = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to lookup credential by username"))?;

        row.as_ref().map(credential_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Credential>, StoreError> {
        let query = r"
            SELECT id, email, username, password_hash, first_name, last_name,
                   tier, verified, dark_mode, display_real_name, created_at
            FROM users
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to lookup credential by id"))?;

        row.as_ref().map(credential_from_row).transpose()
    }

    async fn insert(&self, new: NewCredential) -> Result<Credential, StoreError> {
        let query = r"
            INSERT INTO users
                (email, username, password_hash, first_name, last_name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, username, password_hash, first_name, last_name,
                      tier, verified, dark_mode, display_real_name, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&new.email)
            .bind(&new.username)
            .bind(&new.password_hash)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(unix_now())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| match conflict_field(&err) {
                Some(field) => StoreError::Conflict(field),
                None => db_unavailable(err, "failed to insert credential"),
            })?;

        credential_from_row(&row)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        changes: CredentialChanges,
    ) -> Result<Option<Credential>, StoreError> {
        let query = r"
            UPDATE users SET
                email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                tier = COALESCE($6, tier),
                verified = COALESCE($7, verified),
                dark_mode = COALESCE($8, dark_mode),
                display_real_name = COALESCE($9, display_real_name)
            WHERE id = $1
            RETURNING id, email, username, password_hash, first_name, last_name,
                      tier, verified, dark_mode, display_real_name, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(changes.email)
            .bind(changes.password_hash)
            .bind(changes.first_name)
            .bind(changes.last_name)
            .bind(changes.tier.map(UserTier::as_str))
            .bind(changes.verified)
            .bind(changes.dark_mode)
            .bind(changes.display_real_name)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| match conflict_field(&err) {
                Some(field) => StoreError::Conflict(field),
                None => db_unavailable(err, "failed to update credential"),
            })?;

        row.as_ref().map(credential_from_row).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to delete credential"))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Credential>, StoreError> {
        let query = r"
            SELECT id, email, username, password_hash, first_name, last_name,
                   tier, verified, dark_mode, display_real_name, created_at
            FROM users
            ORDER BY created_at DESC, id ASC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to list credentials"))?;

        rows.iter().map(credential_from_row).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let query = "SELECT 1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to ping store"))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, user_id: Uuid) -> Result<String, StoreError> {
        let query = r"
            INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
        ";

        // Retried on the astronomically unlikely hash collision so a raw
        // token is never bound to someone else's row.
        for _ in 0..SESSION_INSERT_ATTEMPTS {
            let token = generate_session_token()?;
            let now = unix_now();
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = query
            );
            let inserted = sqlx::query(query)
                .bind(hash_session_token(&token))
                .bind(user_id)
                .bind(now)
                .bind(now + self.ttl_seconds)
                .execute(&self.pool)
                .instrument(span)
                .await;

            match inserted {
                Ok(_) => return Ok(token),
                Err(err) if is_unique_violation(&err) => continue,
                Err(err) => return Err(db_unavailable(err, "failed to insert session")),
            }
        }

        Err(StoreError::unavailable(anyhow::anyhow!(
            "session token collision after {SESSION_INSERT_ATTEMPTS} attempts"
        )))
    }

    async fn resolve(&self, session_token: &str) -> Result<Option<Uuid>, StoreError> {
        // Single statement: renewal and expiry check stay atomic.
        let query = r"
            UPDATE sessions
            SET expires_at = $2
            WHERE token_hash = $1 AND expires_at > $3
            RETURNING user_id
        ";
        let now = unix_now();
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(hash_session_token(session_token))
            .bind(now + self.ttl_seconds)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to resolve session"))?;

        Ok(row.map(|row| row.get("user_id")))
    }

    async fn destroy(&self, session_token: &str) -> Result<(), StoreError> {
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(hash_session_token(session_token))
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to destroy session"))?;
        Ok(())
    }

    async fn destroy_for_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM sessions WHERE user_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to destroy user sessions"))?;
        Ok(())
    }
}

#[async_trait]
impl BlogStore for PgBlogStore {
    async fn insert(&self, blog: NewBlog) -> Result<BlogRecord, StoreError> {
        let query = r"
            INSERT INTO blogs
                (short_id, title, body, author_id, status, created_at, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, short_id, title, body, author_id, status,
                      created_at, published_at, last_edited
        ";
        let now = unix_now();
        let published_at = (blog.status == BlogStatus::Published).then_some(now);
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&blog.short_id)
            .bind(&blog.title)
            .bind(&blog.body)
            .bind(blog.author_id)
            .bind(blog.status.as_str())
            .bind(now)
            .bind(published_at)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| match conflict_field(&err) {
                Some(field) => StoreError::Conflict(field),
                None => db_unavailable(err, "failed to insert blog"),
            })?;

        blog_from_row(&row)
    }

    async fn find_by_short_id(&self, short_id: &str) -> Result<Option<BlogRecord>, StoreError> {
        let query = r"
            SELECT id, short_id, title, body, author_id, status,
                   created_at, published_at, last_edited
            FROM blogs
            WHERE short_id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(short_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to lookup blog"))?;

        row.as_ref().map(blog_from_row).transpose()
    }

    async fn list_published(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<BlogRecord>, StoreError> {
        let query = r"
            SELECT id, short_id, title, body, author_id, status,
                   created_at, published_at, last_edited
            FROM blogs
            WHERE status = 'published'
            ORDER BY created_at DESC, id ASC
            LIMIT $1 OFFSET $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to list published blogs"))?;

        rows.iter().map(blog_from_row).collect()
    }

    async fn count_published(&self) -> Result<u64, StoreError> {
        let query = "SELECT COUNT(*) AS total FROM blogs WHERE status = 'published'";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to count published blogs"))?;

        let total: i64 = row.get("total");
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
        include_drafts: bool,
    ) -> Result<Vec<BlogRecord>, StoreError> {
        let query = r"
            SELECT id, short_id, title, body, author_id, status,
                   created_at, published_at, last_edited
            FROM blogs
            WHERE author_id = $1 AND (status = 'published' OR $2)
            ORDER BY created_at DESC, id ASC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(author_id)
            .bind(include_drafts)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to list author blogs"))?;

        rows.iter().map(blog_from_row).collect()
    }

    async fn update(
        &self,
        id: Uuid,
        changes: BlogChanges,
    ) -> Result<Option<BlogRecord>, StoreError> {
        let query = r"
            UPDATE blogs SET
                title = COALESCE($2, title),
                body = COALESCE($3, body),
                status = COALESCE($4, status),
                published_at = COALESCE($5, published_at),
                last_edited = COALESCE($6, last_edited)
            WHERE id = $1
            RETURNING id, short_id, title, body, author_id, status,
                      created_at, published_at, last_edited
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(changes.title)
            .bind(changes.body)
            .bind(changes.status.map(BlogStatus::as_str))
            .bind(changes.published_at)
            .bind(changes.last_edited)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to update blog"))?;

        row.as_ref().map(blog_from_row).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM blogs WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to delete blog"))?;
        Ok(())
    }

    async fn delete_by_author(&self, author_id: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM blogs WHERE author_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(author_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to delete author blogs"))?;
        Ok(())
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn insert(&self, comment: NewComment) -> Result<CommentRecord, StoreError> {
        let query = r"
            INSERT INTO comments (blog_id, author_id, body, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, blog_id, author_id, body, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(comment.blog_id)
            .bind(comment.author_id)
            .bind(&comment.body)
            .bind(unix_now())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to insert comment"))?;

        Ok(comment_from_row(&row))
    }

    async fn list_for_blog(&self, blog_id: Uuid) -> Result<Vec<CommentRecord>, StoreError> {
        let query = r"
            SELECT id, blog_id, author_id, body, created_at
            FROM comments
            WHERE blog_id = $1
            ORDER BY created_at ASC, id ASC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(blog_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to list comments"))?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>, StoreError> {
        let query = r"
            SELECT id, blog_id, author_id, body, created_at
            FROM comments
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to lookup comment"))?;

        Ok(row.as_ref().map(comment_from_row))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM comments WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to delete comment"))?;
        Ok(())
    }

    async fn delete_for_blog(&self, blog_id: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM comments WHERE blog_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(blog_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to delete blog comments"))?;
        Ok(())
    }

    async fn delete_by_author(&self, author_id: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM comments WHERE author_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(author_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| db_unavailable(err, "failed to delete author comments"))?;
        Ok(())
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
