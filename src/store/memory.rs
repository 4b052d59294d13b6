//! In-memory store implementations.
//!
//! Back the `--memory-store` mode and the handler/router tests. Every map
//! mutation happens under a single write lock, which also makes the
//! check-and-insert uniqueness guard atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{unix_now, BlogStatus};

use super::{
    generate_session_token, hash_session_token, BlogChanges, BlogRecord, BlogStore, CommentRecord,
    CommentStore, ConflictField, Credential, CredentialChanges, CredentialStore, NewBlog,
    NewComment, NewCredential, Preferences, SessionStore, StoreError, UserTier,
};

#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<Uuid, Credential>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Credential>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn insert(&self, new: NewCredential) -> Result<Credential, StoreError> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|user| user.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(StoreError::Conflict(ConflictField::Email));
        }
        if users.values().any(|user| user.username == new.username) {
            return Err(StoreError::Conflict(ConflictField::Username));
        }

        let credential = Credential {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            tier: UserTier::Member,
            verified: false,
            preferences: Preferences::default(),
            created_at: unix_now(),
        };
        users.insert(credential.id, credential.clone());
        Ok(credential)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        changes: CredentialChanges,
    ) -> Result<Option<Credential>, StoreError> {
        let mut users = self.users.write().await;

        if let Some(email) = &changes.email {
            let taken = users
                .values()
                .any(|user| user.id != id && user.email.eq_ignore_ascii_case(email));
            if taken {
                return Err(StoreError::Conflict(ConflictField::Email));
            }
        }

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(tier) = changes.tier {
            user.tier = tier;
        }
        if let Some(verified) = changes.verified {
            user.verified = verified;
        }
        if let Some(dark_mode) = changes.dark_mode {
            user.preferences.dark_mode = dark_mode;
        }
        if let Some(display_real_name) = changes.display_real_name {
            user.preferences.display_real_name = display_real_name;
        }

        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.users.write().await.remove(&id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Credential>, StoreError> {
        let users = self.users.read().await;
        let mut all: Vec<Credential> = users.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

struct SessionEntry {
    user_id: Uuid,
    expires_at: i64,
}

pub struct MemorySessionStore {
    ttl_seconds: i64,
    sessions: RwLock<HashMap<Vec<u8>, SessionEntry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl_seconds,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    async fn backdate(&self, session_token: &str, seconds: i64) {
        let key = hash_session_token(session_token);
        if let Some(entry) = self.sessions.write().await.get_mut(&key) {
            entry.expires_at -= seconds;
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: Uuid) -> Result<String, StoreError> {
        let token = generate_session_token()?;
        let entry = SessionEntry {
            user_id,
            expires_at: unix_now() + self.ttl_seconds,
        };
        self.sessions
            .write()
            .await
            .insert(hash_session_token(&token), entry);
        Ok(token)
    }

    async fn resolve(&self, session_token: &str) -> Result<Option<Uuid>, StoreError> {
        let key = hash_session_token(session_token);
        let now = unix_now();
        let mut sessions = self.sessions.write().await;

        match sessions.get_mut(&key) {
            Some(entry) if entry.expires_at > now => {
                // Rolling window: activity pushes the expiry out again.
                entry.expires_at = now + self.ttl_seconds;
                Ok(Some(entry.user_id))
            }
            Some(_) => {
                sessions.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn destroy(&self, session_token: &str) -> Result<(), StoreError> {
        let key = hash_session_token(session_token);
        self.sessions.write().await.remove(&key);
        Ok(())
    }

    async fn destroy_for_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .retain(|_, entry| entry.user_id != user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlogStore {
    blogs: RwLock<HashMap<Uuid, BlogRecord>>,
}

impl MemoryBlogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn set_created_at(&self, id: Uuid, created_at: i64) {
        if let Some(blog) = self.blogs.write().await.get_mut(&id) {
            blog.created_at = created_at;
        }
    }
}

fn newest_first(a: &BlogRecord, b: &BlogRecord) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id))
}

#[async_trait]
impl BlogStore for MemoryBlogStore {
    async fn insert(&self, blog: NewBlog) -> Result<BlogRecord, StoreError> {
        let mut blogs = self.blogs.write().await;

        if blogs.values().any(|other| other.short_id == blog.short_id) {
            return Err(StoreError::Conflict(ConflictField::ShortId));
        }

        let now = unix_now();
        let record = BlogRecord {
            id: Uuid::new_v4(),
            short_id: blog.short_id,
            title: blog.title,
            body: blog.body,
            author_id: blog.author_id,
            status: blog.status,
            created_at: now,
            published_at: (blog.status == BlogStatus::Published).then_some(now),
            last_edited: None,
        };
        blogs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_short_id(&self, short_id: &str) -> Result<Option<BlogRecord>, StoreError> {
        let blogs = self.blogs.read().await;
        Ok(blogs.values().find(|blog| blog.short_id == short_id).cloned())
    }

    async fn list_published(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<BlogRecord>, StoreError> {
        let blogs = self.blogs.read().await;
        let mut published: Vec<BlogRecord> = blogs
            .values()
            .filter(|blog| blog.status == BlogStatus::Published)
            .cloned()
            .collect();
        published.sort_by(newest_first);
        Ok(published
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_published(&self) -> Result<u64, StoreError> {
        let blogs = self.blogs.read().await;
        let count = blogs
            .values()
            .filter(|blog| blog.status == BlogStatus::Published)
            .count();
        Ok(count as u64)
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
        include_drafts: bool,
    ) -> Result<Vec<BlogRecord>, StoreError> {
        let blogs = self.blogs.read().await;
        let mut authored: Vec<BlogRecord> = blogs
            .values()
            .filter(|blog| blog.author_id == author_id)
            .filter(|blog| include_drafts || blog.status == BlogStatus::Published)
            .cloned()
            .collect();
        authored.sort_by(newest_first);
        Ok(authored)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: BlogChanges,
    ) -> Result<Option<BlogRecord>, StoreError> {
        let mut blogs = self.blogs.write().await;
        let Some(blog) = blogs.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            blog.title = title;
        }
        if let Some(body) = changes.body {
            blog.body = body;
        }
        if let Some(status) = changes.status {
            blog.status = status;
        }
        if let Some(published_at) = changes.published_at {
            blog.published_at = Some(published_at);
        }
        if let Some(last_edited) = changes.last_edited {
            blog.last_edited = Some(last_edited);
        }

        Ok(Some(blog.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.blogs.write().await.remove(&id);
        Ok(())
    }

    async fn delete_by_author(&self, author_id: Uuid) -> Result<(), StoreError> {
        self.blogs
            .write()
            .await
            .retain(|_, blog| blog.author_id != author_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCommentStore {
    comments: RwLock<HashMap<Uuid, CommentRecord>>,
}

impl MemoryCommentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn insert(&self, comment: NewComment) -> Result<CommentRecord, StoreError> {
        let record = CommentRecord {
            id: Uuid::new_v4(),
            blog_id: comment.blog_id,
            author_id: comment.author_id,
            body: comment.body,
            created_at: unix_now(),
        };
        self.comments
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_for_blog(&self, blog_id: Uuid) -> Result<Vec<CommentRecord>, StoreError> {
        let comments = self.comments.read().await;
        let mut on_blog: Vec<CommentRecord> = comments
            .values()
            .filter(|comment| comment.blog_id == blog_id)
            .cloned()
            .collect();
        on_blog.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(on_blog)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>, StoreError> {
        let comments = self.comments.read().await;
        Ok(comments.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.comments.write().await.remove(&id);
        Ok(())
    }

    async fn delete_for_blog(&self, blog_id: Uuid) -> Result<(), StoreError> {
        self.comments
            .write()
            .await
            .retain(|_, comment| comment.blog_id != blog_id);
        Ok(())
    }

    async fn delete_by_author(&self, author_id: Uuid) -> Result<(), StoreError> {
        self.comments
            .write()
            .await
            .retain(|_, comment| comment.author_id != author_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credential(email: &str, username: &str) -> NewCredential {
        NewCredential {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "$2b$10$fakedigestfakedigestfakedigest".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup_credentials() {
        let store = MemoryCredentialStore::new();
        let created = store
            .insert(sample_credential("a@x.com", "bob"))
            .await
            .expect("insert");

        assert_eq!(created.tier, UserTier::Member);
        assert!(!created.verified);
        assert_eq!(created.preferences, Preferences::default());

        // Email lookups ignore case; username lookups do not.
        let by_email = store.find_by_email("A@X.COM").await.expect("lookup");
        assert_eq!(by_email.as_ref().map(|c| c.id), Some(created.id));
        let by_username = store.find_by_username("bob").await.expect("lookup");
        assert_eq!(by_username.map(|c| c.id), Some(created.id));
        let by_id = store.find_by_id(created.id).await.expect("lookup");
        assert_eq!(by_id.map(|c| c.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let store = MemoryCredentialStore::new();
        store
            .insert(sample_credential("a@x.com", "bob"))
            .await
            .expect("insert");

        let same_email = store.insert(sample_credential("A@x.com", "carol")).await;
        assert!(matches!(
            same_email,
            Err(StoreError::Conflict(ConflictField::Email))
        ));

        let same_username = store.insert(sample_credential("b@x.com", "bob")).await;
        assert!(matches!(
            same_username,
            Err(StoreError::Conflict(ConflictField::Username))
        ));

        // Nothing extra was written by the rejected attempts.
        assert_eq!(store.list().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_update_fields_is_partial() {
        let store = MemoryCredentialStore::new();
        let created = store
            .insert(sample_credential("a@x.com", "bob"))
            .await
            .expect("insert");

        let updated = store
            .update_fields(
                created.id,
                CredentialChanges {
                    verified: Some(true),
                    dark_mode: Some(true),
                    ..CredentialChanges::default()
                },
            )
            .await
            .expect("update")
            .expect("present");

        assert!(updated.verified);
        assert!(updated.preferences.dark_mode);
        assert_eq!(updated.email, "a@x.com");
        assert_eq!(updated.username, "bob");

        let absent = store
            .update_fields(Uuid::new_v4(), CredentialChanges::default())
            .await
            .expect("update");
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_update_email_conflicts_with_other_user() {
        let store = MemoryCredentialStore::new();
        let first = store
            .insert(sample_credential("a@x.com", "bob"))
            .await
            .expect("insert");
        store
            .insert(sample_credential("b@x.com", "carol"))
            .await
            .expect("insert");

        let stolen = store
            .update_fields(
                first.id,
                CredentialChanges {
                    email: Some("B@x.com".to_string()),
                    ..CredentialChanges::default()
                },
            )
            .await;
        assert!(matches!(
            stolen,
            Err(StoreError::Conflict(ConflictField::Email))
        ));

        // Updating to your own current email is not a conflict.
        let kept = store
            .update_fields(
                first.id,
                CredentialChanges {
                    email: Some("a@x.com".to_string()),
                    ..CredentialChanges::default()
                },
            )
            .await
            .expect("update");
        assert!(kept.is_some());
    }

    #[tokio::test]
    async fn test_delete_credential_is_idempotent() {
        let store = MemoryCredentialStore::new();
        let created = store
            .insert(sample_credential("a@x.com", "bob"))
            .await
            .expect("insert");

        store.delete(created.id).await.expect("delete");
        store.delete(created.id).await.expect("delete again");
        assert!(store.find_by_id(created.id).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn test_session_round_trip_and_idempotent_destroy() {
        let store = MemorySessionStore::new(3600);
        let user_id = Uuid::new_v4();

        let token = store.create(user_id).await.expect("create");
        assert_eq!(store.resolve(&token).await.expect("resolve"), Some(user_id));
        assert_eq!(store.resolve("no-such-token").await.expect("resolve"), None);

        store.destroy(&token).await.expect("destroy");
        store.destroy(&token).await.expect("destroy again");
        assert_eq!(store.resolve(&token).await.expect("resolve"), None);
    }

    #[tokio::test]
    async fn test_session_expires_after_window() {
        let store = MemorySessionStore::new(100);
        let token = store.create(Uuid::new_v4()).await.expect("create");

        store.backdate(&token, 200).await;
        assert_eq!(store.resolve(&token).await.expect("resolve"), None);
    }

    #[tokio::test]
    async fn test_session_expiry_is_rolling() {
        let store = MemorySessionStore::new(100);
        let user_id = Uuid::new_v4();
        let token = store.create(user_id).await.expect("create");

        // Twice within the window. Without renewal on the first resolve the
        // second backdate would push the session past its original expiry.
        store.backdate(&token, 99).await;
        assert_eq!(store.resolve(&token).await.expect("resolve"), Some(user_id));
        store.backdate(&token, 99).await;
        assert_eq!(store.resolve(&token).await.expect("resolve"), Some(user_id));
    }

    #[tokio::test]
    async fn test_destroy_for_user_clears_all_their_sessions() {
        let store = MemorySessionStore::new(3600);
        let user_id = Uuid::new_v4();
        let other = Uuid::new_v4();

        let first = store.create(user_id).await.expect("create");
        let second = store.create(user_id).await.expect("create");
        let kept = store.create(other).await.expect("create");

        store.destroy_for_user(user_id).await.expect("destroy");
        assert_eq!(store.resolve(&first).await.expect("resolve"), None);
        assert_eq!(store.resolve(&second).await.expect("resolve"), None);
        assert_eq!(store.resolve(&kept).await.expect("resolve"), Some(other));
    }

    fn sample_blog(short_id: &str, author_id: Uuid, status: BlogStatus) -> NewBlog {
        NewBlog {
            short_id: short_id.to_string(),
            title: "Title".to_string(),
            body: "Body".to_string(),
            author_id,
            status,
        }
    }

    #[tokio::test]
    async fn test_blog_insert_stamps_published_at() {
        let store = MemoryBlogStore::new();
        let author = Uuid::new_v4();

        let published = store
            .insert(sample_blog("aaaa1111", author, BlogStatus::Published))
            .await
            .expect("insert");
        assert_eq!(published.published_at, Some(published.created_at));
        assert_eq!(published.last_edited, None);

        let draft = store
            .insert(sample_blog("bbbb2222", author, BlogStatus::Draft))
            .await
            .expect("insert");
        assert_eq!(draft.published_at, None);
    }

    #[tokio::test]
    async fn test_blog_short_id_collision_is_a_conflict() {
        let store = MemoryBlogStore::new();
        let author = Uuid::new_v4();
        store
            .insert(sample_blog("aaaa1111", author, BlogStatus::Draft))
            .await
            .expect("insert");

        let collision = store
            .insert(sample_blog("aaaa1111", author, BlogStatus::Draft))
            .await;
        assert!(matches!(
            collision,
            Err(StoreError::Conflict(ConflictField::ShortId))
        ));
    }

    #[tokio::test]
    async fn test_published_listing_orders_and_pages() {
        let store = MemoryBlogStore::new();
        let author = Uuid::new_v4();

        let oldest = store
            .insert(sample_blog("aaaa1111", author, BlogStatus::Published))
            .await
            .expect("insert");
        let middle = store
            .insert(sample_blog("bbbb2222", author, BlogStatus::Published))
            .await
            .expect("insert");
        let newest = store
            .insert(sample_blog("cccc3333", author, BlogStatus::Published))
            .await
            .expect("insert");
        store
            .insert(sample_blog("dddd4444", author, BlogStatus::Draft))
            .await
            .expect("insert");

        store.set_created_at(oldest.id, 1_000).await;
        store.set_created_at(middle.id, 2_000).await;
        store.set_created_at(newest.id, 3_000).await;

        assert_eq!(store.count_published().await.expect("count"), 3);

        let page = store.list_published(0, 2).await.expect("list");
        assert_eq!(
            page.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![newest.id, middle.id]
        );

        let rest = store.list_published(2, 2).await.expect("list");
        assert_eq!(rest.iter().map(|b| b.id).collect::<Vec<_>>(), vec![oldest.id]);
    }

    #[tokio::test]
    async fn test_author_listing_filters_drafts() {
        let store = MemoryBlogStore::new();
        let author = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        store
            .insert(sample_blog("aaaa1111", author, BlogStatus::Published))
            .await
            .expect("insert");
        store
            .insert(sample_blog("bbbb2222", author, BlogStatus::Draft))
            .await
            .expect("insert");
        store
            .insert(sample_blog("cccc3333", stranger, BlogStatus::Published))
            .await
            .expect("insert");

        let public_view = store.list_by_author(author, false).await.expect("list");
        assert_eq!(public_view.len(), 1);
        let own_view = store.list_by_author(author, true).await.expect("list");
        assert_eq!(own_view.len(), 2);
    }

    #[tokio::test]
    async fn test_blog_update_applies_changes() {
        let store = MemoryBlogStore::new();
        let author = Uuid::new_v4();
        let draft = store
            .insert(sample_blog("aaaa1111", author, BlogStatus::Draft))
            .await
            .expect("insert");

        let updated = store
            .update(
                draft.id,
                BlogChanges {
                    title: Some("New title".to_string()),
                    status: Some(BlogStatus::Published),
                    published_at: Some(4_000),
                    ..BlogChanges::default()
                },
            )
            .await
            .expect("update")
            .expect("present");

        assert_eq!(updated.title, "New title");
        assert_eq!(updated.status, BlogStatus::Published);
        assert_eq!(updated.published_at, Some(4_000));
        assert_eq!(updated.body, "Body");

        let absent = store
            .update(Uuid::new_v4(), BlogChanges::default())
            .await
            .expect("update");
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_comments_list_oldest_first_and_cascade() {
        let store = MemoryCommentStore::new();
        let blog_id = Uuid::new_v4();
        let author = Uuid::new_v4();

        for body in ["first", "second"] {
            store
                .insert(NewComment {
                    blog_id,
                    author_id: author,
                    body: body.to_string(),
                })
                .await
                .expect("insert");
        }
        store
            .insert(NewComment {
                blog_id: Uuid::new_v4(),
                author_id: author,
                body: "elsewhere".to_string(),
            })
            .await
            .expect("insert");

        let listed = store.list_for_blog(blog_id).await.expect("list");
        assert_eq!(listed.len(), 2);

        store.delete_for_blog(blog_id).await.expect("delete");
        assert!(store.list_for_blog(blog_id).await.expect("list").is_empty());
    }
}
