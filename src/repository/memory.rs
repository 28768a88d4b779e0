use super::{RepoResult, Repository, new_comment_id};
use crate::models::{BlogPost, Comment, CommentWithAuthor, User, UserProfile};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    // Insertion order; listings sort newest first on top of it.
    comments: Vec<Comment>,
    posts: Vec<BlogPost>,
}

/// MemoryRepository
///
/// In-process `Repository` used by the test suite and by local runs without
/// `DATABASE_URL`. Same observable semantics as the Postgres implementation,
/// including email-based account linking.
#[derive(Default)]
pub struct MemoryRepository {
    store: RwLock<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds blog posts, which have no write path through the API.
    pub fn with_posts(posts: Vec<BlogPost>) -> Self {
        Self {
            store: RwLock::new(Store {
                posts,
                ..Store::default()
            }),
        }
    }

    /// Inserts a user record as-is (test fixtures).
    pub async fn insert_user(&self, user: User) {
        self.store.write().await.users.insert(user.id, user);
    }
}

fn with_author(store: &Store, comment: &Comment) -> Option<CommentWithAuthor> {
    store
        .users
        .get(&comment.user_id)
        .map(|author| CommentWithAuthor::new(comment.clone(), author))
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_comment(&self, id: &str) -> RepoResult<Option<Comment>> {
        let store = self.store.read().await;
        Ok(store.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn find_comment_with_author(&self, id: &str) -> RepoResult<Option<CommentWithAuthor>> {
        let store = self.store.read().await;
        Ok(store
            .comments
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| with_author(&store, c)))
    }

    async fn list_comments(&self) -> RepoResult<Vec<CommentWithAuthor>> {
        let store = self.store.read().await;
        let mut comments: Vec<CommentWithAuthor> = store
            .comments
            .iter()
            .rev()
            .filter_map(|c| with_author(&store, c))
            .collect();
        // Stable sort keeps later inserts first on equal timestamps.
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    async fn create_comment(&self, user_id: Uuid, content: &str) -> RepoResult<Comment> {
        let now = Utc::now();
        let comment = Comment {
            id: new_comment_id(),
            content: content.to_string(),
            user_id,
            created_at: now,
            updated_at: now,
        };
        self.store.write().await.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, id: &str, content: &str) -> RepoResult<Option<Comment>> {
        let mut store = self.store.write().await;
        Ok(store.comments.iter_mut().find(|c| c.id == id).map(|c| {
            c.content = content.to_string();
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn delete_comment(&self, id: &str) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.comments.len();
        store.comments.retain(|c| c.id != id);
        Ok(store.comments.len() < before)
    }

    async fn list_posts(&self, limit: i64) -> RepoResult<Vec<BlogPost>> {
        let store = self.store.read().await;
        let mut posts = store.posts.clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(posts)
    }

    async fn find_post_by_slug(&self, slug: &str) -> RepoResult<Option<BlogPost>> {
        let store = self.store.read().await;
        Ok(store.posts.iter().find(|p| p.slug == slug).cloned())
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn upsert_user(&self, profile: UserProfile) -> RepoResult<User> {
        let profile = profile.normalized();
        let mut store = self.store.write().await;
        let now = Utc::now();

        if let Some(existing) = store.users.values_mut().find(|u| u.email == profile.email) {
            if let Some(name) = profile.name {
                existing.name = name;
            }
            if profile.image.is_some() {
                existing.image = profile.image;
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            name: profile.name.clone().unwrap_or_else(|| profile.fallback_name()),
            email: profile.email,
            image: profile.image,
            created_at: now,
            updated_at: now,
        };
        store.users.insert(user.id, user.clone());
        Ok(user)
    }
}
