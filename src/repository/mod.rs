use crate::models::{BlogPost, Comment, CommentWithAuthor, User, UserProfile};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Failure of the persistence collaborator. Callers never show these to clients;
/// the guard logs them and answers with a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers and the mutation
/// guard only see this trait, so Postgres, the in-memory store and test doubles are
/// interchangeable behind `Arc<dyn Repository>`.
///
/// The store is opaque CRUD: it performs no authorization of its own. Ownership is
/// enforced by `guard` before any mutating call reaches it.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Comments ---
    async fn find_comment(&self, id: &str) -> RepoResult<Option<Comment>>;
    async fn find_comment_with_author(&self, id: &str) -> RepoResult<Option<CommentWithAuthor>>;
    /// All comments, newest first, joined with their authors.
    async fn list_comments(&self) -> RepoResult<Vec<CommentWithAuthor>>;
    async fn create_comment(&self, user_id: Uuid, content: &str) -> RepoResult<Comment>;
    /// Replaces the content. `None` if the row disappeared in the meantime.
    async fn update_comment(&self, id: &str, content: &str) -> RepoResult<Option<Comment>>;
    /// Returns true if a row was removed.
    async fn delete_comment(&self, id: &str) -> RepoResult<bool>;

    // --- Blog ---
    /// Newest first, at most `limit` rows.
    async fn list_posts(&self, limit: i64) -> RepoResult<Vec<BlogPost>>;
    async fn find_post_by_slug(&self, slug: &str) -> RepoResult<Option<BlogPost>>;

    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    /// Creates the user or links to the existing account with the same email.
    /// Provided name/image overwrite the stored ones; absent ones are kept.
    async fn upsert_user(&self, profile: UserProfile) -> RepoResult<User>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Fresh opaque identifier for comments.
pub(crate) fn new_comment_id() -> String {
    Uuid::new_v4().simple().to_string()
}
