use super::{RepoResult, Repository, new_comment_id};
use crate::models::{BlogPost, Comment, CommentWithAuthor, User, UserProfile};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

const COMMENT_COLUMNS: &str = "id, content, user_id, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, image, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are bound at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- COMMENT ACTIONS ---

    async fn find_comment(&self, id: &str) -> RepoResult<Option<Comment>> {
        let query = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    /// find_comment_with_author
    ///
    /// Single comment joined with `users` for the author's public profile.
    async fn find_comment_with_author(&self, id: &str) -> RepoResult<Option<CommentWithAuthor>> {
        let comment = sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT
                c.id, c.content, c.user_id, c.created_at, c.updated_at,
                u.name AS author_name, u.image AS author_image
            FROM comments c
            JOIN users u ON c.user_id = u.id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn list_comments(&self) -> RepoResult<Vec<CommentWithAuthor>> {
        let comments = sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT
                c.id, c.content, c.user_id, c.created_at, c.updated_at,
                u.name AS author_name, u.image AS author_image
            FROM comments c
            JOIN users u ON c.user_id = u.id
            ORDER BY c.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn create_comment(&self, user_id: Uuid, content: &str) -> RepoResult<Comment> {
        let query = format!(
            "INSERT INTO comments (id, content, user_id, created_at, updated_at) \
             VALUES ($1, $2, $3, NOW(), NOW()) RETURNING {COMMENT_COLUMNS}"
        );
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(new_comment_id())
            .bind(content)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(comment)
    }

    /// update_comment
    ///
    /// Content replacement only; `user_id` is never part of the SET list.
    async fn update_comment(&self, id: &str, content: &str) -> RepoResult<Option<Comment>> {
        let query = format!(
            "UPDATE comments SET content = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {COMMENT_COLUMNS}"
        );
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .bind(content)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- BLOG ---

    async fn list_posts(&self, limit: i64) -> RepoResult<Vec<BlogPost>> {
        let posts = sqlx::query_as::<_, BlogPost>(
            "SELECT id, slug, title, content, created_at FROM blog_posts \
             ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn find_post_by_slug(&self, slug: &str) -> RepoResult<Option<BlogPost>> {
        let post = sqlx::query_as::<_, BlogPost>(
            "SELECT id, slug, title, content, created_at FROM blog_posts WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// upsert_user
    ///
    /// Links by email with `ON CONFLICT (email)`. `COALESCE` keeps the stored name and
    /// image when the sign-in flow did not supply new ones.
    async fn upsert_user(&self, profile: UserProfile) -> RepoResult<User> {
        let profile = profile.normalized();
        let fallback_name = profile.fallback_name();
        let query = format!(
            r#"
            INSERT INTO users (id, name, email, image, created_at, updated_at)
            VALUES ($1, COALESCE($2, $5), $3, $4, NOW(), NOW())
            ON CONFLICT (email) DO UPDATE
            SET name = COALESCE($2, users.name),
                image = COALESCE($4, users.image),
                updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(profile.name)
            .bind(profile.email)
            .bind(profile.image)
            .bind(fallback_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }
}
