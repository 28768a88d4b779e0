use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The persisted account record in the `users` table. Created or refreshed by the
/// sign-in flows (OAuth providers and magic link); the email is the linking key.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    // Avatar URL, usually supplied by the OAuth provider.
    pub image: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Identity
///
/// The authenticated-user context resolved from a request's credentials.
/// It is rebuilt on every request and never cached.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: Some(user.email),
            image: user.image,
        }
    }
}

/// Comment
///
/// A row of the `comments` table. `content` is always stored trimmed and non-empty,
/// and `user_id` never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct Comment {
    // Opaque unique identifier, generated at creation time.
    pub id: String,
    pub content: String,
    pub user_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CommentWithAuthor
///
/// Listing shape: a comment joined with its author's public profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct CommentWithAuthor {
    pub id: String,
    pub content: String,
    pub user_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    // Loaded via a JOIN on `users`.
    pub author_name: String,
    pub author_image: Option<String>,
}

impl CommentWithAuthor {
    pub fn new(comment: Comment, author: &User) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            user_id: comment.user_id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            author_name: author.name.clone(),
            author_image: author.image.clone(),
        }
    }
}

/// BlogPost
///
/// A row of the `blog_posts` table. `content` holds the markdown source; rendering is
/// left to the frontend.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct BlogPost {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserProfile
///
/// Internal upsert payload produced by a sign-in flow. `name` and `image` are `None`
/// when the flow has nothing to say about them (magic link), so an existing user's
/// values are kept.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl UserProfile {
    /// Emails are the linking key, so they are stored trimmed and lowercased.
    pub fn normalized(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        self
    }

    /// Display name used when a brand new account has no name of its own.
    pub fn fallback_name(&self) -> String {
        self.email
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or("user")
            .to_string()
    }
}

// --- Request Payloads (Input Schemas) ---

/// CommentPayload
///
/// Body of `POST /comments` and `PATCH /comments/{id}`. Bodies are validated by
/// `guard::ValidContent`, so this type only documents the wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentPayload {
    #[schema(example = "Great post!")]
    pub content: Option<String>,
}

/// MagicLinkRequest
///
/// Body of `POST /auth/magic-link`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MagicLinkRequest {
    #[schema(example = "reader@example.com")]
    pub email: String,
}

// --- Responses ---

/// SuccessResponse
///
/// Acknowledgement body, `{"success": true}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// ErrorBody
///
/// Shape of every error response, `{"error": "<message>"}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
}

/// AuthProviders
///
/// Sign-in methods enabled by the current configuration.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Default)]
#[ts(export)]
pub struct AuthProviders {
    pub github: bool,
    pub google: bool,
    pub magic_link: bool,
}
