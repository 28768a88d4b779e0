//! Guarded mutation of owner-scoped resources.
//!
//! Every change to a comment runs the same sequence, short-circuiting on the first
//! failure: authenticate, validate the input, look the resource up, check ownership,
//! mutate. Lookup and ownership are separate phases whose types chain:
//! `lookup_or_not_found` is the only way to obtain an [`Existing`], and
//! [`assert_owner_or_forbidden`] only accepts one, so a caller cannot evaluate
//! ownership before existence has been established.

use std::future::Future;

use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{Comment, Identity},
    repository::{RepoResult, Repository},
};

const COMMENT_NOT_FOUND: &str = "Comment not found";
const INVALID_CONTENT: &str = "Invalid content";

/// A resource with a recorded, immutable owner.
pub trait OwnedResource {
    fn owner_id(&self) -> Uuid;
}

impl OwnedResource for Comment {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

/// A resource that was present in the store when it was looked up.
#[derive(Debug)]
pub struct Existing<T>(T);

/// A resource the acting identity has been confirmed to own.
#[derive(Debug)]
pub struct Owned<T>(T);

impl<T> Owned<T> {
    pub fn get(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Phase 1: an absent identity is `Unauthorized`.
pub fn require_identity(session: Option<Identity>) -> ApiResult<Identity> {
    session.ok_or(ApiError::Unauthorized)
}

/// ValidContent
///
/// Comment text that is known to be non-empty and already trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidContent(String);

impl ValidContent {
    /// Parses a raw JSON request body. Anything but an object with a string
    /// `content` that is non-blank after trimming is `InvalidInput`. A missing
    /// field, `null`, a non-string and a non-object body all fail the same way.
    pub fn parse(body: &[u8]) -> ApiResult<Self> {
        let value: Value =
            serde_json::from_slice(body).map_err(|_| ApiError::InvalidInput(INVALID_CONTENT))?;
        let content = match &value {
            Value::Object(fields) => fields.get("content").and_then(Value::as_str),
            _ => None,
        };
        content
            .map(Self::new)
            .unwrap_or(Err(ApiError::InvalidInput(INVALID_CONTENT)))
    }

    pub fn new(raw: &str) -> ApiResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ApiError::InvalidInput(INVALID_CONTENT));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Phase 3: fetch the resource, or fail with `NotFound`. Store failures are logged
/// under `tag` and become `Internal`.
pub async fn lookup_or_not_found<T, F>(
    tag: &'static str,
    not_found: &'static str,
    lookup: F,
) -> ApiResult<Existing<T>>
where
    F: Future<Output = RepoResult<Option<T>>>,
{
    match lookup.await {
        Ok(Some(resource)) => Ok(Existing(resource)),
        Ok(None) => Err(ApiError::NotFound(not_found)),
        Err(e) => Err(ApiError::internal(tag, e)),
    }
}

/// Phase 4: the acting identity must be the recorded owner, or `Forbidden`.
pub fn assert_owner_or_forbidden<T: OwnedResource>(
    existing: Existing<T>,
    identity: &Identity,
) -> ApiResult<Owned<T>> {
    let Existing(resource) = existing;
    if resource.owner_id() != identity.id {
        tracing::debug!(
            "ownership check failed: owner={} actor={}",
            resource.owner_id(),
            identity.id
        );
        return Err(ApiError::Forbidden);
    }
    Ok(Owned(resource))
}

/// CommentMutation
///
/// The owner-only operations on a comment, carrying their unvalidated input.
#[derive(Debug, Clone, Copy)]
pub enum CommentMutation<'b> {
    /// Replace the content with the body's trimmed `content`.
    Replace(&'b [u8]),
    Delete,
}

impl CommentMutation<'_> {
    /// Log tag identifying the operation.
    pub fn tag(&self) -> &'static str {
        match self {
            CommentMutation::Replace(_) => "COMMENT_PATCH",
            CommentMutation::Delete => "COMMENT_DELETE",
        }
    }

    fn validate(&self) -> ApiResult<Validated> {
        match self {
            CommentMutation::Replace(body) => ValidContent::parse(body).map(Validated::Replace),
            CommentMutation::Delete => Ok(Validated::Delete),
        }
    }
}

enum Validated {
    Replace(ValidContent),
    Delete,
}

/// MutationOutcome
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Updated(Comment),
    Deleted,
}

/// guarded_mutate
///
/// Runs `mutation` against comment `id` on behalf of `session`:
/// 1. no identity → `Unauthorized`
/// 2. invalid input → `InvalidInput`, before any store access
/// 3. unknown id → `NotFound`
/// 4. different owner → `Forbidden`
/// 5. mutate, 6. return the outcome.
///
/// Two mutations racing on the same id resolve at the store (last write wins). If
/// the row vanishes between lookup and mutation the result is `NotFound`.
pub async fn guarded_mutate(
    repo: &dyn Repository,
    session: Option<Identity>,
    id: &str,
    mutation: CommentMutation<'_>,
) -> ApiResult<MutationOutcome> {
    let tag = mutation.tag();

    let identity = require_identity(session)?;
    let validated = mutation.validate()?;
    let existing = lookup_or_not_found(tag, COMMENT_NOT_FOUND, repo.find_comment(id)).await?;
    let owned = assert_owner_or_forbidden(existing, &identity)?;

    match validated {
        Validated::Replace(content) => {
            let updated = repo
                .update_comment(&owned.get().id, content.as_str())
                .await
                .map_err(|e| ApiError::internal(tag, e))?
                .ok_or(ApiError::NotFound(COMMENT_NOT_FOUND))?;
            tracing::info!("comment {} updated by {}", updated.id, identity.id);
            Ok(MutationOutcome::Updated(updated))
        }
        Validated::Delete => {
            let removed = repo
                .delete_comment(&owned.get().id)
                .await
                .map_err(|e| ApiError::internal(tag, e))?;
            if !removed {
                return Err(ApiError::NotFound(COMMENT_NOT_FOUND));
            }
            tracing::info!("comment {} deleted by {}", owned.get().id, identity.id);
            Ok(MutationOutcome::Deleted)
        }
    }
}

/// Owner-only content replacement.
pub async fn update_comment(
    repo: &dyn Repository,
    session: Option<Identity>,
    id: &str,
    body: &[u8],
) -> ApiResult<Comment> {
    match guarded_mutate(repo, session, id, CommentMutation::Replace(body)).await? {
        MutationOutcome::Updated(comment) => Ok(comment),
        MutationOutcome::Deleted => Err(ApiError::internal(
            "COMMENT_PATCH",
            "replace mutation reported a deletion",
        )),
    }
}

/// Owner-only deletion.
pub async fn delete_comment(
    repo: &dyn Repository,
    session: Option<Identity>,
    id: &str,
) -> ApiResult<()> {
    guarded_mutate(repo, session, id, CommentMutation::Delete)
        .await
        .map(|_| ())
}

/// create_comment
///
/// The creation path has no existence or ownership phase: authenticate, validate,
/// persist with the identity as owner.
pub async fn create_comment(
    repo: &dyn Repository,
    session: Option<Identity>,
    body: &[u8],
) -> ApiResult<Comment> {
    let identity = require_identity(session)?;
    let content = ValidContent::parse(body)?;

    let comment = repo
        .create_comment(identity.id, content.as_str())
        .await
        .map_err(|e| ApiError::internal("COMMENT_POST", e))?;
    tracing::info!("comment {} created by {}", comment.id, identity.id);
    Ok(comment)
}
