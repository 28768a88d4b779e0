use crate::{
    AppState,
    auth::Session,
    error::{ApiError, ApiResult},
    guard,
    models::{
        BlogPost, Comment, CommentPayload, CommentWithAuthor, ErrorBody, SuccessResponse,
    },
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

pub const DEFAULT_POST_LIMIT: i64 = 3;
pub const MAX_POST_LIMIT: i64 = 50;

// --- Filter Structs ---

/// PostQuery
///
/// Query parameters for the blog listing (GET /posts).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct PostQuery {
    /// Number of posts to return, newest first. Defaults to 3, capped at 50.
    pub limit: Option<i64>,
}

impl PostQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_POST_LIMIT)
            .clamp(1, MAX_POST_LIMIT)
    }
}

// --- Comment Handlers ---

/// create_comment
///
/// [Session Route] Posts a new comment owned by the caller.
/// The body is taken raw so the session check always precedes body validation.
#[utoipa::path(
    post,
    path = "/comments",
    request_body = CommentPayload,
    responses(
        (status = 200, description = "Comment created", body = Comment),
        (status = 400, description = "Blank or missing content", body = ErrorBody),
        (status = 401, description = "No session", body = ErrorBody)
    )
)]
pub async fn create_comment(
    Session(session): Session,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Comment>> {
    let comment = guard::create_comment(state.repo.as_ref(), session, &body).await?;
    Ok(Json(comment))
}

/// update_comment
///
/// [Session Route] Replaces a comment's content. Owner-only.
#[utoipa::path(
    patch,
    path = "/comments/{id}",
    params(("id" = String, Path, description = "Comment ID")),
    request_body = CommentPayload,
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 400, description = "Blank or missing content", body = ErrorBody),
        (status = 401, description = "No session", body = ErrorBody),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    )
)]
pub async fn update_comment(
    Session(session): Session,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Comment>> {
    let comment = guard::update_comment(state.repo.as_ref(), session, &id, &body).await?;
    Ok(Json(comment))
}

/// delete_comment
///
/// [Session Route] Permanently removes a comment. Owner-only.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Deleted", body = SuccessResponse),
        (status = 401, description = "No session", body = ErrorBody),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    )
)]
pub async fn delete_comment(
    Session(session): Session,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    guard::delete_comment(state.repo.as_ref(), session, &id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// list_comments
///
/// [Public Route] Every comment with its author, newest first.
#[utoipa::path(
    get,
    path = "/comments",
    responses((status = 200, description = "Comments", body = [CommentWithAuthor]))
)]
pub async fn list_comments(State(state): State<AppState>) -> ApiResult<Json<Vec<CommentWithAuthor>>> {
    let comments = state
        .repo
        .list_comments()
        .await
        .map_err(|e| ApiError::internal("COMMENT_LIST", e))?;
    Ok(Json(comments))
}

/// get_comment
///
/// [Public Route] A single comment with its author.
#[utoipa::path(
    get,
    path = "/comments/{id}",
    params(("id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Found", body = CommentWithAuthor),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CommentWithAuthor>> {
    state
        .repo
        .find_comment_with_author(&id)
        .await
        .map_err(|e| ApiError::internal("COMMENT_GET", e))?
        .map(Json)
        .ok_or(ApiError::NotFound("Comment not found"))
}

// --- Blog Handlers ---

/// list_posts
///
/// [Public Route] Latest blog posts, newest first.
#[utoipa::path(
    get,
    path = "/posts",
    params(PostQuery),
    responses(
        (status = 200, description = "Latest posts", body = [BlogPost]),
        (status = 400, description = "Malformed query", body = ErrorBody)
    )
)]
pub async fn list_posts(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<PostQuery>, ApiError>,
) -> ApiResult<Json<Vec<BlogPost>>> {
    let posts = state
        .repo
        .list_posts(query.effective_limit())
        .await
        .map_err(|e| ApiError::internal("POST_LIST", e))?;
    Ok(Json(posts))
}

/// get_post
///
/// [Public Route] A blog post by slug; the markdown body is returned as-is.
#[utoipa::path(
    get,
    path = "/posts/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Found", body = BlogPost),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<BlogPost>> {
    state
        .repo
        .find_post_by_slug(&slug)
        .await
        .map_err(|e| ApiError::internal("POST_GET", e))?
        .map(Json)
        .ok_or(ApiError::NotFound("Post not found"))
}
