use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use blog_portal::{
    AppState, ApiError, MemoryRepository, MockMailer, OAuthClient,
    auth::Session,
    config::AppConfig,
    handlers::{self, PostQuery},
    models::{BlogPost, ErrorBody, Identity, SuccessResponse, User},
};
use axum_extra::extract::WithRejection;
use chrono::{Duration, Utc};
use std::{marker::PhantomData, sync::Arc};
use tokio::test;
use uuid::Uuid;

// --- TEST UTILITIES ---

const AUTHOR_ID: Uuid = Uuid::from_u128(0x1111);
const OTHER_ID: Uuid = Uuid::from_u128(0x2222);

fn account(id: Uuid, name: &str) -> User {
    let now = Utc::now();
    User {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        image: None,
        created_at: now,
        updated_at: now,
    }
}

fn session_of(id: Uuid, name: &str) -> Session {
    Session(Some(Identity::from(account(id, name))))
}

fn author() -> Session {
    session_of(AUTHOR_ID, "Author")
}

fn other() -> Session {
    session_of(OTHER_ID, "Other")
}

fn anonymous() -> Session {
    Session(None)
}

fn json_body(content: &str) -> Bytes {
    Bytes::from(serde_json::json!({ "content": content }).to_string())
}

fn posts_query(query: PostQuery) -> WithRejection<Query<PostQuery>, ApiError> {
    WithRejection(Query(query), PhantomData)
}

async fn create_test_state(repo: MemoryRepository) -> AppState {
    repo.insert_user(account(AUTHOR_ID, "Author")).await;
    repo.insert_user(account(OTHER_ID, "Other")).await;
    AppState {
        repo: Arc::new(repo),
        mailer: Arc::new(MockMailer::new()),
        oauth: OAuthClient::new().unwrap(),
        config: AppConfig::default(),
    }
}

async fn error_body(error: ApiError) -> (StatusCode, ErrorBody) {
    let response = error.into_response();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    (parts.status, serde_json::from_slice(&bytes).unwrap())
}

// --- COMMENT MUTATIONS ---

#[test]
async fn test_create_comment_success() {
    let state = create_test_state(MemoryRepository::new()).await;

    let Json(comment) =
        handlers::create_comment(author(), State(state.clone()), json_body("Nice write-up"))
            .await
            .unwrap();

    assert_eq!(comment.content, "Nice write-up");
    assert_eq!(comment.user_id, AUTHOR_ID);
    assert!(state.repo.find_comment(&comment.id).await.unwrap().is_some());
}

#[test]
async fn test_create_comment_requires_session() {
    let state = create_test_state(MemoryRepository::new()).await;

    let result = handlers::create_comment(anonymous(), State(state.clone()), json_body("hi")).await;

    let (status, body) = error_body(result.unwrap_err()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.error, "Unauthorized");
    assert!(state.repo.list_comments().await.unwrap().is_empty());
}

#[test]
async fn test_update_comment_by_owner() {
    let state = create_test_state(MemoryRepository::new()).await;
    let created = state.repo.create_comment(AUTHOR_ID, "typo").await.unwrap();

    let Json(updated) = handlers::update_comment(
        author(),
        State(state.clone()),
        Path(created.id.clone()),
        json_body("  fixed  "),
    )
    .await
    .unwrap();

    assert_eq!(updated.content, "fixed");
    assert_eq!(updated.user_id, AUTHOR_ID);
    assert!(updated.updated_at >= created.updated_at);
}

#[test]
async fn test_update_comment_by_other_user_is_forbidden() {
    let state = create_test_state(MemoryRepository::new()).await;
    let created = state.repo.create_comment(AUTHOR_ID, "mine").await.unwrap();

    let result = handlers::update_comment(
        other(),
        State(state.clone()),
        Path(created.id.clone()),
        json_body("not yours"),
    )
    .await;

    let (status, body) = error_body(result.unwrap_err()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body.error, "Forbidden");
    let stored = state.repo.find_comment(&created.id).await.unwrap().unwrap();
    assert_eq!(stored.content, "mine");
}

#[test]
async fn test_update_comment_rejects_blank_content() {
    let state = create_test_state(MemoryRepository::new()).await;
    let created = state.repo.create_comment(AUTHOR_ID, "keep").await.unwrap();

    let result = handlers::update_comment(
        author(),
        State(state.clone()),
        Path(created.id.clone()),
        Bytes::from_static(b"{\"content\":\"   \"}"),
    )
    .await;

    let (status, body) = error_body(result.unwrap_err()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.error, "Invalid content");
}

#[test]
async fn test_update_missing_comment_is_not_found() {
    let state = create_test_state(MemoryRepository::new()).await;

    let result = handlers::update_comment(
        other(),
        State(state),
        Path("does-not-exist".to_string()),
        json_body("anything"),
    )
    .await;

    let (status, body) = error_body(result.unwrap_err()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.error, "Comment not found");
}

#[test]
async fn test_delete_comment_lifecycle() {
    let state = create_test_state(MemoryRepository::new()).await;
    let created = state.repo.create_comment(AUTHOR_ID, "bye").await.unwrap();

    let forbidden =
        handlers::delete_comment(other(), State(state.clone()), Path(created.id.clone())).await;
    assert_eq!(forbidden.unwrap_err(), ApiError::Forbidden);

    let Json(done) =
        handlers::delete_comment(author(), State(state.clone()), Path(created.id.clone()))
            .await
            .unwrap();
    assert_eq!(done, SuccessResponse { success: true });

    let again =
        handlers::delete_comment(author(), State(state.clone()), Path(created.id.clone())).await;
    assert_eq!(again.unwrap_err(), ApiError::NotFound("Comment not found"));
}

// --- READ PATHS ---

#[test]
async fn test_get_comment_includes_author() {
    let state = create_test_state(MemoryRepository::new()).await;
    let created = state.repo.create_comment(OTHER_ID, "hello").await.unwrap();

    let Json(found) = handlers::get_comment(State(state.clone()), Path(created.id.clone()))
        .await
        .unwrap();
    assert_eq!(found.author_name, "Other");
    assert_eq!(found.content, "hello");

    let missing = handlers::get_comment(State(state), Path("nope".to_string())).await;
    assert_eq!(missing.unwrap_err(), ApiError::NotFound("Comment not found"));
}

#[test]
async fn test_list_comments_newest_first() {
    let state = create_test_state(MemoryRepository::new()).await;
    let first = state.repo.create_comment(AUTHOR_ID, "first").await.unwrap();
    let second = state.repo.create_comment(OTHER_ID, "second").await.unwrap();

    let Json(listing) = handlers::list_comments(State(state)).await.unwrap();

    let ids: Vec<&str> = listing.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
}

#[test]
async fn test_list_posts_respects_limit() {
    let now = Utc::now();
    let posts = (0..6)
        .map(|n| BlogPost {
            id: format!("id-{n}"),
            slug: format!("slug-{n}"),
            title: format!("Title {n}"),
            content: "# Heading".to_string(),
            created_at: now - Duration::hours(n),
        })
        .collect();
    let state = create_test_state(MemoryRepository::with_posts(posts)).await;

    let Json(default) = handlers::list_posts(State(state.clone()), posts_query(PostQuery::default()))
        .await
        .unwrap();
    assert_eq!(default.len(), 3);
    assert_eq!(default[0].slug, "slug-0");

    let Json(two) = handlers::list_posts(State(state.clone()), posts_query(PostQuery { limit: Some(2) }))
        .await
        .unwrap();
    assert_eq!(two.len(), 2);

    let Json(post) = handlers::get_post(State(state.clone()), Path("slug-4".to_string()))
        .await
        .unwrap();
    assert_eq!(post.content, "# Heading");

    let missing = handlers::get_post(State(state), Path("slug-99".to_string())).await;
    assert_eq!(missing.unwrap_err(), ApiError::NotFound("Post not found"));
}
