use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, Method, Request, Uri, header, request::Parts},
};
use blog_portal::{
    AppState, ApiError, MemoryRepository, MockMailer, OAuthClient,
    auth::{self, MagicLinkClaims, Session, SessionClaims, SessionResolver, TokenKind, TokenSessionResolver},
    config::{AppConfig, Env},
    models::{BlogPost, Comment, CommentWithAuthor, User, UserProfile},
    repository::{RepoError, RepoResult, Repository},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

// --- Failing Repository for Session Store Errors ---

struct UnreachableStore;

#[async_trait]
impl Repository for UnreachableStore {
    async fn get_user(&self, _id: Uuid) -> RepoResult<Option<User>> {
        Err(RepoError::Unavailable("connection refused".into()))
    }
    // Nothing below is reached by the resolver.
    async fn find_comment(&self, _id: &str) -> RepoResult<Option<Comment>> {
        Ok(None)
    }
    async fn find_comment_with_author(&self, _id: &str) -> RepoResult<Option<CommentWithAuthor>> {
        Ok(None)
    }
    async fn list_comments(&self) -> RepoResult<Vec<CommentWithAuthor>> {
        Ok(vec![])
    }
    async fn create_comment(&self, _user_id: Uuid, _content: &str) -> RepoResult<Comment> {
        Err(RepoError::Unavailable("connection refused".into()))
    }
    async fn update_comment(&self, _id: &str, _content: &str) -> RepoResult<Option<Comment>> {
        Ok(None)
    }
    async fn delete_comment(&self, _id: &str) -> RepoResult<bool> {
        Ok(false)
    }
    async fn list_posts(&self, _limit: i64) -> RepoResult<Vec<BlogPost>> {
        Ok(vec![])
    }
    async fn find_post_by_slug(&self, _slug: &str) -> RepoResult<Option<BlogPost>> {
        Ok(None)
    }
    async fn upsert_user(&self, _profile: UserProfile) -> RepoResult<User> {
        Err(RepoError::Unavailable("connection refused".into()))
    }
}

// --- Test Helpers ---

const TEST_AUTH_SECRET: &str = "integration-test-auth-secret";

fn test_user() -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        name: "Reader".to_string(),
        email: "reader@example.com".to_string(),
        image: Some("https://img.example.com/reader.png".to_string()),
        created_at: now,
        updated_at: now,
    }
}

fn test_config(env: Env) -> AppConfig {
    AppConfig {
        env,
        auth_secret: TEST_AUTH_SECRET.to_string(),
        ..AppConfig::default()
    }
}

/// Builds an AppState whose store knows exactly one user.
async fn state_with_user(env: Env, user: User) -> AppState {
    let repo = MemoryRepository::new();
    repo.insert_user(user).await;
    AppState {
        repo: Arc::new(repo),
        mailer: Arc::new(MockMailer::new()),
        oauth: OAuthClient::new().unwrap(),
        config: test_config(env),
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn parts_with(name: header::HeaderName, value: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts
        .headers
        .insert(name, header::HeaderValue::from_str(value).unwrap());
    parts
}

fn bearer(token: &str) -> Parts {
    parts_with(header::AUTHORIZATION, &format!("Bearer {}", token))
}

// --- Tests ---

#[tokio::test]
async fn test_session_resolves_with_valid_bearer_token() {
    let user = test_user();
    let state = state_with_user(Env::Production, user.clone()).await;
    let token = auth::issue_session(&state.config, user.id).unwrap();

    let mut parts = bearer(&token);
    let Session(identity) = Session::from_request_parts(&mut parts, &state).await.unwrap();

    let identity = identity.expect("session should resolve");
    assert_eq!(identity.id, user.id);
    assert_eq!(identity.name, "Reader");
    assert_eq!(identity.email.as_deref(), Some("reader@example.com"));
    assert_eq!(identity.image, user.image);
}

#[tokio::test]
async fn test_session_resolves_from_cookie() {
    let user = test_user();
    let state = state_with_user(Env::Production, user.clone()).await;
    let token = auth::issue_session(&state.config, user.id).unwrap();

    let mut parts = parts_with(
        header::COOKIE,
        &format!("theme=dark; {}={}", auth::SESSION_COOKIE, token),
    );
    let Session(identity) = Session::from_request_parts(&mut parts, &state).await.unwrap();

    assert_eq!(identity.map(|i| i.id), Some(user.id));
}

#[tokio::test]
async fn test_missing_credentials_are_anonymous() {
    let state = state_with_user(Env::Production, test_user()).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    let session = Session::from_request_parts(&mut parts, &state).await;

    assert!(matches!(session, Ok(Session(None))));
}

#[tokio::test]
async fn test_expired_token_is_anonymous() {
    let user = test_user();
    let state = state_with_user(Env::Production, user.clone()).await;
    let now = Utc::now().timestamp();
    let expired = SessionClaims {
        sub: user.id,
        iat: now - 7200,
        exp: now - 3600,
        kind: TokenKind::Session,
    };
    let token = auth::sign(&state.config, &expired).unwrap();

    let mut parts = bearer(&token);
    let session = Session::from_request_parts(&mut parts, &state).await;

    assert!(matches!(session, Ok(Session(None))));
}

#[tokio::test]
async fn test_garbage_and_foreign_tokens_are_anonymous() {
    let user = test_user();
    let state = state_with_user(Env::Production, user.clone()).await;

    let foreign_config = AppConfig {
        auth_secret: "another-secret".to_string(),
        ..test_config(Env::Production)
    };
    let foreign = auth::issue_session(&foreign_config, user.id).unwrap();
    let magic = auth::sign(&state.config, &MagicLinkClaims::new(&user.email)).unwrap();

    for token in ["not-a-jwt", "a.b.c", foreign.as_str(), magic.as_str()] {
        let mut parts = bearer(token);
        let session = Session::from_request_parts(&mut parts, &state).await;
        assert!(matches!(session, Ok(Session(None))), "token {token} resolved");
    }
}

#[tokio::test]
async fn test_token_for_unknown_user_is_anonymous() {
    let state = state_with_user(Env::Production, test_user()).await;
    let token = auth::issue_session(&state.config, Uuid::new_v4()).unwrap();

    let mut parts = bearer(&token);
    let session = Session::from_request_parts(&mut parts, &state).await;

    assert!(matches!(session, Ok(Session(None))));
}

#[tokio::test]
async fn test_local_bypass_success() {
    let user = test_user();
    let state = state_with_user(Env::Local, user.clone()).await;

    let mut parts = parts_with(
        header::HeaderName::from_static(auth::DEV_USER_HEADER),
        &user.id.to_string(),
    );
    let Session(identity) = Session::from_request_parts(&mut parts, &state).await.unwrap();

    assert_eq!(identity.map(|i| i.id), Some(user.id));
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let user = test_user();
    let state = state_with_user(Env::Production, user.clone()).await;

    let mut parts = parts_with(
        header::HeaderName::from_static(auth::DEV_USER_HEADER),
        &user.id.to_string(),
    );
    let session = Session::from_request_parts(&mut parts, &state).await;

    assert!(matches!(session, Ok(Session(None))));
}

#[tokio::test]
async fn test_store_failure_is_an_error_not_anonymous() {
    let config = test_config(Env::Production);
    let token = auth::issue_session(&config, Uuid::new_v4()).unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let resolver = TokenSessionResolver::new(&config, &UnreachableStore);
    assert!(resolver.resolve(&headers).await.is_err());

    let state = AppState {
        repo: Arc::new(UnreachableStore),
        mailer: Arc::new(MockMailer::new()),
        oauth: OAuthClient::new().unwrap(),
        config,
    };
    let mut parts = bearer(&token);
    let session = Session::from_request_parts(&mut parts, &state).await;
    assert_eq!(session.unwrap_err(), ApiError::Internal);
}

#[tokio::test]
async fn test_resolver_ignores_token_without_store_call_when_invalid() {
    // An invalid token must not reach the store: the unreachable store would error.
    let config = test_config(Env::Production);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Bearer definitely-not-valid"),
    );

    let resolver = TokenSessionResolver::new(&config, &UnreachableStore);
    assert!(matches!(resolver.resolve(&headers).await, Ok(None)));
}
