use crate::{AppState, handlers, sign_in};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no session: health, the blog and comment read paths, and the
/// sign-in flows that create sessions in the first place.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // --- Blog ---
        // GET /posts?limit=...
        // Latest posts, newest first (3 by default).
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{slug}
        .route("/posts/{slug}", get(handlers::get_post))
        // --- Comments (read path) ---
        .route("/comments", get(handlers::list_comments))
        .route("/comments/{id}", get(handlers::get_comment))
        // --- Sign-in flows ---
        .route("/auth/session", get(sign_in::get_session))
        .route("/auth/providers", get(sign_in::get_providers))
        .route("/auth/sign-in/{provider}", get(sign_in::sign_in))
        .route("/auth/callback/{provider}", get(sign_in::oauth_callback))
        .route("/auth/magic-link", post(sign_in::request_magic_link))
        .route("/auth/magic-link/verify", get(sign_in::verify_magic_link))
        .route("/auth/sign-out", post(sign_in::sign_out))
}
