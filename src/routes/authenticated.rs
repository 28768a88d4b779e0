use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{patch, post},
};

/// Authenticated Router Module
///
/// The comment mutation endpoints. No router-level auth layer sits in front of them:
/// each handler resolves the session itself and hands it to the mutation guard,
/// which answers 401 before the body is even parsed.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /comments
        // Creates a comment owned by the caller.
        .route("/comments", post(handlers::create_comment))
        // PATCH/DELETE /comments/{id}
        // Owner-only edit and delete: session, validation, existence, then ownership.
        .route(
            "/comments/{id}",
            patch(handlers::update_comment).delete(handlers::delete_comment),
        )
}
