use crate::{
    AppState,
    auth::{self, MagicLinkClaims, Session, StateClaims},
    error::{ApiError, ApiResult},
    models::{AuthProviders, ErrorBody, Identity, MagicLinkRequest, SuccessResponse, UserProfile},
    oauth::{self, Provider},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{WithRejection, cookie::CookieJar};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

const UNKNOWN_PROVIDER: &str = "Unknown provider";

/// CallbackQuery
///
/// Parameters the provider appends when redirecting back.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declined consent.
    pub error: Option<String>,
}

/// VerifyQuery
///
/// A link stripped of its token is treated like any other unusable link.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

/// get_session
///
/// [Public Route] The caller's identity, or `null` when anonymous.
#[utoipa::path(
    get,
    path = "/auth/session",
    responses((status = 200, description = "Current identity or null", body = Identity))
)]
pub async fn get_session(Session(session): Session) -> Json<Option<Identity>> {
    Json(session)
}

/// get_providers
///
/// [Public Route] Sign-in methods enabled by configuration.
#[utoipa::path(
    get,
    path = "/auth/providers",
    responses((status = 200, description = "Enabled providers", body = AuthProviders))
)]
pub async fn get_providers(State(state): State<AppState>) -> Json<AuthProviders> {
    Json(AuthProviders {
        github: state.config.github.is_some(),
        google: state.config.google.is_some(),
        magic_link: state.config.email_from.is_some(),
    })
}

/// sign_in
///
/// [Public Route] Starts a social sign-in by redirecting to the provider's consent
/// page. The `state` parameter is a short-lived signed token bound to the provider.
#[utoipa::path(
    get,
    path = "/auth/sign-in/{provider}",
    params(("provider" = String, Path, description = "github | google")),
    responses(
        (status = 302, description = "Redirect to the provider"),
        (status = 404, description = "Unknown or disabled provider", body = ErrorBody)
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> ApiResult<Response> {
    let provider = enabled_provider(&state, &provider)?;
    let state_token = auth::sign(&state.config, &StateClaims::new(provider.slug()))
        .map_err(|e| ApiError::internal("OAUTH_SIGN_IN", e))?;
    let url = oauth::authorize_url(&state.config, provider, &state_token)
        .map_err(|e| ApiError::internal("OAUTH_SIGN_IN", e))?;

    Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
}

/// oauth_callback
///
/// [Public Route] Completes a social sign-in: verifies `state`, exchanges the code,
/// links or creates the user by email (provider name and avatar win), then sets the
/// session cookie.
#[utoipa::path(
    get,
    path = "/auth/callback/{provider}",
    params(("provider" = String, Path, description = "github | google"), CallbackQuery),
    responses(
        (status = 303, description = "Signed in; redirect home"),
        (status = 400, description = "Invalid state or missing code", body = ErrorBody),
        (status = 502, description = "Provider failure", body = ErrorBody)
    )
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<CallbackQuery>, ApiError>,
) -> ApiResult<Response> {
    let provider = enabled_provider(&state, &provider)?;

    let state_ok = query
        .state
        .as_deref()
        .and_then(|token| auth::verify::<StateClaims>(&state.config, token))
        .is_some_and(|claims| claims.provider == provider.slug());
    if !state_ok {
        return Err(ApiError::InvalidInput("Invalid state"));
    }
    if let Some(error) = query.error {
        tracing::info!("{} sign-in declined: {}", provider.slug(), error);
        return Err(ApiError::Unauthorized);
    }
    let code = query.code.ok_or(ApiError::InvalidInput("Missing code"))?;

    let access_token = state
        .oauth
        .exchange_code(&state.config, provider, &code)
        .await
        .map_err(|e| bad_gateway(provider, e))?;
    let profile = state
        .oauth
        .fetch_profile(provider, &access_token)
        .await
        .map_err(|e| bad_gateway(provider, e))?;

    start_session(&state, profile, "OAUTH_CALLBACK").await
}

/// request_magic_link
///
/// [Public Route] Mails a one-time sign-in link valid for 15 minutes.
#[utoipa::path(
    post,
    path = "/auth/magic-link",
    request_body = MagicLinkRequest,
    responses(
        (status = 200, description = "Link sent", body = SuccessResponse),
        (status = 400, description = "Invalid email", body = ErrorBody),
        (status = 404, description = "Magic link disabled", body = ErrorBody)
    )
)]
pub async fn request_magic_link(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SuccessResponse>> {
    if state.config.email_from.is_none() {
        return Err(ApiError::NotFound("Magic link sign-in is disabled"));
    }

    let request: MagicLinkRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::InvalidInput("Invalid email"))?;
    let email = request.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::InvalidInput("Invalid email"));
    }

    let token = auth::sign(&state.config, &MagicLinkClaims::new(&email))
        .map_err(|e| ApiError::internal("MAGIC_LINK", e))?;
    let link = format!("{}/auth/magic-link/verify?token={}", state.config.base_url, token);

    state
        .mailer
        .send_magic_link(&email, &link)
        .await
        .map_err(|e| ApiError::internal("MAGIC_LINK", e))?;

    Ok(Json(SuccessResponse::ok()))
}

/// verify_magic_link
///
/// [Public Route] Redeems a magic link: links or creates the user by email and sets
/// the session cookie.
#[utoipa::path(
    get,
    path = "/auth/magic-link/verify",
    params(VerifyQuery),
    responses(
        (status = 303, description = "Signed in; redirect home"),
        (status = 401, description = "Invalid or expired link", body = ErrorBody)
    )
)]
pub async fn verify_magic_link(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<VerifyQuery>, ApiError>,
) -> ApiResult<Response> {
    let claims = query
        .token
        .as_deref()
        .and_then(|token| auth::verify::<MagicLinkClaims>(&state.config, token))
        .ok_or(ApiError::Unauthorized)?;

    let profile = UserProfile {
        email: claims.email,
        name: None,
        image: None,
    };
    start_session(&state, profile, "MAGIC_LINK_VERIFY").await
}

/// sign_out
///
/// [Public Route] Clears the session cookie. Session tokens are stateless, so
/// there is nothing to revoke server-side.
#[utoipa::path(
    post,
    path = "/auth/sign-out",
    responses((status = 200, description = "Signed out", body = SuccessResponse))
)]
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(auth::session_cookie_removal(&state.config)),
        Json(SuccessResponse::ok()),
    )
}

// --- Helpers ---

fn enabled_provider(state: &AppState, slug: &str) -> ApiResult<Provider> {
    Provider::from_slug(slug)
        .filter(|provider| provider.credentials(&state.config).is_some())
        .ok_or(ApiError::NotFound(UNKNOWN_PROVIDER))
}

fn bad_gateway(provider: Provider, cause: oauth::OAuthError) -> ApiError {
    tracing::error!("[OAUTH_CALLBACK] {}: {:?}", provider.slug(), cause);
    ApiError::BadGateway
}

async fn start_session(state: &AppState, profile: UserProfile, tag: &str) -> ApiResult<Response> {
    let user = state
        .repo
        .upsert_user(profile)
        .await
        .map_err(|e| ApiError::internal(tag, e))?;
    let token =
        auth::issue_session(&state.config, user.id).map_err(|e| ApiError::internal(tag, e))?;
    tracing::info!("user {} signed in", user.id);

    let jar = CookieJar::new().add(auth::session_cookie(&state.config, &token));
    Ok((jar, Redirect::to("/")).into_response())
}

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("compile email regex")
});

/// Shape check only: one `@`, a dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}
