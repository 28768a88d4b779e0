use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use cookie::time::Duration as CookieDuration;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::ApiError,
    models::Identity,
    repository::{RepoError, Repository, RepositoryState},
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_token";
/// Development-only header naming a user id directly.
pub const DEV_USER_HEADER: &str = "x-user-id";

const MAGIC_LINK_TTL_MINUTES: i64 = 15;
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// AuthError
///
/// Failures of the auth collaborator itself, as opposed to "no session", which is
/// a normal `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("session lookup failed: {0}")]
    Backend(#[from] RepoError),
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

// --- Tokens ---

/// TokenKind
///
/// Every token this service signs carries its purpose, so a magic-link or OAuth
/// state token can never be replayed as a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    Session,
    MagicLink,
    OauthState,
}

pub trait TokenClaims: Serialize + DeserializeOwned {
    const KIND: TokenKind;
    fn kind(&self) -> TokenKind;
}

/// SessionClaims
///
/// Payload of a session token. `sub` is the user's id in the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub kind: TokenKind,
}

impl SessionClaims {
    pub fn new(user_id: Uuid, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            kind: TokenKind::Session,
        }
    }
}

impl TokenClaims for SessionClaims {
    const KIND: TokenKind = TokenKind::Session;
    fn kind(&self) -> TokenKind {
        self.kind
    }
}

/// MagicLinkClaims
///
/// Payload of the token embedded in a magic sign-in link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicLinkClaims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub kind: TokenKind,
}

impl MagicLinkClaims {
    pub fn new(email: &str) -> Self {
        let now = Utc::now();
        Self {
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(MAGIC_LINK_TTL_MINUTES)).timestamp(),
            kind: TokenKind::MagicLink,
        }
    }
}

impl TokenClaims for MagicLinkClaims {
    const KIND: TokenKind = TokenKind::MagicLink;
    fn kind(&self) -> TokenKind {
        self.kind
    }
}

/// StateClaims
///
/// Signed OAuth `state` parameter, bound to the provider it was issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateClaims {
    pub provider: String,
    pub nonce: String,
    pub iat: i64,
    pub exp: i64,
    pub kind: TokenKind,
}

impl StateClaims {
    pub fn new(provider: &str) -> Self {
        let now = Utc::now();
        Self {
            provider: provider.to_string(),
            nonce: Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(OAUTH_STATE_TTL_MINUTES)).timestamp(),
            kind: TokenKind::OauthState,
        }
    }
}

impl TokenClaims for StateClaims {
    const KIND: TokenKind = TokenKind::OauthState;
    fn kind(&self) -> TokenKind {
        self.kind
    }
}

/// Signs `claims` with the configured HMAC secret.
pub fn sign<C: TokenClaims>(config: &AppConfig, claims: &C) -> Result<String, AuthError> {
    let key = EncodingKey::from_secret(config.auth_secret.as_bytes());
    Ok(encode(&Header::default(), claims, &key)?)
}

/// Decodes and validates a token of kind `C::KIND`.
///
/// Bad signatures, expired tokens, malformed input and kind mismatches all yield `None`.
pub fn verify<C: TokenClaims>(config: &AppConfig, token: &str) -> Option<C> {
    let key = DecodingKey::from_secret(config.auth_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<C>(token, &key, &validation) {
        Ok(data) if data.claims.kind() == C::KIND => Some(data.claims),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("rejected {:?} token: {:?}", C::KIND, e.kind());
            None
        }
    }
}

/// Issues a session token for `user_id` with the configured lifetime.
pub fn issue_session(config: &AppConfig, user_id: Uuid) -> Result<String, AuthError> {
    sign(config, &SessionClaims::new(user_id, config.session_ttl_secs))
}

// --- Cookies ---

/// The session credential: the session cookie first, then a Bearer token.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_owned)
        })
}

/// The `Set-Cookie` carrying a freshly issued session token.
pub fn session_cookie(config: &AppConfig, token: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_owned()))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(config.is_production())
        .max_age(CookieDuration::seconds(config.session_ttl_secs))
        .build()
}

/// An already-expired session cookie. Path and flags match the issued one so the
/// browser overwrites it.
pub fn session_cookie_removal(config: &AppConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE)
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(config.is_production())
        .build();
    cookie.make_removal();
    cookie
}

// --- Session Resolver ---

/// SessionResolver
///
/// `resolve(headers) -> Identity | None`. Absence of a valid session is `Ok(None)`;
/// only a failure of the auth collaborator itself is an error.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError>;
}

/// TokenSessionResolver
///
/// Validates the signed session token and loads the user it names. Built per request
/// from borrowed state; holds no data of its own.
pub struct TokenSessionResolver<'a> {
    config: &'a AppConfig,
    repo: &'a dyn Repository,
}

impl<'a> TokenSessionResolver<'a> {
    pub fn new(config: &'a AppConfig, repo: &'a dyn Repository) -> Self {
        Self { config, repo }
    }

    /// Local development bypass: an `x-user-id` header naming an existing user.
    async fn dev_bypass(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError> {
        if self.config.is_production() {
            return Ok(None);
        }
        let Some(user_id) = headers
            .get(DEV_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok())
        else {
            return Ok(None);
        };
        Ok(self.repo.get_user(user_id).await?.map(Identity::from))
    }
}

#[async_trait]
impl SessionResolver for TokenSessionResolver<'_> {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError> {
        if let Some(identity) = self.dev_bypass(headers).await? {
            return Ok(Some(identity));
        }

        let Some(token) = session_token(headers) else {
            return Ok(None);
        };
        let Some(claims) = verify::<SessionClaims>(self.config, &token) else {
            return Ok(None);
        };

        // A token for a deleted user is just a stale session.
        let user = self.repo.get_user(claims.sub).await?;
        Ok(user.map(Identity::from))
    }
}

/// Session Extractor
///
/// Resolves the request's session without rejecting anonymous callers: handlers
/// receive `Session(None)` and the mutation guard decides what that means. Rejects
/// with a 500 only when the session store fails.
#[derive(Debug, Clone)]
pub struct Session(pub Option<Identity>);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        TokenSessionResolver::new(&config, repo.as_ref())
            .resolve(&parts.headers)
            .await
            .map(Session)
            .map_err(|e| ApiError::internal("SESSION", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_found_among_several_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("a=1; session_token=abc.def.ghi; b=2"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_used_when_cookie_absent_or_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        assert_eq!(session_token(&headers).as_deref(), Some("tok"));

        headers.insert(header::COOKIE, HeaderValue::from_static("session_token="));
        assert_eq!(session_token(&headers).as_deref(), Some("tok"));

        headers.insert(header::COOKIE, HeaderValue::from_static("session_token=cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("cookie"));
    }

    #[test]
    fn token_kinds_do_not_cross() {
        let config = AppConfig::default();
        let magic = sign(&config, &MagicLinkClaims::new("a@b.co")).unwrap();
        assert!(verify::<SessionClaims>(&config, &magic).is_none());
        assert!(verify::<MagicLinkClaims>(&config, &magic).is_some());
    }

    #[test]
    fn cookie_flags_follow_env() {
        let mut config = AppConfig::default();
        let local = session_cookie(&config, "t");
        assert_eq!(local.http_only(), Some(true));
        assert_eq!(local.same_site(), Some(SameSite::Lax));
        assert_eq!(local.path(), Some("/"));
        assert_ne!(local.secure(), Some(true));
        assert_eq!(
            local.max_age(),
            Some(CookieDuration::seconds(config.session_ttl_secs))
        );

        config.env = crate::config::Env::Production;
        assert_eq!(session_cookie(&config, "t").secure(), Some(true));

        let removal = session_cookie_removal(&config);
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(CookieDuration::ZERO));
        assert_eq!(removal.secure(), Some(true));
    }
}
