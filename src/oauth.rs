use reqwest::{StatusCode, Url, header};
use serde::Deserialize;

use crate::{
    config::{AppConfig, OAuthCredentials},
    models::UserProfile,
};

/// OAuthError
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("provider {0} is not configured")]
    NotConfigured(&'static str),
    #[error("invalid provider url: {0}")]
    InvalidUrl(String),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider answered {0}")]
    Rejected(StatusCode),
    #[error("provider returned no usable email address")]
    MissingEmail,
}

/// Provider
///
/// The social sign-in providers this service knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    GitHub,
    Google,
}

impl Provider {
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "github" => Some(Provider::GitHub),
            "google" => Some(Provider::Google),
            _ => None,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Google => "google",
        }
    }

    fn authorize_endpoint(&self) -> &'static str {
        match self {
            Provider::GitHub => "https://github.com/login/oauth/authorize",
            Provider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
        }
    }

    fn token_endpoint(&self) -> &'static str {
        match self {
            Provider::GitHub => "https://github.com/login/oauth/access_token",
            Provider::Google => "https://oauth2.googleapis.com/token",
        }
    }

    fn scope(&self) -> &'static str {
        match self {
            Provider::GitHub => "read:user user:email",
            Provider::Google => "openid email profile",
        }
    }

    /// Client credentials, if this provider is enabled.
    pub fn credentials<'c>(&self, config: &'c AppConfig) -> Option<&'c OAuthCredentials> {
        match self {
            Provider::GitHub => config.github.as_ref(),
            Provider::Google => config.google.as_ref(),
        }
    }
}

/// Where the provider sends the browser back to.
pub fn redirect_uri(config: &AppConfig, provider: Provider) -> String {
    format!("{}/auth/callback/{}", config.base_url, provider.slug())
}

/// authorize_url
///
/// The provider's consent page for this client, carrying the signed `state`.
pub fn authorize_url(
    config: &AppConfig,
    provider: Provider,
    state: &str,
) -> Result<Url, OAuthError> {
    let credentials = provider
        .credentials(config)
        .ok_or(OAuthError::NotConfigured(provider.slug()))?;
    let redirect_uri = redirect_uri(config, provider);

    Url::parse_with_params(
        provider.authorize_endpoint(),
        &[
            ("client_id", credentials.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", provider.scope()),
            ("response_type", "code"),
            ("state", state),
        ],
    )
    .map_err(|e| OAuthError::InvalidUrl(e.to_string()))
}

/// Response from the OAuth token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct GoogleUser {
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Maps a GitHub account onto a profile. The public email wins; otherwise the
/// primary verified address from `/user/emails` is used.
pub fn github_profile(user: GitHubUser, emails: &[GitHubEmail]) -> Result<UserProfile, OAuthError> {
    let email = user
        .email
        .filter(|email| !email.is_empty())
        .or_else(|| {
            emails
                .iter()
                .find(|e| e.primary && e.verified)
                .map(|e| e.email.clone())
        })
        .ok_or(OAuthError::MissingEmail)?;

    Ok(UserProfile {
        email,
        name: Some(user.name.filter(|name| !name.is_empty()).unwrap_or(user.login)),
        image: user.avatar_url,
    })
}

/// Maps a Google OpenID profile. Unverified addresses are refused.
pub fn google_profile(user: GoogleUser) -> Result<UserProfile, OAuthError> {
    let email = user
        .email
        .filter(|_| user.email_verified.unwrap_or(false))
        .ok_or(OAuthError::MissingEmail)?;

    Ok(UserProfile {
        email,
        name: user.name,
        image: user.picture,
    })
}

/// OAuthClient
///
/// Performs the authorization-code exchange and profile lookup against a provider.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
}

impl OAuthClient {
    /// Built once at start-up and shared through `AppState`.
    pub fn new() -> Result<Self, OAuthError> {
        // GitHub's API refuses requests without a User-Agent.
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Trades the callback `code` for a provider access token.
    pub async fn exchange_code(
        &self,
        config: &AppConfig,
        provider: Provider,
        code: &str,
    ) -> Result<String, OAuthError> {
        let credentials = provider
            .credentials(config)
            .ok_or(OAuthError::NotConfigured(provider.slug()))?;
        let redirect_uri = redirect_uri(config, provider);

        let response = self
            .http
            .post(provider.token_endpoint())
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Rejected(response.status()));
        }

        let token = response.json::<TokenResponse>().await?;
        Ok(token.access_token)
    }

    /// Loads the signed-in account's profile with the access token.
    pub async fn fetch_profile(
        &self,
        provider: Provider,
        access_token: &str,
    ) -> Result<UserProfile, OAuthError> {
        match provider {
            Provider::GitHub => {
                let user: GitHubUser = self.get_json("https://api.github.com/user", access_token).await?;
                let emails: Vec<GitHubEmail> = if user.email.is_some() {
                    Vec::new()
                } else {
                    self.get_json("https://api.github.com/user/emails", access_token)
                        .await?
                };
                github_profile(user, &emails)
            }
            Provider::Google => {
                let user: GoogleUser = self
                    .get_json("https://openidconnect.googleapis.com/v1/userinfo", access_token)
                    .await?;
                google_profile(user)
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, OAuthError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Rejected(response.status()));
        }
        Ok(response.json::<T>().await?)
    }
}
