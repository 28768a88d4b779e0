use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. It is built once by `load()` at
/// start-up, shared through `AppState`, and never mutated afterwards. The session
/// resolver and the sign-in flows read provider credentials and the signing secret
/// from here instead of from the process environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local `x-user-id` bypass and cookie flags.
    pub env: Env,
    // Postgres connection string. Local runs fall back to the in-memory store without it.
    pub db_url: Option<String>,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Public origin of this service; used for OAuth redirect URIs and magic links.
    pub base_url: String,
    // Browser origins allowed by CORS.
    pub trusted_origins: Vec<String>,
    // HMAC secret for session, magic-link and OAuth state tokens.
    pub auth_secret: String,
    // Lifetime of an issued session, in seconds.
    pub session_ttl_secs: i64,
    pub github: Option<OAuthCredentials>,
    pub google: Option<OAuthCredentials>,
    // Sender address for magic-link mail. Magic-link sign-in is disabled without it.
    pub email_from: Option<String>,
}

/// Env
///
/// Defines the runtime context: developer conveniences locally, hardened settings in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// OAuthCredentials
///
/// Client registration for one social provider.
#[derive(Clone, Debug, PartialEq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3200";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3200";
pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const LOCAL_AUTH_SECRET: &str = "local-development-auth-secret-value";

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for tests: local mode, no database, no providers,
    /// magic link enabled.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            trusted_origins: vec![DEFAULT_BASE_URL.to_string()],
            auth_secret: LOCAL_AUTH_SECRET.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            github: None,
            google: None,
            email_from: Some("noreply@localhost".to_string()),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables, failing fast.
    ///
    /// # Panics
    /// Panics if a variable required for the current environment is missing
    /// (`AUTH_SECRET` and `DATABASE_URL` in production) or if a numeric variable does
    /// not parse. The process must not start with an incomplete or insecure configuration.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (auth_secret, db_url) = match env {
            Env::Production => (
                env::var("AUTH_SECRET").expect("FATAL: AUTH_SECRET must be set in production."),
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
            ),
            Env::Local => (
                env::var("AUTH_SECRET").unwrap_or_else(|_| LOCAL_AUTH_SECRET.to_string()),
                env::var("DATABASE_URL").ok(),
            ),
        };

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let trusted_origins = match env::var("TRUSTED_ORIGINS") {
            Ok(list) => split_list(&list),
            Err(_) => vec![base_url.clone()],
        };

        let session_ttl_secs = match env::var("SESSION_TTL_SECS") {
            Ok(raw) => raw
                .parse()
                .expect("FATAL: SESSION_TTL_SECS must be an integer number of seconds"),
            Err(_) => DEFAULT_SESSION_TTL_SECS,
        };

        let email_from = match env {
            Env::Production => env::var("EMAIL_FROM").ok(),
            Env::Local => {
                Some(env::var("EMAIL_FROM").unwrap_or_else(|_| "noreply@localhost".to_string()))
            }
        };

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            github: credentials("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
            google: credentials("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            env,
            db_url,
            base_url,
            trusted_origins,
            auth_secret,
            session_ttl_secs,
            email_from,
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}

/// A provider is enabled only when both halves of its credentials are present.
fn credentials(id_var: &str, secret_var: &str) -> Option<OAuthCredentials> {
    match (env::var(id_var), env::var(secret_var)) {
        (Ok(client_id), Ok(client_secret)) if !client_id.is_empty() && !client_secret.is_empty() => {
            Some(OAuthCredentials {
                client_id,
                client_secret,
            })
        }
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_end_matches('/'))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
