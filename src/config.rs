use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::errors::AppError;

/// Process configuration. Built once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub session: SessionConfig,
    pub redis: RedisConfig,
    pub oauth: OAuthConfig,
    pub database_url: String,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub app_name: String,
    pub env: String,
    pub addr: SocketAddr,
    /// Mount point for every API route, e.g. `/api`. Empty means root.
    pub api_prefix: String,
}

impl AppSettings {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    /// Log filter used when `RUST_LOG` is unset; quieter in production.
    pub fn default_log_filter(&self) -> &'static str {
        if self.is_production() {
            "info"
        } else {
            "debug,hyper=info,sqlx=warn"
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_domain: Option<String>,
    /// Cookie max-age and server-side session TTL.
    pub max_age: Duration,
    pub http_only: bool,
    pub secure: bool,
    pub store_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "cdk_session".to_string(),
            cookie_domain: None,
            max_age: Duration::from_secs(7 * 24 * 3600),
            http_only: true,
            secure: false,
            store_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: Url,
    pub token_url: Url,
    pub user_info_url: Url,
    pub revoke_url: Option<Url>,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    pub state_ttl: Duration,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let app = AppSettings {
            app_name: env_or("APP_NAME", "cdk-edge"),
            env: env_or("APP_ENV", "development"),
            addr: parse_env("APP_ADDR", "0.0.0.0:8000")?,
            api_prefix: normalize_prefix(&env_or("APP_API_PREFIX", "/api")),
        };

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            cookie_name: env_or("SESSION_COOKIE_NAME", &defaults.cookie_name),
            cookie_domain: std::env::var("SESSION_DOMAIN").ok().filter(|d| !d.is_empty()),
            max_age: Duration::from_secs(parse_env("SESSION_AGE_SECS", "604800")?),
            http_only: parse_env("SESSION_HTTP_ONLY", "true")?,
            secure: parse_env("SESSION_SECURE", "false")?,
            store_timeout: Duration::from_millis(parse_env("SESSION_STORE_TIMEOUT_MS", "3000")?),
        };

        let redis = RedisConfig {
            url: required("REDIS_URL")?,
            key_prefix: env_or("REDIS_KEY_PREFIX", "cdk"),
        };

        let scopes = env_or("OAUTH_SCOPES", "read")
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let oauth = OAuthConfig {
            client_id: required("OAUTH_CLIENT_ID")?,
            client_secret: required("OAUTH_CLIENT_SECRET")?,
            authorize_url: required_url("OAUTH_AUTHORIZATION_ENDPOINT")?,
            token_url: required_url("OAUTH_TOKEN_ENDPOINT")?,
            user_info_url: required_url("OAUTH_USER_ENDPOINT")?,
            revoke_url: match std::env::var("OAUTH_REVOKE_ENDPOINT") {
                Ok(value) if !value.is_empty() => Some(parse_url("OAUTH_REVOKE_ENDPOINT", &value)?),
                _ => None,
            },
            redirect_uri: required_url("OAUTH_REDIRECT_URI")?,
            scopes,
            state_ttl: Duration::from_secs(parse_env("OAUTH_STATE_TTL_SECS", "600")?),
            http_timeout: Duration::from_millis(parse_env("OAUTH_HTTP_TIMEOUT_MS", "10000")?),
        };

        Ok(Self {
            app,
            session,
            redis,
            oauth,
            database_url: required("DATABASE_URL")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required(key: &str) -> Result<String, AppError> {
    std::env::var(key).map_err(|_| AppError::configuration(format!("{key} not set")))
}

fn required_url(key: &str) -> Result<Url, AppError> {
    let value = required(key)?;
    parse_url(key, &value)
}

fn parse_url(key: &str, value: &str) -> Result<Url, AppError> {
    Url::parse(value).map_err(|err| AppError::configuration(format!("{key} is not a valid URL: {err}")))
}

fn parse_env<T: FromStr>(key: &str, default: &str) -> Result<T, AppError> {
    env_or(key, default)
        .parse::<T>()
        .map_err(|_| AppError::configuration(format!("{key} has an invalid value")))
}

pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
