#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

use cdk_edge::config::{AppConfig, AppSettings, OAuthConfig, RedisConfig, SessionConfig};
use cdk_edge::errors::{AppError, AppResult};
use cdk_edge::oauth::{IdentityProvider, ProviderToken, ProviderUser};
use cdk_edge::session::{MemorySessionStore, SessionStore};
use cdk_edge::{create_app, AppState};

pub const PREFIX: &str = "/api";

/// Identity provider answering from a fixed table of codes.
///
/// Codes map to users; `"provider-down"` simulates an outage and any unknown
/// code is rejected as an invalid grant.
#[derive(Default)]
pub struct ScriptedProvider {
    users: HashMap<String, ProviderUser>,
    pub revoked: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn with_user(mut self, code: &str, id: i64, username: &str, trust_level: i64) -> Self {
        self.users.insert(
            code.to_string(),
            ProviderUser {
                id,
                username: username.to_string(),
                name: Some(username.to_uppercase()),
                avatar_url: Some(format!("https://cdn.example.com/{username}.png")),
                trust_level,
                active: true,
            },
        );
        self
    }

    pub fn with_inactive_user(mut self, code: &str, id: i64, username: &str) -> Self {
        self = self.with_user(code, id, username, 0);
        if let Some(user) = self.users.get_mut(code) {
            user.active = false;
        }
        self
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn exchange_code(&self, code: &str) -> AppResult<ProviderToken> {
        if code == "provider-down" {
            return Err(AppError::provider_unavailable("connection refused"));
        }
        if !self.users.contains_key(code) {
            return Err(AppError::invalid_grant("unknown code"));
        }
        Ok(ProviderToken {
            access_token: format!("token-{code}"),
        })
    }

    async fn fetch_user_info(&self, access_token: &str) -> AppResult<ProviderUser> {
        let code = access_token.trim_start_matches("token-");
        self.users
            .get(code)
            .cloned()
            .ok_or_else(|| AppError::provider_unavailable("unknown token"))
    }

    async fn revoke(&self, access_token: &str) -> AppResult<()> {
        self.revoked
            .lock()
            .map_err(|_| AppError::internal("poisoned"))?
            .push(access_token.to_string());
        Ok(())
    }
}

/// Session backend that is always down.
pub struct UnreachableStore;

#[async_trait]
impl SessionStore for UnreachableStore {
    async fn put(&self, _: &str, _: String, _: Duration) -> AppResult<()> {
        Err(AppError::store_unavailable("connection refused"))
    }
    async fn replace(&self, _: &str, _: String, _: Duration) -> AppResult<bool> {
        Err(AppError::store_unavailable("connection refused"))
    }
    async fn get(&self, _: &str) -> AppResult<Option<String>> {
        Err(AppError::store_unavailable("connection refused"))
    }
    async fn take(&self, _: &str) -> AppResult<Option<String>> {
        Err(AppError::store_unavailable("connection refused"))
    }
    async fn delete(&self, _: &str) -> AppResult<()> {
        Err(AppError::store_unavailable("connection refused"))
    }
    async fn ping(&self) -> AppResult<()> {
        Err(AppError::store_unavailable("connection refused"))
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        app: AppSettings {
            app_name: "cdk-edge-test".into(),
            env: "test".into(),
            addr: "127.0.0.1:0".parse().expect("valid addr"),
            api_prefix: PREFIX.into(),
        },
        session: SessionConfig::default(),
        redis: RedisConfig {
            url: "redis://127.0.0.1:6379".into(),
            key_prefix: "cdk-test".into(),
        },
        oauth: OAuthConfig {
            client_id: "cdk-client".into(),
            client_secret: "cdk-secret".into(),
            authorize_url: "https://idp.example.com/oauth2/authorize".parse().expect("valid url"),
            token_url: "https://idp.example.com/oauth2/token".parse().expect("valid url"),
            user_info_url: "https://idp.example.com/api/user".parse().expect("valid url"),
            revoke_url: None,
            redirect_uri: "https://cdk.example.com/callback".parse().expect("valid url"),
            scopes: vec!["read".into()],
            state_ttl: Duration::from_secs(600),
            http_timeout: Duration::from_secs(5),
        },
        database_url: "sqlite::memory:".into(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub state: AppState,
    pub provider: Arc<ScriptedProvider>,
    _dir: TempDir,
}

pub async fn spawn_app(provider: ScriptedProvider) -> Result<TestApp> {
    spawn_app_with_store(provider, Arc::new(MemorySessionStore::new())).await
}

pub async fn spawn_app_with_store(provider: ScriptedProvider, store: Arc<dyn SessionStore>) -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let config = test_config();
    let provider = Arc::new(provider);
    let state = AppState::new(&config, pool.clone(), store, provider.clone());
    let router = create_app(state.clone(), PREFIX);

    Ok(TestApp {
        router,
        pool,
        state,
        provider,
        _dir: dir,
    })
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` pair of the first Set-Cookie header.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string)
    }
}

impl TestApp {
    pub async fn request(&self, method: &str, path: &str, cookie: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(format!("{PREFIX}{path}"));
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.router.clone().oneshot(req).await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Ok(TestResponse { status, headers, body })
    }

    /// Starts a login and returns the session cookie plus the issued state.
    pub async fn begin_login(&self, cookie: Option<&str>) -> Result<(String, String)> {
        let resp = self.request("GET", "/v1/oauth/login", cookie, None).await?;
        assert_eq!(resp.status, StatusCode::OK, "login failed: {}", resp.body);

        let cookie = resp.session_cookie().context("login did not set a cookie")?;
        let url = resp.body["data"].as_str().context("login url missing")?;
        let url = url::Url::parse(url)?;
        let state = url
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .context("state missing from login url")?;

        Ok((cookie, state))
    }

    /// Full login through the provider; returns the rotated, authenticated cookie.
    pub async fn login(&self, code: &str) -> Result<String> {
        let (cookie, state) = self.begin_login(None).await?;
        let resp = self
            .request(
                "POST",
                "/v1/oauth/callback",
                Some(&cookie),
                Some(serde_json::json!({ "state": state, "code": code })),
            )
            .await?;
        assert_eq!(resp.status, StatusCode::OK, "callback failed: {}", resp.body);
        resp.session_cookie().context("callback did not reissue the cookie")
    }
}

pub fn project_body(name: &str, items: &[&str], minimum_trust_level: i64) -> Value {
    let now = chrono::Utc::now();
    serde_json::json!({
        "name": name,
        "description": "test project",
        "tags": ["games", "beta"],
        "start_time": (now - chrono::Duration::hours(1)).to_rfc3339(),
        "end_time": (now + chrono::Duration::days(1)).to_rfc3339(),
        "minimum_trust_level": minimum_trust_level,
        "items": items,
    })
}
