use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::OAuthConfig;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderToken {
    pub access_token: String,
}

/// Identity as reported by the provider's user-info endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub trust_level: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// The external identity provider, treated as opaque.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn exchange_code(&self, code: &str) -> AppResult<ProviderToken>;

    async fn fetch_user_info(&self, access_token: &str) -> AppResult<ProviderUser>;

    /// Best effort. Providers without a revocation endpoint return `Ok(())`.
    async fn revoke(&self, access_token: &str) -> AppResult<()>;
}

pub struct HttpIdentityProvider {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl HttpIdentityProvider {
    pub fn new(config: OAuthConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| AppError::configuration(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { config, http })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response, operation: &str) -> AppResult<T> {
        let body = response
            .bytes()
            .await
            .map_err(|err| AppError::provider_unavailable(format!("{operation}: {err}")))?;
        let mut de = serde_json::Deserializer::from_slice(&body);
        serde_path_to_error::deserialize(&mut de)
            .map_err(|err| AppError::provider_unavailable(format!("{operation}: malformed response at {}", err.path())))
    }
}

fn transport_error(operation: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::provider_unavailable(format!("{operation}: timed out"))
    } else {
        AppError::provider_unavailable(format!("{operation}: {err}"))
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn exchange_code(&self, code: &str) -> AppResult<ProviderToken> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(self.config.token_url.clone())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|err| transport_error("token exchange", err))?;

        match response.status() {
            status if status.is_success() => Self::read_json(response, "token exchange").await,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                let detail = response.text().await.unwrap_or_default();
                Err(AppError::invalid_grant(detail))
            }
            status => Err(AppError::provider_unavailable(format!("token exchange returned {status}"))),
        }
    }

    async fn fetch_user_info(&self, access_token: &str) -> AppResult<ProviderUser> {
        let response = self
            .http
            .get(self.config.user_info_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| transport_error("user info", err))?;

        if !response.status().is_success() {
            return Err(AppError::provider_unavailable(format!(
                "user info returned {}",
                response.status()
            )));
        }

        Self::read_json(response, "user info").await
    }

    async fn revoke(&self, access_token: &str) -> AppResult<()> {
        let Some(revoke_url) = self.config.revoke_url.clone() else {
            return Ok(());
        };

        let response = self
            .http
            .post(revoke_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("token", access_token), ("token_type_hint", "access_token")])
            .send()
            .await
            .map_err(|err| transport_error("token revocation", err))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::provider_unavailable(format!(
                "token revocation returned {}",
                response.status()
            )))
        }
    }
}
