//! OAuth login flow against the external identity provider.
//!
//! The state nonce lives in the session as a read-once transient, so a
//! callback is accepted at most once per issued login URL regardless of what
//! the provider itself guarantees.

mod provider;

pub use provider::{HttpIdentityProvider, IdentityProvider, ProviderToken, ProviderUser};

use std::sync::Arc;

use rand_core::{OsRng, RngCore};
use sqlx::SqlitePool;
use url::Url;

use crate::config::OAuthConfig;
use crate::db::users;
use crate::errors::{AppError, AppResult};
use crate::models::user::UserProfile;
use crate::session::{SessionId, SessionManager, SessionUser};

const STATE_KEY: &str = "oauth_state";

/// Outcome of a successful callback: the new authenticated session and its user.
#[derive(Debug, Clone)]
pub struct CompletedLogin {
    pub session: SessionId,
    pub profile: UserProfile,
}

#[derive(Clone)]
pub struct OAuthClient {
    config: Arc<OAuthConfig>,
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionManager,
    pool: SqlitePool,
}

impl OAuthClient {
    pub fn new(
        config: OAuthConfig,
        provider: Arc<dyn IdentityProvider>,
        sessions: SessionManager,
        pool: SqlitePool,
    ) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            sessions,
            pool,
        }
    }

    pub async fn build_login_url(&self, session: &SessionId) -> AppResult<Url> {
        let state = generate_state();
        self.sessions
            .put_transient(session, STATE_KEY, &state, self.config.state_ttl)
            .await?;

        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", &state);

        tracing::debug!(session = ?session, "login url issued");
        Ok(url)
    }

    /// Validates and consumes the state, then completes the code exchange.
    ///
    /// The authenticated user lands on a fresh session id and the pre-login
    /// session is destroyed, so an id planted before login is worthless after it.
    pub async fn handle_callback(&self, session: &SessionId, received_state: &str, code: &str) -> AppResult<CompletedLogin> {
        let expected = self
            .sessions
            .take_transient(session, STATE_KEY)
            .await
            .map_err(|err| match err {
                AppError::SessionNotFound => AppError::InvalidOrExpiredState,
                other => other,
            })?;

        match expected {
            Some(expected) if !received_state.is_empty() && expected == received_state => {}
            _ => {
                tracing::warn!(session = ?session, "oauth state rejected");
                return Err(AppError::InvalidOrExpiredState);
            }
        }

        let token = self.provider.exchange_code(code).await?;
        let provider_user = self.provider.fetch_user_info(&token.access_token).await?;

        if !provider_user.active {
            tracing::warn!(provider_user_id = provider_user.id, "inactive provider account refused");
            return Err(AppError::forbidden("account is not active"));
        }

        let user = users::upsert_from_provider(&self.pool, &provider_user).await?;
        let profile = UserProfile::from(user);

        let rotated = self.sessions.create_session().await?;
        self.sessions
            .set_user(
                &rotated,
                SessionUser {
                    id: profile.id,
                    profile: profile.clone(),
                    access_token: Some(token.access_token),
                },
            )
            .await?;
        self.sessions.destroy(session).await?;

        tracing::info!(user_id = %profile.id, username = %profile.username, "login completed");
        Ok(CompletedLogin {
            session: rotated,
            profile,
        })
    }

    /// Revocation failures are logged and ignored; the session is always destroyed.
    pub async fn logout(&self, session: &SessionId) -> AppResult<()> {
        let access_token = match self.sessions.get_session(session).await {
            Ok(record) => record.user.and_then(|user| user.access_token),
            Err(AppError::SessionNotFound) => None,
            Err(err) => return Err(err),
        };

        if let Some(token) = access_token {
            if let Err(err) = self.provider.revoke(&token).await {
                tracing::warn!(error = %err, "token revocation failed");
            }
        }

        self.sessions.destroy(session).await
    }
}

fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_unique() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
