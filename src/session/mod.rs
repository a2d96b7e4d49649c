//! Server-side sessions referenced by an opaque cookie id.
//!
//! [`SessionManager`] owns key layout, serialization and TTLs; the
//! [`SessionStore`] backend only moves strings. Every call goes to the store,
//! so horizontally scaled instances always agree on session state.

mod redis_store;
mod store;

pub use self::redis_store::RedisSessionStore;
pub use self::store::{MemorySessionStore, SessionStore};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::user::UserProfile;

const SESSION_ID_BYTES: usize = 32;

/// Opaque session identifier, 64 lowercase hex characters.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Accepts only well-formed ids so arbitrary cookie values never reach the store.
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = raw.len() == SESSION_ID_BYTES * 2
            && raw.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep ids out of logs.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}…)", &self.0[..8])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub profile: UserProfile,
    /// Provider access token, kept server-side for revocation on logout.
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user: Option<SessionUser>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    key_prefix: String,
    ttl: Duration,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, key_prefix: impl Into<String>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
            ttl,
            timeout,
        }
    }

    pub async fn create_session(&self) -> AppResult<SessionId> {
        let id = SessionId::generate();
        let now = Utc::now();
        let record = SessionRecord {
            user: None,
            created_at: now,
            expires_at: now + self.chrono_ttl(),
        };
        self.write(&id, &record).await?;
        tracing::debug!(session = ?id, "session created");
        Ok(id)
    }

    pub async fn get_session(&self, id: &SessionId) -> AppResult<SessionRecord> {
        let raw = self
            .bounded(self.store.get(&self.session_key(id)))
            .await?
            .ok_or(AppError::SessionNotFound)?;

        serde_json::from_str(&raw).map_err(|err| AppError::internal(format!("corrupt session record: {err}")))
    }

    /// `Ok(None)` means the session exists but login has not completed.
    pub async fn get_user(&self, id: &SessionId) -> AppResult<Option<Uuid>> {
        let record = self.get_session(id).await?;
        Ok(record.user.map(|user| user.id))
    }

    /// Marks the session authenticated and restarts its TTL.
    ///
    /// The write only lands if the session still exists, so a concurrent
    /// `destroy` wins and the session stays gone.
    pub async fn set_user(&self, id: &SessionId, user: SessionUser) -> AppResult<()> {
        let mut record = self.get_session(id).await?;
        record.user = Some(user);
        record.expires_at = Utc::now() + self.chrono_ttl();

        let raw = encode(&record)?;
        let written = self
            .bounded(self.store.replace(&self.session_key(id), raw, self.ttl))
            .await?;
        if !written {
            return Err(AppError::SessionNotFound);
        }
        Ok(())
    }

    pub async fn destroy(&self, id: &SessionId) -> AppResult<()> {
        self.bounded(self.store.delete(&self.session_key(id))).await?;
        tracing::debug!(session = ?id, "session destroyed");
        Ok(())
    }

    pub async fn put_transient(&self, id: &SessionId, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.get_session(id).await?;
        self.bounded(self.store.put(&self.transient_key(id, key), value.to_string(), ttl))
            .await
    }

    /// Destructive read; a value is returned at most once.
    pub async fn take_transient(&self, id: &SessionId, key: &str) -> AppResult<Option<String>> {
        // Transients outlive a destroyed session only until their own TTL;
        // requiring the session makes them unreachable immediately.
        self.get_session(id).await?;
        self.bounded(self.store.take(&self.transient_key(id, key))).await
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.bounded(self.store.ping()).await
    }

    async fn write(&self, id: &SessionId, record: &SessionRecord) -> AppResult<()> {
        let raw = encode(record)?;
        self.bounded(self.store.put(&self.session_key(id), raw, self.ttl)).await
    }

    async fn bounded<T>(&self, fut: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| AppError::store_unavailable("session store timed out"))?
    }

    fn session_key(&self, id: &SessionId) -> String {
        let digest = Sha256::digest(id.as_str().as_bytes());
        format!("{}:session:{}", self.key_prefix, hex::encode(digest))
    }

    fn transient_key(&self, id: &SessionId, key: &str) -> String {
        format!("{}:t:{}", self.session_key(id), key)
    }

    fn chrono_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(7))
    }
}

fn encode(record: &SessionRecord) -> AppResult<String> {
    serde_json::to_string(record).map_err(|err| AppError::internal(format!("failed to encode session: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn manager(ttl: Duration) -> SessionManager {
        SessionManager::new(Arc::new(MemorySessionStore::new()), "test", ttl, Duration::from_secs(1))
    }

    fn user(id: Uuid) -> SessionUser {
        SessionUser {
            id,
            profile: UserProfile {
                id,
                username: "alice".into(),
                nickname: "Alice".into(),
                avatar_url: String::new(),
                trust_level: 1,
            },
            access_token: None,
        }
    }

    #[test]
    fn session_ids_are_random_and_parseable() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(SessionId::parse(a.as_str()), Some(a));
        assert!(SessionId::parse("not-a-session").is_none());
        assert!(SessionId::parse(&"G".repeat(64)).is_none());
    }

    #[tokio::test]
    async fn new_session_is_anonymous() {
        let sessions = manager(Duration::from_secs(60));
        let id = sessions.create_session().await.unwrap();
        assert_eq!(sessions.get_user(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_user_then_get_user_until_destroy() {
        let sessions = manager(Duration::from_secs(60));
        let id = sessions.create_session().await.unwrap();
        let user_id = Uuid::new_v4();

        sessions.set_user(&id, user(user_id)).await.unwrap();
        assert_eq!(sessions.get_user(&id).await.unwrap(), Some(user_id));

        sessions.destroy(&id).await.unwrap();
        assert!(matches!(sessions.get_user(&id).await, Err(AppError::SessionNotFound)));
        // idempotent
        sessions.destroy(&id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn session_expires_after_ttl() {
        let sessions = manager(Duration::from_secs(30));
        let id = sessions.create_session().await.unwrap();
        sessions.set_user(&id, user(Uuid::new_v4())).await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(sessions.get_user(&id).await, Err(AppError::SessionNotFound)));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let sessions = manager(Duration::from_secs(60));
        let result = sessions.get_user(&SessionId::generate()).await;
        assert!(matches!(result, Err(AppError::SessionNotFound)));
    }

    #[tokio::test]
    async fn transient_values_are_read_once() {
        let sessions = manager(Duration::from_secs(60));
        let id = sessions.create_session().await.unwrap();

        sessions
            .put_transient(&id, "oauth_state", "nonce", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            sessions.take_transient(&id, "oauth_state").await.unwrap().as_deref(),
            Some("nonce")
        );
        assert_eq!(sessions.take_transient(&id, "oauth_state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn transients_are_unreachable_after_destroy() {
        let sessions = manager(Duration::from_secs(60));
        let id = sessions.create_session().await.unwrap();
        sessions
            .put_transient(&id, "oauth_state", "nonce", Duration::from_secs(60))
            .await
            .unwrap();
        sessions.destroy(&id).await.unwrap();

        assert!(matches!(
            sessions.take_transient(&id, "oauth_state").await,
            Err(AppError::SessionNotFound)
        ));
    }

    /// Deletes the key right after the next read, like a logout landing
    /// between `set_user`'s read and its write.
    #[derive(Default)]
    struct DestroyAfterRead {
        inner: MemorySessionStore,
        armed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl SessionStore for DestroyAfterRead {
        async fn put(&self, key: &str, value: String, ttl: Duration) -> AppResult<()> {
            self.inner.put(key, value, ttl).await
        }
        async fn replace(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool> {
            self.inner.replace(key, value, ttl).await
        }
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            let value = self.inner.get(key).await?;
            if self.armed.swap(false, std::sync::atomic::Ordering::SeqCst) {
                self.inner.delete(key).await?;
            }
            Ok(value)
        }
        async fn take(&self, key: &str) -> AppResult<Option<String>> {
            self.inner.take(key).await
        }
        async fn delete(&self, key: &str) -> AppResult<()> {
            self.inner.delete(key).await
        }
        async fn ping(&self) -> AppResult<()> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn set_user_does_not_resurrect_destroyed_session() {
        let store = Arc::new(DestroyAfterRead::default());
        let sessions = SessionManager::new(store.clone(), "test", Duration::from_secs(60), Duration::from_secs(1));
        let id = sessions.create_session().await.unwrap();

        store.armed.store(true, std::sync::atomic::Ordering::SeqCst);
        let result = sessions.set_user(&id, user(Uuid::new_v4())).await;

        assert!(matches!(result, Err(AppError::SessionNotFound)));
        assert!(matches!(sessions.get_user(&id).await, Err(AppError::SessionNotFound)));
    }

    struct HangingStore;

    #[async_trait]
    impl SessionStore for HangingStore {
        async fn put(&self, _: &str, _: String, _: Duration) -> AppResult<()> {
            std::future::pending().await
        }
        async fn replace(&self, _: &str, _: String, _: Duration) -> AppResult<bool> {
            std::future::pending().await
        }
        async fn get(&self, _: &str) -> AppResult<Option<String>> {
            std::future::pending().await
        }
        async fn take(&self, _: &str) -> AppResult<Option<String>> {
            std::future::pending().await
        }
        async fn delete(&self, _: &str) -> AppResult<()> {
            std::future::pending().await
        }
        async fn ping(&self) -> AppResult<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn store_timeouts_surface_as_unavailable() {
        let sessions = SessionManager::new(Arc::new(HangingStore), "test", Duration::from_secs(60), Duration::from_millis(50));
        let result = sessions.get_user(&SessionId::generate()).await;
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    }
}
