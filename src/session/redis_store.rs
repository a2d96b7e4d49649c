use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::store::SessionStore;
use crate::errors::{AppError, AppResult};

/// Shared backend: every instance behind the load balancer sees the same sessions.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("invalid REDIS_URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;
        Ok(Self { conn })
    }
}

fn unavailable(err: redis::RedisError) -> AppError {
    AppError::store_unavailable(format!("redis: {err}"))
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn replace(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool> {
        // XX: nil reply when the key is gone.
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .arg("XX")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn take(&self, key: &str) -> AppResult<Option<String>> {
        // GETDEL (redis >= 6.2) reads and deletes atomically.
        let mut conn = self.conn.clone();
        redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(unavailable)
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(unavailable)
    }
}
