use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::user::DbUser;
use crate::oauth::ProviderUser;

const USER_COLUMNS: &str =
    "id, provider_user_id, username, nickname, avatar_url, trust_level, created_at, updated_at, last_login_at";

/// Maps a provider identity onto an internal user, creating it on first login
/// and refreshing the cached profile on every later one.
pub async fn upsert_from_provider(pool: &SqlitePool, provider_user: &ProviderUser) -> AppResult<DbUser> {
    let now = chrono::Utc::now();
    let nickname = provider_user.name.clone().unwrap_or_default();
    let avatar_url = provider_user.avatar_url.clone().unwrap_or_default();

    sqlx::query(
        "INSERT INTO users (id, provider_user_id, username, nickname, avatar_url, trust_level, created_at, updated_at, last_login_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(provider_user_id) DO UPDATE SET \
           username = excluded.username, nickname = excluded.nickname, avatar_url = excluded.avatar_url, \
           trust_level = excluded.trust_level, updated_at = excluded.updated_at, last_login_at = excluded.last_login_at",
    )
    .bind(Uuid::new_v4())
    .bind(provider_user.id)
    .bind(&provider_user.username)
    .bind(&nickname)
    .bind(&avatar_url)
    .bind(provider_user.trust_level)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE provider_user_id = ?"))
        .bind(provider_user.id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::internal("user vanished after upsert"))
}
