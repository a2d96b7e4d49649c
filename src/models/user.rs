use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub provider_user_id: i64,
    pub username: String,
    pub nickname: String,
    pub avatar_url: String,
    pub trust_level: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

/// Profile fields cached in the session after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    #[schema(example = "alice")]
    pub username: String,
    #[schema(example = "Alice")]
    pub nickname: String,
    #[schema(example = "https://cdn.example.com/avatar/alice.png")]
    pub avatar_url: String,
    #[schema(example = 2)]
    pub trust_level: i64,
}

impl From<DbUser> for UserProfile {
    fn from(value: DbUser) -> Self {
        UserProfile {
            id: value.id,
            username: value.username,
            nickname: value.nickname,
            avatar_url: value.avatar_url,
            trust_level: value.trust_level,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CallbackRequest {
    #[schema(example = "3f0c2d6c8e1a4b7d9f6e5a4b3c2d1e0f")]
    pub state: String,
    #[schema(example = "provider-issued-code")]
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginUrlResponse {
    /// Provider authorization URL the client should navigate to.
    pub data: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
