use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("session not found")]
    SessionNotFound,
    #[error("invalid or expired oauth state")]
    InvalidOrExpiredState,
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("invalid grant: {0}")]
    InvalidGrant(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable(message.into())
    }

    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Machine-readable kind carried in every error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AuthenticationRequired | AppError::SessionNotFound => "authentication_required",
            AppError::InvalidOrExpiredState => "invalid_or_expired_state",
            AppError::ProviderUnavailable(_) => "provider_unavailable",
            AppError::InvalidGrant(_) => "invalid_grant",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "resource_not_found",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Database(err) if is_unavailable(err) => "store_unavailable",
            AppError::Database(_) => "internal",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationRequired | AppError::SessionNotFound => StatusCode::UNAUTHORIZED,
            AppError::InvalidOrExpiredState => StatusCode::BAD_REQUEST,
            AppError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidGrant(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(err) if is_unavailable(err) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller. Infrastructure failures never leak details.
    fn public_message(&self) -> String {
        match self {
            AppError::ProviderUnavailable(_) => "identity provider unavailable".to_string(),
            AppError::InvalidGrant(_) => "authorization code rejected".to_string(),
            AppError::StoreUnavailable(_) => "service temporarily unavailable".to_string(),
            AppError::Database(err) if is_unavailable(err) => "service temporarily unavailable".to_string(),
            AppError::Database(_) | AppError::Internal(_) | AppError::Configuration(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

fn is_unavailable(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        }

        let payload = ErrorResponse {
            error: self.kind(),
            message: self.public_message(),
        };

        (status, Json(payload)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
