//! Login gate: resolves the session cookie to an authenticated principal.

pub mod cookies;

use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppError;
use crate::session::{SessionId, SessionUser};

/// Session of the authenticated caller, attached by [`require_login`].
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub id: SessionId,
    pub user: SessionUser,
}

/// Rejects anonymous callers with `AuthenticationRequired` before any handler
/// runs. Never writes to the session.
pub async fn require_login(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session_id = cookies::session_id(&jar, &state.cookies).ok_or(AppError::AuthenticationRequired)?;

    let record = match state.sessions.get_session(&session_id).await {
        Ok(record) => record,
        Err(AppError::SessionNotFound) => return Err(AppError::AuthenticationRequired),
        Err(err) => return Err(err),
    };

    let user = record.user.ok_or(AppError::AuthenticationRequired)?;

    req.extensions_mut().insert(Principal::from(&user));
    req.extensions_mut().insert(CurrentSession { id: session_id, user });

    Ok(next.run(req).await)
}

/// Authenticated caller for handlers behind [`require_login`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::AuthenticationRequired)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or(AppError::AuthenticationRequired)
    }
}
