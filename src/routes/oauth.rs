use axum::extract::State;
use axum::Json;
use axum_extra::extract::{CookieJar, WithRejection};

use crate::app::AppState;
use crate::auth::{cookies, CurrentSession};
use crate::errors::{AppError, AppResult};
use crate::models::user::{CallbackRequest, LoginUrlResponse, MessageResponse, UserProfile};

#[utoipa::path(
    get,
    path = "/v1/oauth/login",
    tag = "OAuth",
    responses(
        (status = 200, description = "Provider authorization URL; sets the session cookie", body = LoginUrlResponse),
        (status = 503, description = "Session store unavailable")
    )
)]
pub async fn login(State(state): State<AppState>, jar: CookieJar) -> AppResult<(CookieJar, Json<LoginUrlResponse>)> {
    let existing = match cookies::session_id(&jar, &state.cookies) {
        Some(id) => match state.sessions.get_session(&id).await {
            Ok(_) => Some(id),
            Err(AppError::SessionNotFound) => None,
            Err(err) => return Err(err),
        },
        None => None,
    };

    let session_id = match existing {
        Some(id) => id,
        None => state.sessions.create_session().await?,
    };

    let url = state.oauth.build_login_url(&session_id).await?;
    let jar = jar.add(cookies::session_cookie(&state.cookies, &session_id));

    Ok((jar, Json(LoginUrlResponse { data: url.into() })))
}

#[utoipa::path(
    post,
    path = "/v1/oauth/callback",
    tag = "OAuth",
    request_body = CallbackRequest,
    responses(
        (status = 200, description = "Login completed; reissues the session cookie", body = UserProfile),
        (status = 400, description = "Invalid or expired state, or rejected code"),
        (status = 502, description = "Identity provider unavailable")
    )
)]
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<CallbackRequest>, AppError>,
) -> AppResult<(CookieJar, Json<UserProfile>)> {
    // Without the session that issued the state there is nothing to match against.
    let session_id = cookies::session_id(&jar, &state.cookies).ok_or(AppError::InvalidOrExpiredState)?;

    let login = state
        .oauth
        .handle_callback(&session_id, &payload.state, &payload.code)
        .await?;

    let jar = jar.add(cookies::session_cookie(&state.cookies, &login.session));
    Ok((jar, Json(login.profile)))
}

#[utoipa::path(
    get,
    path = "/v1/oauth/logout",
    tag = "OAuth",
    responses(
        (status = 200, description = "Session destroyed", body = MessageResponse),
        (status = 401, description = "Not logged in")
    ),
    security(("sessionCookie" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    session: CurrentSession,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    state.oauth.logout(&session.id).await?;
    tracing::info!(user_id = %session.user.id, "logged out");

    let jar = jar.remove(cookies::clear_session_cookie(&state.cookies));
    Ok((
        jar,
        Json(MessageResponse {
            message: "logged out".to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/oauth/user-info",
    tag = "OAuth",
    responses(
        (status = 200, description = "Cached profile of the current user", body = UserProfile),
        (status = 401, description = "Not logged in")
    ),
    security(("sessionCookie" = []))
)]
pub async fn user_info(session: CurrentSession) -> Json<UserProfile> {
    Json(session.user.profile)
}
