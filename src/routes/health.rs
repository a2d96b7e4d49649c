use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use sqlx::query_scalar;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    pub session_store_ok: bool,
}

#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await.is_ok();

    let session_store_ok = match state.sessions.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "session store ping failed");
            false
        }
    };

    Json(HealthResponse {
        status: "ok",
        db_ok,
        session_store_ok,
    })
}
