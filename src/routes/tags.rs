use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::db::projects as repo;
use crate::errors::AppResult;

#[utoipa::path(
    get,
    path = "/v1/tags",
    tag = "Tags",
    responses((status = 200, description = "Distinct tags of live projects", body = [String])),
    security(("sessionCookie" = []))
)]
pub async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let tags = repo::list_tags(&state.pool).await?;
    Ok(Json(tags))
}
