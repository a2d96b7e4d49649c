use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::authz::Authorized;
use crate::db::projects::{self as repo, NewProject};
use crate::errors::{AppError, AppResult};
use crate::models::project::{
    normalize_items, normalize_tags, validate_name, validate_window, Project, ProjectCreateRequest,
    ProjectUpdateRequest, ReceiveCandidate, ReceivedItem,
};

#[utoipa::path(
    get,
    path = "/v1/projects",
    tag = "Projects",
    responses((status = 200, description = "Projects created by the caller", body = [Project])),
    security(("sessionCookie" = []))
)]
pub async fn list_projects(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Vec<Project>>> {
    let projects = repo::list_by_creator(&state.pool, user.user_id).await?;
    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/v1/projects",
    tag = "Projects",
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Invalid project")
    ),
    security(("sessionCookie" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Json(payload), _): WithRejection<Json<ProjectCreateRequest>, AppError>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let name = validate_name(&payload.name)?;
    validate_window(payload.start_time, payload.end_time)?;
    let tags = normalize_tags(&payload.tags)?;
    let items = normalize_items(&payload.items);
    if items.is_empty() {
        return Err(AppError::bad_request("a project needs at least one item"));
    }

    let project_id = repo::insert_project(
        &state.pool,
        NewProject {
            creator_id: user.user_id,
            name,
            description: payload.description,
            tags,
            start_time: payload.start_time,
            end_time: payload.end_time,
            minimum_trust_level: payload.minimum_trust_level,
            items,
        },
    )
    .await?;

    tracing::info!(user_id = %user.user_id, project_id = %project_id, "project created");

    let project = repo::fetch_project(&state.pool, project_id)
        .await?
        .ok_or_else(|| AppError::internal("project vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/v1/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail", body = Project),
        (status = 404, description = "Project not found")
    ),
    security(("sessionCookie" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Project>> {
    let project = repo::fetch_project(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("project not found"))?;
    Ok(Json(project))
}

#[utoipa::path(
    put,
    path = "/v1/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 403, description = "Caller is not the creator"),
        (status = 404, description = "Project not found")
    ),
    security(("sessionCookie" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    Extension(Authorized(mut project)): Extension<Authorized<Project>>,
    WithRejection(Json(payload), _): WithRejection<Json<ProjectUpdateRequest>, AppError>,
) -> AppResult<Json<Project>> {
    if let Some(name) = payload.name.as_deref() {
        project.name = validate_name(name)?;
    }
    if payload.description.is_some() {
        project.description = payload.description;
    }
    if let Some(start_time) = payload.start_time {
        project.start_time = start_time;
    }
    if let Some(end_time) = payload.end_time {
        project.end_time = end_time;
    }
    if let Some(level) = payload.minimum_trust_level {
        project.minimum_trust_level = level;
    }
    validate_window(project.start_time, project.end_time)?;

    let tags = payload.tags.as_deref().map(normalize_tags).transpose()?;
    let items = normalize_items(&payload.items);

    repo::update_project(&state.pool, &project, tags.as_deref(), &items).await?;
    tracing::info!(user_id = %project.creator_id, project_id = %project.id, "project updated");

    let project = repo::fetch_project(&state.pool, project.id)
        .await?
        .ok_or_else(|| AppError::not_found("project not found"))?;
    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/v1/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project soft deleted"),
        (status = 403, description = "Caller is not the creator"),
        (status = 404, description = "Project not found")
    ),
    security(("sessionCookie" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(Authorized(project)): Extension<Authorized<Project>>,
) -> AppResult<StatusCode> {
    repo::soft_delete_project(&state.pool, project.id).await?;
    tracing::info!(user_id = %project.creator_id, project_id = %project.id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/projects/{id}/receive",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Item received", body = ReceivedItem),
        (status = 403, description = "Caller is not eligible"),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Lost the race for the last item")
    ),
    security(("sessionCookie" = []))
)]
pub async fn receive_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Extension(Authorized(candidate)): Extension<Authorized<ReceiveCandidate>>,
) -> AppResult<Json<ReceivedItem>> {
    let item = repo::claim_item(&state.pool, candidate.project.id, user.user_id).await?;
    tracing::info!(user_id = %user.user_id, project_id = %candidate.project.id, "item received");
    Ok(Json(item))
}

#[utoipa::path(
    get,
    path = "/v1/projects/received",
    tag = "Projects",
    responses((status = 200, description = "Items received by the caller", body = [ReceivedItem])),
    security(("sessionCookie" = []))
)]
pub async fn list_received(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Vec<ReceivedItem>>> {
    let items = repo::list_received(&state.pool, user.user_id).await?;
    Ok(Json(items))
}
