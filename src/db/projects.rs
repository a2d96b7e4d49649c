use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::authz::{Principal, ResourceLoader};
use crate::errors::{AppError, AppResult};
use crate::models::project::{DbProject, DbReceivedItem, Project, ReceiveCandidate, ReceivedItem};

const PROJECT_SELECT: &str = "SELECT p.id, p.creator_id, p.name, p.description, p.start_time, p.end_time, \
     p.minimum_trust_level, p.created_at, p.updated_at, \
     (SELECT COUNT(1) FROM project_items i WHERE i.project_id = p.id) AS total_items, \
     (SELECT COUNT(1) FROM project_items i WHERE i.project_id = p.id AND i.receiver_id IS NULL) AS remaining_items \
     FROM projects p";

pub struct NewProject {
    pub creator_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub minimum_trust_level: i64,
    pub items: Vec<String>,
}

pub async fn fetch_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<Option<Project>> {
    let row = sqlx::query_as::<_, DbProject>(&format!(
        "{PROJECT_SELECT} WHERE p.id = ? AND p.deleted_at IS NULL"
    ))
    .bind(project_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let tags = fetch_tags(pool, row.id).await?;
            Ok(Some(row.into_project(tags)))
        }
        None => Ok(None),
    }
}

pub async fn list_by_creator(pool: &SqlitePool, creator_id: Uuid) -> AppResult<Vec<Project>> {
    let rows = sqlx::query_as::<_, DbProject>(&format!(
        "{PROJECT_SELECT} WHERE p.creator_id = ? AND p.deleted_at IS NULL ORDER BY p.created_at DESC"
    ))
    .bind(creator_id)
    .fetch_all(pool)
    .await?;

    let mut projects = Vec::with_capacity(rows.len());
    for row in rows {
        let tags = fetch_tags(pool, row.id).await?;
        projects.push(row.into_project(tags));
    }
    Ok(projects)
}

pub async fn insert_project(pool: &SqlitePool, project: NewProject) -> AppResult<Uuid> {
    let project_id = Uuid::new_v4();
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO projects (id, creator_id, name, description, start_time, end_time, minimum_trust_level, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(project.creator_id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.start_time)
    .bind(project.end_time)
    .bind(project.minimum_trust_level)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    replace_tags(&mut tx, project_id, &project.tags).await?;
    insert_items(&mut tx, project_id, &project.items, now).await?;

    tx.commit().await?;
    Ok(project_id)
}

/// Persists the already-merged project fields, optionally replacing tags and appending items.
pub async fn update_project(
    pool: &SqlitePool,
    project: &Project,
    tags: Option<&[String]>,
    new_items: &[String],
) -> AppResult<()> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let affected = sqlx::query(
        "UPDATE projects SET name = ?, description = ?, start_time = ?, end_time = ?, minimum_trust_level = ?, updated_at = ? \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.start_time)
    .bind(project.end_time)
    .bind(project.minimum_trust_level)
    .bind(now)
    .bind(project.id)
    .execute(&mut *tx)
    .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("project not found"));
    }

    if let Some(tags) = tags {
        replace_tags(&mut tx, project.id, tags).await?;
    }
    insert_items(&mut tx, project.id, new_items, now).await?;

    tx.commit().await?;
    Ok(())
}

pub async fn soft_delete_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<()> {
    let now = Utc::now();
    let affected = sqlx::query("UPDATE projects SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(project_id)
        .execute(pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("project not found"));
    }
    Ok(())
}

/// Atomically assigns one unclaimed item to the receiver.
///
/// Liveness and the claim window are checked again in the same statement, so
/// a project deleted or closed after the receive gate ran hands out nothing.
pub async fn claim_item(pool: &SqlitePool, project_id: Uuid, receiver_id: Uuid) -> AppResult<ReceivedItem> {
    let now = Utc::now();
    let claimed = sqlx::query_as::<_, (Uuid, String)>(
        "UPDATE project_items SET receiver_id = ?, received_at = ? \
         WHERE id = (SELECT id FROM project_items WHERE project_id = ? AND receiver_id IS NULL ORDER BY created_at, id LIMIT 1) \
           AND receiver_id IS NULL \
           AND EXISTS (SELECT 1 FROM projects p WHERE p.id = ? AND p.deleted_at IS NULL AND p.start_time <= ? AND p.end_time > ?) \
         RETURNING id, content",
    )
    .bind(receiver_id)
    .bind(now)
    .bind(project_id)
    .bind(project_id)
    .bind(now)
    .bind(now)
    .fetch_optional(pool)
    .await;

    let (item_id, content) = match claimed {
        Ok(Some(row)) => row,
        Ok(None) => return Err(AppError::conflict("project has no receivable items")),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            return Err(AppError::conflict("already received"))
        }
        Err(err) => return Err(err.into()),
    };

    let project_name: String = sqlx::query_scalar("SELECT name FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await?;

    Ok(ReceivedItem {
        item_id,
        project_id,
        project_name,
        content,
        received_at: now,
    })
}

pub async fn list_received(pool: &SqlitePool, receiver_id: Uuid) -> AppResult<Vec<ReceivedItem>> {
    let rows = sqlx::query_as::<_, DbReceivedItem>(
        "SELECT i.id AS item_id, i.project_id, p.name AS project_name, i.content, i.received_at \
         FROM project_items i JOIN projects p ON p.id = i.project_id \
         WHERE i.receiver_id = ? ORDER BY i.received_at DESC",
    )
    .bind(receiver_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ReceivedItem::from).collect())
}

pub async fn list_tags(pool: &SqlitePool) -> AppResult<Vec<String>> {
    let tags = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT t.tag FROM project_tags t JOIN projects p ON p.id = t.project_id \
         WHERE p.deleted_at IS NULL ORDER BY t.tag",
    )
    .fetch_all(pool)
    .await?;
    Ok(tags)
}

async fn fetch_tags(pool: &SqlitePool, project_id: Uuid) -> AppResult<Vec<String>> {
    let tags = sqlx::query_scalar::<_, String>("SELECT tag FROM project_tags WHERE project_id = ? ORDER BY tag")
        .bind(project_id)
        .fetch_all(pool)
        .await?;
    Ok(tags)
}

async fn replace_tags(tx: &mut Transaction<'_, Sqlite>, project_id: Uuid, tags: &[String]) -> AppResult<()> {
    sqlx::query("DELETE FROM project_tags WHERE project_id = ?")
        .bind(project_id)
        .execute(&mut **tx)
        .await?;

    for tag in tags {
        sqlx::query("INSERT INTO project_tags (project_id, tag) VALUES (?, ?)")
            .bind(project_id)
            .bind(tag)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn insert_items(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: Uuid,
    items: &[String],
    now: DateTime<Utc>,
) -> AppResult<()> {
    for content in items {
        sqlx::query("INSERT INTO project_items (id, project_id, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(Uuid::new_v4())
            .bind(project_id)
            .bind(content)
            .bind(now)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Loads live projects for the creator-only gate.
#[derive(Clone)]
pub struct ProjectLoader {
    pool: SqlitePool,
}

impl ProjectLoader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceLoader for ProjectLoader {
    type Resource = Project;

    async fn load(&self, id: Uuid, _principal: &Principal) -> AppResult<Option<Project>> {
        fetch_project(&self.pool, id).await
    }
}

/// Loads a project together with the caller's claim status for the receive gate.
#[derive(Clone)]
pub struct ReceiveCandidateLoader {
    pool: SqlitePool,
}

impl ReceiveCandidateLoader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceLoader for ReceiveCandidateLoader {
    type Resource = ReceiveCandidate;

    async fn load(&self, id: Uuid, principal: &Principal) -> AppResult<Option<ReceiveCandidate>> {
        let Some(project) = fetch_project(&self.pool, id).await? else {
            return Ok(None);
        };

        let claims: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM project_items WHERE project_id = ? AND receiver_id = ?")
            .bind(id)
            .bind(principal.user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Some(ReceiveCandidate {
            project,
            already_received: claims > 0,
        }))
    }
}
