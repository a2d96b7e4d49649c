use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{Owned, Receivable};
use crate::errors::AppError;

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub minimum_trust_level: i64,
    pub total_items: i64,
    pub remaining_items: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Project {
    fn creator_id(&self) -> Uuid {
        self.creator_id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub minimum_trust_level: i64,
    pub total_items: i64,
    pub remaining_items: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbProject {
    pub fn into_project(self, tags: Vec<String>) -> Project {
        Project {
            id: self.id,
            creator_id: self.creator_id,
            name: self.name,
            description: self.description,
            tags,
            start_time: self.start_time,
            end_time: self.end_time,
            minimum_trust_level: self.minimum_trust_level,
            total_items: self.total_items,
            remaining_items: self.remaining_items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A project as seen by one prospective receiver.
#[derive(Debug, Clone)]
pub struct ReceiveCandidate {
    pub project: Project,
    pub already_received: bool,
}

impl Owned for ReceiveCandidate {
    fn creator_id(&self) -> Uuid {
        self.project.creator_id
    }
}

impl Receivable for ReceiveCandidate {
    fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.project.start_time, self.project.end_time)
    }

    fn minimum_trust_level(&self) -> i64 {
        self.project.minimum_trust_level
    }

    fn remaining(&self) -> i64 {
        self.project.remaining_items
    }

    fn already_received(&self) -> bool {
        self.already_received
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "Launch giveaway")]
    pub name: String,
    #[schema(example = "Beta keys for early supporters.")]
    pub description: Option<String>,
    #[serde(default)]
    #[schema(example = json!(["games", "beta"]))]
    pub tags: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    #[schema(example = 1)]
    pub minimum_trust_level: i64,
    /// Redemption codes handed out one per receiver.
    #[schema(example = json!(["AAAA-BBBB-CCCC", "DDDD-EEEE-FFFF"]))]
    pub items: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProjectUpdateRequest {
    #[schema(example = "Launch giveaway (extended)")]
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub minimum_trust_level: Option<i64>,
    /// Appended to the existing items.
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReceivedItem {
    pub item_id: Uuid,
    pub project_id: Uuid,
    pub project_name: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbReceivedItem {
    pub item_id: Uuid,
    pub project_id: Uuid,
    pub project_name: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl From<DbReceivedItem> for ReceivedItem {
    fn from(value: DbReceivedItem) -> Self {
        ReceivedItem {
            item_id: value.item_id,
            project_id: value.project_id,
            project_name: value.project_name,
            content: value.content,
            received_at: value.received_at,
        }
    }
}

pub fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::bad_request(format!(
            "name must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if start >= end {
        return Err(AppError::bad_request("start_time must be before end_time"));
    }
    Ok(())
}

/// Trims, drops duplicates (keeping first occurrence) and enforces limits.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, AppError> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
            return Err(AppError::bad_request(format!(
                "tags must be between 1 and {MAX_TAG_LEN} characters"
            )));
        }
        if !normalized.iter().any(|existing| existing == tag) {
            normalized.push(tag.to_string());
        }
    }
    if normalized.len() > MAX_TAGS {
        return Err(AppError::bad_request(format!("at most {MAX_TAGS} tags are allowed")));
    }
    Ok(normalized)
}

pub fn normalize_items(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = normalize_tags(&[" games ".into(), "beta".into(), "games".into()]).unwrap();
        assert_eq!(tags, vec!["games", "beta"]);
    }

    #[test]
    fn too_many_tags_are_rejected() {
        let tags: Vec<String> = (0..11).map(|i| format!("t{i}")).collect();
        assert!(normalize_tags(&tags).is_err());
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(validate_name("   ").is_err());
        assert_eq!(validate_name(" keys ").unwrap(), "keys");
    }

    #[test]
    fn empty_window_is_rejected() {
        let now = Utc::now();
        assert!(validate_window(now, now).is_err());
        assert!(validate_window(now, now + chrono::Duration::hours(1)).is_ok());
    }
}
