use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ===== Envelope =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

// ===== Todo Models =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Todo {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateTodoRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Partial update; omitted fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UpdateTodoRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl CreateTodoRequest {
    /// Trimmed title, or `None` when it is blank.
    pub fn normalized_title(&self) -> Option<String> {
        normalize_title(&self.title)
    }
}

impl UpdateTodoRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

pub fn normalize_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_titles_are_rejected() {
        assert_eq!(normalize_title("  buy milk "), Some("buy milk".to_string()));
        assert_eq!(normalize_title("   "), None);
    }

    #[test]
    fn update_defaults_to_empty() {
        let update: UpdateTodoRequest = serde_json::from_str("{}").expect("valid json");
        assert!(update.is_empty());

        let update: UpdateTodoRequest =
            serde_json::from_str(r#"{"completed": true}"#).expect("valid json");
        assert!(!update.is_empty());
        assert_eq!(update.completed, Some(true));
    }

    #[test]
    fn create_defaults_optional_fields() {
        let create: CreateTodoRequest =
            serde_json::from_str(r#"{"title": "write tests"}"#).expect("valid json");
        assert!(!create.completed);
        assert!(create.description.is_none());
    }
}
