use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::todos::{repo_types::Todo, services::TodoPage};

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Full replacement of the mutable fields.
#[derive(Debug, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTodosQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Outward view of a todo; the owner id stays server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Todo> for TodoResponse {
    fn from(t: Todo) -> Self {
        Self {
            id: t.id,
            title: t.title,
            description: t.description,
            completed: t.completed,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationInfo {
    pub page: i64,
    #[serde(rename = "page_size")]
    pub limit: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoListResponse {
    pub data: Vec<TodoResponse>,
    pub pagination: PaginationInfo,
}

impl From<TodoPage> for TodoListResponse {
    fn from(page: TodoPage) -> Self {
        let pagination = PaginationInfo {
            page: page.page,
            limit: page.limit,
            total_items: page.total_items,
            total_pages: page.total_pages(),
        };
        Self {
            data: page.items.into_iter().map(TodoResponse::from).collect(),
            pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_hides_owner_and_uses_rfc3339() {
        let todo = Todo::new(Uuid::new_v4(), "Buy milk".into(), String::new());
        let json = serde_json::to_value(TodoResponse::from(todo.clone())).unwrap();

        assert!(json.get("owner_id").is_none());
        assert_eq!(json["id"], todo.id.to_string());
        assert_eq!(json["completed"], false);
        assert_eq!(json["description"], "");
        let created = json["created_at"].as_str().unwrap();
        assert_eq!(
            OffsetDateTime::parse(created, &time::format_description::well_known::Rfc3339).unwrap(),
            todo.created_at
        );
    }

    #[test]
    fn optional_fields_default() {
        let create: CreateTodoRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert!(create.description.is_none());

        let update: UpdateTodoRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert!(!update.completed);
        assert!(update.description.is_none());

        assert!(serde_json::from_str::<CreateTodoRequest>(r#"{"description":"d"}"#).is_err());
    }

    #[test]
    fn list_envelope_shape() {
        let owner = Uuid::new_v4();
        let page = TodoPage {
            items: vec![Todo::new(owner, "a".into(), String::new())],
            page: 2,
            limit: 1,
            total_items: 3,
        };
        let json = serde_json::to_value(TodoListResponse::from(page)).unwrap();
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert_eq!(
            json["pagination"],
            serde_json::json!({"page": 2, "page_size": 1, "total_items": 3, "total_pages": 3})
        );
    }
}
