use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    db::with_deadline,
    error::{AppError, AppResult},
    state::AppState,
    todos::{repo::TodoStore, repo_types::Todo},
    validation,
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
pub const MSG_TODO_NOT_FOUND: &str = "todo not found";

/// Result of loading a todo on behalf of a caller.
#[derive(Debug)]
enum Lookup {
    Found(Todo),
    NotFound,
    Forbidden,
}

/// One page of a caller's todos.
#[derive(Debug, Clone)]
pub struct TodoPage {
    pub items: Vec<Todo>,
    pub page: i64,
    pub limit: i64,
    pub total_items: i64,
}

impl TodoPage {
    pub fn total_pages(&self) -> i64 {
        if self.limit <= 0 {
            return 0;
        }
        (self.total_items + self.limit - 1) / self.limit
    }
}

/// Owner-scoped CRUD over the todo store.
#[derive(Clone)]
pub struct TodoService {
    store: Arc<dyn TodoStore>,
    timeout: Duration,
}

impl FromRef<AppState> for TodoService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.todos.clone(), state.config.store_timeout)
    }
}

fn not_found() -> AppError {
    AppError::NotFound(MSG_TODO_NOT_FOUND.into())
}

/// Clamps raw paging input: non-positive values fall back to defaults and
/// `limit` is capped at [`MAX_LIMIT`].
pub fn normalize_paging(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
    let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    (page, limit)
}

impl TodoService {
    pub fn new(store: Arc<dyn TodoStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn create(&self, owner: Uuid, title: &str, description: &str) -> AppResult<Todo> {
        validation::validate_title(title)?;
        validation::validate_description(description)?;

        let todo = Todo::new(owner, title.trim().to_string(), description.to_string());
        with_deadline(self.timeout, self.store.insert(&todo))
            .await
            .map_err(|e| AppError::database("Failed to create todo", e))?;

        info!(%owner, todo_id = %todo.id, "todo created");
        Ok(todo)
    }

    pub async fn get(&self, owner: Uuid, id: &str) -> AppResult<Todo> {
        match self.load_owned(owner, id).await? {
            Lookup::Found(todo) => Ok(todo),
            Lookup::NotFound | Lookup::Forbidden => Err(not_found()),
        }
    }

    pub async fn list(&self, owner: Uuid, page: Option<i64>, limit: Option<i64>) -> AppResult<TodoPage> {
        let (page, limit) = normalize_paging(page, limit);
        let offset = (page - 1).saturating_mul(limit);

        let (items, total_items) =
            with_deadline(self.timeout, self.store.list_by_owner(owner, limit, offset))
                .await
                .map_err(|e| AppError::database("Failed to retrieve todos", e))?;

        info!(%owner, page, limit, count = items.len(), total = total_items, "todos listed");
        Ok(TodoPage {
            items,
            page,
            limit,
            total_items,
        })
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: &str,
        title: &str,
        description: &str,
        completed: bool,
    ) -> AppResult<Todo> {
        validation::validate_title(title)?;
        validation::validate_description(description)?;

        let mut todo = match self.load_owned(owner, id).await? {
            Lookup::Found(todo) => todo,
            Lookup::NotFound | Lookup::Forbidden => return Err(not_found()),
        };
        todo.title = title.trim().to_string();
        todo.description = description.to_string();
        todo.completed = completed;
        todo.touch();

        let replaced = with_deadline(self.timeout, self.store.replace(&todo))
            .await
            .map_err(|e| AppError::database("Failed to update todo", e))?;
        if !replaced {
            // deleted between the load and the write
            return Err(not_found());
        }

        info!(%owner, todo_id = %todo.id, completed, "todo updated");
        Ok(todo)
    }

    pub async fn delete(&self, owner: Uuid, id: &str) -> AppResult<()> {
        let todo = match self.load_owned(owner, id).await? {
            Lookup::Found(todo) => todo,
            Lookup::NotFound | Lookup::Forbidden => return Err(not_found()),
        };

        let deleted = with_deadline(self.timeout, self.store.delete(owner, todo.id))
            .await
            .map_err(|e| AppError::database("Failed to delete todo", e))?;
        if !deleted {
            return Err(not_found());
        }

        info!(%owner, todo_id = %todo.id, "todo deleted");
        Ok(())
    }

    async fn load_owned(&self, owner: Uuid, id: &str) -> AppResult<Lookup> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(Lookup::NotFound);
        };
        let found = with_deadline(self.timeout, self.store.find_by_id(id))
            .await
            .map_err(|e| AppError::database("Failed to retrieve todo", e))?;

        Ok(match found {
            None => Lookup::NotFound,
            Some(todo) if todo.owner_id != owner => {
                warn!(%owner, todo_id = %id, "cross-owner todo access");
                Lookup::Forbidden
            }
            Some(todo) => Lookup::Found(todo),
        })
    }
}
