use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::todos::repo_types::Todo;

/// Todo store. Listing is newest first; mutations match on id and owner.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn insert(&self, todo: &Todo) -> anyhow::Result<()>;

    /// Unscoped read. Handlers reach it only through `TodoService::load_owned`,
    /// which applies the owner check.
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Todo>>;

    /// One page of the owner's todos plus the owner's total count.
    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Todo>, i64)>;

    /// Full replacement; `false` when no row matches both id and owner.
    async fn replace(&self, todo: &Todo) -> anyhow::Result<bool>;

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> anyhow::Result<bool>;

    async fn ping(&self) -> anyhow::Result<()>;
}

/// Map-backed store; readers share the lock, writers hold it exclusively.
#[derive(Clone, Default)]
pub struct InMemoryTodoStore {
    todos: Arc<RwLock<HashMap<Uuid, Todo>>>,
}

impl InMemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoStore for InMemoryTodoStore {
    async fn insert(&self, todo: &Todo) -> anyhow::Result<()> {
        let mut todos = self.todos.write().await;
        anyhow::ensure!(!todos.contains_key(&todo.id), "todo {} already exists", todo.id);
        todos.insert(todo.id, todo.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Todo>> {
        Ok(self.todos.read().await.get(&id).cloned())
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Todo>, i64)> {
        let todos = self.todos.read().await;
        let mut owned: Vec<&Todo> = todos.values().filter(|t| t.owner_id == owner_id).collect();
        let total = owned.len() as i64;
        owned.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(0);
        let page = owned.into_iter().skip(skip).take(take).cloned().collect();
        Ok((page, total))
    }

    async fn replace(&self, todo: &Todo) -> anyhow::Result<bool> {
        let mut todos = self.todos.write().await;
        match todos.get_mut(&todo.id) {
            Some(current) if current.owner_id == todo.owner_id => {
                *current = todo.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut todos = self.todos.write().await;
        if todos.get(&id).is_some_and(|t| t.owner_id == owner_id) {
            todos.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgTodoStore {
    db: PgPool,
}

impl PgTodoStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn insert(&self, todo: &Todo) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO todos (id, owner_id, title, description, completed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(todo.id)
        .bind(todo.owner_id)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.completed)
        .bind(todo.created_at)
        .bind(todo.updated_at)
        .execute(&self.db)
        .await
        .context("insert todo")?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Todo>> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, owner_id, title, description, completed, created_at, updated_at
            FROM todos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select todo by id")?;
        Ok(todo)
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Todo>, i64)> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, owner_id, title, description, completed, created_at, updated_at
            FROM todos
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list todos by owner")?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM todos WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.db)
            .await
            .context("count todos by owner")?;

        Ok((rows, total))
    }

    async fn replace(&self, todo: &Todo) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE todos
               SET title = $3, description = $4, completed = $5, updated_at = $6
             WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(todo.id)
        .bind(todo.owner_id)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.completed)
        .bind(todo.updated_at)
        .execute(&self.db)
        .await
        .context("update todo")?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM todos WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.db)
            .await
            .context("delete todo")?;
        Ok(res.rows_affected() > 0)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.db)
            .await
            .context("ping database")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn todo(owner: Uuid, title: &str, age_secs: i64) -> Todo {
        let mut t = Todo::new(owner, title.into(), String::new());
        t.created_at -= Duration::seconds(age_secs);
        t.updated_at = t.created_at;
        t
    }

    #[tokio::test]
    async fn list_is_owner_scoped_and_newest_first() {
        let store = InMemoryTodoStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.insert(&todo(alice, "old", 30)).await.unwrap();
        store.insert(&todo(alice, "new", 10)).await.unwrap();
        store.insert(&todo(alice, "mid", 20)).await.unwrap();
        store.insert(&todo(bob, "bob's", 5)).await.unwrap();

        let (page, total) = store.list_by_owner(alice, 10, 0).await.unwrap();
        assert_eq!(total, 3);
        let titles: Vec<_> = page.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["new", "mid", "old"]);

        let (page, total) = store.list_by_owner(alice, 2, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "old");

        let (page, total) = store.list_by_owner(alice, 2, 10).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn mutations_require_matching_owner() {
        let store = InMemoryTodoStore::new();
        let alice = Uuid::new_v4();
        let mallory = Uuid::new_v4();
        let original = todo(alice, "mine", 0);
        store.insert(&original).await.unwrap();

        let mut hijack = original.clone();
        hijack.owner_id = mallory;
        hijack.title = "pwned".into();
        assert!(!store.replace(&hijack).await.unwrap());
        assert!(!store.delete(mallory, original.id).await.unwrap());
        assert_eq!(store.find_by_id(original.id).await.unwrap().unwrap().title, "mine");

        let mut edit = original.clone();
        edit.completed = true;
        assert!(store.replace(&edit).await.unwrap());
        assert!(store.delete(alice, original.id).await.unwrap());
        assert!(store.find_by_id(original.id).await.unwrap().is_none());
        assert!(!store.delete(alice, original.id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_insert_fails() {
        let store = InMemoryTodoStore::new();
        let t = todo(Uuid::new_v4(), "x", 0);
        store.insert(&t).await.unwrap();
        assert!(store.insert(&t).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_writers_all_land() {
        let store = InMemoryTodoStore::new();
        let owner = Uuid::new_v4();
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(&todo(owner, &format!("t{i}"), i)).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let (_, total) = store.list_by_owner(owner, 100, 0).await.unwrap();
        assert_eq!(total, 32);
    }
}
