use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::auth::repo_types::User;

/// Raised by `UserStore::insert` when the email is already taken.
#[derive(Debug, Error)]
#[error("email already registered")]
pub struct DuplicateEmail;

/// Credential store: users keyed by their unique email.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Fails with [`DuplicateEmail`] if the email already exists.
    async fn insert(&self, user: &User) -> anyhow::Result<()>;
}

#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(DuplicateEmail.into());
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select user by email")?;
        Ok(user)
    }

    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        let res = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.db)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DuplicateEmail.into()),
            Err(e) => Err(anyhow::Error::new(e).context("insert user")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use uuid::Uuid;

    fn user(email: &str) -> User {
        let now = db::now();
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "hash".into(),
            name: "Test".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_then_find() {
        let store = InMemoryUserStore::new();
        let u = user("a@x.com");
        store.insert(&u).await.unwrap();

        let found = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, u.id);
        assert!(store.find_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_typed() {
        let store = InMemoryUserStore::new();
        store.insert(&user("a@x.com")).await.unwrap();
        let err = store.insert(&user("a@x.com")).await.unwrap_err();
        assert!(err.is::<DuplicateEmail>());
    }
}
