use std::sync::Arc;

use tracing::info;

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::{InMemoryUserStore, PgUserStore, UserStore},
    },
    config::{AppConfig, StoreBackend},
    db,
    todos::repo::{InMemoryTodoStore, PgTodoStore, TodoStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub todos: Arc<dyn TodoStore>,
    pub jwt: JwtKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        Self::from_config(config).await
    }

    /// Opens the configured backend. For Postgres this connects and runs
    /// pending migrations before the first request is served.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let (users, todos): (Arc<dyn UserStore>, Arc<dyn TodoStore>) = match &config.store {
            StoreBackend::Memory => {
                info!("using in-memory store");
                (
                    Arc::new(InMemoryUserStore::new()),
                    Arc::new(InMemoryTodoStore::new()),
                )
            }
            StoreBackend::Postgres {
                database_url,
                max_connections,
            } => {
                let pool = db::connect(database_url, *max_connections).await?;
                db::migrate(&pool).await?;
                info!(max_connections, "using postgres store");
                (
                    Arc::new(PgUserStore::new(pool.clone())),
                    Arc::new(PgTodoStore::new(pool)),
                )
            }
        };
        Self::from_parts(Arc::new(config), users, todos)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        todos: Arc<dyn TodoStore>,
    ) -> anyhow::Result<Self> {
        let jwt = JwtKeys::new(&config.jwt)?;
        Ok(Self {
            config,
            users,
            todos,
            jwt,
        })
    }

    /// In-memory state over the test config.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::from_parts(
            Arc::new(crate::config::test_config()),
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryTodoStore::new()),
        )
        .expect("test config is valid")
    }
}
