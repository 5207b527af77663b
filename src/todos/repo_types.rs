use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::db;

/// Todo row as held by the todo store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Todo {
    pub fn new(owner_id: Uuid, title: String, description: String) -> Self {
        let now = db::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title,
            description,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes `updated_at`; it always moves strictly forward.
    pub fn touch(&mut self) {
        let now = db::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}
