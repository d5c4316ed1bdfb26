//! Storage backends implementing the action-set traits.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryRelationActions, MemorySchemaActions, MemoryStore};
pub use postgres::{PgRelationActions, PgSchemaActions};

use crate::config::{EntitySchema, RelationSchema};
use crate::error::{AppError, StorageError};
use crate::service::{RelationActions, SchemaActions};
use sqlx::PgPool;
use std::sync::Arc;

/// The storage engine chosen at startup.
#[derive(Clone)]
pub enum Backend {
    Memory(MemoryStore),
    Postgres(PgPool),
}

impl Backend {
    pub fn entity(&self, schema: Arc<EntitySchema>) -> Arc<dyn SchemaActions> {
        match self {
            Backend::Memory(store) => Arc::new(store.entity(schema)),
            Backend::Postgres(pool) => Arc::new(PgSchemaActions::new(pool.clone(), schema)),
        }
    }

    pub fn relation(&self, relation: Arc<RelationSchema>) -> Result<Arc<dyn RelationActions>, AppError> {
        Ok(match self {
            Backend::Memory(store) => Arc::new(store.relation(relation)?),
            Backend::Postgres(pool) => Arc::new(PgRelationActions::new(pool.clone(), relation)),
        })
    }

    /// Cheap liveness probe for the readiness route.
    pub async fn ping(&self) -> Result<(), StorageError> {
        match self {
            Backend::Memory(_) => Ok(()),
            Backend::Postgres(pool) => {
                sqlx::query("SELECT 1").fetch_optional(pool).await?;
                Ok(())
            }
        }
    }
}
