//! Per-mount state handed to the generic handlers. Immutable once the router is built.

use crate::config::EntitySchema;
use crate::error::AppError;
use crate::handlers::{RelationGuards, StandardGuards};
use crate::service::{DuplicateFieldMap, RelationActions, SchemaActions};
use std::collections::HashMap;
use std::sync::Arc;

/// Relation action set plus the unique constraints it may report as a field-attributed 422.
pub struct RelationMount {
    pub actions: Arc<dyn RelationActions>,
    pub duplicates: DuplicateFieldMap,
}

impl RelationMount {
    /// Duplicate pairs surface as a duplicate of the relation's ids field (e.g. `scopeIds`).
    pub fn new(actions: Arc<dyn RelationActions>) -> Self {
        let relation = actions.relation().clone();
        let duplicates = DuplicateFieldMap::new().with(relation.constraint.clone(), relation.ids_field.clone());
        Self { actions, duplicates }
    }

    pub async fn insert(&self, pairs: &[(String, String)]) -> Result<(), AppError> {
        self.actions
            .insert(pairs)
            .await
            .map_err(|e| self.duplicates.remap(e))
    }
}

/// State of one mounted resource: its action set, guards and relations.
#[derive(Clone)]
pub struct ResourceState {
    pub actions: Arc<dyn SchemaActions>,
    pub guards: Arc<StandardGuards>,
    pub relations: Arc<HashMap<String, Arc<RelationMount>>>,
}

impl ResourceState {
    pub fn schema(&self) -> &Arc<EntitySchema> {
        self.actions.schema()
    }

    /// Relation mounted under this resource by name.
    pub fn relation(&self, name: &str) -> Result<&Arc<RelationMount>, AppError> {
        self.relations.get(name).ok_or_else(|| {
            AppError::from(crate::error::ConfigError::MissingReference {
                kind: "relation",
                id: format!("{}/{}", self.schema().name, name),
            })
        })
    }
}

/// State of one relation sub-router.
#[derive(Clone)]
pub struct RelationState {
    pub parent: Arc<dyn SchemaActions>,
    pub mount: Arc<RelationMount>,
    pub guards: Arc<RelationGuards>,
}
