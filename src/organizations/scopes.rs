use crate::config::SchemaRegistry;
use crate::error::AppError;
use crate::organizations::SCOPES;
use crate::routes::{DisabledRoutes, SchemaRouter};
use crate::service::{DuplicateFieldMap, UniqueFieldActions};
use crate::store::Backend;
use axum::Router;
use std::sync::Arc;

pub fn routes(registry: &SchemaRegistry, backend: &Backend) -> Result<Router, AppError> {
    let schema = registry.entity(SCOPES)?;
    let duplicates = DuplicateFieldMap::new().with_unique_field(&schema, "name");
    let actions = UniqueFieldActions::new(backend.entity(schema), duplicates);
    SchemaRouter::new(Arc::new(actions), DisabledRoutes::default()).into_router()
}
