//! Application assembly: schema loading, storage selection and the full router.

use crate::config::{load_from_dir, resolve, SchemaRegistry};
use crate::error::{AppError, ConfigError};
use crate::organizations;
use crate::routes::{common_routes, protect, DisabledRoutes, SchemaRouter};
use crate::settings::{ServerSettings, StorageKind};
use crate::store::{Backend, MemoryStore};
use axum::Router;
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Registry from `SCHEMA_DIR`, or the built-in organization schemas.
pub async fn load_registry(settings: &ServerSettings) -> Result<SchemaRegistry, AppError> {
    match &settings.schema_dir {
        Some(dir) => Ok(resolve(&load_from_dir(dir).await?)?),
        None => organizations::registry(),
    }
}

pub async fn connect(settings: &ServerSettings) -> Result<Backend, AppError> {
    match settings.storage {
        StorageKind::Memory => {
            tracing::warn!("using in-memory storage; data is lost on exit");
            Ok(Backend::Memory(MemoryStore::new()))
        }
        StorageKind::Postgres => {
            let url = settings
                .database_url
                .as_deref()
                .ok_or_else(|| ConfigError::Validation("DATABASE_URL is not set".into()))?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            Ok(Backend::Postgres(pool))
        }
    }
}

/// Every registered entity as a resource. Organization entities get their own module;
/// the rest are mounted with the standard verbs and their relations.
pub fn resource_routes(registry: &SchemaRegistry, backend: &Backend) -> Result<Router, AppError> {
    let mut router = Router::new();
    if registry.entity(organizations::ROLES).is_ok() && registry.entity(organizations::SCOPES).is_ok() {
        router = router.merge(organizations::routes(registry, backend)?);
    }

    let mut entities: Vec<_> = registry
        .entities()
        .filter(|e| !organizations::owns(&e.name))
        .cloned()
        .collect();
    entities.sort_by(|a, b| a.name.cmp(&b.name));
    for schema in entities {
        let mut mount = SchemaRouter::new(backend.entity(schema.clone()), DisabledRoutes::default());
        for rel in registry.relations().filter(|r| r.owner.name == schema.name) {
            mount = mount.relation(backend.relation(rel.clone())?);
        }
        router = router.merge(mount.into_router()?);
    }
    Ok(router)
}

/// Public common routes plus resource routes behind the optional token gate.
pub fn build_app(registry: &SchemaRegistry, backend: Backend, api_token: Option<String>) -> Result<Router, AppError> {
    let resources = protect(resource_routes(registry, &backend)?, api_token);
    Ok(common_routes(backend).merge(resources))
}

/// Server middleware: tracing, body limit, panic to 500.
pub fn with_layers(router: Router, body_limit_bytes: usize) -> Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
}
