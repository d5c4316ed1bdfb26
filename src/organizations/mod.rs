//! Organization roles and scopes, mounted from `schemas/organizations.json`.

mod roles;
mod scopes;

use crate::config::{parse, resolve, FullConfig, SchemaRegistry};
use crate::error::AppError;
use crate::store::Backend;
use axum::Router;

pub const ROLES: &str = "organization_roles";
pub const SCOPES: &str = "organization_scopes";
/// Relation from a role to its scopes, served at `/organization-roles/:id/scopes`.
pub const SCOPES_RELATION: &str = "scopes";

const CONFIG: &str = include_str!("../../schemas/organizations.json");

pub fn config() -> Result<FullConfig, AppError> {
    Ok(parse(CONFIG)?)
}

pub fn registry() -> Result<SchemaRegistry, AppError> {
    Ok(resolve(&config()?)?)
}

/// Whether `name` is mounted by this module rather than as a plain resource.
pub fn owns(name: &str) -> bool {
    name == ROLES || name == SCOPES
}

pub fn routes(registry: &SchemaRegistry, backend: &Backend) -> Result<Router, AppError> {
    Ok(roles::routes(registry, backend)?.merge(scopes::routes(registry, backend)?))
}
