//! Roles replace the standard `POST /` with one that also links an initial set of scopes.

use crate::config::{FieldType, SchemaRegistry};
use crate::error::{AppError, GuardTarget, StorageError, ValidationError};
use crate::handlers::entity::param;
use crate::organizations::{ROLES, SCOPES_RELATION};
use crate::response;
use crate::routes::{DisabledRoutes, SchemaRouter};
use crate::service::{
    DuplicateFieldMap, FieldGuard, Record, ResponseGuard, RouteGuard, SchemaActions, UniqueFieldActions,
};
use crate::state::ResourceState;
use crate::store::Backend;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{post, MethodRouter},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

const SCOPE_IDS: &str = "scopeIds";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRolePayload {
    scope_ids: Vec<String>,
    #[serde(flatten)]
    role: Record,
}

/// Guard and scope lookups of the role create route.
struct CreateRole {
    guard: RouteGuard,
    scopes: Arc<dyn SchemaActions>,
}

pub fn routes(registry: &SchemaRegistry, backend: &Backend) -> Result<Router, AppError> {
    let schema = registry.entity(ROLES)?;
    let relation = registry.relation(ROLES, SCOPES_RELATION)?;

    let create = Arc::new(CreateRole {
        guard: RouteGuard::new()
            .body(
                schema
                    .create_guard
                    .clone()
                    .extend(FieldGuard::required(SCOPE_IDS, FieldType::StringArray).with_default(Value::Array(Vec::new()))),
            )
            .response(ResponseGuard::Entity(schema.guard.clone()))
            .status(&[201, 422]),
        scopes: backend.entity(relation.target.clone()),
    });

    let duplicates = DuplicateFieldMap::new().with_unique_field(&schema, "name");
    let actions = UniqueFieldActions::new(backend.entity(schema), duplicates);
    SchemaRouter::new(
        Arc::new(actions),
        DisabledRoutes {
            post: true,
            ..Default::default()
        },
    )
    .route("/", create_with_scopes(create))
    .relation(backend.relation(relation)?)
    .into_router()
}

fn create_with_scopes(create: Arc<CreateRole>) -> MethodRouter<ResourceState> {
    post(move |State(state): State<ResourceState>, body: Bytes| {
        let create = create.clone();
        async move { create.handle(state, body).await }
    })
}

impl CreateRole {
    /// Every scope id must be distinct and exist before the role is stored.
    async fn check_scopes(&self, scope_ids: &[String]) -> Result<(), AppError> {
        let mut issues = ValidationError::default();
        let mut seen = HashSet::new();
        for (i, scope) in scope_ids.iter().enumerate() {
            let path = format!("{}.{}", SCOPE_IDS, i);
            if !seen.insert(scope.as_str()) {
                issues.push(path, "duplicates an earlier scope id");
                continue;
            }
            match self.scopes.get_by_id(scope).await {
                Ok(_) => {}
                Err(AppError::Storage(StorageError::NotFound)) => issues.push(path, "references an unknown scope"),
                Err(e) => return Err(e),
            }
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(self.guard.reject(GuardTarget::Body, issues))
        }
    }

    async fn handle(&self, state: ResourceState, body: Bytes) -> Result<Response, AppError> {
        let payload: CreateRolePayload = self.guard.check_body_as(&body)?;
        self.check_scopes(&payload.scope_ids).await?;
        let role = state.actions.post(payload.role).await?;
        let id = param(&role, &state.schema().id_field);

        if !payload.scope_ids.is_empty() {
            let pairs: Vec<(String, String)> = payload
                .scope_ids
                .iter()
                .map(|scope| (id.clone(), scope.clone()))
                .collect();
            if let Err(e) = state.relation(SCOPES_RELATION)?.insert(&pairs).await {
                // A scope deleted since the check: undo the role so a 422 leaves nothing behind.
                if let Err(undo) = state.actions.delete_by_id(&id).await {
                    tracing::error!(role = %id, error = %undo, "could not remove role after failed scope link");
                }
                return Err(match e {
                    AppError::Storage(StorageError::ForeignKeyViolation { .. }) => self.guard.reject(
                        GuardTarget::Body,
                        ValidationError::single(SCOPE_IDS, "references an unknown scope"),
                    ),
                    other => other,
                });
            }
            tracing::debug!(role = %id, scopes = pairs.len(), "role created with scopes");
        }

        let body = self.guard.check_response(StatusCode::CREATED, Value::Object(role))?;
        Ok(response::created(body))
    }
}
