//! Standard resource verbs: list, read, create, update, delete.

use crate::config::EntitySchema;
use crate::error::AppError;
use crate::response;
use crate::service::{translate, FieldGuard, ListQuery, ObjectGuard, Record, ResponseGuard, RouteGuard};
use crate::state::ResourceState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde_json::Value;
use std::collections::HashMap;

/// Route parameter naming the entity instance.
pub const ID_PARAM: &str = "id";

/// Guards of the five standard verbs of one entity.
#[derive(Clone, Debug)]
pub struct StandardGuards {
    pub list: RouteGuard,
    pub get: RouteGuard,
    pub create: RouteGuard,
    pub update: RouteGuard,
    pub delete: RouteGuard,
}

impl StandardGuards {
    pub fn for_schema(schema: &EntitySchema) -> Self {
        let id = ObjectGuard::new(vec![FieldGuard::id(ID_PARAM)]);
        let entity = ResponseGuard::Entity(schema.guard.clone());
        Self {
            list: RouteGuard::new()
                .query(ListQuery::guard(schema))
                .response(ResponseGuard::List(schema.guard.clone()))
                .status(&[200, 422]),
            get: RouteGuard::new()
                .params(id.clone())
                .response(entity.clone())
                .status(&[200, 404]),
            create: RouteGuard::new()
                .body(schema.create_guard.clone())
                .response(entity.clone())
                .status(&[201, 422]),
            update: RouteGuard::new()
                .params(id.clone())
                .body(schema.update_guard.clone())
                .response(entity)
                .status(&[200, 404, 422]),
            delete: RouteGuard::new().params(id).status(&[204, 404]),
        }
    }
}

/// String param already checked by a params guard.
pub(crate) fn param(params: &Record, name: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn rows_to_value(rows: Vec<Record>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

pub async fn list(
    State(state): State<ResourceState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let guard = &state.guards.list;
    let record = guard.check_query(&query)?;
    let query = ListQuery::from_record(record, state.schema());
    let page = state.actions.get(&query).await?;
    let body = guard.check_response(StatusCode::OK, rows_to_value(page.rows))?;
    Ok(response::paginated(body, page.total))
}

pub async fn read(
    State(state): State<ResourceState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let guard = &state.guards.get;
    let id = param(&guard.check_params(&params)?, ID_PARAM);
    let row = state
        .actions
        .get_by_id(&id)
        .await
        .map_err(|e| translate(e, &state.schema().name, &id))?;
    let body = guard.check_response(StatusCode::OK, Value::Object(row))?;
    Ok(response::ok(body))
}

pub async fn create(State(state): State<ResourceState>, body: Bytes) -> Result<Response, AppError> {
    let guard = &state.guards.create;
    let data = guard.check_body(&body)?;
    let row = state.actions.post(data).await?;
    tracing::debug!(entity = %state.schema().name, "created");
    let body = guard.check_response(StatusCode::CREATED, Value::Object(row))?;
    Ok(response::created(body))
}

pub async fn update(
    State(state): State<ResourceState>,
    Path(params): Path<HashMap<String, String>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let guard = &state.guards.update;
    let id = param(&guard.check_params(&params)?, ID_PARAM);
    let data = guard.check_body(&body)?;
    let row = state
        .actions
        .patch_by_id(&id, data)
        .await
        .map_err(|e| translate(e, &state.schema().name, &id))?;
    let body = guard.check_response(StatusCode::OK, Value::Object(row))?;
    Ok(response::ok(body))
}

pub async fn delete(
    State(state): State<ResourceState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let guard = &state.guards.delete;
    let id = param(&guard.check_params(&params)?, ID_PARAM);
    state
        .actions
        .delete_by_id(&id)
        .await
        .map_err(|e| translate(e, &state.schema().name, &id))?;
    tracing::debug!(entity = %state.schema().name, %id, "deleted");
    Ok(response::no_content())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organizations;

    #[test]
    fn create_guard_omits_server_fields_and_answers_422() {
        let registry = organizations::registry().unwrap();
        let guards = StandardGuards::for_schema(&registry.entity(organizations::ROLES).unwrap());
        let err = guards.create.check_body(br#"{ "id": "x" }"#).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let data = guards
            .create
            .check_body(br#"{ "id": "x", "name": "admin", "createdAt": 1 }"#)
            .unwrap();
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn id_guard_rejects_empty_id_with_400_when_no_client_status_declared() {
        let registry = organizations::registry().unwrap();
        let guards = StandardGuards::for_schema(&registry.entity(organizations::ROLES).unwrap());
        let mut params = HashMap::new();
        params.insert(ID_PARAM.to_string(), String::new());
        assert_eq!(guards.get.check_params(&params).unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}
