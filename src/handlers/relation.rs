//! Nested relation endpoints: list, insert and delete links of one parent instance.

use crate::config::{FieldType, RelationSchema, ValidationRule};
use crate::error::AppError;
use crate::handlers::entity::{param, rows_to_value, ID_PARAM};
use crate::response;
use crate::service::{translate, FieldGuard, ObjectGuard, ResponseGuard, RouteGuard};
use crate::state::RelationState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct RelationGuards {
    pub list: RouteGuard,
    pub insert: RouteGuard,
    pub delete: RouteGuard,
}

impl RelationGuards {
    pub fn for_relation(relation: &RelationSchema) -> Self {
        let parent = ObjectGuard::new(vec![FieldGuard::id(ID_PARAM)]);
        let targets = ResponseGuard::List(relation.target.guard.clone());
        Self {
            list: RouteGuard::new()
                .params(parent.clone())
                .response(targets.clone())
                .status(&[200, 404]),
            insert: RouteGuard::new()
                .params(parent.clone())
                .body(ObjectGuard::new(vec![ids_field(&relation.ids_field)]))
                .response(targets)
                .status(&[200, 404, 422]),
            delete: RouteGuard::new()
                .params(parent.extend(FieldGuard::id(&relation.target_param)))
                .status(&[204, 422]),
        }
    }
}

/// Non-empty array of non-empty ids.
pub fn ids_field(name: &str) -> FieldGuard {
    FieldGuard::required(name, FieldType::StringArray).with_rule(ValidationRule {
        min_items: Some(1),
        min_length: Some(1),
        ..Default::default()
    })
}

pub async fn list_entries(
    State(state): State<RelationState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let guard = &state.guards.list;
    let id = param(&guard.check_params(&params)?, ID_PARAM);
    let parent = &state.parent.schema().name;
    state
        .parent
        .get_by_id(&id)
        .await
        .map_err(|e| translate(e, parent, &id))?;
    let rows = state
        .mount
        .actions
        .get_entries(&id)
        .await
        .map_err(|e| translate(e, parent, &id))?;
    let body = guard.check_response(StatusCode::OK, rows_to_value(rows))?;
    Ok(response::ok(body))
}

pub async fn insert_entries(
    State(state): State<RelationState>,
    Path(params): Path<HashMap<String, String>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let guard = &state.guards.insert;
    let id = param(&guard.check_params(&params)?, ID_PARAM);
    let data = guard.check_body(&body)?;
    let relation = state.mount.actions.relation();
    let pairs: Vec<(String, String)> = data
        .get(&relation.ids_field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(|target| (id.clone(), target.to_string()))
        .collect();
    let parent = &state.parent.schema().name;
    state
        .mount
        .insert(&pairs)
        .await
        .map_err(|e| translate(e, parent, &id))?;
    tracing::debug!(relation = %relation.name, %id, count = pairs.len(), "links inserted");
    let rows = state
        .mount
        .actions
        .get_entries(&id)
        .await
        .map_err(|e| translate(e, parent, &id))?;
    let body = guard.check_response(StatusCode::OK, rows_to_value(rows))?;
    Ok(response::ok(body))
}

/// Removing a pair that does not exist still answers 204.
pub async fn delete_entry(
    State(state): State<RelationState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let guard = &state.guards.delete;
    let relation = state.mount.actions.relation();
    let checked = guard.check_params(&params)?;
    let (id, target) = (param(&checked, ID_PARAM), param(&checked, &relation.target_param));
    let removed = state
        .mount
        .actions
        .delete(&id, &target)
        .await
        .map_err(|e| translate(e, &state.parent.schema().name, &id))?;
    if !removed {
        tracing::debug!(relation = %relation.name, %id, %target, "no link to delete");
    }
    Ok(response::no_content())
}
