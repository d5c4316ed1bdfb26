//! Validation guards for request params/query/body and response bodies.
//!
//! A guard is a pure function from raw JSON to a validated [`Record`]: unknown keys are stripped,
//! defaults applied, and every failed check is collected into one [`ValidationError`].

use crate::config::{FieldType, ValidationRule};
use crate::error::{AppError, GuardTarget, ValidationError};
use crate::service::validation::{check_field, coerce_query_value};
use crate::service::Record;
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct FieldGuard {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    /// May be absent from the input.
    pub optional: bool,
    /// Inserted when the field is absent.
    pub default: Option<Value>,
    pub rule: ValidationRule,
}

impl FieldGuard {
    pub fn required(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            nullable: false,
            optional: false,
            default: None,
            rule: ValidationRule::default(),
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.optional = true;
        self.default = Some(default);
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rule = rule;
        self
    }

    /// Non-empty string, the usual shape of an id.
    pub fn id(name: &str) -> Self {
        Self::required(name, FieldType::String).with_rule(ValidationRule {
            min_length: Some(1),
            ..Default::default()
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ObjectGuard {
    fields: Vec<FieldGuard>,
}

impl ObjectGuard {
    pub fn new(fields: Vec<FieldGuard>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldGuard] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Vec<FieldGuard> {
        &mut self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldGuard> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Copy without the named fields.
    pub fn omit(&self, names: &[&str]) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|f| !names.contains(&f.name.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Add a field, replacing any existing field of the same name.
    pub fn extend(mut self, field: FieldGuard) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    /// Copy with every field optional and no defaults (PATCH semantics).
    pub fn partial(&self) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .cloned()
                .map(|mut f| {
                    f.optional = true;
                    f.default = None;
                    f
                })
                .collect(),
        }
    }

    pub fn validate(&self, raw: &Value) -> Result<Record, ValidationError> {
        self.validate_at("", raw)
    }

    fn validate_at(&self, prefix: &str, raw: &Value) -> Result<Record, ValidationError> {
        let Some(obj) = raw.as_object() else {
            return Err(ValidationError::single(prefix, "must be an object"));
        };
        let mut errors = ValidationError::default();
        let mut out = Record::new();
        for f in &self.fields {
            let path = if prefix.is_empty() {
                f.name.clone()
            } else {
                format!("{}.{}", prefix, f.name)
            };
            match obj.get(&f.name) {
                None => {
                    if let Some(default) = &f.default {
                        out.insert(f.name.clone(), default.clone());
                    } else if !f.optional {
                        errors.push(path, "is required");
                    }
                }
                Some(Value::Null) => {
                    if f.nullable {
                        out.insert(f.name.clone(), Value::Null);
                    } else {
                        errors.push(path, "must not be null");
                    }
                }
                Some(v) => {
                    check_field(&path, v, f.field_type, &f.rule, &mut errors);
                    out.insert(f.name.clone(), v.clone());
                }
            }
        }
        if errors.is_empty() {
            Ok(out)
        } else {
            Err(errors)
        }
    }
}

/// Shape of a response body.
#[derive(Clone, Debug)]
pub enum ResponseGuard {
    Entity(ObjectGuard),
    List(ObjectGuard),
}

impl ResponseGuard {
    pub fn validate(&self, body: &Value) -> Result<Value, ValidationError> {
        match self {
            ResponseGuard::Entity(guard) => guard.validate(body).map(Value::Object),
            ResponseGuard::List(guard) => {
                let Some(items) = body.as_array() else {
                    return Err(ValidationError::single("", "must be an array"));
                };
                let mut errors = ValidationError::default();
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match guard.validate_at(&i.to_string(), item) {
                        Ok(record) => out.push(Value::Object(record)),
                        Err(e) => errors.issues.extend(e.issues),
                    }
                }
                if errors.is_empty() {
                    Ok(Value::Array(out))
                } else {
                    Err(errors)
                }
            }
        }
    }
}

/// Per-route guard configuration: which parts are checked and which statuses the route may answer.
#[derive(Clone, Debug, Default)]
pub struct RouteGuard {
    params: Option<ObjectGuard>,
    query: Option<ObjectGuard>,
    body: Option<ObjectGuard>,
    response: Option<ResponseGuard>,
    status: Vec<StatusCode>,
}

impl RouteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, guard: ObjectGuard) -> Self {
        self.params = Some(guard);
        self
    }

    pub fn query(mut self, guard: ObjectGuard) -> Self {
        self.query = Some(guard);
        self
    }

    pub fn body(mut self, guard: ObjectGuard) -> Self {
        self.body = Some(guard);
        self
    }

    pub fn response(mut self, guard: ResponseGuard) -> Self {
        self.response = Some(guard);
        self
    }

    pub fn status(mut self, status: &[u16]) -> Self {
        self.status = status
            .iter()
            .filter_map(|s| StatusCode::from_u16(*s).ok())
            .collect();
        self
    }

    /// Smallest declared client-error status other than 404, else 400.
    pub fn invalid_input_status(&self) -> StatusCode {
        self.status
            .iter()
            .copied()
            .filter(|s| s.is_client_error() && *s != StatusCode::NOT_FOUND)
            .min()
            .unwrap_or(StatusCode::BAD_REQUEST)
    }

    /// Invalid-input error carrying this route's rejection status.
    pub fn reject(&self, target: GuardTarget, source: ValidationError) -> AppError {
        tracing::debug!(%target, error = %source, "guard rejected request");
        AppError::Validation {
            target,
            source,
            status: self.invalid_input_status(),
        }
    }

    pub fn check_params(&self, raw: &HashMap<String, String>) -> Result<Record, AppError> {
        self.check_strings(self.params.as_ref(), GuardTarget::Params, raw)
    }

    /// Query strings are coerced to each declared field's type before checking.
    pub fn check_query(&self, raw: &HashMap<String, String>) -> Result<Record, AppError> {
        self.check_strings(self.query.as_ref(), GuardTarget::Query, raw)
    }

    fn check_strings(
        &self,
        guard: Option<&ObjectGuard>,
        target: GuardTarget,
        raw: &HashMap<String, String>,
    ) -> Result<Record, AppError> {
        let Some(guard) = guard else {
            return Ok(Record::new());
        };
        let value: Record = raw
            .iter()
            .map(|(k, v)| {
                let coerced = match guard.field(k) {
                    Some(f) => coerce_query_value(f.field_type, v),
                    None => Value::String(v.clone()),
                };
                (k.clone(), coerced)
            })
            .collect();
        guard
            .validate(&Value::Object(value))
            .map_err(|e| self.reject(target, e))
    }

    /// Parse and check a raw request body. An empty body counts as `null`.
    pub fn check_body(&self, raw: &[u8]) -> Result<Record, AppError> {
        let Some(guard) = &self.body else {
            return Ok(Record::new());
        };
        let value = if raw.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(raw).map_err(|e| {
                self.reject(GuardTarget::Body, ValidationError::single("", format!("invalid JSON: {}", e)))
            })?
        };
        guard
            .validate(&value)
            .map_err(|e| self.reject(GuardTarget::Body, e))
    }

    /// Typed view of a checked body.
    pub fn check_body_as<T: DeserializeOwned>(&self, raw: &[u8]) -> Result<T, AppError> {
        let record = self.check_body(raw)?;
        serde_json::from_value(Value::Object(record)).map_err(|e| {
            self.reject(GuardTarget::Body, ValidationError::single("", e.to_string()))
        })
    }

    /// Check an outgoing body. A mismatch is a server defect, not a client error.
    pub fn check_response(&self, status: StatusCode, body: Value) -> Result<Value, AppError> {
        if !self.status.is_empty() && !self.status.contains(&status) {
            tracing::warn!(%status, declared = ?self.status, "handler answered with an undeclared status");
        }
        match &self.response {
            Some(guard) => guard.validate(&body).map_err(|e| {
                tracing::error!(error = %e, "response failed its guard");
                AppError::InvalidResponse(e)
            }),
            None => Ok(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn role_guard() -> ObjectGuard {
        ObjectGuard::new(vec![
            FieldGuard::id("id"),
            FieldGuard::required("name", FieldType::String),
            FieldGuard {
                nullable: true,
                optional: true,
                ..FieldGuard::required("description", FieldType::String)
            },
        ])
    }

    #[test]
    fn strips_unknown_keys() {
        let record = role_guard()
            .validate(&json!({ "id": "r1", "name": "admin", "extra": true }))
            .unwrap();
        assert!(!record.contains_key("extra"));
        assert!(!record.contains_key("description"));
    }

    #[test]
    fn collects_every_issue() {
        let err = role_guard().validate(&json!({ "name": 3 })).unwrap_err();
        let paths: Vec<&str> = err.issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["id", "name"]);
    }

    #[test]
    fn partial_allows_missing_fields() {
        let guard = role_guard().omit(&["id"]).partial();
        assert!(guard.validate(&json!({})).unwrap().is_empty());
        assert!(guard.validate(&json!({ "name": null })).is_err());
    }

    #[test]
    fn extend_applies_defaults() {
        let guard = role_guard()
            .omit(&["id"])
            .extend(FieldGuard::required("scopeIds", FieldType::StringArray).with_default(json!([])));
        let record = guard.validate(&json!({ "name": "admin" })).unwrap();
        assert_eq!(record["scopeIds"], json!([]));
    }

    #[test]
    fn list_response_reports_item_index() {
        let guard = ResponseGuard::List(role_guard());
        let err = guard
            .validate(&json!([{ "id": "a", "name": "x" }, { "id": "b" }]))
            .unwrap_err();
        assert_eq!(err.issues[0].path, "1.name");
    }

    #[test]
    fn invalid_input_status_skips_not_found() {
        let guard = RouteGuard::new().status(&[200, 404, 422]);
        assert_eq!(guard.invalid_input_status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(RouteGuard::new().invalid_input_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_body_is_rejected_with_route_status() {
        let guard = RouteGuard::new().body(role_guard()).status(&[201, 422]);
        let err = guard.check_body(b"{ not json").unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(guard.check_body(b"").is_err());
        assert!(guard.check_body(br#"{ "id": "r1", "name": "admin" }"#).is_ok());
    }

    #[test]
    fn query_values_are_coerced() {
        let guard = RouteGuard::new().query(ObjectGuard::new(vec![
            FieldGuard::required("page", FieldType::Integer).with_default(json!(1)),
        ]));
        let mut raw = HashMap::new();
        raw.insert("page".to_string(), "3".to_string());
        assert_eq!(guard.check_query(&raw).unwrap()["page"], json!(3));
        raw.insert("page".to_string(), "three".to_string());
        assert!(matches!(
            guard.check_query(&raw),
            Err(AppError::Validation { target: GuardTarget::Query, .. })
        ));
    }
}
