//! Storage Action Sets: the only seam between route handlers and persistence.

use crate::config::{EntitySchema, FieldType, RelationSchema, ValidationRule};
use crate::error::AppError;
use crate::service::{DuplicateFieldMap, FieldGuard, ObjectGuard, Record};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Largest page whose offset still fits a Postgres `bigint` at any page size.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_SIZE;

/// Pagination, search and exact-match filters of a list request.
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    /// 1-based.
    pub page: u64,
    pub page_size: u64,
    pub search: Option<String>,
    pub filters: Vec<(String, Value)>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search: None,
            filters: Vec::new(),
        }
    }
}

impl ListQuery {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// Query guard for an entity's list route: `page`, `page_size`, `q`, and one optional filter per scalar field.
    pub fn guard(schema: &EntitySchema) -> ObjectGuard {
        let mut fields = vec![
            FieldGuard::required("page", FieldType::Integer)
                .with_default(Value::from(1))
                .with_rule(ValidationRule {
                    minimum: Some(1.0),
                    maximum: Some(MAX_PAGE as f64),
                    ..Default::default()
                }),
            FieldGuard::required("page_size", FieldType::Integer)
                .with_default(Value::from(DEFAULT_PAGE_SIZE))
                .with_rule(ValidationRule {
                    minimum: Some(1.0),
                    maximum: Some(MAX_PAGE_SIZE as f64),
                    ..Default::default()
                }),
            FieldGuard {
                optional: true,
                ..FieldGuard::required("q", FieldType::String)
            },
        ];
        fields.extend(
            schema
                .fields
                .iter()
                .filter(|f| !matches!(f.field_type, FieldType::Json | FieldType::StringArray))
                .map(|f| FieldGuard {
                    optional: true,
                    ..FieldGuard::required(&f.name, f.field_type)
                }),
        );
        ObjectGuard::new(fields)
    }

    /// Build from a record already checked by [`ListQuery::guard`].
    pub fn from_record(mut record: Record, schema: &EntitySchema) -> Self {
        let page = record.remove("page").and_then(|v| v.as_u64()).unwrap_or(1);
        let page_size = record
            .remove("page_size")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let search = record
            .remove("q")
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty());
        let filters = schema
            .fields
            .iter()
            .filter_map(|f| record.remove(&f.name).map(|v| (f.name.clone(), v)))
            .collect();
        Self {
            page,
            page_size,
            search,
            filters,
        }
    }
}

/// One page of rows plus the total number of matching rows.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub total: u64,
    pub rows: Vec<Record>,
}

/// CRUD operations of one entity against a storage engine.
#[async_trait]
pub trait SchemaActions: Send + Sync {
    fn schema(&self) -> &Arc<EntitySchema>;

    async fn get(&self, query: &ListQuery) -> Result<Page, AppError>;

    /// `StorageError::NotFound` when absent.
    async fn get_by_id(&self, id: &str) -> Result<Record, AppError>;

    /// `data` has passed the create guard; server-assigned fields are filled here.
    async fn post(&self, data: Record) -> Result<Record, AppError>;

    async fn patch_by_id(&self, id: &str, data: Record) -> Result<Record, AppError>;

    async fn delete_by_id(&self, id: &str) -> Result<(), AppError>;
}

/// Link-table operations of one relation.
#[async_trait]
pub trait RelationActions: Send + Sync {
    fn relation(&self) -> &Arc<RelationSchema>;

    /// Insert (owner id, target id) pairs as one atomic unit: all or nothing.
    async fn insert(&self, pairs: &[(String, String)]) -> Result<(), AppError>;

    /// Target entities linked to `owner_id`, not raw link rows.
    async fn get_entries(&self, owner_id: &str) -> Result<Vec<Record>, AppError>;

    /// Returns whether a link was removed.
    async fn delete(&self, owner_id: &str, target_id: &str) -> Result<bool, AppError>;
}

#[async_trait]
impl<T: SchemaActions + ?Sized> SchemaActions for Arc<T> {
    fn schema(&self) -> &Arc<EntitySchema> {
        (**self).schema()
    }

    async fn get(&self, query: &ListQuery) -> Result<Page, AppError> {
        (**self).get(query).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Record, AppError> {
        (**self).get_by_id(id).await
    }

    async fn post(&self, data: Record) -> Result<Record, AppError> {
        (**self).post(data).await
    }

    async fn patch_by_id(&self, id: &str, data: Record) -> Result<Record, AppError> {
        (**self).patch_by_id(id, data).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), AppError> {
        (**self).delete_by_id(id).await
    }
}

/// New server-side id for a created row.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Wraps an action set so that unique violations listed in `duplicates` are re-signalled as
/// `DuplicateValue` on `post` and `patch_by_id`; all other verbs delegate unchanged.
pub struct UniqueFieldActions<A> {
    inner: A,
    duplicates: DuplicateFieldMap,
}

impl<A: SchemaActions> UniqueFieldActions<A> {
    pub fn new(inner: A, duplicates: DuplicateFieldMap) -> Self {
        Self { inner, duplicates }
    }
}

#[async_trait]
impl<A: SchemaActions> SchemaActions for UniqueFieldActions<A> {
    fn schema(&self) -> &Arc<EntitySchema> {
        self.inner.schema()
    }

    async fn get(&self, query: &ListQuery) -> Result<Page, AppError> {
        self.inner.get(query).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Record, AppError> {
        self.inner.get_by_id(id).await
    }

    async fn post(&self, data: Record) -> Result<Record, AppError> {
        self.inner
            .post(data)
            .await
            .map_err(|e| self.duplicates.remap(e))
    }

    async fn patch_by_id(&self, id: &str, data: Record) -> Result<Record, AppError> {
        self.inner
            .patch_by_id(id, data)
            .await
            .map_err(|e| self.duplicates.remap(e))
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), AppError> {
        self.inner.delete_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse, resolve};
    use serde_json::json;

    fn schema() -> Arc<EntitySchema> {
        let config = parse(
            r#"{ "entities": [{
                "name": "scopes",
                "path_segment": "scopes",
                "fields": [
                    { "name": "id", "type": "string", "server_assigned": true },
                    { "name": "name", "type": "string" },
                    { "name": "weight", "type": "integer" },
                    { "name": "meta", "type": "json", "nullable": true }
                ]
            }] }"#,
        )
        .unwrap();
        resolve(&config).unwrap().entity("scopes").unwrap()
    }

    #[test]
    fn list_query_defaults() {
        let schema = schema();
        let record = ListQuery::guard(&schema).validate(&json!({})).unwrap();
        let query = ListQuery::from_record(record, &schema);
        assert_eq!(query, ListQuery::default());
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn list_query_collects_filters_and_search() {
        let schema = schema();
        let record = ListQuery::guard(&schema)
            .validate(&json!({ "page": 3, "page_size": 10, "q": "read", "weight": 2, "unknown": "x" }))
            .unwrap();
        let query = ListQuery::from_record(record, &schema);
        assert_eq!(query.offset(), 20);
        assert_eq!(query.search.as_deref(), Some("read"));
        assert_eq!(query.filters, vec![("weight".to_string(), json!(2))]);
    }

    #[test]
    fn list_query_caps_page_size() {
        let schema = schema();
        assert!(ListQuery::guard(&schema)
            .validate(&json!({ "page_size": 101 }))
            .is_err());
        assert!(ListQuery::guard(&schema).field("meta").is_none());
    }

    #[test]
    fn huge_pages_are_rejected_and_offset_never_overflows() {
        let schema = schema();
        assert!(ListQuery::guard(&schema)
            .validate(&json!({ "page": i64::MAX }))
            .is_err());
        assert!(ListQuery::guard(&schema)
            .validate(&json!({ "page": MAX_PAGE, "page_size": MAX_PAGE_SIZE }))
            .is_ok());
        let query = ListQuery {
            page: u64::MAX,
            page_size: MAX_PAGE_SIZE,
            ..Default::default()
        };
        assert_eq!(query.offset(), u64::MAX);
        let first = ListQuery {
            page: 0,
            ..Default::default()
        };
        assert_eq!(first.offset(), 0);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
    }
}
