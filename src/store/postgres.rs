//! Action sets executed against PostgreSQL through the SQL builder.

use crate::config::{EntitySchema, FieldType, RelationSchema};
use crate::error::{AppError, StorageError};
use crate::service::{generate_id, ListQuery, Page, Record, RelationActions, SchemaActions};
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::sync::Arc;

pub struct PgSchemaActions {
    pool: PgPool,
    schema: Arc<EntitySchema>,
}

impl PgSchemaActions {
    pub fn new(pool: PgPool, schema: Arc<EntitySchema>) -> Self {
        Self { pool, schema }
    }
}

fn bind_all<'q>(sql: &'q str, params: &[PgBindValue]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(p.clone());
    }
    query
}

fn with_id(mut q: QueryBuf, id: &str) -> QueryBuf {
    q.params.push(PgBindValue::String(id.to_string()));
    q
}

/// Read a row into a record keyed by API field names, in field order.
fn row_to_record(row: &PgRow, schema: &EntitySchema) -> Result<Record, AppError> {
    let mut record = Record::new();
    for f in &schema.fields {
        let col = f.column.as_str();
        let value = match f.field_type {
            FieldType::String => row.try_get::<Option<String>, _>(col)?.map(Value::String),
            FieldType::Integer | FieldType::Timestamp => row.try_get::<Option<i64>, _>(col)?.map(Value::from),
            FieldType::Number => row
                .try_get::<Option<f64>, _>(col)?
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            FieldType::Boolean => row.try_get::<Option<bool>, _>(col)?.map(Value::Bool),
            FieldType::Json => row.try_get::<Option<Value>, _>(col)?,
            FieldType::StringArray => row.try_get::<Option<Vec<String>>, _>(col)?.map(Value::from),
        };
        record.insert(f.name.clone(), value.unwrap_or(Value::Null));
    }
    Ok(record)
}

#[async_trait]
impl SchemaActions for PgSchemaActions {
    fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    async fn get(&self, query: &ListQuery) -> Result<Page, AppError> {
        let count = sql::count_list(&self.schema, query);
        tracing::debug!(sql = %count.sql, params = ?count.params, "query");
        let total: i64 = bind_all(&count.sql, &count.params)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;

        let q = sql::select_list(&self.schema, query);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(&q.sql, &q.params).fetch_all(&self.pool).await?;
        let rows = rows
            .iter()
            .map(|r| row_to_record(r, &self.schema))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            total: total.max(0) as u64,
            rows,
        })
    }

    async fn get_by_id(&self, id: &str) -> Result<Record, AppError> {
        let q = with_id(sql::select_by_id(&self.schema), id);
        tracing::debug!(sql = %q.sql, id, "query");
        let row = bind_all(&q.sql, &q.params)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound)?;
        row_to_record(&row, &self.schema)
    }

    async fn post(&self, mut data: Record) -> Result<Record, AppError> {
        data.insert(self.schema.id_field.clone(), Value::String(generate_id()));
        let q = sql::insert(&self.schema, &data);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q.sql, &q.params).fetch_one(&self.pool).await?;
        row_to_record(&row, &self.schema)
    }

    async fn patch_by_id(&self, id: &str, data: Record) -> Result<Record, AppError> {
        let q = sql::update(&self.schema, id, &data);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q.sql, &q.params)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound)?;
        row_to_record(&row, &self.schema)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), AppError> {
        let q = with_id(sql::delete(&self.schema), id);
        tracing::debug!(sql = %q.sql, id, "query");
        let result = bind_all(&q.sql, &q.params).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound.into());
        }
        Ok(())
    }
}

pub struct PgRelationActions {
    pool: PgPool,
    relation: Arc<RelationSchema>,
}

impl PgRelationActions {
    pub fn new(pool: PgPool, relation: Arc<RelationSchema>) -> Self {
        Self { pool, relation }
    }
}

#[async_trait]
impl RelationActions for PgRelationActions {
    fn relation(&self) -> &Arc<RelationSchema> {
        &self.relation
    }

    async fn insert(&self, pairs: &[(String, String)]) -> Result<(), AppError> {
        if pairs.is_empty() {
            return Ok(());
        }
        let q = sql::insert_links(&self.relation, pairs);
        tracing::debug!(sql = %q.sql, pairs = pairs.len(), "query");
        bind_all(&q.sql, &q.params).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_entries(&self, owner_id: &str) -> Result<Vec<Record>, AppError> {
        let q = with_id(sql::select_linked_targets(&self.relation), owner_id);
        tracing::debug!(sql = %q.sql, owner_id, "query");
        let rows = bind_all(&q.sql, &q.params).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| row_to_record(r, &self.relation.target))
            .collect()
    }

    async fn delete(&self, owner_id: &str, target_id: &str) -> Result<bool, AppError> {
        let mut q = with_id(sql::delete_link(&self.relation), owner_id);
        q.params.push(PgBindValue::String(target_id.to_string()));
        tracing::debug!(sql = %q.sql, owner_id, target_id, "query");
        let result = bind_all(&q.sql, &q.params).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
