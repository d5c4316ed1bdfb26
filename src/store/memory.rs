//! In-process storage engine with the same constraint semantics as the Postgres backend:
//! primary keys, declared unique constraints, link-table foreign keys with cascading deletes,
//! and all-or-nothing batch inserts.

use crate::config::{EntitySchema, FieldType, RelationSchema};
use crate::error::{AppError, StorageError};
use crate::service::{generate_id, ListQuery, Page, Record, RelationActions, SchemaActions};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct MemoryDb {
    /// Table name -> rows keyed (and ordered) by id.
    tables: HashMap<String, BTreeMap<String, Record>>,
    /// Link table name -> (owner id, target id) pairs.
    links: HashMap<String, Vec<(String, String)>>,
    relations: Vec<Arc<RelationSchema>>,
}

/// Shared handle to one in-memory database. Cloning shares the data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    db: Arc<RwLock<MemoryDb>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, schema: Arc<EntitySchema>) -> MemorySchemaActions {
        MemorySchemaActions {
            store: self.clone(),
            schema,
        }
    }

    /// Register a link table; its foreign keys cascade on entity delete from now on.
    pub fn relation(&self, relation: Arc<RelationSchema>) -> Result<MemoryRelationActions, AppError> {
        {
            let mut db = self.write()?;
            if !db.relations.iter().any(|r| r.table_name == relation.table_name) {
                db.relations.push(relation.clone());
            }
        }
        Ok(MemoryRelationActions {
            store: self.clone(),
            relation,
        })
    }

    /// Number of stored links in a link table.
    pub fn link_count(&self, table: &str) -> Result<usize, AppError> {
        Ok(self.read()?.links.get(table).map_or(0, Vec::len))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryDb>, AppError> {
        self.db
            .read()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".into()).into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryDb>, AppError> {
        self.db
            .write()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".into()).into())
    }
}

fn now_millis() -> Value {
    Value::from(chrono::Utc::now().timestamp_millis())
}

fn values_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn matches_search(schema: &EntitySchema, row: &Record, search: &str) -> bool {
    let needle = search.to_lowercase();
    schema.search_fields.iter().any(|f| {
        row.get(f)
            .and_then(Value::as_str)
            .is_some_and(|s| s.to_lowercase().contains(&needle))
    })
}

/// First declared unique constraint that `row` would violate against the other rows of the table.
fn unique_violation(
    schema: &EntitySchema,
    rows: &BTreeMap<String, Record>,
    row: &Record,
    own_id: &str,
) -> Option<String> {
    schema.unique.iter().find_map(|u| {
        let key: Vec<&Value> = u.fields.iter().map(|f| row.get(f).unwrap_or(&Value::Null)).collect();
        if key.iter().any(|v| v.is_null()) {
            return None;
        }
        rows.iter()
            .filter(|(id, _)| id.as_str() != own_id)
            .any(|(_, other)| {
                u.fields
                    .iter()
                    .zip(&key)
                    .all(|(f, v)| other.get(f).is_some_and(|o| values_eq(o, v)))
            })
            .then(|| u.name.clone())
    })
}

pub struct MemorySchemaActions {
    store: MemoryStore,
    schema: Arc<EntitySchema>,
}

#[async_trait]
impl SchemaActions for MemorySchemaActions {
    fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    async fn get(&self, query: &ListQuery) -> Result<Page, AppError> {
        let db = self.store.read()?;
        let Some(rows) = db.tables.get(&self.schema.table_name) else {
            return Ok(Page::default());
        };
        let matching: Vec<&Record> = rows
            .values()
            .filter(|row| {
                query
                    .filters
                    .iter()
                    .all(|(f, v)| row.get(f).is_some_and(|o| values_eq(o, v)))
            })
            .filter(|row| match &query.search {
                Some(search) => matches_search(&self.schema, row, search),
                None => true,
            })
            .collect();
        let total = matching.len() as u64;
        let rows = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .cloned()
            .collect();
        Ok(Page { total, rows })
    }

    async fn get_by_id(&self, id: &str) -> Result<Record, AppError> {
        let db = self.store.read()?;
        db.tables
            .get(&self.schema.table_name)
            .and_then(|rows| rows.get(id))
            .cloned()
            .ok_or_else(|| StorageError::NotFound.into())
    }

    async fn post(&self, data: Record) -> Result<Record, AppError> {
        let id = generate_id();
        let mut row = Record::new();
        for f in &self.schema.fields {
            let value = if f.name == self.schema.id_field {
                Value::String(id.clone())
            } else if f.server_assigned && f.field_type == FieldType::Timestamp {
                now_millis()
            } else {
                data.get(&f.name).cloned().unwrap_or(Value::Null)
            };
            row.insert(f.name.clone(), value);
        }

        let mut db = self.store.write()?;
        let rows = db.tables.entry(self.schema.table_name.clone()).or_default();
        if rows.contains_key(&id) {
            return Err(StorageError::UniqueViolation {
                constraint: format!("{}_pkey", self.schema.table_name),
            }
            .into());
        }
        if let Some(constraint) = unique_violation(&self.schema, rows, &row, &id) {
            return Err(StorageError::UniqueViolation { constraint }.into());
        }
        tracing::debug!(entity = %self.schema.name, %id, "inserted row");
        rows.insert(id, row.clone());
        Ok(row)
    }

    async fn patch_by_id(&self, id: &str, data: Record) -> Result<Record, AppError> {
        let mut db = self.store.write()?;
        let rows = db.tables.entry(self.schema.table_name.clone()).or_default();
        let mut row = rows.get(id).cloned().ok_or(StorageError::NotFound)?;
        for f in self.schema.fields.iter().filter(|f| !f.server_assigned) {
            if let Some(v) = data.get(&f.name) {
                row.insert(f.name.clone(), v.clone());
            }
        }
        if let Some(constraint) = unique_violation(&self.schema, rows, &row, id) {
            return Err(StorageError::UniqueViolation { constraint }.into());
        }
        rows.insert(id.to_string(), row.clone());
        Ok(row)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), AppError> {
        let mut db = self.store.write()?;
        let removed = db
            .tables
            .get_mut(&self.schema.table_name)
            .and_then(|rows| rows.remove(id));
        if removed.is_none() {
            return Err(StorageError::NotFound.into());
        }
        let cascades: Vec<(String, bool)> = db
            .relations
            .iter()
            .filter(|r| r.owner.name == self.schema.name || r.target.name == self.schema.name)
            .map(|r| (r.table_name.clone(), r.owner.name == self.schema.name))
            .collect();
        for (table, is_owner) in cascades {
            if let Some(links) = db.links.get_mut(&table) {
                links.retain(|(owner, target)| if is_owner { owner != id } else { target != id });
            }
        }
        tracing::debug!(entity = %self.schema.name, id, "deleted row");
        Ok(())
    }
}

pub struct MemoryRelationActions {
    store: MemoryStore,
    relation: Arc<RelationSchema>,
}

#[async_trait]
impl RelationActions for MemoryRelationActions {
    fn relation(&self) -> &Arc<RelationSchema> {
        &self.relation
    }

    async fn insert(&self, pairs: &[(String, String)]) -> Result<(), AppError> {
        let rel = &self.relation;
        let mut db = self.store.write()?;

        // Check the whole batch before writing anything.
        let exists = |table: &str, id: &str| {
            db.tables
                .get(table)
                .is_some_and(|rows| rows.contains_key(id))
        };
        for (owner, target) in pairs {
            if !exists(&rel.owner.table_name, owner) {
                return Err(StorageError::ForeignKeyViolation {
                    constraint: rel.foreign_key(&rel.owner_column()),
                }
                .into());
            }
            if !exists(&rel.target.table_name, target) {
                return Err(StorageError::ForeignKeyViolation {
                    constraint: rel.foreign_key(&rel.target_column()),
                }
                .into());
            }
        }
        let existing: HashSet<&(String, String)> = db
            .links
            .get(&rel.table_name)
            .map(|links| links.iter().collect())
            .unwrap_or_default();
        let mut batch = HashSet::new();
        for pair in pairs {
            if existing.contains(pair) || !batch.insert(pair) {
                return Err(StorageError::UniqueViolation {
                    constraint: rel.constraint.clone(),
                }
                .into());
            }
        }

        db.links
            .entry(rel.table_name.clone())
            .or_default()
            .extend(pairs.iter().cloned());
        tracing::debug!(relation = %rel.table_name, count = pairs.len(), "inserted links");
        Ok(())
    }

    async fn get_entries(&self, owner_id: &str) -> Result<Vec<Record>, AppError> {
        let rel = &self.relation;
        let db = self.store.read()?;
        let Some(targets) = db.tables.get(&rel.target.table_name) else {
            return Ok(Vec::new());
        };
        let linked: HashSet<&str> = db
            .links
            .get(&rel.table_name)
            .map(|links| {
                links
                    .iter()
                    .filter(|(owner, _)| owner == owner_id)
                    .map(|(_, target)| target.as_str())
                    .collect()
            })
            .unwrap_or_default();
        Ok(targets
            .iter()
            .filter(|(id, _)| linked.contains(id.as_str()))
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn delete(&self, owner_id: &str, target_id: &str) -> Result<bool, AppError> {
        let mut db = self.store.write()?;
        let Some(links) = db.links.get_mut(&self.relation.table_name) else {
            return Ok(false);
        };
        let before = links.len();
        links.retain(|(owner, target)| !(owner == owner_id && target == target_id));
        Ok(links.len() < before)
    }
}
