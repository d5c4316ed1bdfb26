//! Builds parameterized SELECT, INSERT, UPDATE, DELETE for entities and link tables.

use crate::config::{EntitySchema, FieldSpec, FieldType, RelationSchema};
use crate::service::{ListQuery, Record};
use crate::sql::PgBindValue;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Optionally alias-qualified column.
fn column_ref(alias: Option<&str>, column: &str) -> String {
    match alias {
        Some(a) => format!("{}.{}", a, quoted(column)),
        None => quoted(column),
    }
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn push_param(&mut self, v: PgBindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Bind a field value and return its placeholder, cast to the column's type.
    fn push_field(&mut self, field: &FieldSpec, v: &serde_json::Value) -> String {
        let n = self.push_param(PgBindValue::for_field(field.field_type, v));
        placeholder(field.field_type, n)
    }
}

fn placeholder(field_type: FieldType, n: usize) -> String {
    match field_type {
        FieldType::String => format!("${}::text", n),
        FieldType::Integer => format!("${}::bigint", n),
        FieldType::Number => format!("${}::float8", n),
        FieldType::Boolean => format!("${}::boolean", n),
        FieldType::Timestamp => format!("to_timestamp(${}::bigint / 1000.0)", n),
        FieldType::Json => format!("${}::jsonb", n),
        FieldType::StringArray => format!("${}::text[]", n),
    }
}

/// SELECT list in field order. Timestamps are read back as epoch milliseconds.
fn select_column_list(schema: &EntitySchema, alias: Option<&str>) -> String {
    schema
        .fields
        .iter()
        .map(|f| {
            let col = column_ref(alias, &f.column);
            match f.field_type {
                FieldType::Timestamp => format!(
                    "(EXTRACT(EPOCH FROM {}) * 1000)::bigint AS {}",
                    col,
                    quoted(&f.column)
                ),
                _ => format!("{} AS {}", col, quoted(&f.column)),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// WHERE clause for list filters and search; params are appended to `q`.
fn list_where(schema: &EntitySchema, query: &ListQuery, q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    for (name, val) in &query.filters {
        let Some(field) = schema.field(name) else { continue };
        let ph = q.push_field(field, val);
        parts.push(format!("{} = {}", quoted(&field.column), ph));
    }
    if let Some(search) = &query.search {
        let columns: Vec<&str> = schema
            .search_fields
            .iter()
            .filter_map(|name| schema.field(name))
            .map(|f| f.column.as_str())
            .collect();
        if !columns.is_empty() {
            let n = q.push_param(PgBindValue::String(format!("%{}%", escape_like(search))));
            let ors: Vec<String> = columns
                .iter()
                .map(|c| format!("{} ILIKE ${} ESCAPE '\\'", quoted(c), n))
                .collect();
            parts.push(format!("({})", ors.join(" OR ")));
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// Search terms match literally: LIKE wildcards and the escape character are escaped.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// SELECT by primary key. Caller binds the id as sole param.
pub fn select_by_id(schema: &EntitySchema) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "SELECT {} FROM {} WHERE {} = $1",
            select_column_list(schema, None),
            quoted(&schema.table_name),
            quoted(schema.id_column())
        ),
        params: Vec::new(),
    }
}

/// SELECT one page, ordered by primary key.
pub fn select_list(schema: &EntitySchema, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::default();
    let where_clause = list_where(schema, query, &mut q);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
        select_column_list(schema, None),
        quoted(&schema.table_name),
        where_clause,
        quoted(schema.id_column()),
        query.page_size,
        query.offset()
    );
    q
}

/// COUNT(*) under the same filters as `select_list`.
pub fn count_list(schema: &EntitySchema, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::default();
    let where_clause = list_where(schema, query, &mut q);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(&schema.table_name), where_clause);
    q
}

/// INSERT the fields present in `data`; absent columns take their database default.
pub fn insert(schema: &EntitySchema, data: &Record) -> QueryBuf {
    let mut q = QueryBuf::default();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &schema.fields {
        let Some(v) = data.get(&f.name) else { continue };
        placeholders.push(q.push_field(f, v));
        cols.push(quoted(&f.column));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(&schema.table_name),
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(schema, None)
    );
    q
}

/// UPDATE by id: SET only non-server fields present in `data`. Falls back to a plain select when nothing is set.
pub fn update(schema: &EntitySchema, id: &str, data: &Record) -> QueryBuf {
    let mut q = QueryBuf::default();
    let mut sets = Vec::new();
    for f in schema.fields.iter().filter(|f| !f.server_assigned) {
        let Some(v) = data.get(&f.name) else { continue };
        let ph = q.push_field(f, v);
        sets.push(format!("{} = {}", quoted(&f.column), ph));
    }
    if sets.is_empty() {
        let mut q = select_by_id(schema);
        q.params.push(PgBindValue::String(id.to_string()));
        return q;
    }
    let id_param = q.push_param(PgBindValue::String(id.to_string()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        quoted(&schema.table_name),
        sets.join(", "),
        quoted(schema.id_column()),
        id_param,
        select_column_list(schema, None)
    );
    q
}

/// DELETE by id. Caller binds the id as sole param.
pub fn delete(schema: &EntitySchema) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "DELETE FROM {} WHERE {} = $1",
            quoted(&schema.table_name),
            quoted(schema.id_column())
        ),
        params: Vec::new(),
    }
}

/// Single multi-row INSERT into a link table, atomic by construction.
pub fn insert_links(relation: &RelationSchema, pairs: &[(String, String)]) -> QueryBuf {
    let mut q = QueryBuf::default();
    let mut rows = Vec::with_capacity(pairs.len());
    for (owner, target) in pairs {
        let a = q.push_param(PgBindValue::String(owner.clone()));
        let b = q.push_param(PgBindValue::String(target.clone()));
        rows.push(format!("(${}::text, ${}::text)", a, b));
    }
    q.sql = format!(
        "INSERT INTO {} ({}, {}) VALUES {}",
        quoted(&relation.table_name),
        quoted(&relation.owner_column()),
        quoted(&relation.target_column()),
        rows.join(", ")
    );
    q
}

/// Target rows linked to one owner. Caller binds the owner id as sole param.
pub fn select_linked_targets(relation: &RelationSchema) -> QueryBuf {
    let target = &relation.target;
    QueryBuf {
        sql: format!(
            "SELECT {} FROM {} t JOIN {} r ON r.{} = t.{} WHERE r.{} = $1 ORDER BY t.{}",
            select_column_list(target, Some("t")),
            quoted(&target.table_name),
            quoted(&relation.table_name),
            quoted(&relation.target_column()),
            quoted(target.id_column()),
            quoted(&relation.owner_column()),
            quoted(target.id_column())
        ),
        params: Vec::new(),
    }
}

/// DELETE one exact (owner, target) pair. Caller binds owner then target.
pub fn delete_link(relation: &RelationSchema) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "DELETE FROM {} WHERE {} = $1 AND {} = $2",
            quoted(&relation.table_name),
            quoted(&relation.owner_column()),
            quoted(&relation.target_column())
        ),
        params: Vec::new(),
    }
}
