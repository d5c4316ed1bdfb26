//! Load schema config from JSON and resolve it into a `SchemaRegistry`.

use crate::case::to_snake_case;
use crate::config::resolved::{EntitySchema, FieldSpec, RelationSchema, SchemaRegistry, UniqueConstraint};
use crate::config::{validate, FullConfig};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Build the registry from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<SchemaRegistry, ConfigError> {
    validate(config)?;

    let mut entities = HashMap::new();
    for e in &config.entities {
        let table_name = e.table.clone().unwrap_or_else(|| e.name.clone());
        let fields: Vec<FieldSpec> = e
            .fields
            .iter()
            .map(|f| FieldSpec {
                name: f.name.clone(),
                column: f.column.clone().unwrap_or_else(|| to_snake_case(&f.name)),
                field_type: f.type_,
                nullable: f.nullable,
                server_assigned: f.server_assigned,
                default: f.default.clone(),
                rule: f.validation.clone(),
            })
            .collect();
        let unique = e
            .unique
            .iter()
            .map(|u| {
                let name = u.name.clone().unwrap_or_else(|| {
                    let columns: Vec<String> = u.fields.iter().map(|f| to_snake_case(f)).collect();
                    format!("{}__{}", table_name, columns.join("_"))
                });
                UniqueConstraint {
                    name,
                    fields: u.fields.clone(),
                }
            })
            .collect();
        let schema = EntitySchema::new(
            e.name.clone(),
            table_name,
            e.path_segment.clone(),
            e.id_field.clone(),
            fields,
            unique,
            e.search_fields.clone(),
        );
        tracing::debug!(entity = %schema.name, fields = schema.fields.len(), "resolved entity");
        entities.insert(e.name.clone(), Arc::new(schema));
    }

    let mut relations = Vec::with_capacity(config.relations.len());
    for r in &config.relations {
        let lookup = |name: &str| {
            entities
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "entity",
                    id: name.to_string(),
                })
        };
        relations.push(Arc::new(RelationSchema {
            name: r.name.clone(),
            table_name: r.table.clone(),
            owner: lookup(&r.owner.entity)?,
            target: lookup(&r.target.entity)?,
            owner_field: r.owner.field.clone(),
            target_field: r.target.field.clone(),
            ids_field: r.ids_field.clone(),
            target_param: r.target_param.clone(),
            constraint: r
                .constraint
                .clone()
                .unwrap_or_else(|| format!("{}_pkey", r.table)),
        }));
    }

    Ok(SchemaRegistry { entities, relations })
}

pub fn parse(json: &str) -> Result<FullConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read every `*.json` file of a directory (sorted by name) and merge them.
pub async fn load_from_dir(dir: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", dir.display(), e)))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConfigError::Load(e.to_string()))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut config = FullConfig::default();
    for path in paths {
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), "loading schema config");
        config = config.merge(parse(&text)?);
    }
    Ok(config)
}
