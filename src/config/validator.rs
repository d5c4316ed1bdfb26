//! Schema config validation: referential integrity and descriptor invariants.

use crate::config::{EntityConfig, FieldType, FullConfig};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut paths = HashSet::new();
    for entity in &config.entities {
        if !names.insert(entity.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "entity",
                name: entity.name.clone(),
            });
        }
        if !paths.insert(entity.path_segment.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "path segment",
                name: entity.path_segment.clone(),
            });
        }
        validate_entity(entity)?;
    }

    let mut relation_keys = HashSet::new();
    for r in &config.relations {
        for end in [&r.owner, &r.target] {
            if !names.contains(end.entity.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "entity",
                    id: end.entity.clone(),
                });
            }
            if end.field.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "relation {} has an empty link field",
                    r.name
                )));
            }
        }
        if r.owner.field == r.target.field {
            return Err(ConfigError::Validation(format!(
                "relation {} links both sides through {}",
                r.name, r.owner.field
            )));
        }
        if r.ids_field.is_empty() || r.target_param.is_empty() || r.target_param == "id" {
            return Err(ConfigError::Validation(format!(
                "relation {} needs a non-empty ids_field and a target_param other than 'id'",
                r.name
            )));
        }
        if !relation_keys.insert((r.owner.entity.as_str(), r.name.as_str())) {
            return Err(ConfigError::Duplicate {
                kind: "relation",
                name: format!("{}/{}", r.owner.entity, r.name),
            });
        }
    }

    Ok(())
}

fn validate_entity(entity: &EntityConfig) -> Result<(), ConfigError> {
    let mut fields = HashSet::new();
    for f in &entity.fields {
        if !fields.insert(f.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "field",
                name: format!("{}.{}", entity.name, f.name),
            });
        }
        if let Some(pattern) = &f.validation.pattern {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("{}.{}: invalid pattern: {}", entity.name, f.name, e))
            })?;
        }
    }

    let id = entity
        .fields
        .iter()
        .find(|f| f.name == entity.id_field)
        .ok_or_else(|| ConfigError::InvalidIdField {
            entity: entity.name.clone(),
            field: entity.id_field.clone(),
        })?;
    if !id.server_assigned || id.type_ != FieldType::String || id.nullable {
        return Err(ConfigError::InvalidIdField {
            entity: entity.name.clone(),
            field: entity.id_field.clone(),
        });
    }

    for unique in &entity.unique {
        if unique.fields.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{}: unique constraint without fields",
                entity.name
            )));
        }
        for field in &unique.fields {
            if !fields.contains(field.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "unique field",
                    id: format!("{}.{}", entity.name, field),
                });
            }
        }
    }

    for field in &entity.search_fields {
        let Some(f) = entity.fields.iter().find(|f| &f.name == field) else {
            return Err(ConfigError::MissingReference {
                kind: "search field",
                id: format!("{}.{}", entity.name, field),
            });
        };
        if f.type_ != FieldType::String {
            return Err(ConfigError::Validation(format!(
                "{}.{}: only string fields are searchable",
                entity.name, field
            )));
        }
    }

    Ok(())
}
