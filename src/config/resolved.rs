//! Resolved schema model: config validated and flattened into immutable descriptors.

use crate::config::{FieldType, ValidationRule};
use crate::error::ConfigError;
use crate::service::{FieldGuard, ObjectGuard};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub column: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub server_assigned: bool,
    pub default: Option<Value>,
    pub rule: ValidationRule,
}

#[derive(Clone, Debug)]
pub struct UniqueConstraint {
    pub name: String,
    pub fields: Vec<String>,
}

/// Entity Schema Descriptor. Built once by `resolve` and shared read-only afterwards.
#[derive(Clone, Debug)]
pub struct EntitySchema {
    pub name: String,
    pub table_name: String,
    pub path_segment: String,
    pub id_field: String,
    pub fields: Vec<FieldSpec>,
    pub unique: Vec<UniqueConstraint>,
    pub search_fields: Vec<String>,
    /// Full entity shape, used for responses.
    pub guard: ObjectGuard,
    /// Full guard minus server-assigned fields.
    pub create_guard: ObjectGuard,
    /// Create guard with every field optional.
    pub update_guard: ObjectGuard,
}

impl EntitySchema {
    pub fn new(
        name: String,
        table_name: String,
        path_segment: String,
        id_field: String,
        fields: Vec<FieldSpec>,
        unique: Vec<UniqueConstraint>,
        search_fields: Vec<String>,
    ) -> Self {
        let guard = ObjectGuard::new(
            fields
                .iter()
                .map(|f| FieldGuard {
                    name: f.name.clone(),
                    field_type: f.field_type,
                    nullable: f.nullable,
                    optional: false,
                    default: None,
                    rule: f.rule.clone(),
                })
                .collect(),
        );
        let server_assigned: Vec<&str> = fields
            .iter()
            .filter(|f| f.server_assigned)
            .map(|f| f.name.as_str())
            .collect();
        let mut create_guard = guard.omit(&server_assigned);
        for (field, spec) in create_guard
            .fields_mut()
            .iter_mut()
            .zip(fields.iter().filter(|f| !f.server_assigned))
        {
            field.optional = (spec.nullable || spec.default.is_some()) && spec.rule.required != Some(true);
            field.default = spec.default.clone();
        }
        let update_guard = create_guard.partial();
        Self {
            name,
            table_name,
            path_segment,
            id_field,
            fields,
            unique,
            search_fields,
            guard,
            create_guard,
            update_guard,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn id_column(&self) -> &str {
        self.field(&self.id_field)
            .map(|f| f.column.as_str())
            .unwrap_or("id")
    }
}

/// Link table between two entities.
#[derive(Clone, Debug)]
pub struct RelationSchema {
    pub name: String,
    pub table_name: String,
    pub owner: Arc<EntitySchema>,
    pub target: Arc<EntitySchema>,
    /// Link field holding the owner id, e.g. `organizationRoleId`.
    pub owner_field: String,
    /// Link field holding the target id, e.g. `organizationScopeId`.
    pub target_field: String,
    pub ids_field: String,
    pub target_param: String,
    /// (owner, target) uniqueness constraint.
    pub constraint: String,
}

impl RelationSchema {
    pub fn owner_column(&self) -> String {
        crate::case::to_snake_case(&self.owner_field)
    }

    pub fn target_column(&self) -> String {
        crate::case::to_snake_case(&self.target_field)
    }

    /// Foreign key constraint name for one side, as `<table>__<column>_fkey`.
    pub fn foreign_key(&self, column: &str) -> String {
        format!("{}__{}_fkey", self.table_name, column)
    }
}

/// Process-wide, read-only mapping from entity name to descriptor.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    pub(crate) entities: HashMap<String, Arc<EntitySchema>>,
    pub(crate) relations: Vec<Arc<RelationSchema>>,
}

impl SchemaRegistry {
    pub fn entity(&self, name: &str) -> Result<Arc<EntitySchema>, ConfigError> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: name.to_string(),
            })
    }

    pub fn relation(&self, owner: &str, name: &str) -> Result<Arc<RelationSchema>, ConfigError> {
        self.relations
            .iter()
            .find(|r| r.owner.name == owner && r.name == name)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "relation",
                id: format!("{}/{}", owner, name),
            })
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntitySchema>> {
        self.entities.values()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Arc<RelationSchema>> {
        self.relations.iter()
    }
}
