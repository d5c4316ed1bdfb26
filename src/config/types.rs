//! Raw schema config types as written in `schemas/*.json`.

use serde::{Deserialize, Serialize};

/// Semantic type of an entity field as seen by API callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// Milliseconds since the Unix epoch.
    Timestamp,
    Json,
    StringArray,
}

impl FieldType {
    pub fn describe(&self) -> &'static str {
        match self {
            FieldType::String => "a string",
            FieldType::Integer => "an integer",
            FieldType::Number => "a number",
            FieldType::Boolean => "a boolean",
            FieldType::Timestamp => "a timestamp in milliseconds",
            FieldType::Json => "a JSON object",
            FieldType::StringArray => "an array of strings",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    /// Minimum element count for array fields.
    #[serde(default)]
    pub min_items: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    /// API name (camelCase).
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub nullable: bool,
    /// Assigned by the server (ids, timestamps); never accepted in create payloads.
    #[serde(default)]
    pub server_assigned: bool,
    /// Storage column; defaults to the snake_case form of `name`.
    #[serde(default)]
    pub column: Option<String>,
    /// Value applied when a create payload omits the field.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub validation: ValidationRule,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UniqueConfig {
    /// Constraint name as the storage engine reports it on a violation; duplicate-field mapping matches
    /// on this exact name. Defaults to `<table>__<columns>`, which is not what Postgres generates for an
    /// unnamed `UNIQUE` (`<table>_<column>_key`), so set it when the migration does not name the constraint.
    #[serde(default)]
    pub name: Option<String>,
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    /// Storage table; defaults to `name`.
    #[serde(default)]
    pub table: Option<String>,
    pub path_segment: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub unique: Vec<UniqueConfig>,
    /// Fields matched by the `q` list parameter.
    #[serde(default)]
    pub search_fields: Vec<String>,
}

fn default_id_field() -> String {
    "id".into()
}

/// One side of a link table: the entity it points at and the link field holding its id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationEndConfig {
    pub entity: String,
    pub field: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    /// Path segment under the owner, e.g. `scopes`.
    pub name: String,
    pub table: String,
    pub owner: RelationEndConfig,
    pub target: RelationEndConfig,
    /// Body field of the batch insert, e.g. `scopeIds`.
    pub ids_field: String,
    #[serde(default = "default_target_param")]
    pub target_param: String,
    /// Name of the (owner, target) uniqueness constraint; defaults to `<table>_pkey`.
    #[serde(default)]
    pub constraint: Option<String>,
}

fn default_target_param() -> String {
    "targetId".into()
}

/// All schema config in one struct.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
}

impl FullConfig {
    /// Concatenate several config documents.
    pub fn merge(mut self, other: FullConfig) -> Self {
        self.entities.extend(other.entities);
        self.relations.extend(other.relations);
        self
    }
}
