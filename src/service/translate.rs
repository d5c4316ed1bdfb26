//! Error translation at the boundary between action sets and route handlers.

use crate::config::EntitySchema;
use crate::error::{AppError, StorageError};

/// Explicit table of unique constraints that may surface as a field-attributed 422.
/// Constraints missing from the table are left untouched and end up as a 500.
#[derive(Clone, Debug, Default)]
pub struct DuplicateFieldMap {
    entries: Vec<(String, String)>,
}

impl DuplicateFieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, constraint: impl Into<String>, field: impl Into<String>) -> Self {
        self.entries.push((constraint.into(), field.into()));
        self
    }

    /// Map the single-field unique constraint declared on `field` to that field.
    pub fn with_unique_field(self, schema: &EntitySchema, field: &str) -> Self {
        match schema
            .unique
            .iter()
            .find(|u| u.fields.len() == 1 && u.fields[0] == field)
        {
            Some(u) => {
                let constraint = u.name.clone();
                self.with(constraint, field)
            }
            None => {
                tracing::warn!(entity = %schema.name, field, "no single-field unique constraint to map");
                self
            }
        }
    }

    pub fn field_for(&self, constraint: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == constraint)
            .map(|(_, f)| f.as_str())
    }

    /// Re-signal a mapped unique violation as `DuplicateValue`; everything else passes through.
    pub fn remap(&self, err: AppError) -> AppError {
        match err {
            AppError::Storage(StorageError::UniqueViolation { constraint }) => match self.field_for(&constraint) {
                Some(field) => AppError::DuplicateValue {
                    field: field.to_string(),
                },
                None => AppError::Storage(StorageError::UniqueViolation { constraint }),
            },
            other => other,
        }
    }
}

/// Attribute missing-row and foreign-key failures to the id the route is keyed on.
pub fn translate(err: AppError, entity: &str, id: &str) -> AppError {
    match err {
        AppError::Storage(StorageError::NotFound) => AppError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        },
        AppError::Storage(StorageError::ForeignKeyViolation { constraint }) => {
            tracing::debug!(%constraint, entity, id, "foreign key violation reported as not found");
            AppError::NotFound {
                entity: entity.to_string(),
                id: id.to_string(),
            }
        }
        other => other,
    }
}
