//! Typed errors and HTTP mapping.

use crate::response::error_body;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Postgres SQLSTATE for unique_violation.
const PG_UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for foreign_key_violation.
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("invalid id field: entity {entity} field {field}")]
    InvalidIdField { entity: String, field: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// One failed check inside a guarded value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

/// All issues found while checking a value against a guard.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

impl ValidationError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![Issue {
                path: path.into(),
                message: message.into(),
            }],
        }
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(Issue {
            path: path.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .issues
            .iter()
            .map(|i| {
                if i.path.is_empty() {
                    i.message.clone()
                } else {
                    format!("{}: {}", i.path, i.message)
                }
            })
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Which part of the request a guard rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardTarget {
    Params,
    Query,
    Body,
}

impl fmt::Display for GuardTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GuardTarget::Params => "params",
            GuardTarget::Query => "query",
            GuardTarget::Body => "body",
        })
    }
}

/// Failures raised by a storage backend. Engine types never cross this boundary.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },
    #[error("row not found")]
    NotFound,
    #[error("database: {0}")]
    Db(sqlx::Error),
    #[error("storage: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                match db_err.code().as_deref() {
                    Some(PG_UNIQUE_VIOLATION) => StorageError::UniqueViolation { constraint },
                    Some(PG_FOREIGN_KEY_VIOLATION) => StorageError::ForeignKeyViolation { constraint },
                    _ => StorageError::Db(sqlx::Error::Database(db_err)),
                }
            }
            other => StorageError::Db(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid {target}: {source}")]
    Validation {
        target: GuardTarget,
        source: ValidationError,
        status: StatusCode,
    },
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
    #[error("duplicate value of unique field: {field}")]
    DuplicateValue { field: String },
    #[error("response does not match its guard: {0}")]
    InvalidResponse(ValidationError),
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.into())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { status, .. } => *status,
            AppError::NotFound { .. } | AppError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DuplicateValue { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Config(_) | AppError::InvalidResponse(_) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config.invalid",
            AppError::Validation { .. } => "guard.invalid_input",
            AppError::NotFound { .. } | AppError::Storage(StorageError::NotFound) => "entity.not_found",
            AppError::DuplicateValue { .. } => "entity.duplicate_value_of_unique_field",
            AppError::InvalidResponse(_) => "guard.invalid_response",
            AppError::Unauthorized => "auth.unauthorized",
            AppError::Storage(_) => "entity.storage_failure",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, field, details) = match &self {
            AppError::Validation { source, .. } => (
                self.to_string(),
                None,
                serde_json::to_value(&source.issues).ok(),
            ),
            AppError::DuplicateValue { field } => (self.to_string(), Some(field.as_str()), None),
            AppError::NotFound { .. } | AppError::Unauthorized => (self.to_string(), None, None),
            AppError::Storage(StorageError::NotFound) => ("entity not found".to_string(), None, None),
            AppError::Config(_) | AppError::InvalidResponse(_) | AppError::Storage(_) => {
                tracing::error!(error = %self, code, "internal error");
                ("an internal error occurred".to_string(), None, None)
            }
        };
        (status, Json(error_body(code, message, field, details))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_value_is_unprocessable() {
        let err = AppError::DuplicateValue { field: "name".into() };
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "entity.duplicate_value_of_unique_field");
    }

    #[test]
    fn unmapped_unique_violation_stays_a_server_error() {
        let err = AppError::from(StorageError::UniqueViolation {
            constraint: "organization_roles__slug".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "entity.storage_failure");
    }

    #[test]
    fn row_not_found_maps_to_storage_not_found() {
        let err = StorageError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::NotFound));
    }

    #[test]
    fn validation_error_lists_every_issue() {
        let mut err = ValidationError::single("name", "is required");
        err.push("description", "must be a string");
        assert_eq!(err.to_string(), "name: is required; description: must be a string");
    }
}
