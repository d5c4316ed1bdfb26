//! Process settings read from the environment (after `.env` is loaded).

use crate::error::ConfigError;
use std::path::PathBuf;

pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Postgres,
}

#[derive(Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub storage: StorageKind,
    pub database_url: Option<String>,
    /// Directory of `*.json` schema files; the built-in organization schemas when unset.
    pub schema_dir: Option<PathBuf>,
    /// Bearer token required on resource routes when set.
    pub api_token: Option<String>,
    pub body_limit_bytes: usize,
}

impl ServerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| ConfigError::Validation(format!("PORT must be a port number, got '{}'", p)))?,
            None => 3000,
        };
        let database_url = get("DATABASE_URL");
        let storage = match get("STORAGE").as_deref() {
            Some("memory") => StorageKind::Memory,
            Some("postgres") => StorageKind::Postgres,
            Some(other) => {
                return Err(ConfigError::Validation(format!(
                    "STORAGE must be 'memory' or 'postgres', got '{}'",
                    other
                )))
            }
            None if database_url.is_some() => StorageKind::Postgres,
            None => StorageKind::Memory,
        };
        if storage == StorageKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Validation("STORAGE=postgres requires DATABASE_URL".into()));
        }
        let body_limit_bytes = match get("BODY_LIMIT_BYTES") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Validation(format!("BODY_LIMIT_BYTES must be a byte count, got '{}'", v)))?,
            None => DEFAULT_BODY_LIMIT_BYTES,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".into()),
            port,
            storage,
            database_url,
            schema_dir: get("SCHEMA_DIR").map(PathBuf::from),
            api_token: get("API_TOKEN"),
            body_limit_bytes,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
