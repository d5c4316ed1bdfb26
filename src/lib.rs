//! Schema router: schema-driven REST resources with guarded CRUD verbs and relation sub-routes.

pub mod app;
pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod organizations;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use app::{build_app, connect, load_registry, resource_routes, with_layers};
pub use config::{load_from_dir, parse, resolve, EntitySchema, FullConfig, RelationSchema, SchemaRegistry};
pub use error::{AppError, ConfigError, StorageError, ValidationError};
pub use routes::{common_routes, protect, DisabledRoutes, SchemaRouter};
pub use service::{
    DuplicateFieldMap, ListQuery, ObjectGuard, Page, Record, RelationActions, RouteGuard, SchemaActions,
    UniqueFieldActions,
};
pub use settings::{ServerSettings, StorageKind};
pub use store::{Backend, MemoryStore};
