//! HTTP handlers for the standard resource verbs and relation sub-routes.

pub mod entity;
pub mod relation;

pub use entity::StandardGuards;
pub use relation::RelationGuards;
