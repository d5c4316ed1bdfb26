//! Guards, action-set traits and error translation shared by every mounted resource.

mod actions;
mod guard;
mod translate;
pub mod validation;

pub use actions::*;
pub use guard::{FieldGuard, ObjectGuard, ResponseGuard, RouteGuard};
pub use translate::{translate, DuplicateFieldMap};

/// A validated JSON object: the typed view handed to handlers and returned by action sets.
pub type Record = serde_json::Map<String, serde_json::Value>;
