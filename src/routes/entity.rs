//! Mounts one entity as a REST resource: the standard verbs, custom routes and relation sub-routes.

use crate::error::{AppError, ConfigError};
use crate::handlers::entity::{self, ID_PARAM};
use crate::handlers::relation::{self, RelationGuards};
use crate::handlers::StandardGuards;
use crate::service::{RelationActions, SchemaActions};
use crate::state::{RelationMount, RelationState, ResourceState};
use axum::routing::{get, MethodRouter};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;

/// Standard verbs switched off for one mount. Everything is enabled by default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisabledRoutes {
    pub get: bool,
    pub get_by_id: bool,
    pub post: bool,
    pub patch_by_id: bool,
    pub delete_by_id: bool,
}

/// Builder for an entity's router, nested under `/<path_segment>`.
///
/// ```ignore
/// let router = SchemaRouter::new(actions, DisabledRoutes { post: true, ..Default::default() })
///     .route("/", post(create_with_links))
///     .relation(links)
///     .into_router()?;
/// ```
pub struct SchemaRouter {
    actions: Arc<dyn SchemaActions>,
    disabled: DisabledRoutes,
    relations: Vec<Arc<dyn RelationActions>>,
    custom: Router<ResourceState>,
}

impl SchemaRouter {
    pub fn new(actions: Arc<dyn SchemaActions>, disabled: DisabledRoutes) -> Self {
        Self {
            actions,
            disabled,
            relations: Vec::new(),
            custom: Router::new(),
        }
    }

    /// Expose `/:id/<relation>` for a relation owned by this entity.
    pub fn relation(mut self, actions: Arc<dyn RelationActions>) -> Self {
        self.relations.push(actions);
        self
    }

    /// Add a handler next to the standard verbs, typically replacing a disabled one.
    pub fn route(mut self, path: &str, method_router: MethodRouter<ResourceState>) -> Self {
        self.custom = self.custom.route(path, method_router);
        self
    }

    pub fn into_router(self) -> Result<Router, AppError> {
        let schema = self.actions.schema().clone();

        let mut mounts: HashMap<String, Arc<RelationMount>> = HashMap::new();
        let mut relation_routers: Vec<Router> = Vec::with_capacity(self.relations.len());
        for actions in self.relations {
            let rel = actions.relation().clone();
            if rel.owner.name != schema.name {
                return Err(ConfigError::MissingReference {
                    kind: "relation owner",
                    id: format!("{}/{}", schema.name, rel.name),
                }
                .into());
            }
            if mounts.contains_key(&rel.name) {
                return Err(ConfigError::Duplicate {
                    kind: "relation",
                    name: rel.name.clone(),
                }
                .into());
            }
            let mount = Arc::new(RelationMount::new(actions));
            mounts.insert(rel.name.clone(), mount.clone());
            let state = RelationState {
                parent: self.actions.clone(),
                mount,
                guards: Arc::new(RelationGuards::for_relation(&rel)),
            };
            relation_routers.push(
                Router::new()
                    .route(
                        &format!("/:{}/{}", ID_PARAM, rel.name),
                        get(relation::list_entries).post(relation::insert_entries),
                    )
                    .route(
                        &format!("/:{}/{}/:{}", ID_PARAM, rel.name, rel.target_param),
                        axum::routing::delete(relation::delete_entry),
                    )
                    .with_state(state),
            );
        }

        let state = ResourceState {
            guards: Arc::new(StandardGuards::for_schema(&schema)),
            actions: self.actions,
            relations: Arc::new(mounts),
        };

        let d = self.disabled;
        let mut router = self.custom;
        let mut collection: Option<MethodRouter<ResourceState>> = None;
        if !d.get {
            collection = Some(get(entity::list));
        }
        if !d.post {
            collection = Some(match collection {
                Some(m) => m.post(entity::create),
                None => axum::routing::post(entity::create),
            });
        }
        if let Some(m) = collection {
            router = router.route("/", m);
        }

        let mut item: Option<MethodRouter<ResourceState>> = None;
        if !d.get_by_id {
            item = Some(get(entity::read));
        }
        if !d.patch_by_id {
            item = Some(match item {
                Some(m) => m.patch(entity::update),
                None => axum::routing::patch(entity::update),
            });
        }
        if !d.delete_by_id {
            item = Some(match item {
                Some(m) => m.delete(entity::delete),
                None => axum::routing::delete(entity::delete),
            });
        }
        if let Some(m) = item {
            router = router.route(&format!("/:{}", ID_PARAM), m);
        }

        let mut router: Router = router.with_state(state);
        for r in relation_routers {
            router = router.merge(r);
        }
        tracing::info!(entity = %schema.name, path = %schema.path_segment, disabled = ?d, "resource mounted");
        Ok(Router::new().nest(&format!("/{}", schema.path_segment), router))
    }
}
