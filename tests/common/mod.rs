#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use schema_router::config::{EntitySchema, RelationSchema};
use schema_router::service::{ListQuery, Page, Record, RelationActions, SchemaActions};
use schema_router::{build_app, organizations, AppError, Backend, MemoryStore};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const ROLES: &str = "/organization-roles";
pub const SCOPES: &str = "/organization-scopes";

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
}

pub fn app() -> TestApp {
    app_with_token(None)
}

pub fn app_with_token(token: Option<&str>) -> TestApp {
    let store = MemoryStore::new();
    let registry = organizations::registry().unwrap();
    let router = build_app(&registry, Backend::Memory(store.clone()), token.map(str::to_string)).unwrap();
    TestApp { router, store }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    Reply { status, headers, body }
}

fn request(method: Method, uri: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn get(router: &Router, uri: &str) -> Reply {
    send(router, request(Method::GET, uri, None)).await
}

pub async fn post_json(router: &Router, uri: &str, body: Value) -> Reply {
    send(router, request(Method::POST, uri, Some(&body))).await
}

pub async fn patch_json(router: &Router, uri: &str, body: Value) -> Reply {
    send(router, request(Method::PATCH, uri, Some(&body))).await
}

pub async fn delete(router: &Router, uri: &str) -> Reply {
    send(router, request(Method::DELETE, uri, None)).await
}

/// Create an entity through the API and return its id.
pub async fn create(router: &Router, collection: &str, body: Value) -> String {
    let reply = post_json(router, collection, body).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["id"].as_str().unwrap().to_string()
}

pub fn names(body: &Value) -> Vec<String> {
    let mut names: Vec<String> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

/// Action set wrapper counting every storage call.
pub struct CountingActions {
    inner: Arc<dyn SchemaActions>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingActions {
    pub fn new(inner: Arc<dyn SchemaActions>) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SchemaActions for CountingActions {
    fn schema(&self) -> &Arc<EntitySchema> {
        self.inner.schema()
    }

    async fn get(&self, query: &ListQuery) -> Result<Page, AppError> {
        self.hit();
        self.inner.get(query).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Record, AppError> {
        self.hit();
        self.inner.get_by_id(id).await
    }

    async fn post(&self, data: Record) -> Result<Record, AppError> {
        self.hit();
        self.inner.post(data).await
    }

    async fn patch_by_id(&self, id: &str, data: Record) -> Result<Record, AppError> {
        self.hit();
        self.inner.patch_by_id(id, data).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), AppError> {
        self.hit();
        self.inner.delete_by_id(id).await
    }
}

/// Relation action wrapper counting every link-table call.
pub struct CountingRelation {
    inner: Arc<dyn RelationActions>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingRelation {
    pub fn new(inner: Arc<dyn RelationActions>) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl RelationActions for CountingRelation {
    fn relation(&self) -> &Arc<RelationSchema> {
        self.inner.relation()
    }

    async fn insert(&self, pairs: &[(String, String)]) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(pairs).await
    }

    async fn get_entries(&self, owner_id: &str) -> Result<Vec<Record>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_entries(owner_id).await
    }

    async fn delete(&self, owner_id: &str, target_id: &str) -> Result<bool, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(owner_id, target_id).await
    }
}
