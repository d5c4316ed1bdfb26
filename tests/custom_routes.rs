mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use schema_router::routes::{DisabledRoutes, SchemaRouter};
use schema_router::{organizations, Backend, MemoryStore};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn role_create_links_initial_scopes() {
    let app = app();
    let a = create(&app.router, SCOPES, json!({ "name": "read" })).await;
    let b = create(&app.router, SCOPES, json!({ "name": "write" })).await;

    let reply = post_json(&app.router, ROLES, json!({ "name": "admin", "scopeIds": [a, b] })).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert!(reply.body.get("scopeIds").is_none());
    let role = reply.body["id"].as_str().unwrap();

    let scopes = get(&app.router, &format!("{}/{}/scopes", ROLES, role)).await;
    assert_eq!(names(&scopes.body), vec!["read", "write"]);
}

#[tokio::test]
async fn role_create_keeps_the_status_contract() {
    let app = app();

    let plain = post_json(&app.router, ROLES, json!({ "name": "viewer" })).await;
    assert_eq!(plain.status, StatusCode::CREATED);
    let fetched = get(&app.router, &format!("{}/{}", ROLES, plain.body["id"].as_str().unwrap())).await;
    assert_eq!(fetched.body, plain.body);

    let missing = post_json(&app.router, ROLES, json!({ "scopeIds": [] })).await;
    assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(missing.body["code"], "guard.invalid_input");

    let bad_ids = post_json(&app.router, ROLES, json!({ "name": "x", "scopeIds": [1] })).await;
    assert_eq!(bad_ids.status, StatusCode::UNPROCESSABLE_ENTITY);

    let duplicate = post_json(&app.router, ROLES, json!({ "name": "viewer" })).await;
    assert_eq!(duplicate.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(duplicate.body["code"], "entity.duplicate_value_of_unique_field");
    assert_eq!(duplicate.body["field"], "name");

    let unknown_scope = post_json(&app.router, ROLES, json!({ "name": "editor", "scopeIds": ["nope"] })).await;
    assert_eq!(unknown_scope.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(unknown_scope.body["details"][0]["path"], "scopeIds.0");
    assert_eq!(names(&get(&app.router, ROLES).await.body), vec!["viewer"]);
}

#[tokio::test]
async fn rejected_role_create_stores_nothing() {
    let app = app();
    let scope = create(&app.router, SCOPES, json!({ "name": "read" })).await;

    let repeated = post_json(&app.router, ROLES, json!({ "name": "admin", "scopeIds": [scope, scope] })).await;
    assert_eq!(repeated.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(repeated.body["details"][0]["path"], "scopeIds.1");
    assert_eq!(get(&app.router, ROLES).await.body, json!([]));
    assert_eq!(app.store.link_count("organization_role_scope_relations").unwrap(), 0);

    let retry = post_json(&app.router, ROLES, json!({ "name": "admin", "scopeIds": [scope] })).await;
    assert_eq!(retry.status, StatusCode::CREATED);
    let role = retry.body["id"].as_str().unwrap();
    let scopes = get(&app.router, &format!("{}/{}/scopes", ROLES, role)).await;
    assert_eq!(names(&scopes.body), vec!["read"]);
}

#[tokio::test]
async fn other_role_verbs_are_standard() {
    let app = app();
    let id = create(&app.router, ROLES, json!({ "name": "admin" })).await;
    let path = format!("{}/{}", ROLES, id);

    let list = get(&app.router, ROLES).await;
    assert_eq!(names(&list.body), vec!["admin"]);
    let patched = patch_json(&app.router, &path, json!({ "description": "All access" })).await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["description"], "All access");
    assert_eq!(delete(&app.router, &path).await.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn disabled_verb_is_method_not_allowed_and_never_reaches_storage() {
    let store = MemoryStore::new();
    let backend = Backend::Memory(store);
    let registry = organizations::registry().unwrap();
    let actions = Arc::new(CountingActions::new(
        backend.entity(registry.entity(organizations::SCOPES).unwrap()),
    ));
    let calls = actions.calls.clone();
    let router = SchemaRouter::new(
        actions,
        DisabledRoutes {
            post: true,
            delete_by_id: true,
            ..Default::default()
        },
    )
    .into_router()
    .unwrap();

    let post = post_json(&router, SCOPES, json!({ "name": "read" })).await;
    assert_eq!(post.status, StatusCode::METHOD_NOT_ALLOWED);
    let removed = delete(&router, &format!("{}/x", SCOPES)).await;
    assert_eq!(removed.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(get(&router, SCOPES).await.status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_body_never_reaches_storage() {
    let backend = Backend::Memory(MemoryStore::new());
    let registry = organizations::registry().unwrap();
    let actions = Arc::new(CountingActions::new(
        backend.entity(registry.entity(organizations::SCOPES).unwrap()),
    ));
    let calls = actions.calls.clone();
    let router = SchemaRouter::new(actions, DisabledRoutes::default())
        .into_router()
        .unwrap();

    let reply = post_json(&router, SCOPES, json!({ "description": "no name" })).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    let reply = patch_json(&router, &format!("{}/x", SCOPES), json!({ "name": 5 })).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn token_gate_protects_resources_only() {
    let app = app_with_token(Some("s3cret"));

    let health = get(&app.router, "/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");
    assert_eq!(get(&app.router, "/ready").await.status, StatusCode::OK);

    let anonymous = get(&app.router, SCOPES).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["code"], "auth.unauthorized");

    let wrong = send(
        &app.router,
        Request::get(SCOPES)
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let authed = send(
        &app.router,
        Request::get(SCOPES)
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(authed.status, StatusCode::OK);
}

#[tokio::test]
async fn version_reports_package() {
    let app = app();
    let reply = get(&app.router, "/version").await;
    assert_eq!(reply.body["name"], "schema-router");
}
