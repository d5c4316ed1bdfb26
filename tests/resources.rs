mod common;

use axum::http::StatusCode;
use common::*;
use schema_router::response::TOTAL_NUMBER_HEADER;
use serde_json::json;

#[tokio::test]
async fn create_returns_submitted_and_server_fields() {
    let app = app();
    let reply = post_json(&app.router, SCOPES, json!({ "name": "read", "description": "Read access" })).await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let body = reply.body.as_object().unwrap();
    let mut keys: Vec<&str> = body.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["createdAt", "description", "id", "name"]);
    assert_eq!(body["name"], "read");
    assert_eq!(body["description"], "Read access");
    assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(body["createdAt"].is_i64());
}

#[tokio::test]
async fn server_assigned_fields_in_payload_are_ignored() {
    let app = app();
    let reply = post_json(&app.router, SCOPES, json!({ "id": "mine", "name": "read", "createdAt": 1 })).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_ne!(reply.body["id"], "mine");
    assert_ne!(reply.body["createdAt"], 1);
}

#[tokio::test]
async fn missing_required_field_is_422() {
    let app = app();
    let reply = post_json(&app.router, SCOPES, json!({ "description": "no name" })).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["code"], "guard.invalid_input");
    assert_eq!(reply.body["details"][0]["path"], "name");

    let list = get(&app.router, SCOPES).await;
    assert_eq!(list.body, json!([]));
}

#[tokio::test]
async fn malformed_json_is_422() {
    let app = app();
    let reply = send(
        &app.router,
        axum::http::Request::post(SCOPES)
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{ \"name\": "))
            .unwrap(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn duplicate_name_is_field_attributed_422() {
    let app = app();
    let first = post_json(&app.router, SCOPES, json!({ "name": "read" })).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = post_json(&app.router, SCOPES, json!({ "name": "read" })).await;
    assert_eq!(second.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(second.body["code"], "entity.duplicate_value_of_unique_field");
    assert_eq!(second.body["field"], "name");
}

#[tokio::test]
async fn duplicate_name_on_patch_is_field_attributed_422() {
    let app = app();
    create(&app.router, SCOPES, json!({ "name": "read" })).await;
    let id = create(&app.router, SCOPES, json!({ "name": "write" })).await;

    let reply = patch_json(&app.router, &format!("{}/{}", SCOPES, id), json!({ "name": "read" })).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["field"], "name");
}

#[tokio::test]
async fn get_by_id_round_trips_create_response() {
    let app = app();
    let created = post_json(&app.router, SCOPES, json!({ "name": "read" })).await;
    let id = created.body["id"].as_str().unwrap();

    let fetched = get(&app.router, &format!("{}/{}", SCOPES, id)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, created.body);
}

#[tokio::test]
async fn unknown_id_is_404() {
    let app = app();
    let path = format!("{}/missing", SCOPES);

    let read = get(&app.router, &path).await;
    assert_eq!(read.status, StatusCode::NOT_FOUND);
    assert_eq!(read.body["code"], "entity.not_found");

    assert_eq!(patch_json(&app.router, &path, json!({ "name": "x" })).await.status, StatusCode::NOT_FOUND);
    assert_eq!(delete(&app.router, &path).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_updates_only_given_fields() {
    let app = app();
    let id = create(&app.router, SCOPES, json!({ "name": "read", "description": "before" })).await;
    let path = format!("{}/{}", SCOPES, id);

    let reply = patch_json(&app.router, &path, json!({ "description": "after" })).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["name"], "read");
    assert_eq!(reply.body["description"], "after");

    let cleared = patch_json(&app.router, &path, json!({ "description": null })).await;
    assert_eq!(cleared.body["description"], serde_json::Value::Null);

    let invalid = patch_json(&app.router, &path, json!({ "name": null })).await;
    assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn delete_removes_entity() {
    let app = app();
    let id = create(&app.router, SCOPES, json!({ "name": "read" })).await;
    let path = format!("{}/{}", SCOPES, id);

    let reply = delete(&app.router, &path).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert_eq!(get(&app.router, &path).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_paginates_and_reports_total() {
    let app = app();
    for name in ["a", "b", "c", "d", "e"] {
        create(&app.router, SCOPES, json!({ "name": name })).await;
    }

    let page = get(&app.router, &format!("{}?page=2&page_size=2", SCOPES)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body.as_array().unwrap().len(), 2);
    assert_eq!(page.headers[TOTAL_NUMBER_HEADER], "5");

    let last = get(&app.router, &format!("{}?page=3&page_size=2", SCOPES)).await;
    assert_eq!(last.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_filters_and_searches() {
    let app = app();
    create(&app.router, SCOPES, json!({ "name": "read:users", "description": "Read users" })).await;
    create(&app.router, SCOPES, json!({ "name": "write:users" })).await;
    create(&app.router, SCOPES, json!({ "name": "billing", "description": "Manage USERS billing" })).await;

    let searched = get(&app.router, &format!("{}?q=users", SCOPES)).await;
    assert_eq!(names(&searched.body), vec!["billing", "read:users", "write:users"]);

    let filtered = get(&app.router, &format!("{}?name=billing", SCOPES)).await;
    assert_eq!(names(&filtered.body), vec!["billing"]);
    assert_eq!(filtered.headers[TOTAL_NUMBER_HEADER], "1");
}

#[tokio::test]
async fn invalid_list_query_is_rejected() {
    let app = app();
    assert_eq!(
        get(&app.router, &format!("{}?page_size=500", SCOPES)).await.status,
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        get(&app.router, &format!("{}?page=zero", SCOPES)).await.status,
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn page_beyond_storage_range_is_rejected() {
    let app = app();
    create(&app.router, ROLES, json!({ "name": "admin" })).await;

    let reply = get(&app.router, &format!("{}?page=9223372036854775807&page_size=100", ROLES)).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["details"][0]["path"], "page");

    let far = get(&app.router, &format!("{}?page=1000000&page_size=100", ROLES)).await;
    assert_eq!(far.status, StatusCode::OK);
    assert_eq!(far.body, json!([]));
    assert_eq!(far.headers[TOTAL_NUMBER_HEADER], "1");
}

#[tokio::test]
async fn search_treats_wildcards_literally() {
    let app = app();
    create(&app.router, SCOPES, json!({ "name": "discount_100%" })).await;
    create(&app.router, SCOPES, json!({ "name": "discount-100" })).await;

    let percent = get(&app.router, &format!("{}?q=%25", SCOPES)).await;
    assert_eq!(names(&percent.body), vec!["discount_100%"]);
    let underscore = get(&app.router, &format!("{}?q=t_1", SCOPES)).await;
    assert_eq!(names(&underscore.body), vec!["discount_100%"]);
}
