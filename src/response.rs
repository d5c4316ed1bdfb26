//! Response helpers shared by the generic and custom handlers.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

/// Header carrying the unpaginated row count of a list response.
pub const TOTAL_NUMBER_HEADER: HeaderName = HeaderName::from_static("total-number");

pub fn created(body: Value) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

pub fn ok(body: Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Array body plus `Total-Number` header.
pub fn paginated(body: Value, total: u64) -> Response {
    let mut response = (StatusCode::OK, Json(body)).into_response();
    response
        .headers_mut()
        .insert(TOTAL_NUMBER_HEADER, HeaderValue::from(total));
    response
}

pub fn error_body(code: &str, message: String, field: Option<&str>, details: Option<Value>) -> Value {
    let mut body = serde_json::json!({
        "code": code,
        "message": message,
    });
    if let Some(field) = field {
        body["field"] = Value::String(field.to_string());
    }
    if let Some(details) = details {
        body["details"] = details;
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_omits_absent_field() {
        let body = error_body("entity.not_found", "missing".into(), None, None);
        assert_eq!(body["code"], "entity.not_found");
        assert!(body.get("field").is_none());
        assert!(body.get("details").is_none());
    }

    #[test]
    fn paginated_sets_total_header() {
        let response = paginated(serde_json::json!([]), 7);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[TOTAL_NUMBER_HEADER], "7");
    }
}
