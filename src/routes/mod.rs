//! Router assembly: public common routes plus token-gated resource routes.

pub mod common;
pub mod entity;

pub use common::common_routes;
pub use entity::{DisabledRoutes, SchemaRouter};

use crate::error::AppError;
use crate::extractors::BearerToken;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::sync::Arc;

async fn require_token(
    State(expected): State<Arc<str>>,
    BearerToken(token): BearerToken,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match token {
        Some(token) if *token == *expected => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}

/// Gate every matched route of `router` behind `Authorization: Bearer <token>` when a token is set.
pub fn protect(router: Router, token: Option<String>) -> Router {
    match token {
        Some(token) => router.route_layer(middleware::from_fn_with_state(Arc::<str>::from(token), require_token)),
        None => router,
    }
}
