//! Server binary: reads settings from the environment and serves the resource routes.
//!
//! Run from repo root: `cargo run -p schema-router-server`

use schema_router::{build_app, connect, load_registry, with_layers, ServerSettings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("schema_router=info,tower_http=info")),
        )
        .init();

    let settings = ServerSettings::from_env()?;
    let registry = load_registry(&settings).await?;
    let backend = connect(&settings).await?;
    let app = with_layers(
        build_app(&registry, backend, settings.api_token.clone())?,
        settings.body_limit_bytes,
    );

    let listener = TcpListener::bind(settings.bind_addr()).await?;
    tracing::info!(
        "schema-router listening on http://{} (storage: {:?}, auth: {})",
        listener.local_addr()?,
        settings.storage,
        if settings.api_token.is_some() { "bearer" } else { "off" }
    );
    axum::serve(listener, app).await?;
    Ok(())
}
