// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Memory Keeper web server.

use memory_keeper::{
    config::Config,
    services::{Backend, MemoryBackend, SupabaseClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        production = config.production,
        offline = config.offline,
        "Starting Memory Keeper"
    );

    let state = if config.offline {
        tracing::warn!("OFFLINE_MODE set, using in-memory auth and database");
        AppState::offline(config.clone(), Arc::new(MemoryBackend::new()))
    } else {
        tracing::info!(url = %config.supabase_url, "Using hosted auth provider");
        if config.supabase_jwt_secret.is_none() {
            tracing::info!("SUPABASE_JWT_SECRET not set, access tokens are checked with the provider");
        }
        let backend: Arc<dyn Backend> = Arc::new(SupabaseClient::new(
            &config.supabase_url,
            &config.supabase_anon_key,
        ));
        AppState::new(config.clone(), backend)
    };

    // Build router
    let app = memory_keeper::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("memory_keeper=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
