// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! airtrack API server
//!
//! Records routes from device GPS fixes and beacon sightings, and serves
//! station measurements and pollution heat maps from Firestore.

use airtrack::{
    config::Config,
    db::FirestoreDb,
    services::{BeaconRegistry, BeaconTracking},
    time_utils::SystemClock,
    AppState,
};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting airtrack API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .context("Failed to connect to Firestore")?;

    let mut state = AppState::new(config.clone(), Arc::new(db), Arc::new(SystemClock));

    // Load known beacon locations
    if let Some(path) = &config.beacon_registry_path {
        tracing::info!(path = %path, "Loading beacon registry");
        let registry = BeaconRegistry::load_from_file(path)
            .with_context(|| format!("Failed to load beacon registry from {}", path))?;
        tracing::info!(count = registry.len(), "Beacon registry loaded");

        state = state.with_beacon_tracking(BeaconTracking {
            registry: Arc::new(registry),
            region: config.beacon_region.clone(),
            max_distance_m: config.beacon_max_distance_m,
        });
    } else {
        tracing::info!("No beacon registry configured; beacon tracking off");
    }

    // Build router
    let app = airtrack::routes::create_router(Arc::new(state));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("airtrack=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
