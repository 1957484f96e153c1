// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! fitlog API Server
//!
//! Stores workouts, brokers Stripe subscriptions and relays workout notes
//! to the analysis workflow.

use fitlog::{config::Config, db::Database, services::StripeClient, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment; a missing secret is fatal
    let config = Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        e
    })?;
    tracing::info!(port = config.port, "Starting fitlog API");

    // Open the workout store
    let db = Database::connect(&config.store).await?;

    // Stripe client
    let stripe = StripeClient::new(
        config.stripe_secret_key.clone(),
        config.stripe_api_base.clone(),
    )?;
    tracing::info!(api_base = %config.stripe_api_base, "Stripe client initialized");

    if config.auth_jwt_secret.is_none() {
        tracing::warn!("AUTH_JWT_SECRET not set: user ids in requests are trusted");
    }

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, Arc::new(stripe))?);

    // Build router
    let app = fitlog::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fitlog=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
