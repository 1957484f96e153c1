// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! fitlog: workout logging with a paid analysis tier
//!
//! This crate provides the backend API: per-user workout storage, Stripe
//! subscription management and a relay to an external notes-analysis
//! workflow.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Database;
use error::AppError;
use services::{AnalysisRelay, BillingProvider, CheckoutLocks, SubscriptionGateway};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub subscriptions: SubscriptionGateway,
    pub analysis: AnalysisRelay,
}

impl AppState {
    /// Wire services around an open database and a billing provider.
    pub fn new(
        config: Config,
        db: Database,
        billing: Arc<dyn BillingProvider>,
    ) -> Result<Self, AppError> {
        let checkout_locks: CheckoutLocks = Arc::new(dashmap::DashMap::new());

        let subscriptions = SubscriptionGateway::new(
            billing,
            db.clone(),
            checkout_locks,
            config.checkout_success_url(),
            config.checkout_cancel_url(),
        );

        let analysis = AnalysisRelay::new(
            config.analysis_webhook_url.clone(),
            config.analysis_timeout,
        )?;

        Ok(Self {
            config,
            db,
            subscriptions,
            analysis,
        })
    }
}
