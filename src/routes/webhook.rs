// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe webhook receiver.
//!
//! Events are an observability signal only: subscription status is always
//! re-derived from Stripe, so nothing here writes state.

use crate::error::AppError;
use crate::services::stripe_webhook;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Webhook routes (public; authenticated by signature).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", post(handle_event))
}

#[derive(Serialize)]
struct ReceivedResponse {
    received: bool,
}

/// Verify the signature over the raw body, then log the event.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ReceivedResponse>, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Signature("missing stripe-signature header".to_string()))?;

    let event = stripe_webhook::parse_event(
        &body,
        signature,
        &state.config.stripe_webhook_secret,
        chrono::Utc::now().timestamp(),
    )?;

    stripe_webhook::log_event(&event);
    Ok(Json(ReceivedResponse { received: true }))
}
