// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notes analysis route.

use crate::error::{AppError, Result};
use crate::extract::ApiJson;
use crate::middleware::Caller;
use crate::models::UserId;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/ai-analysis", post(analyze_notes))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct AnalysisBody {
    #[validate(length(min = 1, max = 10000))]
    notes: String,
    #[serde(default)]
    user_id: Option<UserId>,
}

#[derive(Serialize)]
struct AnalysisResponse {
    analysis: String,
}

/// Forward notes to the analysis workflow.
///
/// Subscription gating is the client's job; this only checks that a named
/// user matches the caller.
async fn analyze_notes(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiJson(body): ApiJson<AnalysisBody>,
) -> Result<Json<AnalysisResponse>> {
    if body.notes.trim().is_empty() {
        return Err(AppError::Validation("Notes are required".to_string()));
    }
    body.validate()?;
    if let Some(user_id) = &body.user_id {
        caller.authorize(user_id)?;
    }

    let analysis = state.analysis.analyze(&body.notes).await?;
    tracing::info!(
        user_id = body.user_id.as_ref().map(UserId::as_str).unwrap_or("-"),
        chars = analysis.chars().count(),
        "Notes analysis completed"
    );

    Ok(Json(AnalysisResponse { analysis }))
}
