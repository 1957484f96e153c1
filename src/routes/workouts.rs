// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout CRUD routes.
//!
//! Every operation names its owner: in the path for reads, in the body for
//! create/update and in the query for delete.

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::Caller;
use crate::models::workout::{CreateWorkoutRequest, UpdateWorkoutRequest};
use crate::models::{UserId, Workout, WorkoutSummary};
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Workout routes (auth middleware applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/workouts", post(create_workout))
        // GET takes the owner's user id; PUT and DELETE take a workout id
        .route(
            "/api/workouts/{id}",
            get(list_workouts).put(update_workout).delete(delete_workout),
        )
        .route("/api/workouts/{id}/summary", get(workout_summary))
}

/// List the owner's workouts, newest first.
async fn list_workouts(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(user_id): ApiPath<String>,
) -> Result<Json<Vec<Workout>>> {
    let user_id = UserId::parse(&user_id)?;
    caller.authorize(&user_id)?;

    let workouts = state.db.list_workouts(&user_id).await?;
    tracing::debug!(user_id = %user_id, count = workouts.len(), "Listed workouts");
    Ok(Json(workouts))
}

async fn workout_summary(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(user_id): ApiPath<String>,
) -> Result<Json<WorkoutSummary>> {
    let user_id = UserId::parse(&user_id)?;
    caller.authorize(&user_id)?;

    let workouts = state.db.list_workouts(&user_id).await?;
    Ok(Json(WorkoutSummary::from_workouts(&workouts)))
}

async fn create_workout(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiJson(body): ApiJson<CreateWorkoutRequest>,
) -> Result<(StatusCode, Json<Workout>)> {
    let input = body.into_new_workout()?;
    caller.authorize(&input.user_id)?;

    let workout = state.db.create_workout(input).await?;
    tracing::info!(
        workout_id = %workout.id,
        user_id = %workout.user_id,
        "Workout created"
    );
    Ok((StatusCode::CREATED, Json(workout)))
}

async fn update_workout(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<UpdateWorkoutRequest>,
) -> Result<Json<Workout>> {
    let (user_id, patch) = body.into_parts()?;
    caller.authorize(&user_id)?;

    let workout = state.db.update_workout(&id, &user_id, &patch).await?;
    tracing::info!(workout_id = %id, user_id = %user_id, "Workout updated");
    Ok(Json(workout))
}

#[derive(Deserialize)]
struct DeleteQuery {
    user_id: Option<String>,
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
}

async fn delete_workout(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<String>,
    ApiQuery(query): ApiQuery<DeleteQuery>,
) -> Result<Json<DeleteResponse>> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::Validation("user_id query parameter is required".to_string()))?;
    let user_id = UserId::parse(&user_id)?;
    caller.authorize(&user_id)?;

    state.db.delete_workout(&id, &user_id).await?;
    tracing::info!(workout_id = %id, user_id = %user_id, "Workout deleted");
    Ok(Json(DeleteResponse { success: true }))
}
