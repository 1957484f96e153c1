// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::Validate;

use crate::error::AppError;
use crate::models::UserId;

const MAX_TYPE_LEN: u64 = 100;
const MAX_TEXT_LEN: usize = 10_000;
const MAX_DURATION_MINUTES: i64 = 10_000;
const MAX_CALORIES: i64 = 100_000;

/// Workout identifier.
///
/// The file store hands out sequential numbers; Firestore documents get a
/// random key. Both serialize as the bare value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkoutId {
    Seq(u64),
    Key(String),
}

impl fmt::Display for WorkoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkoutId::Seq(n) => write!(f, "{}", n),
            WorkoutId::Key(k) => f.write_str(k),
        }
    }
}

/// Stored workout record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: WorkoutId,
    /// Owner (auth provider user id)
    pub user_id: UserId,
    /// Free-text workout type ("run", "yoga", ...)
    #[serde(rename = "type")]
    pub workout_type: String,
    /// Duration in minutes (always positive)
    pub duration: u32,
    pub calories: u32,
    pub notes: Option<String>,
    pub ai_analysis: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Workout {
    /// Build a record from validated input.
    pub fn new(id: WorkoutId, input: NewWorkout, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: input.user_id,
            workout_type: input.workout_type,
            duration: input.duration,
            calories: input.calories,
            notes: input.notes,
            ai_analysis: input.ai_analysis,
            created_at: now,
            updated_at: None,
        }
    }

    /// Merge the provided fields over this record and stamp `updated_at`.
    pub fn apply(&mut self, patch: &WorkoutPatch, now: DateTime<Utc>) {
        if let Some(workout_type) = &patch.workout_type {
            self.workout_type = workout_type.clone();
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(calories) = patch.calories {
            self.calories = calories;
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(ai_analysis) = &patch.ai_analysis {
            self.ai_analysis = ai_analysis.clone();
        }
        self.updated_at = Some(now);
    }
}

/// Validated input for a new workout.
#[derive(Debug, Clone)]
pub struct NewWorkout {
    pub user_id: UserId,
    pub workout_type: String,
    pub duration: u32,
    pub calories: u32,
    pub notes: Option<String>,
    pub ai_analysis: Option<String>,
}

/// Validated partial update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct WorkoutPatch {
    pub workout_type: Option<String>,
    pub duration: Option<u32>,
    pub calories: Option<u32>,
    pub notes: Option<Option<String>>,
    pub ai_analysis: Option<Option<String>>,
}

// ─── Request Bodies ──────────────────────────────────────────

/// `POST /api/workouts` body.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkoutRequest {
    pub user_id: UserId,
    #[serde(rename = "type", default)]
    #[validate(length(max = MAX_TYPE_LEN))]
    pub workout_type: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = MAX_DURATION_MINUTES))]
    pub duration: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_CALORIES))]
    pub calories: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub ai_analysis: Option<String>,
}

impl CreateWorkoutRequest {
    /// Validate and convert into a [`NewWorkout`].
    pub fn into_new_workout(self) -> Result<NewWorkout, AppError> {
        let workout_type = self
            .workout_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let (Some(workout_type), Some(duration), Some(calories)) =
            (workout_type, self.duration, self.calories)
        else {
            return Err(AppError::Validation(
                "Missing required fields: type, duration, calories".to_string(),
            ));
        };

        self.validate()?;
        check_text_len("notes", self.notes.as_deref())?;
        check_text_len("ai_analysis", self.ai_analysis.as_deref())?;

        Ok(NewWorkout {
            user_id: self.user_id,
            workout_type,
            duration: to_u32("duration", duration)?,
            calories: to_u32("calories", calories)?,
            notes: self.notes,
            ai_analysis: self.ai_analysis,
        })
    }
}

/// `PUT /api/workouts/{id}` body: owner plus any subset of fields.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateWorkoutRequest {
    pub user_id: UserId,
    #[serde(rename = "type", default)]
    #[validate(length(min = 1, max = MAX_TYPE_LEN))]
    pub workout_type: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = MAX_DURATION_MINUTES))]
    pub duration: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_CALORIES))]
    pub calories: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub ai_analysis: Option<Option<String>>,
}

impl UpdateWorkoutRequest {
    /// Validate and split into owner and patch.
    pub fn into_parts(self) -> Result<(UserId, WorkoutPatch), AppError> {
        self.validate()?;
        check_text_len("notes", self.notes.as_ref().and_then(|n| n.as_deref()))?;
        check_text_len(
            "ai_analysis",
            self.ai_analysis.as_ref().and_then(|a| a.as_deref()),
        )?;

        let workout_type = match self.workout_type {
            Some(t) if t.trim().is_empty() => {
                return Err(AppError::Validation("Type must not be blank".to_string()))
            }
            other => other.map(|t| t.trim().to_string()),
        };

        let patch = WorkoutPatch {
            workout_type,
            duration: self.duration.map(|d| to_u32("duration", d)).transpose()?,
            calories: self.calories.map(|c| to_u32("calories", c)).transpose()?,
            notes: self.notes,
            ai_analysis: self.ai_analysis,
        };

        Ok((self.user_id, patch))
    }
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn check_text_len(field: &str, value: Option<&str>) -> Result<(), AppError> {
    match value {
        Some(text) if text.chars().count() > MAX_TEXT_LEN => Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, MAX_TEXT_LEN
        ))),
        _ => Ok(()),
    }
}

fn to_u32(field: &str, value: i64) -> Result<u32, AppError> {
    u32::try_from(value).map_err(|_| AppError::Validation(format!("{} is out of range", field)))
}

// ─── Summary ─────────────────────────────────────────────────

/// Per-user totals for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkoutSummary {
    pub total_workouts: usize,
    pub total_duration: u64,
    pub total_calories: u64,
    /// Workout count per (lower-cased) type
    pub by_type: BTreeMap<String, u32>,
    pub last_workout_at: Option<DateTime<Utc>>,
}

impl WorkoutSummary {
    pub fn from_workouts(workouts: &[Workout]) -> Self {
        let mut summary = Self::default();

        for workout in workouts {
            summary.total_workouts += 1;
            summary.total_duration += u64::from(workout.duration);
            summary.total_calories += u64::from(workout.calories);
            *summary
                .by_type
                .entry(workout.workout_type.trim().to_lowercase())
                .or_insert(0) += 1;

            if summary
                .last_workout_at
                .is_none_or(|last| workout.created_at > last)
            {
                summary.last_workout_at = Some(workout.created_at);
            }
        }

        summary
    }
}
