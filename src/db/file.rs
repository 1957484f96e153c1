// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON-file store for single-instance deployments.
//!
//! The whole document is held in memory and rewritten after every mutation.
//! Mutations inside one process are serialized by a mutex; separate
//! processes sharing the same file are NOT coordinated and the last writer
//! wins. Use Firestore for anything multi-instance.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::models::{
    BillingCustomerMapping, NewWorkout, UserId, Workout, WorkoutId, WorkoutPatch,
};

/// On-disk document layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    #[serde(default)]
    workouts: Vec<Workout>,
    #[serde(default = "first_workout_id")]
    next_workout_id: u64,
    #[serde(default)]
    billing_customers: BTreeMap<String, BillingCustomerMapping>,
}

fn first_workout_id() -> u64 {
    1
}

impl Default for FileData {
    fn default() -> Self {
        Self {
            workouts: Vec::new(),
            next_workout_id: first_workout_id(),
            billing_customers: BTreeMap::new(),
        }
    }
}

/// File-backed database.
#[derive(Clone)]
pub struct FileDb {
    path: PathBuf,
    data: Arc<Mutex<FileData>>,
}

impl FileDb {
    /// Open (or lazily create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => FileData::default(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::Database(format!("Corrupt store file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileData::default(),
            Err(e) => {
                return Err(AppError::Database(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::info!(
            path = %path.display(),
            workouts = data.workouts.len(),
            next_workout_id = data.next_workout_id,
            "Opened file store"
        );

        Ok(Self {
            path,
            data: Arc::new(Mutex::new(data)),
        })
    }

    /// Write the whole document: temp file first, then rename over the store.
    async fn persist(&self, data: &FileData) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Database(format!("Failed to create data dir: {}", e)))?;
        }

        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|e| AppError::Database(format!("Failed to encode store: {}", e)))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| AppError::Database(format!("Failed to write store: {}", e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| AppError::Database(format!("Failed to replace store: {}", e)))?;

        Ok(())
    }

    /// Apply `mutate` to a copy of the document and commit it only if the
    /// write succeeds, so memory never runs ahead of disk.
    async fn mutate<T, F>(&self, mutate: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut FileData) -> Result<T, AppError>,
    {
        let mut guard = self.data.lock().await;
        let mut next = guard.clone();
        let out = mutate(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }

    // ─── Workout Operations ──────────────────────────────────────

    pub async fn list_workouts(&self, user_id: &UserId) -> Result<Vec<Workout>, AppError> {
        let data = self.data.lock().await;
        Ok(data
            .workouts
            .iter()
            .filter(|w| &w.user_id == user_id)
            .cloned()
            .collect())
    }

    pub async fn create_workout(&self, input: NewWorkout) -> Result<Workout, AppError> {
        self.mutate(|data| {
            let id = data.next_workout_id;
            data.next_workout_id += 1;

            let workout = Workout::new(WorkoutId::Seq(id), input, Utc::now());
            data.workouts.push(workout.clone());
            Ok(workout)
        })
        .await
    }

    pub async fn update_workout(
        &self,
        id: &str,
        user_id: &UserId,
        patch: &WorkoutPatch,
    ) -> Result<Workout, AppError> {
        let seq = parse_seq(id)?;
        self.mutate(|data| {
            let workout = data
                .workouts
                .iter_mut()
                .find(|w| w.id == WorkoutId::Seq(seq) && &w.user_id == user_id)
                .ok_or_else(|| workout_not_found(id))?;

            workout.apply(patch, Utc::now());
            Ok(workout.clone())
        })
        .await
    }

    pub async fn delete_workout(&self, id: &str, user_id: &UserId) -> Result<(), AppError> {
        let seq = parse_seq(id)?;
        self.mutate(|data| {
            let index = data
                .workouts
                .iter()
                .position(|w| w.id == WorkoutId::Seq(seq) && &w.user_id == user_id)
                .ok_or_else(|| workout_not_found(id))?;

            data.workouts.remove(index);
            Ok(())
        })
        .await
    }

    // ─── Billing Customer Operations ─────────────────────────────

    pub async fn get_billing_customer(
        &self,
        user_id: &UserId,
    ) -> Result<Option<BillingCustomerMapping>, AppError> {
        let data = self.data.lock().await;
        Ok(data.billing_customers.get(user_id.as_str()).cloned())
    }

    pub async fn set_billing_customer(
        &self,
        mapping: &BillingCustomerMapping,
    ) -> Result<(), AppError> {
        self.mutate(|data| {
            data.billing_customers
                .insert(mapping.user_id.to_string(), mapping.clone());
            Ok(())
        })
        .await
    }

    pub async fn clear_billing_customer(&self, user_id: &UserId) -> Result<(), AppError> {
        if self.get_billing_customer(user_id).await?.is_none() {
            return Ok(());
        }
        self.mutate(|data| {
            data.billing_customers.remove(user_id.as_str());
            Ok(())
        })
        .await
    }
}

/// Ids in this store are numeric; anything else cannot match a row.
fn parse_seq(id: &str) -> Result<u64, AppError> {
    id.trim()
        .parse::<u64>()
        .map_err(|_| workout_not_found(id))
}

fn workout_not_found(id: &str) -> AppError {
    AppError::not_found(format!("Workout {} not found", id))
}
