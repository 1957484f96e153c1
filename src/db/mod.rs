// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: Firestore or a local JSON file.

pub mod file;
pub mod firestore;

pub use self::file::FileDb;
pub use self::firestore::FirestoreDb;

use crate::config::StoreBackend;
use crate::error::AppError;
use crate::models::{BillingCustomerMapping, NewWorkout, UserId, Workout, WorkoutPatch};

/// Collection names as constants.
pub mod collections {
    pub const WORKOUTS: &str = "workouts";
    /// Billing customer mappings (keyed by user id)
    pub const BILLING_CUSTOMERS: &str = "billing_customers";
}

/// Storage backend selected at startup.
///
/// Both backends enforce ownership: a workout is only listed, updated or
/// deleted through its owner's user id, and a mismatch looks exactly like a
/// missing row.
#[derive(Clone)]
pub enum Database {
    Firestore(FirestoreDb),
    File(FileDb),
}

impl Database {
    /// Connect to the configured backend.
    pub async fn connect(backend: &StoreBackend) -> Result<Self, AppError> {
        match backend {
            StoreBackend::Firestore { project_id } => {
                Ok(Database::Firestore(FirestoreDb::new(project_id).await?))
            }
            StoreBackend::File { path } => {
                tracing::warn!(
                    path = %path.display(),
                    "Using file-backed store: safe for a single server instance only"
                );
                Ok(Database::File(FileDb::open(path).await?))
            }
        }
    }

    /// Owner's workouts, newest first.
    pub async fn list_workouts(&self, user_id: &UserId) -> Result<Vec<Workout>, AppError> {
        let mut workouts = match self {
            Database::Firestore(db) => db.list_workouts(user_id).await?,
            Database::File(db) => db.list_workouts(user_id).await?,
        };
        workouts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(workouts)
    }

    pub async fn create_workout(&self, input: NewWorkout) -> Result<Workout, AppError> {
        match self {
            Database::Firestore(db) => db.create_workout(input).await,
            Database::File(db) => db.create_workout(input).await,
        }
    }

    pub async fn update_workout(
        &self,
        id: &str,
        user_id: &UserId,
        patch: &WorkoutPatch,
    ) -> Result<Workout, AppError> {
        match self {
            Database::Firestore(db) => db.update_workout(id, user_id, patch).await,
            Database::File(db) => db.update_workout(id, user_id, patch).await,
        }
    }

    pub async fn delete_workout(&self, id: &str, user_id: &UserId) -> Result<(), AppError> {
        match self {
            Database::Firestore(db) => db.delete_workout(id, user_id).await,
            Database::File(db) => db.delete_workout(id, user_id).await,
        }
    }

    pub async fn get_billing_customer(
        &self,
        user_id: &UserId,
    ) -> Result<Option<BillingCustomerMapping>, AppError> {
        match self {
            Database::Firestore(db) => db.get_billing_customer(user_id).await,
            Database::File(db) => db.get_billing_customer(user_id).await,
        }
    }

    pub async fn set_billing_customer(
        &self,
        mapping: &BillingCustomerMapping,
    ) -> Result<(), AppError> {
        match self {
            Database::Firestore(db) => db.set_billing_customer(mapping).await,
            Database::File(db) => db.set_billing_customer(mapping).await,
        }
    }

    pub async fn clear_billing_customer(&self, user_id: &UserId) -> Result<(), AppError> {
        match self {
            Database::Firestore(db) => db.clear_billing_customer(user_id).await,
            Database::File(db) => db.clear_billing_customer(user_id).await,
        }
    }
}
