// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Workouts (one document per workout, random document id)
//! - Billing customers (one document per user id)
//!
//! Firestore itself knows nothing about owners, so every read and write here
//! filters or checks on `user_id` before touching a document.

use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};

use crate::db::collections;
use crate::error::AppError;
use crate::models::{
    BillingCustomerMapping, NewWorkout, UserId, Workout, WorkoutId, WorkoutPatch,
};

/// Random document ids are 16 bytes, hex encoded.
const DOCUMENT_ID_BYTES: usize = 16;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Workout Operations ──────────────────────────────────────

    /// All workouts owned by `user_id`.
    pub async fn list_workouts(&self, user_id: &UserId) -> Result<Vec<Workout>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::WORKOUTS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id.as_str())]))
            .obj::<Workout>()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a new workout under a fresh random document id.
    pub async fn create_workout(&self, input: NewWorkout) -> Result<Workout, AppError> {
        let doc_id = generate_document_id()?;
        let workout = Workout::new(WorkoutId::Key(doc_id.clone()), input, Utc::now());

        self.write_workout(&doc_id, &workout).await?;
        Ok(workout)
    }

    /// Merge `patch` into the workout if `user_id` owns it.
    pub async fn update_workout(
        &self,
        id: &str,
        user_id: &UserId,
        patch: &WorkoutPatch,
    ) -> Result<Workout, AppError> {
        let mut workout = self.get_owned_workout(id, user_id).await?;
        workout.apply(patch, Utc::now());

        self.write_workout(id, &workout).await?;
        Ok(workout)
    }

    /// Delete the workout if `user_id` owns it.
    pub async fn delete_workout(&self, id: &str, user_id: &UserId) -> Result<(), AppError> {
        self.get_owned_workout(id, user_id).await?;

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::WORKOUTS)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Fetch a workout, treating another user's document as absent.
    async fn get_owned_workout(&self, id: &str, user_id: &UserId) -> Result<Workout, AppError> {
        let workout: Option<Workout> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::WORKOUTS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match workout {
            Some(w) if &w.user_id == user_id => Ok(w),
            Some(_) => {
                tracing::warn!(
                    workout_id = id,
                    user_id = %user_id,
                    "Workout access denied: owner mismatch"
                );
                Err(AppError::not_found(format!("Workout {} not found", id)))
            }
            None => Err(AppError::not_found(format!("Workout {} not found", id))),
        }
    }

    async fn write_workout(&self, doc_id: &str, workout: &Workout) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::WORKOUTS)
            .document_id(doc_id)
            .object(workout)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Billing Customer Operations ─────────────────────────────

    /// Stored billing customer for a user.
    pub async fn get_billing_customer(
        &self,
        user_id: &UserId,
    ) -> Result<Option<BillingCustomerMapping>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::BILLING_CUSTOMERS)
            .obj()
            .one(user_id.as_str())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace the mapping for `mapping.user_id`.
    pub async fn set_billing_customer(
        &self,
        mapping: &BillingCustomerMapping,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::BILLING_CUSTOMERS)
            .document_id(mapping.user_id.as_str())
            .object(mapping)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove the mapping for a user (no-op if absent).
    pub async fn clear_billing_customer(&self, user_id: &UserId) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::BILLING_CUSTOMERS)
            .document_id(user_id.as_str())
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

fn generate_document_id() -> Result<String, AppError> {
    let mut bytes = [0u8; DOCUMENT_ID_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
    Ok(hex::encode(bytes))
}
