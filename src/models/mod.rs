// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod billing;
pub mod ids;
pub mod workout;

pub use billing::{
    ActiveSubscription, BillingCustomer, BillingCustomerMapping, ReconciliationState,
    StatusCheck, SubscriptionDetails,
};
pub use ids::{CustomerId, UserId};
pub use workout::{NewWorkout, Workout, WorkoutId, WorkoutPatch, WorkoutSummary};
