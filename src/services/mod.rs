// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod analysis;
pub mod billing;
pub mod stripe;
pub mod stripe_webhook;
pub mod subscription;

pub use analysis::AnalysisRelay;
pub use billing::{BillingProvider, CheckoutRequest, CheckoutSessionHandle};
pub use stripe::StripeClient;
pub use subscription::{CheckoutLocks, CheckoutSession, Ownership, SubscriptionGateway};
