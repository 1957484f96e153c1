// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Billing provider seam.
//!
//! The subscription gateway talks to Stripe only through this trait so the
//! reconciliation logic can be exercised against an in-memory provider.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{ActiveSubscription, BillingCustomer, CustomerId, UserId};

/// Parameters of a hosted subscription checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: CustomerId,
    pub price_id: String,
    pub user_id: UserId,
    pub success_url: String,
    pub cancel_url: String,
}

/// Handle of a created checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionHandle {
    pub id: String,
    /// Hosted checkout page, when the provider returns one
    pub url: Option<String>,
}

/// Operations the gateway needs from the payment provider.
///
/// Implementations classify transport and API failures as
/// [`AppError::Billing`]. They never retry.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Customers whose email matches exactly.
    async fn find_customers_by_email(&self, email: &str)
        -> Result<Vec<BillingCustomer>, AppError>;

    /// Fetch a customer; `None` if it does not exist or was deleted.
    async fn get_customer(&self, id: &CustomerId) -> Result<Option<BillingCustomer>, AppError>;

    /// Create a customer tagged with its owner.
    async fn create_customer(
        &self,
        email: &str,
        owner: &UserId,
    ) -> Result<BillingCustomer, AppError>;

    /// Overwrite the owner tag of a customer.
    async fn tag_customer_owner(&self, id: &CustomerId, owner: &UserId) -> Result<(), AppError>;

    /// Active subscriptions in provider order.
    async fn list_active_subscriptions(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<ActiveSubscription>, AppError>;

    /// Cancel one subscription immediately.
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), AppError>;

    /// Start a hosted subscription checkout.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSessionHandle, AppError>;

    /// Cheap connectivity probe for the health endpoint.
    async fn is_reachable(&self) -> bool;
}
