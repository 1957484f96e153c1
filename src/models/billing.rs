// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Billing models: customer mappings and derived subscription status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{CustomerId, UserId};

/// Stored link from an application user to their Stripe customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingCustomerMapping {
    pub user_id: UserId,
    pub customer_id: CustomerId,
    pub email: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Stripe customer as seen by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingCustomer {
    pub id: CustomerId,
    pub email: Option<String>,
    /// Owner tag (`metadata.userId`), absent on customers created before tagging
    pub owner: Option<String>,
}

impl BillingCustomer {
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.owner.as_deref() == Some(user_id.as_str())
    }
}

/// An active subscription as seen by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSubscription {
    pub id: String,
    pub price_id: Option<String>,
    pub interval: Option<String>,
    /// Unix seconds
    pub current_period_end: Option<i64>,
}

/// Details surfaced when a customer is subscribed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    pub price_id: Option<String>,
    pub interval: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub current_period_end: Option<i64>,
}

impl From<&ActiveSubscription> for SubscriptionDetails {
    fn from(sub: &ActiveSubscription) -> Self {
        Self {
            price_id: sub.price_id.clone(),
            interval: sub.interval.clone(),
            current_period_end: sub.current_period_end,
        }
    }
}

/// Outcome of reconciling a user with a billing customer.
///
/// Recomputed on every check; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub enum ReconciliationState {
    /// No customer id is known for the user
    NoMapping,
    /// The stored id is not a Stripe customer id
    MappingPresentButInvalid,
    /// Stripe does not know the customer (or it was deleted)
    CustomerNotFound,
    /// The customer is tagged with a different user
    CustomerFoundNotOwned,
    Subscribed,
    NotSubscribed,
}

impl ReconciliationState {
    /// Whether clients should drop the customer id they hold.
    pub fn is_stale(self) -> bool {
        matches!(
            self,
            ReconciliationState::MappingPresentButInvalid
                | ReconciliationState::CustomerNotFound
                | ReconciliationState::CustomerFoundNotOwned
        )
    }
}

/// Result of a subscription check.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusCheck {
    pub state: ReconciliationState,
    pub details: Option<SubscriptionDetails>,
}

impl StatusCheck {
    pub fn unsubscribed(state: ReconciliationState) -> Self {
        Self {
            state,
            details: None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.state == ReconciliationState::Subscribed
    }
}
