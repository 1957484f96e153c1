// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription gateway: reconciles application users with Stripe customers.
//!
//! Nothing here is cached. Every status check walks the reconciliation
//! states from scratch against the live provider:
//!
//! ```text
//! NoMapping -> MappingPresentButInvalid -> CustomerNotFound
//!           -> CustomerFoundNotOwned -> Subscribed | NotSubscribed
//! ```
//!
//! The server-side billing map (user id -> customer id) is kept in the same
//! store as workouts and is repaired here whenever Stripe disagrees with it.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::Database;
use crate::error::AppError;
use crate::models::{
    BillingCustomer, BillingCustomerMapping, CustomerId, ReconciliationState, StatusCheck,
    SubscriptionDetails, UserId,
};
use crate::services::billing::{BillingProvider, CheckoutRequest};

/// Per-email locks serializing checkout creation.
pub type CheckoutLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Who is asking about a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// The customer must be tagged with this user.
    Verified(UserId),
    /// Pre-tagging records: no owner validation.
    Legacy,
}

impl Ownership {
    fn user(&self) -> Option<&UserId> {
        match self {
            Ownership::Verified(user_id) => Some(user_id),
            Ownership::Legacy => None,
        }
    }
}

/// A started hosted checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub customer_id: CustomerId,
    pub url: Option<String>,
}

/// Facade over the billing provider plus the billing map.
#[derive(Clone)]
pub struct SubscriptionGateway {
    provider: Arc<dyn BillingProvider>,
    db: Database,
    checkout_locks: CheckoutLocks,
    success_url: String,
    cancel_url: String,
}

impl SubscriptionGateway {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        db: Database,
        checkout_locks: CheckoutLocks,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            provider,
            db,
            checkout_locks,
            success_url,
            cancel_url,
        }
    }

    /// Whether the billing provider answers at all.
    pub async fn billing_connected(&self) -> bool {
        self.provider.is_reachable().await
    }

    // ─── Checkout ────────────────────────────────────────────────

    /// Emails with a checkout in progress or waiting.
    pub fn checkout_locks_held(&self) -> usize {
        self.checkout_locks.len()
    }

    /// Start a subscription checkout for `user_id`.
    ///
    /// Reuses the customer registered under `email` that is tagged with this
    /// user, else an untagged one, else creates a tagged customer. Customers
    /// tagged with another user are never touched here. Refuses customers
    /// that already hold an active subscription before anything is written.
    pub async fn create_checkout(
        &self,
        price_id: &str,
        user_id: &UserId,
        email: &str,
    ) -> Result<CheckoutSession, AppError> {
        // Two concurrent checkouts for one email could both pass the
        // active-subscription check below; serialize them.
        let key = email.trim().to_lowercase();
        let lock = self
            .checkout_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.checkout_locked(price_id, user_id, email).await
        };

        // With ours dropped, a count above one means another request holds
        // or waits on this lock.
        drop(lock);
        self.checkout_locks
            .remove_if(&key, |_, l| Arc::strong_count(l) == 1);

        result
    }

    async fn checkout_locked(
        &self,
        price_id: &str,
        user_id: &UserId,
        email: &str,
    ) -> Result<CheckoutSession, AppError> {
        let candidate = self.checkout_candidate(user_id, email).await?;

        let customer = match candidate {
            Some(customer) => {
                let active = self.provider.list_active_subscriptions(&customer.id).await?;
                if !active.is_empty() {
                    tracing::warn!(
                        customer_id = %customer.id,
                        user_id = %user_id,
                        active = active.len(),
                        "Checkout refused: customer already subscribed"
                    );
                    return Err(AppError::AlreadySubscribed);
                }

                if customer.owner.is_none() {
                    tracing::info!(
                        customer_id = %customer.id,
                        user_id = %user_id,
                        "Tagging untagged customer with owner"
                    );
                    self.provider
                        .tag_customer_owner(&customer.id, user_id)
                        .await?;
                }
                customer
            }
            None => self.provider.create_customer(email, user_id).await?,
        };

        let session = self
            .provider
            .create_checkout_session(&CheckoutRequest {
                customer_id: customer.id.clone(),
                price_id: price_id.to_string(),
                user_id: user_id.clone(),
                success_url: self.success_url.clone(),
                cancel_url: self.cancel_url.clone(),
            })
            .await?;

        tracing::info!(
            customer_id = %customer.id,
            user_id = %user_id,
            session_id = %session.id,
            "Checkout session created"
        );

        // The session exists now; a failed map write must not turn into an
        // error the client would retry.
        self.remember(user_id, &customer.id, Some(email)).await;

        Ok(CheckoutSession {
            id: session.id,
            customer_id: customer.id,
            url: session.url,
        })
    }

    /// Existing customer usable for `user_id`'s checkout, without writing.
    async fn checkout_candidate(
        &self,
        user_id: &UserId,
        email: &str,
    ) -> Result<Option<BillingCustomer>, AppError> {
        let customers = self.provider.find_customers_by_email(email).await?;

        let owned = customers.iter().position(|c| c.is_owned_by(user_id));
        let untagged = customers.iter().position(|c| c.owner.is_none());

        if owned.is_none() && untagged.is_none() && !customers.is_empty() {
            tracing::info!(
                user_id = %user_id,
                candidates = customers.len(),
                "Email belongs to other users' customers; creating a new one"
            );
        }

        Ok(owned
            .or(untagged)
            .and_then(|i| customers.into_iter().nth(i)))
    }

    // ─── Status ──────────────────────────────────────────────────

    /// Reconcile a customer id against the provider.
    ///
    /// Stale outcomes (`MappingPresentButInvalid`, `CustomerNotFound`,
    /// `CustomerFoundNotOwned`) answer not subscribed. A verified caller's
    /// stored mapping is dropped when it points at the rejected id.
    pub async fn check_status(
        &self,
        raw_customer_id: &str,
        ownership: &Ownership,
    ) -> Result<StatusCheck, AppError> {
        let customer_id = match CustomerId::parse(raw_customer_id) {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(
                    user_id = ownership.user().map(UserId::as_str).unwrap_or("-"),
                    "Status check with malformed customer id"
                );
                return Ok(StatusCheck::unsubscribed(
                    ReconciliationState::MappingPresentButInvalid,
                ));
            }
        };

        let customer = match self.provider.get_customer(&customer_id).await? {
            Some(customer) => customer,
            None => {
                self.forget_if_current(ownership, &customer_id).await;
                return Ok(StatusCheck::unsubscribed(
                    ReconciliationState::CustomerNotFound,
                ));
            }
        };

        if let Ownership::Verified(user_id) = ownership {
            if !customer.is_owned_by(user_id) {
                tracing::warn!(
                    customer_id = %customer_id,
                    user_id = %user_id,
                    "Status check denied: customer owned by another user"
                );
                self.forget_if_current(ownership, &customer_id).await;
                return Ok(StatusCheck::unsubscribed(
                    ReconciliationState::CustomerFoundNotOwned,
                ));
            }
        }

        let active = self.provider.list_active_subscriptions(&customer_id).await?;
        match active.first() {
            Some(subscription) => Ok(StatusCheck {
                state: ReconciliationState::Subscribed,
                details: Some(SubscriptionDetails::from(subscription)),
            }),
            None => Ok(StatusCheck::unsubscribed(
                ReconciliationState::NotSubscribed,
            )),
        }
    }

    /// Status resolved from the server-side map, recovering by email when the
    /// map is empty.
    pub async fn status_for_user(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> Result<StatusCheck, AppError> {
        let customer_id = match self.db.get_billing_customer(user_id).await? {
            Some(mapping) => Some(mapping.customer_id),
            None => match email {
                Some(email) => self.find_by_email(email, user_id).await?,
                None => None,
            },
        };

        match customer_id {
            Some(id) => {
                self.check_status(id.as_str(), &Ownership::Verified(user_id.clone()))
                    .await
            }
            None => Ok(StatusCheck::unsubscribed(ReconciliationState::NoMapping)),
        }
    }

    // ─── Cancel ──────────────────────────────────────────────────

    /// Cancel every active subscription of a customer.
    ///
    /// Returns how many were cancelled; zero is still a success.
    pub async fn cancel(
        &self,
        raw_customer_id: &str,
        ownership: &Ownership,
    ) -> Result<usize, AppError> {
        let customer_id = CustomerId::parse(raw_customer_id)?;

        let customer = match self.provider.get_customer(&customer_id).await? {
            Some(customer) => customer,
            None => {
                self.forget_if_current(ownership, &customer_id).await;
                return Err(AppError::stale(format!(
                    "Customer {} not found",
                    customer_id
                )));
            }
        };

        if let Ownership::Verified(user_id) = ownership {
            if !customer.is_owned_by(user_id) {
                tracing::warn!(
                    customer_id = %customer_id,
                    user_id = %user_id,
                    "Cancel denied: customer owned by another user"
                );
                return Err(AppError::Forbidden(
                    "Customer does not belong to this user".to_string(),
                ));
            }
        }

        // More than one active subscription should never exist, but cancel
        // all of them if it does.
        let active = self.provider.list_active_subscriptions(&customer_id).await?;
        for subscription in &active {
            self.provider.cancel_subscription(&subscription.id).await?;
        }

        tracing::info!(
            customer_id = %customer_id,
            cancelled = active.len(),
            "Cancelled active subscriptions"
        );
        Ok(active.len())
    }

    // ─── Recovery ────────────────────────────────────────────────

    /// Find the billing customer of `user_id` by email.
    ///
    /// Prefers a customer already tagged with the user; otherwise adopts the
    /// first customer with an active subscription and retags it. A hit is
    /// written to the billing map.
    pub async fn find_by_email(
        &self,
        email: &str,
        user_id: &UserId,
    ) -> Result<Option<CustomerId>, AppError> {
        let customers = self.provider.find_customers_by_email(email).await?;

        if let Some(owned) = customers.iter().find(|c| c.is_owned_by(user_id)) {
            self.remember(user_id, &owned.id, Some(email)).await;
            return Ok(Some(owned.id.clone()));
        }

        for customer in &customers {
            let active = self.provider.list_active_subscriptions(&customer.id).await?;
            if active.is_empty() {
                continue;
            }

            tracing::info!(
                customer_id = %customer.id,
                user_id = %user_id,
                previous_owner = customer.owner.as_deref().unwrap_or("-"),
                "Recovered subscribed customer by email; retagging"
            );
            self.provider
                .tag_customer_owner(&customer.id, user_id)
                .await?;
            self.remember(user_id, &customer.id, Some(email)).await;
            return Ok(Some(customer.id.clone()));
        }

        tracing::debug!(
            user_id = %user_id,
            candidates = customers.len(),
            "No customer found by email"
        );
        Ok(None)
    }

    // ─── Billing Map ─────────────────────────────────────────────

    pub async fn mapping(
        &self,
        user_id: &UserId,
    ) -> Result<Option<BillingCustomerMapping>, AppError> {
        self.db.get_billing_customer(user_id).await
    }

    /// Store a client-held customer id after checking it with the provider.
    ///
    /// Unknown customers are refused with a stale hint and customers tagged
    /// with someone else are refused outright. Untagged customers are
    /// adopted and tagged.
    pub async fn set_mapping(
        &self,
        user_id: &UserId,
        customer_id: CustomerId,
        email: Option<String>,
    ) -> Result<BillingCustomerMapping, AppError> {
        let customer = self
            .provider
            .get_customer(&customer_id)
            .await?
            .ok_or_else(|| AppError::stale(format!("Customer {} not found", customer_id)))?;

        match customer.owner.as_deref() {
            Some(owner) if owner == user_id.as_str() => {}
            Some(_) => {
                tracing::warn!(
                    customer_id = %customer_id,
                    user_id = %user_id,
                    "Refusing to map customer owned by another user"
                );
                return Err(AppError::Forbidden(
                    "Customer does not belong to this user".to_string(),
                ));
            }
            None => {
                self.provider
                    .tag_customer_owner(&customer_id, user_id)
                    .await?;
            }
        }

        let mapping = BillingCustomerMapping {
            user_id: user_id.clone(),
            customer_id,
            email: email.or(customer.email),
            updated_at: Utc::now(),
        };
        self.db.set_billing_customer(&mapping).await?;
        Ok(mapping)
    }

    pub async fn clear_mapping(&self, user_id: &UserId) -> Result<(), AppError> {
        self.db.clear_billing_customer(user_id).await
    }

    /// Best-effort map write.
    async fn remember(&self, user_id: &UserId, customer_id: &CustomerId, email: Option<&str>) {
        let mapping = BillingCustomerMapping {
            user_id: user_id.clone(),
            customer_id: customer_id.clone(),
            email: email.map(str::to_string),
            updated_at: Utc::now(),
        };
        if let Err(e) = self.db.set_billing_customer(&mapping).await {
            tracing::warn!(
                user_id = %user_id,
                customer_id = %customer_id,
                error = %e,
                "Failed to store billing customer mapping"
            );
        }
    }

    /// Drop a verified caller's mapping if it points at `stale`.
    async fn forget_if_current(&self, ownership: &Ownership, stale: &CustomerId) {
        let Some(user_id) = ownership.user() else {
            return;
        };

        let result = async {
            match self.db.get_billing_customer(user_id).await? {
                Some(mapping) if &mapping.customer_id == stale => {
                    self.db.clear_billing_customer(user_id).await?;
                    tracing::info!(
                        user_id = %user_id,
                        customer_id = %stale,
                        "Cleared stale billing customer mapping"
                    );
                }
                _ => {}
            }
            Ok::<(), AppError>(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to clear stale mapping");
        }
    }
}
