// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe REST client.
//!
//! Handles:
//! - Customer lookup by id and email, creation and owner tagging
//! - Active subscription listing and cancellation
//! - Hosted checkout session creation
//!
//! Requests are form-encoded, responses JSON. Nothing here retries: a failed
//! billing call is surfaced to the caller so it is never duplicated.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{ActiveSubscription, BillingCustomer, CustomerId, UserId};
use crate::services::billing::{BillingProvider, CheckoutRequest, CheckoutSessionHandle};

/// Metadata key holding the owning user id on customers and sessions.
pub const OWNER_METADATA_KEY: &str = "userId";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LIST_LIMIT: &str = "100";

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    /// Create a client for `base_url` (normally `https://api.stripe.com/v1`).
    pub fn new(secret_key: String, base_url: String) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Billing(format!("Stripe request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Billing(format!("Stripe request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!("Stripe rate limit hit (429)");
            }

            return Err(AppError::Billing(format!(
                "Stripe HTTP {}: {}",
                status.as_u16(),
                stripe_error_message(&body)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Billing(format!("Stripe JSON parse error: {}", e)))
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn find_customers_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<BillingCustomer>, AppError> {
        let list: StripeList<StripeCustomer> = self
            .get("customers", &[("email", email), ("limit", LIST_LIMIT)])
            .await?;

        Ok(list
            .data
            .into_iter()
            .filter_map(StripeCustomer::into_customer)
            .collect())
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<BillingCustomer>, AppError> {
        let response = self
            .http
            .get(self.url(&format!("customers/{}", id)))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Billing(format!("Stripe request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(customer_id = %id, "Stripe customer does not exist");
            return Ok(None);
        }

        let customer: StripeCustomer = self.check_response_json(response).await?;
        Ok(customer.into_customer())
    }

    async fn create_customer(
        &self,
        email: &str,
        owner: &UserId,
    ) -> Result<BillingCustomer, AppError> {
        let metadata_key = format!("metadata[{}]", OWNER_METADATA_KEY);
        let customer: StripeCustomer = self
            .post_form(
                "customers",
                &[("email", email), (metadata_key.as_str(), owner.as_str())],
            )
            .await?;

        tracing::info!(customer_id = %customer.id, user_id = %owner, "Created Stripe customer");

        customer.into_customer().ok_or_else(|| {
            AppError::Billing("Stripe returned an unusable customer record".to_string())
        })
    }

    async fn tag_customer_owner(&self, id: &CustomerId, owner: &UserId) -> Result<(), AppError> {
        let metadata_key = format!("metadata[{}]", OWNER_METADATA_KEY);
        let _: StripeCustomer = self
            .post_form(
                &format!("customers/{}", id),
                &[(metadata_key.as_str(), owner.as_str())],
            )
            .await?;

        tracing::info!(customer_id = %id, user_id = %owner, "Tagged Stripe customer owner");
        Ok(())
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<ActiveSubscription>, AppError> {
        let list: StripeList<StripeSubscription> = self
            .get(
                "subscriptions",
                &[
                    ("customer", customer_id.as_str()),
                    ("status", "active"),
                    ("limit", LIST_LIMIT),
                ],
            )
            .await?;

        Ok(list.data.into_iter().map(ActiveSubscription::from).collect())
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(self.url(&format!("subscriptions/{}", subscription_id)))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Billing(format!("Stripe request failed: {}", e)))?;

        let _: serde_json::Value = self.check_response_json(response).await?;
        tracing::info!(subscription_id, "Cancelled Stripe subscription");
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSessionHandle, AppError> {
        let metadata_key = format!("metadata[{}]", OWNER_METADATA_KEY);
        let subscription_metadata_key =
            format!("subscription_data[metadata][{}]", OWNER_METADATA_KEY);

        let session: StripeCheckoutSession = self
            .post_form(
                "checkout/sessions",
                &[
                    ("mode", "subscription"),
                    ("customer", request.customer_id.as_str()),
                    ("line_items[0][price]", request.price_id.as_str()),
                    ("line_items[0][quantity]", "1"),
                    ("success_url", request.success_url.as_str()),
                    ("cancel_url", request.cancel_url.as_str()),
                    ("client_reference_id", request.user_id.as_str()),
                    (metadata_key.as_str(), request.user_id.as_str()),
                    (subscription_metadata_key.as_str(), request.user_id.as_str()),
                ],
            )
            .await?;

        Ok(CheckoutSessionHandle {
            id: session.id,
            url: session.url,
        })
    }

    async fn is_reachable(&self) -> bool {
        match self.get::<serde_json::Value>("balance", &[]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Stripe connectivity check failed");
                false
            }
        }
    }
}

/// Pull the human-readable message out of a Stripe error body.
fn stripe_error_message(body: &str) -> String {
    serde_json::from_str::<StripeErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.to_string())
}

// ─── Wire Types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    deleted: bool,
}

impl StripeCustomer {
    /// Deleted customers and unparseable ids count as absent.
    fn into_customer(mut self) -> Option<BillingCustomer> {
        if self.deleted {
            return None;
        }
        let id = CustomerId::parse(&self.id).ok()?;
        Some(BillingCustomer {
            id,
            email: self.email,
            owner: self
                .metadata
                .remove(OWNER_METADATA_KEY)
                .filter(|o| !o.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    /// Older API versions keep the period end on the subscription
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    items: Option<StripeList<StripeSubscriptionItem>>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscriptionItem {
    #[serde(default)]
    price: Option<StripePrice>,
    /// Newer API versions keep the period end on each item
    #[serde(default)]
    current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
    #[serde(default)]
    recurring: Option<StripeRecurring>,
}

#[derive(Debug, Deserialize)]
struct StripeRecurring {
    interval: String,
}

impl From<StripeSubscription> for ActiveSubscription {
    fn from(sub: StripeSubscription) -> Self {
        let first_item = sub.items.and_then(|items| items.data.into_iter().next());
        let item_period_end = first_item.as_ref().and_then(|i| i.current_period_end);
        let price = first_item.and_then(|i| i.price);

        ActiveSubscription {
            id: sub.id,
            price_id: price.as_ref().map(|p| p.id.clone()),
            interval: price.and_then(|p| p.recurring).map(|r| r.interval),
            current_period_end: sub.current_period_end.or(item_period_end),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
}
