// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription routes: checkout, status, cancel, recovery and the billing map.
//!
//! The `/{customer_id}/{user_id}` forms validate ownership; the single-segment
//! forms serve customers created before owner tagging existed.

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::Caller;
use crate::models::{CustomerId, ReconciliationState, StatusCheck, SubscriptionDetails, UserId};
use crate::services::Ownership;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Billing routes (auth middleware applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create-checkout-session", post(create_checkout_session))
        .route(
            "/check-subscription/{customer_id}/{user_id}",
            get(check_subscription),
        )
        .route(
            "/check-subscription/{customer_id}",
            get(check_subscription_legacy),
        )
        .route(
            "/cancel-subscription/{customer_id}/{user_id}",
            post(cancel_subscription),
        )
        .route(
            "/cancel-subscription/{customer_id}",
            post(cancel_subscription_legacy),
        )
        .route("/find-customer-by-email", post(find_customer_by_email))
        .route(
            "/billing-customer/{user_id}",
            get(get_billing_customer)
                .put(put_billing_customer)
                .delete(delete_billing_customer),
        )
        .route("/subscription-status/{user_id}", get(subscription_status))
}

// ─── Checkout ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CheckoutBody {
    #[validate(length(min = 1, max = 255))]
    price_id: String,
    user_id: UserId,
    #[validate(email)]
    email: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub id: String,
    pub customer_id: String,
    pub url: Option<String>,
}

async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiJson(body): ApiJson<CheckoutBody>,
) -> Result<Json<CheckoutResponse>> {
    body.validate()?;
    caller.authorize(&body.user_id)?;

    let session = state
        .subscriptions
        .create_checkout(body.price_id.trim(), &body.user_id, body.email.trim())
        .await?;

    Ok(Json(CheckoutResponse {
        id: session.id,
        customer_id: session.customer_id.to_string(),
        url: session.url,
    }))
}

// ─── Status ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_subscribed: bool,
    pub state: ReconciliationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_details: Option<SubscriptionDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clear_data: Option<bool>,
}

impl From<StatusCheck> for StatusResponse {
    fn from(check: StatusCheck) -> Self {
        Self {
            is_subscribed: check.is_subscribed(),
            clear_data: check.state.is_stale().then_some(true),
            state: check.state,
            subscription_details: check.details,
        }
    }
}

async fn check_subscription(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath((customer_id, user_id)): ApiPath<(String, String)>,
) -> Result<Json<StatusResponse>> {
    let user_id = UserId::parse(&user_id)?;
    caller.authorize(&user_id)?;

    let check = state
        .subscriptions
        .check_status(&customer_id, &Ownership::Verified(user_id))
        .await?;
    Ok(Json(check.into()))
}

async fn check_subscription_legacy(
    State(state): State<Arc<AppState>>,
    ApiPath(customer_id): ApiPath<String>,
) -> Result<Json<StatusResponse>> {
    tracing::debug!("Legacy status check (no owner validation)");
    let check = state
        .subscriptions
        .check_status(&customer_id, &Ownership::Legacy)
        .await?;
    Ok(Json(check.into()))
}

#[derive(Deserialize)]
struct StatusQuery {
    email: Option<String>,
}

/// Status resolved from the server-side billing map.
async fn subscription_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(user_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Json<StatusResponse>> {
    let user_id = UserId::parse(&user_id)?;
    caller.authorize(&user_id)?;

    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let check = state.subscriptions.status_for_user(&user_id, email).await?;
    Ok(Json(check.into()))
}

// ─── Cancel ──────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
    pub cancelled: usize,
}

impl CancelResponse {
    fn new(cancelled: usize) -> Self {
        let message = match cancelled {
            0 => "No active subscriptions to cancel".to_string(),
            1 => "Subscription cancelled".to_string(),
            n => format!("{} subscriptions cancelled", n),
        };
        Self {
            success: true,
            message,
            cancelled,
        }
    }
}

async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath((customer_id, user_id)): ApiPath<(String, String)>,
) -> Result<Json<CancelResponse>> {
    let user_id = UserId::parse(&user_id)?;
    caller.authorize(&user_id)?;

    let cancelled = state
        .subscriptions
        .cancel(&customer_id, &Ownership::Verified(user_id))
        .await?;
    Ok(Json(CancelResponse::new(cancelled)))
}

async fn cancel_subscription_legacy(
    State(state): State<Arc<AppState>>,
    ApiPath(customer_id): ApiPath<String>,
) -> Result<Json<CancelResponse>> {
    tracing::debug!("Legacy cancel (no owner validation)");
    let cancelled = state
        .subscriptions
        .cancel(&customer_id, &Ownership::Legacy)
        .await?;
    Ok(Json(CancelResponse::new(cancelled)))
}

// ─── Recovery & Billing Map ──────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct FindByEmailBody {
    #[validate(email)]
    email: String,
    user_id: UserId,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct CustomerLookupResponse {
    pub customer_id: Option<String>,
}

async fn find_customer_by_email(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiJson(body): ApiJson<FindByEmailBody>,
) -> Result<Json<CustomerLookupResponse>> {
    body.validate()?;
    caller.authorize(&body.user_id)?;

    let found = state
        .subscriptions
        .find_by_email(body.email.trim(), &body.user_id)
        .await?;
    Ok(Json(CustomerLookupResponse {
        customer_id: found.map(String::from),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingCustomerResponse {
    pub customer_id: Option<String>,
    pub email: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

async fn get_billing_customer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(user_id): ApiPath<String>,
) -> Result<Json<BillingCustomerResponse>> {
    let user_id = UserId::parse(&user_id)?;
    caller.authorize(&user_id)?;

    let mapping = state.subscriptions.mapping(&user_id).await?;
    Ok(Json(match mapping {
        Some(m) => BillingCustomerResponse {
            customer_id: Some(m.customer_id.to_string()),
            email: m.email,
            updated_at: Some(m.updated_at),
        },
        None => BillingCustomerResponse {
            customer_id: None,
            email: None,
            updated_at: None,
        },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutBillingCustomerBody {
    customer_id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Migrate a client-held customer id into the server-side map.
async fn put_billing_customer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(user_id): ApiPath<String>,
    ApiJson(body): ApiJson<PutBillingCustomerBody>,
) -> Result<Json<BillingCustomerResponse>> {
    let user_id = UserId::parse(&user_id)?;
    caller.authorize(&user_id)?;
    let customer_id = CustomerId::parse(&body.customer_id)?;

    let mapping = state
        .subscriptions
        .set_mapping(&user_id, customer_id, body.email)
        .await?;
    tracing::info!(
        user_id = %user_id,
        customer_id = %mapping.customer_id,
        "Stored billing customer mapping"
    );

    Ok(Json(BillingCustomerResponse {
        customer_id: Some(mapping.customer_id.to_string()),
        email: mapping.email,
        updated_at: Some(mapping.updated_at),
    }))
}

#[derive(Serialize)]
struct ClearedResponse {
    success: bool,
}

async fn delete_billing_customer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(user_id): ApiPath<String>,
) -> Result<Json<ClearedResponse>> {
    let user_id = UserId::parse(&user_id)?;
    caller.authorize(&user_id)?;

    state.subscriptions.clear_mapping(&user_id).await?;
    tracing::info!(user_id = %user_id, "Cleared billing customer mapping");
    Ok(Json(ClearedResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_states_carry_clear_data() {
        let response =
            StatusResponse::from(StatusCheck::unsubscribed(ReconciliationState::CustomerNotFound));
        assert!(!response.is_subscribed);
        assert_eq!(response.clear_data, Some(true));

        let response =
            StatusResponse::from(StatusCheck::unsubscribed(ReconciliationState::NotSubscribed));
        assert_eq!(response.clear_data, None);
    }

    #[test]
    fn test_cancel_messages() {
        assert_eq!(CancelResponse::new(0).message, "No active subscriptions to cancel");
        assert_eq!(CancelResponse::new(2).message, "2 subscriptions cancelled");
        assert!(CancelResponse::new(0).success);
    }
}
