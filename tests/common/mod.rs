// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use fitlog::config::{Config, StoreBackend};
use fitlog::db::{Database, FileDb, FirestoreDb};
use fitlog::error::AppError;
use fitlog::models::{ActiveSubscription, BillingCustomer, CustomerId, UserId};
use fitlog::routes::create_router;
use fitlog::services::{BillingProvider, CheckoutRequest, CheckoutSessionHandle};
use fitlog::AppState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_firestore() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

#[allow(dead_code)]
pub fn user(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

// ─── Fake Billing Provider ───────────────────────────────────

#[derive(Default)]
struct FakeState {
    customers: Vec<BillingCustomer>,
    subscriptions: HashMap<String, Vec<ActiveSubscription>>,
    checkout_requests: Vec<CheckoutRequest>,
    cancelled: Vec<String>,
    next_id: u32,
}

/// In-memory stand-in for Stripe.
///
/// Checkout sessions never turn into subscriptions on their own, like a
/// session whose payment has not been processed yet.
#[derive(Default)]
pub struct FakeBilling {
    state: Mutex<FakeState>,
    pub unreachable: std::sync::atomic::AtomicBool,
}

#[allow(dead_code)]
impl FakeBilling {
    pub fn add_customer(&self, email: &str, owner: Option<&str>) -> CustomerId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = CustomerId::parse(&format!("cus_fake{}", state.next_id)).unwrap();
        state.customers.push(BillingCustomer {
            id: id.clone(),
            email: Some(email.to_string()),
            owner: owner.map(str::to_string),
        });
        id
    }

    pub fn add_subscription(&self, customer: &CustomerId, price_id: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("sub_fake{}", state.next_id);
        state
            .subscriptions
            .entry(customer.to_string())
            .or_default()
            .push(ActiveSubscription {
                id: id.clone(),
                price_id: Some(price_id.to_string()),
                interval: Some("month".to_string()),
                current_period_end: Some(1_767_225_600),
            });
        id
    }

    pub fn remove_customer(&self, customer: &CustomerId) {
        self.state
            .lock()
            .unwrap()
            .customers
            .retain(|c| &c.id != customer);
    }

    pub fn owner_of(&self, customer: &CustomerId) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .customers
            .iter()
            .find(|c| &c.id == customer)
            .and_then(|c| c.owner.clone())
    }

    pub fn customer_count(&self) -> usize {
        self.state.lock().unwrap().customers.len()
    }

    pub fn active_count(&self, customer: &CustomerId) -> usize {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .get(customer.as_str())
            .map_or(0, Vec::len)
    }

    pub fn checkout_requests(&self) -> Vec<CheckoutRequest> {
        self.state.lock().unwrap().checkout_requests.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }
}

#[async_trait]
impl BillingProvider for FakeBilling {
    async fn find_customers_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<BillingCustomer>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .customers
            .iter()
            .filter(|c| c.email.as_deref() == Some(email))
            .cloned()
            .collect())
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<BillingCustomer>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .customers
            .iter()
            .find(|c| &c.id == id)
            .cloned())
    }

    async fn create_customer(
        &self,
        email: &str,
        owner: &UserId,
    ) -> Result<BillingCustomer, AppError> {
        let id = self.add_customer(email, Some(owner.as_str()));
        Ok(BillingCustomer {
            id,
            email: Some(email.to_string()),
            owner: Some(owner.to_string()),
        })
    }

    async fn tag_customer_owner(&self, id: &CustomerId, owner: &UserId) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let customer = state
            .customers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| AppError::Billing(format!("No such customer: {}", id)))?;
        customer.owner = Some(owner.to_string());
        Ok(())
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<ActiveSubscription>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .get(customer_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        for subs in state.subscriptions.values_mut() {
            subs.retain(|s| s.id != subscription_id);
        }
        state.cancelled.push(subscription_id.to_string());
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSessionHandle, AppError> {
        let mut state = self.state.lock().unwrap();
        state.checkout_requests.push(request.clone());
        let n = state.checkout_requests.len();
        Ok(CheckoutSessionHandle {
            id: format!("cs_test_{}", n),
            url: Some(format!("https://checkout.stripe.test/pay/cs_test_{}", n)),
        })
    }

    async fn is_reachable(&self) -> bool {
        !self.unreachable.load(std::sync::atomic::Ordering::SeqCst)
    }
}

// ─── Test App ────────────────────────────────────────────────

/// Router plus handles on its dependencies.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub billing: Arc<FakeBilling>,
    _dir: tempfile::TempDir,
}

#[allow(dead_code)]
impl TestApp {
    /// Send a request and decode the JSON response body (Null when empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request(method, uri, &body)).await
    }
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Create a test app backed by a file store in a temp dir and a fake
/// billing provider.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with(Config::default()).await
}

#[allow(dead_code)]
pub async fn create_test_app_with(mut config: Config) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workouts.json");
    config.store = StoreBackend::File { path: path.clone() };

    let db = Database::File(FileDb::open(&path).await.unwrap());
    let billing = Arc::new(FakeBilling::default());
    let state = Arc::new(AppState::new(config, db, billing.clone()).unwrap());

    TestApp {
        router: create_router(state.clone()),
        state,
        billing,
        _dir: dir,
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
