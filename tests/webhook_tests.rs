// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe webhook endpoint tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

mod common;

fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn webhook_request(payload: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

const EVENT: &str = r#"{"id":"evt_1","type":"customer.subscription.created","data":{"object":{"id":"sub_1","customer":"cus_A1","status":"active"}}}"#;

#[tokio::test]
async fn test_valid_signature_is_accepted() {
    let app = common::create_test_app().await;
    let secret = app.state.config.stripe_webhook_secret.clone();
    let signature = sign(EVENT, &secret, chrono::Utc::now().timestamp());

    let (status, body) = app.send(webhook_request(EVENT, Some(signature))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let app = common::create_test_app().await;

    let (status, body) = app.send(webhook_request(EVENT, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_signature");
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let app = common::create_test_app().await;
    let signature = sign(EVENT, "whsec_attacker", chrono::Utc::now().timestamp());

    let (status, _) = app.send(webhook_request(EVENT, Some(signature))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tampered_payload_is_rejected() {
    let app = common::create_test_app().await;
    let secret = app.state.config.stripe_webhook_secret.clone();
    let signature = sign(EVENT, &secret, chrono::Utc::now().timestamp());
    let tampered = EVENT.replace("cus_A1", "cus_B2");

    let (status, _) = app.send(webhook_request(&tampered, Some(signature))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_replayed_payload_is_rejected() {
    let app = common::create_test_app().await;
    let secret = app.state.config.stripe_webhook_secret.clone();
    let signature = sign(EVENT, &secret, chrono::Utc::now().timestamp() - 600);

    let (status, _) = app.send(webhook_request(EVENT, Some(signature))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rejected_event_changes_nothing() {
    let app = common::create_test_app().await;
    let customer = app.billing.add_customer("alice@example.com", Some("alice"));
    let payload = format!(
        r#"{{"id":"evt_2","type":"customer.subscription.deleted","data":{{"object":{{"id":"sub_x","customer":"{}"}}}}}}"#,
        customer
    );

    let (status, _) = app
        .send(webhook_request(&payload, Some("t=1,v1=deadbeef".to_string())))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.billing.customer_count(), 1);
    assert!(app.billing.cancelled().is_empty());
    assert!(app.billing.checkout_requests().is_empty());
}

#[tokio::test]
async fn test_webhook_is_public_when_auth_enabled() {
    let config = fitlog::config::Config {
        auth_jwt_secret: Some(b"auth-secret-for-webhook-test".to_vec()),
        ..Default::default()
    };
    let app = common::create_test_app_with(config).await;
    let secret = app.state.config.stripe_webhook_secret.clone();
    let signature = sign(EVENT, &secret, chrono::Utc::now().timestamp());

    let (status, _) = app.send(webhook_request(EVENT, Some(signature))).await;
    assert_eq!(status, StatusCode::OK);
}
