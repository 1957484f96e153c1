// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Analysis relay tests against a local stub of the workflow webhook.

use axum::{http::StatusCode, routing::post, Json, Router};
use fitlog::config::Config;
use fitlog::error::AppError;
use fitlog::services::AnalysisRelay;
use serde_json::{json, Value};
use std::time::Duration;

mod common;

/// Stub that echoes the notes back in the given response shape.
fn echo_stub(shape: &'static str) -> Router {
    Router::new().route(
        "/analyze",
        post(move |Json(body): Json<Value>| async move {
            let notes = body["notes"].as_str().unwrap_or_default().to_string();
            let answer = format!("analysis of: {}", notes);
            Json(match shape {
                "data" => json!({"data": answer}),
                "output" => json!({"output": answer}),
                "array" => json!([{"response": answer}]),
                _ => json!(answer),
            })
        }),
    )
}

async fn relay_for(router: Router) -> AnalysisRelay {
    let base = common::spawn_stub(router).await;
    AnalysisRelay::new(format!("{}/analyze", base), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_relay_normalizes_response_shapes() {
    for shape in ["data", "output", "array", "string"] {
        let relay = relay_for(echo_stub(shape)).await;
        let analysis = relay.analyze("tempo run").await.unwrap();
        assert_eq!(analysis, "analysis of: tempo run", "shape {}", shape);
    }
}

#[tokio::test]
async fn test_relay_serializes_unknown_shapes() {
    let router = Router::new().route(
        "/analyze",
        post(|| async { Json(json!({"unrelated": 1})) }),
    );
    let relay = relay_for(router).await;

    assert_eq!(relay.analyze("x").await.unwrap(), r#"{"unrelated":1}"#);
}

#[tokio::test]
async fn test_relay_plain_text_body() {
    let router = Router::new().route("/analyze", post(|| async { "Solid effort." }));
    let relay = relay_for(router).await;

    assert_eq!(relay.analyze("x").await.unwrap(), "Solid effort.");
}

#[tokio::test]
async fn test_relay_upstream_failure() {
    let router = Router::new().route(
        "/analyze",
        post(|| async { (StatusCode::BAD_GATEWAY, "workflow crashed") }),
    );
    let relay = relay_for(router).await;

    let err = relay.analyze("x").await.unwrap_err();
    assert!(matches!(err, AppError::Analysis(ref msg) if msg.contains("502")));
}

#[tokio::test]
async fn test_relay_unreachable() {
    let relay =
        AnalysisRelay::new("http://127.0.0.1:9/analyze".to_string(), Duration::from_secs(2))
            .unwrap();

    assert!(matches!(
        relay.analyze("x").await,
        Err(AppError::Analysis(_))
    ));
}

#[tokio::test]
async fn test_relay_timeout() {
    let router = Router::new().route(
        "/analyze",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "too late"
        }),
    );
    let base = common::spawn_stub(router).await;
    let relay =
        AnalysisRelay::new(format!("{}/analyze", base), Duration::from_millis(200)).unwrap();

    let err = relay.analyze("x").await.unwrap_err();
    assert!(matches!(err, AppError::Analysis(ref msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn test_analysis_endpoint() {
    let base = common::spawn_stub(echo_stub("data")).await;
    let config = Config {
        analysis_webhook_url: format!("{}/analyze", base),
        ..Config::default()
    };
    let app = common::create_test_app_with(config).await;

    let (status, body) = app
        .json(
            "POST",
            "/api/ai-analysis",
            json!({"notes": "long ride", "userId": "alice"}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysis"], "analysis of: long ride");
}

#[tokio::test]
async fn test_analysis_endpoint_requires_notes() {
    let app = common::create_test_app().await;

    let (status, body) = app
        .json("POST", "/api/ai-analysis", json!({"notes": "   ", "userId": "alice"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_analysis_endpoint_upstream_error_shape() {
    let app = common::create_test_app().await;

    let (status, body) = app
        .json("POST", "/api/ai-analysis", json!({"notes": "easy jog"}))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "analysis_error");
    assert!(body["error"].is_string());
}
