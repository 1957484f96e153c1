// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relay to the external notes-analysis workflow.
//!
//! The workflow's response shape is not under our control, so whatever comes
//! back is flattened into a single text answer by [`normalize_analysis`].

use serde_json::{json, Value};
use std::time::Duration;

use crate::error::AppError;

/// Field names probed, in order, for the answer text.
const ANSWER_FIELDS: [&str; 5] = ["output", "result", "response", "message", "analysis"];

/// HTTP client for the analysis webhook.
#[derive(Clone)]
pub struct AnalysisRelay {
    http: reqwest::Client,
    webhook_url: String,
}

impl AnalysisRelay {
    pub fn new(webhook_url: String, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self { http, webhook_url })
    }

    /// Send `notes` to the workflow and return its normalized answer.
    pub async fn analyze(&self, notes: &str) -> Result<String, AppError> {
        let response = self
            .http
            .post(&self.webhook_url)
            .json(&json!({ "notes": notes }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Analysis("Analysis service timed out".to_string())
                } else {
                    AppError::Analysis(format!("Analysis service unreachable: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Analysis(format!(
                "Analysis service returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Analysis(format!("Failed to read analysis response: {}", e)))?;

        tracing::debug!(bytes = body.len(), "Analysis response received");
        Ok(normalize_body(&body))
    }
}

/// Normalize a raw response body; non-JSON text is the answer itself.
pub fn normalize_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => normalize_analysis(&value),
        Err(_) => body.trim().to_string(),
    }
}

/// Flatten a workflow response into answer text.
///
/// 1. A string is the answer.
/// 2. An object with `data` is normalized from `data`.
/// 3. Otherwise the first present of [`ANSWER_FIELDS`] is normalized.
/// 4. A non-empty array is normalized from its first element.
/// 5. Anything else is serialized whole.
pub fn normalize_analysis(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(data) = map.get("data").filter(|v| !v.is_null()) {
                return normalize_analysis(data);
            }
            ANSWER_FIELDS
                .iter()
                .find_map(|field| map.get(*field).filter(|v| !v.is_null()))
                .map(normalize_analysis)
                .unwrap_or_else(|| value.to_string())
        }
        Value::Array(items) => match items.first() {
            Some(first) => normalize_analysis(first),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_table() {
        assert_eq!(normalize_analysis(&json!({"data": "x"})), "x");
        assert_eq!(normalize_analysis(&json!({"output": "y"})), "y");
        assert_eq!(normalize_analysis(&json!("z")), "z");
        assert_eq!(
            normalize_analysis(&json!({"unrelated": 1})),
            r#"{"unrelated":1}"#
        );
    }

    #[test]
    fn test_field_priority() {
        let value = json!({"analysis": "last", "result": "second", "message": "fourth"});
        assert_eq!(normalize_analysis(&value), "second");
    }

    #[test]
    fn test_nested_shapes() {
        assert_eq!(
            normalize_analysis(&json!({"data": {"response": "deep"}})),
            "deep"
        );
        assert_eq!(normalize_analysis(&json!([{"output": "first"}, "second"])), "first");
        assert_eq!(normalize_analysis(&json!([])), "[]");
        assert_eq!(normalize_analysis(&json!(42)), "42");
    }

    #[test]
    fn test_non_string_answer_is_serialized() {
        assert_eq!(
            normalize_analysis(&json!({"result": {"score": 7}})),
            r#"{"score":7}"#
        );
    }

    #[test]
    fn test_plain_text_body() {
        assert_eq!(normalize_body("  Great pacing today.\n"), "Great pacing today.");
        assert_eq!(normalize_body(r#"{"message":"ok"}"#), "ok");
    }
}
