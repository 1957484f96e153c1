// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe webhook signature verification and event decoding.
//!
//! The `stripe-signature` header looks like `t=1492774577,v1=5257a8...`.
//! The signed payload is `"{t}.{raw body}"`, keyed with the endpoint's
//! signing secret. Events are only decoded after the signature checks out.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age (and clock skew) of a signed payload.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Check `header` against `payload`.
///
/// `now` is unix seconds; passed in so tests can pin the clock.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), AppError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::Signature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(AppError::Signature("missing v1 signature".to_string()));
    }

    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| AppError::Signature("malformed timestamp".to_string()))?;
    if now.abs_diff(signed_at) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(AppError::Signature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Signature("unusable signing secret".to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    // Any matching v1 entry is accepted (Stripe sends several during secret rolls)
    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| bool::from(bytes.as_slice().ct_eq(expected.as_slice())))
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(AppError::Signature("signature mismatch".to_string()))
    }
}

/// Envelope of a Stripe event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Event kinds this service reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    CheckoutCompleted,
    Other,
}

impl WebhookEvent {
    pub fn kind(&self) -> EventKind {
        match self.event_type.as_str() {
            "customer.subscription.created" => EventKind::SubscriptionCreated,
            "customer.subscription.updated" => EventKind::SubscriptionUpdated,
            "customer.subscription.deleted" => EventKind::SubscriptionDeleted,
            "checkout.session.completed" => EventKind::CheckoutCompleted,
            _ => EventKind::Other,
        }
    }

    /// Customer the event object refers to, if any.
    pub fn customer(&self) -> Option<&str> {
        self.data.object.get("customer").and_then(|c| c.as_str())
    }

    fn object_field(&self, name: &str) -> Option<&str> {
        self.data.object.get(name).and_then(|v| v.as_str())
    }
}

/// Verify and decode a webhook delivery.
pub fn parse_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<WebhookEvent, AppError> {
    verify_signature(payload, header, secret, now)?;

    serde_json::from_slice(payload)
        .map_err(|e| AppError::Validation(format!("Malformed webhook event: {}", e)))
}

/// Report an event. Status is always re-derived live from Stripe, so events
/// never change stored state.
pub fn log_event(event: &WebhookEvent) {
    let customer_id = event.customer().unwrap_or("-");

    match event.kind() {
        EventKind::SubscriptionCreated
        | EventKind::SubscriptionUpdated
        | EventKind::SubscriptionDeleted => {
            tracing::info!(
                event_id = %event.id,
                event_type = %event.event_type,
                customer_id,
                subscription_id = event.object_field("id").unwrap_or("-"),
                status = event.object_field("status").unwrap_or("-"),
                "Subscription event received"
            );
        }
        EventKind::CheckoutCompleted => {
            tracing::info!(
                event_id = %event.id,
                event_type = %event.event_type,
                customer_id,
                user_id = event.object_field("client_reference_id").unwrap_or("-"),
                "Checkout completed"
            );
        }
        EventKind::Other => {
            tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Ignoring webhook event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_unit_test";
    const NOW: i64 = 1_767_225_600;

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        assert!(verify_signature(payload, &sign(payload, NOW), SECRET, NOW).is_ok());
    }

    #[test]
    fn test_modified_payload_is_rejected() {
        let header = sign(br#"{"id":"evt_1"}"#, NOW);
        let err = verify_signature(br#"{"id":"evt_2"}"#, &header, SECRET, NOW).unwrap_err();
        assert!(matches!(err, AppError::Signature(_)));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let payload = b"{}";
        let header = sign(payload, NOW);
        assert!(verify_signature(payload, &header, "whsec_other", NOW).is_err());
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let payload = b"{}";
        let header = sign(payload, NOW - SIGNATURE_TOLERANCE_SECS - 1);
        assert!(verify_signature(payload, &header, SECRET, NOW).is_err());

        let header = sign(payload, NOW - SIGNATURE_TOLERANCE_SECS);
        assert!(verify_signature(payload, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_one_of_several_v1_entries_may_match() {
        let payload = b"{}";
        let good = sign(payload, NOW);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), good_sig);
        assert!(verify_signature(payload, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "garbage", "v1=abcd", "t=123", "t=abc,v1=abcd", "t=,v1="] {
            assert!(
                verify_signature(b"{}", header, SECRET, NOW).is_err(),
                "header {:?} should be rejected",
                header
            );
        }
        // Not hex
        let header = format!("t={},v1=zz", NOW);
        assert!(verify_signature(b"{}", &header, SECRET, NOW).is_err());

        // Extreme timestamps are out of tolerance, not an arithmetic overflow
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1={}", t, "00".repeat(32));
            assert!(matches!(
                verify_signature(b"{}", &header, SECRET, NOW),
                Err(AppError::Signature(_))
            ));
        }
    }

    #[test]
    fn test_parse_event_kinds() {
        let payload = br#"{"id":"evt_9","type":"customer.subscription.deleted","data":{"object":{"id":"sub_1","customer":"cus_A1"}}}"#;
        let event = parse_event(payload, &sign(payload, NOW), SECRET, NOW).unwrap();
        assert_eq!(event.kind(), EventKind::SubscriptionDeleted);
        assert_eq!(event.customer(), Some("cus_A1"));

        let payload = br#"{"id":"evt_10","type":"invoice.paid","data":{"object":{}}}"#;
        let event = parse_event(payload, &sign(payload, NOW), SECRET, NOW).unwrap();
        assert_eq!(event.kind(), EventKind::Other);
        assert_eq!(event.customer(), None);
    }

    #[test]
    fn test_signed_garbage_is_validation_error() {
        let payload = b"not json";
        let err = parse_event(payload, &sign(payload, NOW), SECRET, NOW).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
