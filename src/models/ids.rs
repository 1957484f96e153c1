// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed identifiers parsed at the API boundary.
//!
//! User ids come from the auth provider; customer ids come from Stripe.
//! Both used to travel as bare strings and get mixed up, so they are parsed
//! into distinct types before any business logic sees them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

const MAX_USER_ID_LEN: usize = 128;
const CUSTOMER_ID_PREFIX: &str = "cus_";
const MAX_CUSTOMER_ID_LEN: usize = 255;

/// Identity issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("User ID is required".to_string()));
        }
        if trimmed.len() > MAX_USER_ID_LEN
            || !trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AppError::Validation("Invalid user ID format".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stripe customer identifier (`cus_...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomerId(String);

impl CustomerId {
    /// Parse a Stripe customer id.
    ///
    /// Anything else (most commonly a user id stored in the customer slot)
    /// is rejected with [`AppError::InvalidCustomerId`].
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        let valid = trimmed.len() <= MAX_CUSTOMER_ID_LEN
            && trimmed
                .strip_prefix(CUSTOMER_ID_PREFIX)
                .is_some_and(|rest| {
                    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric())
                });

        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(AppError::InvalidCustomerId(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CustomerId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CustomerId> for String {
    fn from(id: CustomerId) -> Self {
        id.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_id_accepts_stripe_ids() {
        let id = CustomerId::parse("cus_NffrFeUfNV2Hib").unwrap();
        assert_eq!(id.as_str(), "cus_NffrFeUfNV2Hib");
    }

    #[test]
    fn test_customer_id_rejects_user_ids() {
        let err = CustomerId::parse("3f2b8c1e-9d4a-4e6b-8f7a-1c2d3e4f5a6b").unwrap_err();
        assert!(matches!(err, AppError::InvalidCustomerId(_)));
        assert!(err.clear_data());
    }

    #[test]
    fn test_customer_id_rejects_bare_prefix_and_junk() {
        assert!(CustomerId::parse("cus_").is_err());
        assert!(CustomerId::parse("cus_abc/../x").is_err());
        assert!(CustomerId::parse("").is_err());
    }

    #[test]
    fn test_user_id_validation() {
        assert_eq!(
            UserId::parse(" 3f2b8c1e-9d4a-4e6b-8f7a-1c2d3e4f5a6b ")
                .unwrap()
                .as_str(),
            "3f2b8c1e-9d4a-4e6b-8f7a-1c2d3e4f5a6b"
        );
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("user/1").is_err());
        assert!(UserId::parse(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_user_id_deserializes_with_validation() {
        let ok: UserId = serde_json::from_str("\"user_1\"").unwrap();
        assert_eq!(ok.as_str(), "user_1");
        assert!(serde_json::from_str::<UserId>("\"bad id\"").is_err());
    }
}
