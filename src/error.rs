// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    /// The supplied billing customer id is not a Stripe customer id.
    /// Clients should drop whatever they have cached.
    #[error("Invalid customer ID format: {0}")]
    InvalidCustomerId(String),

    #[error("Customer already has an active subscription")]
    AlreadySubscribed,

    #[error("Invalid webhook signature: {0}")]
    Signature(String),

    #[error("Resource not found: {message}")]
    NotFound { message: String, clear_data: bool },

    #[error("Payment provider error: {0}")]
    Billing(String),

    #[error("Analysis service error: {0}")]
    Analysis(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Not-found error without a cache-clearing hint.
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound {
            message: message.into(),
            clear_data: false,
        }
    }

    /// Not-found error telling the client to drop cached identifiers.
    pub fn stale(message: impl Into<String>) -> Self {
        AppError::NotFound {
            message: message.into(),
            clear_data: true,
        }
    }

    /// Whether the response should carry `clearData: true`.
    pub fn clear_data(&self) -> bool {
        matches!(
            self,
            AppError::InvalidCustomerId(_)
                | AppError::NotFound {
                    clear_data: true,
                    ..
                }
        )
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::InvalidCustomerId(_) => (StatusCode::BAD_REQUEST, "invalid_customer_id"),
            AppError::AlreadySubscribed => (StatusCode::BAD_REQUEST, "already_subscribed"),
            AppError::Signature(_) => (StatusCode::BAD_REQUEST, "invalid_signature"),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Billing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "billing_error"),
            AppError::Analysis(_) => (StatusCode::INTERNAL_SERVER_ERROR, "analysis_error"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    clear_data: Option<bool>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let error = match &self {
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                "Database error".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                "Internal server error".to_string()
            }
            AppError::Billing(msg) => {
                tracing::error!(error = %msg, "Payment provider error");
                msg.clone()
            }
            AppError::Analysis(msg) => {
                tracing::error!(error = %msg, "Analysis webhook error");
                msg.clone()
            }
            AppError::Signature(msg) => {
                tracing::warn!(error = %msg, "Rejected webhook payload");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error,
            code,
            clear_data: self.clear_data().then_some(true),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
