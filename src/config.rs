// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. A missing Stripe secret key aborts
//! launch; there is no degraded mode without billing.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Where workouts and billing mappings are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Managed Firestore database (multi-instance safe).
    Firestore { project_id: String },
    /// JSON file on local disk (single instance only).
    File { path: PathBuf },
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Origins allowed to make cross-origin calls
    pub allowed_origins: Vec<String>,
    /// Frontend URL used for checkout success/cancel redirects
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Workout store backend
    pub store: StoreBackend,
    /// Stripe REST API base URL
    pub stripe_api_base: String,
    /// External analysis workflow webhook
    pub analysis_webhook_url: String,
    /// Timeout for the analysis webhook call
    pub analysis_timeout: Duration,

    // --- Secrets ---
    /// Stripe secret API key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret (`whsec_...`)
    pub stripe_webhook_secret: String,
    /// HS256 secret of the auth provider's JWTs; `None` trusts ids in requests
    pub auth_jwt_secret: Option<Vec<u8>>,
    /// Expected `aud` claim of the auth provider's JWTs
    pub auth_jwt_audience: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            store: StoreBackend::File {
                path: PathBuf::from("data/workouts.json"),
            },
            stripe_api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            analysis_webhook_url: "http://127.0.0.1:9/analysis".to_string(),
            analysis_timeout: Duration::from_secs(5),
            stripe_secret_key: "sk_test_fitlog".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            auth_jwt_secret: None,
            auth_jwt_audience: "authenticated".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let stripe_secret_key = required("STRIPE_SECRET_KEY")?;
        let stripe_webhook_secret = required("STRIPE_WEBHOOK_SECRET")?;
        let analysis_webhook_url = required("ANALYSIS_WEBHOOK_URL")?;

        let allowed_origins = parse_origins(&required("ALLOWED_ORIGINS")?);
        if allowed_origins.is_empty() {
            return Err(ConfigError::Invalid(
                "ALLOWED_ORIGINS",
                "at least one origin is required".to_string(),
            ));
        }

        let frontend_url = env::var("FRONTEND_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|_| allowed_origins[0].clone());

        let store = match env::var("WORKOUT_STORE")
            .unwrap_or_else(|_| "file".to_string())
            .trim()
        {
            "file" => StoreBackend::File {
                path: env::var("WORKOUT_DATA_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("data/workouts.json")),
            },
            "firestore" => StoreBackend::Firestore {
                project_id: required("GCP_PROJECT_ID")?,
            },
            other => {
                return Err(ConfigError::Invalid(
                    "WORKOUT_STORE",
                    format!("expected 'file' or 'firestore', got '{}'", other),
                ))
            }
        };

        let analysis_timeout_secs = match env::var("ANALYSIS_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::Invalid("ANALYSIS_TIMEOUT_SECS", format!("not a number: {}", raw))
            })?,
            Err(_) => 60,
        };

        Ok(Self {
            allowed_origins,
            frontend_url,
            port: parse_port(env::var("PORT").ok().as_deref())?,
            store,
            stripe_api_base: env::var("STRIPE_API_BASE")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string()),
            analysis_webhook_url,
            analysis_timeout: Duration::from_secs(analysis_timeout_secs),
            stripe_secret_key,
            stripe_webhook_secret,
            auth_jwt_secret: env::var("AUTH_JWT_SECRET")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(String::into_bytes),
            auth_jwt_audience: env::var("AUTH_JWT_AUDIENCE")
                .unwrap_or_else(|_| "authenticated".to_string()),
        })
    }

    /// Redirect target after a completed checkout.
    pub fn checkout_success_url(&self) -> String {
        format!(
            "{}/subscription/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.frontend_url
        )
    }

    /// Redirect target after an abandoned checkout.
    pub fn checkout_cancel_url(&self) -> String {
        format!("{}/subscription/cancel", self.frontend_url)
    }
}

/// Read a required variable; blank values count as missing.
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Unset means 8080; anything set must be a valid port number.
fn parse_port(raw: Option<&str>) -> Result<u16, ConfigError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(8080),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid("PORT", format!("not a port number: {}", value))),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
