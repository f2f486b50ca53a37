//! Error types for the GLPI gateway.
//!
//! This module defines `GatewayError`, the unified error type used throughout
//! the crate. Most HTTP-backed operations never surface it directly: they fold
//! it into a [`ResponseEnvelope`](crate::models::ResponseEnvelope). It escapes
//! as a `Result` only from configuration loading, the criteria compiler and
//! the search operation.
//!
//! # Security
//!
//! All error messages are sanitized to ensure tokens are never leaked
//! in logs or error responses. Use `sanitize_message()` when constructing
//! error messages from external sources.

use thiserror::Error;

/// Unified error type for all gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration error - missing or invalid environment variables.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client initialization failed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// Network-level failure: DNS, refused connection, timeout, truncated body.
    #[error("transport error during {operation}: {message}")]
    Transport {
        /// The request that failed (e.g. `GET search/Ticket`).
        operation: String,
        /// Description of the underlying failure.
        message: String,
    },

    /// The remote API answered with a non-success status code.
    #[error("GLPI returned HTTP {status}: {body}")]
    RemoteStatus {
        /// The HTTP status code returned.
        status: u16,
        /// The response body, potentially containing error details.
        body: String,
    },

    /// `initSession` did not yield a usable session token.
    #[error("session acquisition failed: {reason}")]
    SessionAcquisition {
        /// HTTP status of the `initSession` response, if one was received.
        status: Option<u16>,
        /// What was wrong with the response.
        reason: String,
    },

    /// A search criterion did not have a recognizable shape.
    #[error("malformed search criterion at {path}: {reason}")]
    CriteriaShape {
        /// Position of the offending criterion, e.g. `criteria[1][criteria][0]`.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// No active user matched the phone number.
    #[error("no active user found for phone {phone}")]
    LookupNotFound {
        /// The phone number that was searched.
        phone: String,
    },

    /// The phone lookup has no database configured.
    #[error("phone lookup is not configured - set GLPI_HOST, GLPI_USER and GLPI_DATABASE")]
    LookupUnavailable,

    /// Database query or connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input validation failed.
    #[error("validation error: {0}")]
    Validation(String),
}

impl GatewayError {
    /// Creates a configuration error for a missing environment variable.
    pub fn missing_env(var_name: &str) -> Self {
        GatewayError::Config(format!(
            "missing required environment variable: {}",
            var_name
        ))
    }

    /// Creates a configuration error for an invalid value.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        GatewayError::Config(message.into())
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }

    /// Creates a transport error for the given operation.
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a session acquisition error.
    pub fn session(status: Option<u16>, reason: impl Into<String>) -> Self {
        GatewayError::SessionAcquisition {
            status,
            reason: reason.into(),
        }
    }

    /// Creates a criteria shape error.
    pub fn criteria_shape(path: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::CriteriaShape {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the failure happened before anything was sent over the network.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            GatewayError::Config(_)
                | GatewayError::CriteriaShape { .. }
                | GatewayError::Validation(_)
                | GatewayError::LookupUnavailable
        )
    }

    /// Sanitizes an error message by redacting every secret in `secrets`.
    ///
    /// Empty secrets are skipped so that an unset token does not turn every
    /// character boundary into `[REDACTED]`.
    #[must_use]
    pub fn sanitize_message(message: &str, secrets: &[&str]) -> String {
        secrets
            .iter()
            .filter(|secret| !secret.is_empty())
            .fold(message.to_string(), |acc, secret| {
                acc.replace(secret, "[REDACTED]")
            })
    }
}
