//! GLPI session lifecycle.
//!
//! Every authenticated call runs inside a short-lived session opened with
//! `initSession` and closed with `killSession`. [`SessionManager::with_session`]
//! brackets a unit of work with both calls: the session is released exactly
//! once on every exit path, and if the work future is dropped before it
//! finishes, the release is handed to the runtime instead of being lost.
//!
//! Release failures are logged and never reported to the caller, so they
//! cannot mask the outcome of the work that used the session.

use std::fmt;
use std::future::Future;

use reqwest::Method;
use serde_json::Value;

use crate::error::GatewayError;
use crate::executor::{ApiRequest, Executor};

/// Endpoint that opens a session.
const INIT_SESSION_PATH: &str = "initSession/";

/// Endpoint that closes a session.
const KILL_SESSION_PATH: &str = "killSession";

/// Field of the `initSession` response holding the token.
const SESSION_TOKEN_FIELD: &str = "session_token";

/// Opaque session token issued by GLPI.
///
/// Owned by a single operation and never persisted. `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for the `Session-Token` header.
    ///
    /// This should ONLY be used for headers and sanitization, never for logging.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// Opens and closes GLPI sessions.
#[derive(Clone)]
pub struct SessionManager {
    executor: Executor,
}

impl SessionManager {
    /// Creates a session manager sending through `executor`.
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    /// Opens a session.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::SessionAcquisition` if the call fails or the
    /// response body is not an object carrying a non-empty `session_token`.
    pub async fn acquire(&self) -> Result<SessionToken, GatewayError> {
        let request = ApiRequest::open_session(INIT_SESSION_PATH);
        let envelope = self.executor.execute(&request).await;

        if let Some(error) = &envelope.error {
            return Err(GatewayError::session(
                envelope.status_code,
                format!("initSession request failed: {}", error),
            ));
        }

        let token = envelope
            .body
            .as_ref()
            .and_then(|body| body.get(SESSION_TOKEN_FIELD))
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty());

        match token {
            Some(token) => {
                tracing::debug!(status = ?envelope.status_code, "GLPI session opened");
                Ok(SessionToken::new(token))
            }
            None => {
                let body = self.executor.sanitize(&envelope.body_text(), &[]);
                tracing::error!(
                    status = ?envelope.status_code,
                    body = %body,
                    "Unexpected initSession response shape"
                );
                Err(GatewayError::session(
                    envelope.status_code,
                    format!(
                        "unexpected initSession response (HTTP {}): {}",
                        envelope
                            .status_code
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "none".to_string()),
                        body
                    ),
                ))
            }
        }
    }

    /// Closes a session. Best effort: failures are logged, never returned.
    pub async fn release(&self, token: SessionToken) {
        let request = ApiRequest::new(Method::GET, KILL_SESSION_PATH, token);
        let envelope = self.executor.execute(&request).await;

        if let Some(error) = &envelope.error {
            tracing::warn!(error = %error, "Failed to close GLPI session");
        } else if !envelope.is_success() {
            tracing::warn!(
                status = ?envelope.status_code,
                body = %self.executor.sanitize(&envelope.body_text(), &[]),
                "GLPI refused to close session"
            );
        } else {
            tracing::debug!("GLPI session closed");
        }
    }

    /// Runs `work` inside a fresh session.
    ///
    /// If no session can be opened, `work` is never started and the
    /// acquisition error is returned; there is nothing to release. Otherwise
    /// the session is released after `work` completes, whatever it returned.
    pub async fn with_session<T, F, Fut>(&self, operation: &str, work: F) -> Result<T, GatewayError>
    where
        F: FnOnce(SessionToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let token = self.acquire().await.inspect_err(|e| {
            tracing::error!(
                operation = operation,
                error = %self.executor.sanitize(&e.to_string(), &[]),
                "Skipping request: no GLPI session"
            );
        })?;

        let guard = SessionGuard {
            manager: self.clone(),
            token: Some(token.clone()),
        };

        let output = work(token).await;
        guard.release().await;

        Ok(output)
    }
}

/// Releases its session when dropped without an explicit release.
struct SessionGuard {
    manager: SessionManager,
    token: Option<SessionToken>,
}

impl SessionGuard {
    async fn release(mut self) {
        if let Some(token) = self.token.take() {
            self.manager.release(token).await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("Operation abandoned; closing GLPI session in background");
                let manager = self.manager.clone();
                handle.spawn(async move {
                    manager.release(token).await;
                });
            }
            Err(_) => {
                tracing::warn!("Operation abandoned outside a runtime; GLPI session left open");
            }
        }
    }
}
