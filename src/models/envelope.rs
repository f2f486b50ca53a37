//! The uniform response envelope returned by every HTTP-backed operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized result of one remote call.
///
/// Exactly one of `status_code` and `error` describes the outcome: a transport
/// failure leaves `status_code` unset and fills `error`; any received response,
/// whatever its status, fills `status_code`, `headers` and `body`.
/// Remote 4xx/5xx answers are passed through untranslated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// HTTP status code, absent when no response was received.
    pub status_code: Option<u16>,

    /// Response headers (lower-cased names).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Decoded JSON body, or the raw text when the body is not JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Failure description for transport or local errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Builds an envelope from a received response.
    ///
    /// The body is decoded as JSON when possible and kept verbatim as a
    /// string otherwise; malformed JSON is never an error.
    pub fn received(status: u16, headers: BTreeMap<String, String>, raw_body: String) -> Self {
        let body = match serde_json::from_str::<Value>(&raw_body) {
            Ok(json) => json,
            Err(_) => Value::String(raw_body),
        };

        Self {
            status_code: Some(status),
            headers,
            body: Some(body),
            error: None,
        }
    }

    /// Builds an envelope for a call that produced no response.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            headers: BTreeMap::new(),
            body: None,
            error: Some(message.into()),
        }
    }

    /// Builds a locally produced envelope carrying a JSON body.
    pub fn local(status: u16, body: Value) -> Self {
        Self {
            status_code: Some(status),
            headers: BTreeMap::new(),
            body: Some(body),
            error: None,
        }
    }

    /// Builds a locally produced envelope carrying a status and an error message.
    pub fn local_error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(status),
            headers: BTreeMap::new(),
            body: None,
            error: Some(message.into()),
        }
    }

    /// Returns true if a response was received with a 2xx status.
    pub fn is_success(&self) -> bool {
        matches!(self.status_code, Some(code) if (200..300).contains(&code))
    }

    /// Returns true if no response was received.
    pub fn is_transport_failure(&self) -> bool {
        self.status_code.is_none()
    }

    /// Returns the body as text, re-encoding JSON bodies.
    pub fn body_text(&self) -> String {
        match &self.body {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_received_parses_json() {
        let env = ResponseEnvelope::received(201, BTreeMap::new(), r#"{"id":42}"#.to_string());
        assert_eq!(env.status_code, Some(201));
        assert_eq!(env.body, Some(json!({"id": 42})));
        assert!(env.error.is_none());
        assert!(env.is_success());
    }

    #[test]
    fn test_received_keeps_malformed_json_as_text() {
        let raw = "<html>Fatal error</html>".to_string();
        let env = ResponseEnvelope::received(500, BTreeMap::new(), raw.clone());
        assert_eq!(env.body, Some(Value::String(raw)));
        assert!(!env.is_success());
        assert!(!env.is_transport_failure());
    }

    #[test]
    fn test_received_empty_body_is_empty_text() {
        let env = ResponseEnvelope::received(200, BTreeMap::new(), String::new());
        assert_eq!(env.body, Some(Value::String(String::new())));
        assert_eq!(env.body_text(), "");
    }

    #[test]
    fn test_failure_has_no_status() {
        let env = ResponseEnvelope::failure("connection refused");
        assert!(env.is_transport_failure());
        assert_eq!(env.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_serialization_skips_absent_parts() {
        let env = ResponseEnvelope::failure("timed out");
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({"status_code": null, "error": "timed out"}));
    }

    #[test]
    fn test_body_text_reencodes_json() {
        let env = ResponseEnvelope::local(200, json!(["ERROR_ITEM_NOT_FOUND"]));
        assert_eq!(env.body_text(), r#"["ERROR_ITEM_NOT_FOUND"]"#);
    }
}
