//! HTTP call executor for the GLPI REST API.
//!
//! [`Executor::execute`] performs exactly one network call for an
//! [`ApiRequest`] and normalizes whatever happens into a
//! [`ResponseEnvelope`]. It never returns an error: transport failures become
//! envelopes without a status, and remote error statuses are passed through.
//!
//! # Authentication
//!
//! Every request carries the `App-Token` header. On top of that a request is
//! either the session-opening call (`Authorization: user_token <token>`) or
//! carries a [`SessionToken`] in `Session-Token`; [`ApiRequest`] can only be
//! built one of those two ways, so no main request leaves without a session.
//!
//! # Security
//!
//! Tokens are never logged. Transport error text is sanitized before it is
//! logged or placed in an envelope.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde_json::Value;

use crate::config::Config;
use crate::error::GatewayError;
use crate::models::ResponseEnvelope;
use crate::session::SessionToken;

/// Form field GLPI reads the JSON manifest of an upload from.
const UPLOAD_MANIFEST_FIELD: &str = "uploadManifest";

/// How a request authenticates, beyond the application token.
#[derive(Debug, Clone)]
enum Auth {
    /// Opening a session with the long-lived user token.
    UserToken,
    /// Any call made inside a session.
    Session(SessionToken),
}

/// A file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// File name reported to GLPI.
    pub file_name: String,
    /// MIME type, if known.
    pub mime: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Request payload.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// JSON body.
    Json(Value),
    /// `multipart/form-data` body: a JSON manifest field plus file parts.
    Multipart {
        /// Serialized into the `uploadManifest` field.
        manifest: Value,
        /// Sent as `filename[0]`, `filename[1]`, ...
        files: Vec<UploadFile>,
    },
}

/// An outgoing request: method, endpoint path, authentication, query and body.
///
/// Built once per call and never modified after being handed to the executor.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    auth: Auth,
    query: Vec<(String, String)>,
    body: RequestBody,
}

impl ApiRequest {
    /// Creates a request made inside `session`.
    pub fn new(method: Method, path: impl Into<String>, session: SessionToken) -> Self {
        Self {
            method,
            path: path.into(),
            auth: Auth::Session(session),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Creates the `initSession` request, authenticated by the user token.
    pub(crate) fn open_session(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            auth: Auth::UserToken,
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Sets query parameters.
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Sets a JSON body.
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Sets a body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Short description used in logs and errors, e.g. `GET search/Ticket`.
    pub fn operation(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Sends [`ApiRequest`]s to GLPI.
#[derive(Clone)]
pub struct Executor {
    /// The underlying HTTP client (cloning is cheap).
    http: Client,

    /// Base URL of the REST API, without trailing slash.
    base_url: String,

    /// SECURITY: Never log this value!
    app_token: String,

    /// SECURITY: Never log this value!
    user_token: String,

    /// Read timeout, reported in timeout errors.
    timeout: Duration,
}

impl Executor {
    /// Creates an executor from configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::HttpClient` if the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(GatewayError::HttpClient)?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            app_token: config.app_token().to_string(),
            user_token: config.user_token().to_string(),
            timeout: config.request_timeout,
        })
    }

    /// Returns the absolute URL for an endpoint path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Redacts the configured tokens (and `extra`) from `message`.
    pub(crate) fn sanitize(&self, message: &str, extra: &[&str]) -> String {
        let mut secrets = vec![self.app_token.as_str(), self.user_token.as_str()];
        secrets.extend_from_slice(extra);
        GatewayError::sanitize_message(message, &secrets)
    }

    /// Performs the request and normalizes the outcome.
    pub async fn execute(&self, request: &ApiRequest) -> ResponseEnvelope {
        let url = self.url(&request.path);
        let operation = request.operation();
        let session_secret = match &request.auth {
            Auth::Session(token) => token.as_str(),
            Auth::UserToken => "",
        };

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            query_params = request.query.len(),
            "Sending GLPI request"
        );

        let mut req = self
            .http
            .request(request.method.clone(), &url)
            .header("App-Token", &self.app_token);

        req = match &request.auth {
            Auth::UserToken => req.header("Authorization", self.authorization()),
            Auth::Session(token) => req.header("Session-Token", token.as_str()),
        };

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        req = match &request.body {
            RequestBody::Empty => req.header(CONTENT_TYPE, "application/json"),
            RequestBody::Json(body) => req.json(body),
            RequestBody::Multipart { manifest, files } => match build_form(manifest, files) {
                Ok(form) => req.multipart(form),
                Err(e) => {
                    let message = self.sanitize(&e.to_string(), &[session_secret]);
                    tracing::error!(operation = %operation, error = %message, "Failed to build upload form");
                    return ResponseEnvelope::failure(message);
                }
            },
        };

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = self.sanitize(&self.describe(&e), &[session_secret]);
                tracing::warn!(operation = %operation, error = %message, "GLPI request failed");
                return ResponseEnvelope::failure(message);
            }
        };

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        match response.text().await {
            Ok(body) => {
                tracing::debug!(operation = %operation, status = status, "GLPI response received");
                tracing::trace!(body = %self.sanitize(&body, &[session_secret]), "GLPI response body");
                ResponseEnvelope::received(status, headers, body)
            }
            Err(e) => {
                let message = self.sanitize(&self.describe(&e), &[session_secret]);
                tracing::warn!(operation = %operation, status = status, error = %message, "Failed to read GLPI response body");
                ResponseEnvelope::failure(message)
            }
        }
    }

    /// `Authorization` value for `initSession`; a bare token gets the `user_token` scheme.
    fn authorization(&self) -> String {
        let token = self.user_token.trim();
        let has_scheme = token
            .split_once(' ')
            .map(|(scheme, _)| {
                scheme.eq_ignore_ascii_case("user_token") || scheme.eq_ignore_ascii_case("basic")
            })
            .unwrap_or(false);
        if has_scheme {
            token.to_string()
        } else {
            format!("user_token {}", token)
        }
    }

    /// Describes a transport failure, singling out timeouts and refused connections.
    fn describe(&self, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            format!("request timed out after {:?}: {}", self.timeout, error)
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else {
            error.to_string()
        }
    }
}

/// Collects headers into a sorted map; non-UTF-8 values are converted lossily.
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Builds a GLPI upload form: `uploadManifest` plus `filename[i]` parts.
fn build_form(manifest: &Value, files: &[UploadFile]) -> Result<Form, GatewayError> {
    let manifest = serde_json::to_string(manifest)?;
    let mut form = Form::new().text(UPLOAD_MANIFEST_FIELD, manifest);

    for (index, file) in files.iter().enumerate() {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        if let Some(mime) = &file.mime {
            part = part.mime_str(mime).map_err(|_| {
                GatewayError::validation(format!(
                    "invalid MIME type {:?} for {}",
                    mime, file.file_name
                ))
            })?;
        }
        form = form.part(format!("filename[{}]", index), part);
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_executor(base_url: &str) -> Executor {
        let mut config = Config::new(base_url, "app_tok", "user_tok");
        config.request_timeout = Duration::from_millis(300);
        Executor::new(&config).unwrap()
    }

    fn session() -> SessionToken {
        SessionToken::new("sess_tok")
    }

    #[test]
    fn test_url_joins_path() {
        let executor = test_executor("https://glpi.example.com/apirest.php/");
        assert_eq!(
            executor.url("Ticket/"),
            "https://glpi.example.com/apirest.php/Ticket/"
        );
        assert_eq!(
            executor.url("/search/User"),
            "https://glpi.example.com/apirest.php/search/User"
        );
    }

    #[test]
    fn test_authorization_adds_scheme_once() {
        assert_eq!(test_executor("https://glpi.example.com").authorization(), "user_token user_tok");

        let config = Config::new("https://glpi.example.com", "app_tok", "user_token abc");
        let executor = Executor::new(&config).unwrap();
        assert_eq!(executor.authorization(), "user_token abc");
    }

    #[test]
    fn test_operation_description() {
        let request = ApiRequest::new(Method::POST, "Ticket/", session());
        assert_eq!(request.operation(), "POST Ticket/");
    }

    #[test]
    fn test_session_token_debug_is_redacted() {
        let request = ApiRequest::new(Method::GET, "Ticket/1", session());
        assert!(!format!("{:?}", request).contains("sess_tok"));
    }

    #[tokio::test]
    async fn test_execute_sends_tokens_and_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Ticket/"))
            .and(header("App-Token", "app_tok"))
            .and(header("Session-Token", "sess_tok"))
            .and(body_json(json!({"input": {"name": "a"}})))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-glpi", "yes")
                    .set_body_json(json!({"id": 7, "message": ""})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let executor = test_executor(&server.uri());
        let request =
            ApiRequest::new(Method::POST, "Ticket/", session()).with_json(json!({"input": {"name": "a"}}));
        let env = executor.execute(&request).await;

        assert_eq!(env.status_code, Some(201));
        assert_eq!(env.body, Some(json!({"id": 7, "message": ""})));
        assert_eq!(env.headers.get("x-glpi").map(String::as_str), Some("yes"));
        assert!(env.error.is_none());
    }

    #[tokio::test]
    async fn test_open_session_uses_user_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/initSession/"))
            .and(header("Authorization", "user_token user_tok"))
            .and(header("App-Token", "app_tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_token": "s"})))
            .expect(1)
            .mount(&server)
            .await;

        let executor = test_executor(&server.uri());
        let env = executor.execute(&ApiRequest::open_session("initSession/")).await;
        assert_eq!(env.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_remote_error_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Ticket/99"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!(["ERROR_ITEM_NOT_FOUND", "Item not found"])),
            )
            .mount(&server)
            .await;

        let executor = test_executor(&server.uri());
        let env = executor
            .execute(&ApiRequest::new(Method::GET, "Ticket/99", session()))
            .await;

        assert_eq!(env.status_code, Some(404));
        assert_eq!(env.body, Some(json!(["ERROR_ITEM_NOT_FOUND", "Item not found"])));
        assert!(env.error.is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_body_is_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Ticket/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let executor = test_executor(&server.uri());
        let env = executor
            .execute(&ApiRequest::new(Method::GET, "Ticket/1", session()))
            .await;

        assert_eq!(env.status_code, Some(200));
        assert_eq!(env.body, Some(Value::String("{not json".to_string())));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failure_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Ticket/1"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let executor = test_executor(&server.uri());
        let env = executor
            .execute(&ApiRequest::new(Method::GET, "Ticket/1", session()))
            .await;

        assert!(env.status_code.is_none());
        let error = env.error.unwrap();
        assert!(error.contains("timed out"));
        assert!(!error.contains("sess_tok"));
    }

    #[tokio::test]
    async fn test_connection_refused_becomes_failure_envelope() {
        // Bind then drop a listener to get a port nothing is listening on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let executor = test_executor(&format!("http://127.0.0.1:{}", port));
        let env = executor
            .execute(&ApiRequest::new(Method::GET, "Ticket/1", session()))
            .await;

        assert!(env.status_code.is_none());
        assert!(env.error.is_some());
        assert!(env.body.is_none());
    }

    #[tokio::test]
    async fn test_query_parameters_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/Ticket"))
            .and(query_param("criteria[0][field]", "1"))
            .and(query_param("criteria[0][searchtype]", "contains"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"totalcount": 0})))
            .expect(1)
            .mount(&server)
            .await;

        let executor = test_executor(&server.uri());
        let request = ApiRequest::new(Method::GET, "search/Ticket", session()).with_query(vec![
            ("criteria[0][field]".to_string(), "1".to_string()),
            ("criteria[0][searchtype]".to_string(), "contains".to_string()),
        ]);
        let env = executor.execute(&request).await;
        assert_eq!(env.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_multipart_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Document/"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 3})))
            .expect(1)
            .mount(&server)
            .await;

        let executor = test_executor(&server.uri());
        let request = ApiRequest::new(Method::POST, "Document/", session()).with_body(
            RequestBody::Multipart {
                manifest: json!({"input": {"name": "notes.txt"}}),
                files: vec![UploadFile {
                    file_name: "notes.txt".to_string(),
                    mime: Some("text/plain".to_string()),
                    bytes: b"hello".to_vec(),
                }],
            },
        );
        let env = executor.execute(&request).await;
        assert_eq!(env.status_code, Some(201));

        let received = server.received_requests().await.unwrap();
        let content_type = received[0]
            .headers
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&received[0].body).into_owned();
        assert!(body.contains("name=\"uploadManifest\""));
        assert!(body.contains("name=\"filename[0]\""));
        assert!(body.contains("hello"));
    }

    #[test]
    fn test_build_form_rejects_bad_mime() {
        let files = vec![UploadFile {
            file_name: "a.bin".to_string(),
            mime: Some("not a mime".to_string()),
            bytes: vec![1, 2, 3],
        }];
        let err = build_form(&json!({}), &files).unwrap_err();
        assert!(err.to_string().contains("MIME"));
    }
}
