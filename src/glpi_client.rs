//! Operation layer for the GLPI REST API.
//!
//! This module provides the `GlpiClient` struct. Each public method is one
//! exposed capability: it opens a session, sends one request through the
//! [`Executor`], and closes the session whatever happened.
//!
//! # Failure semantics
//!
//! Every method except [`GlpiClient::search`] returns a [`ResponseEnvelope`]:
//! transport failures, remote 4xx/5xx answers, session acquisition failures
//! and local validation failures all arrive as envelopes, never as errors.
//! `search` instead returns `Err` for anything but a 2xx answer.
//!
//! # Security
//!
//! Tokens are never logged. All error messages are sanitized before logging.

use reqwest::Method;
use serde_json::{json, Value};

use crate::config::Config;
use crate::criteria::{self, CompiledCriteria};
use crate::error::GatewayError;
use crate::executor::{ApiRequest, Executor, RequestBody, UploadFile};
use crate::models::{Criterion, ParticipationType, ResponseEnvelope, Ticket, TicketUser};
use crate::session::{SessionManager, SessionToken};

/// Itemtype of tickets.
pub const TICKET_ITEMTYPE: &str = "Ticket";

/// Itemtype of users.
pub const USER_ITEMTYPE: &str = "User";

/// Itemtype of ticket/user associations.
pub const TICKET_USER_ITEMTYPE: &str = "Ticket_User";

/// Payload accepted by [`GlpiClient::add_item`].
#[derive(Debug, Clone)]
pub enum AddPayload {
    /// Sent as `application/json` body `{"input": ...}`.
    Json(Value),
    /// Sent as `multipart/form-data`: `uploadManifest` is `{"input": manifest}`.
    Upload {
        /// Fields of the created item (e.g. a Document's `name`).
        manifest: Value,
        /// Files to attach.
        files: Vec<UploadFile>,
    },
}

impl AddPayload {
    /// Content type the payload is sent with.
    pub fn content_type(&self) -> &'static str {
        match self {
            AddPayload::Json(_) => "application/json",
            AddPayload::Upload { .. } => "multipart/form-data",
        }
    }

    fn into_body(self) -> RequestBody {
        match self {
            AddPayload::Json(input) => RequestBody::Json(json!({ "input": input })),
            AddPayload::Upload { manifest, files } => RequestBody::Multipart {
                manifest: json!({ "input": manifest }),
                files,
            },
        }
    }
}

/// Client for GLPI operations.
///
/// # Example
///
/// ```ignore
/// let config = Config::from_env()?;
/// let client = GlpiClient::new(&config)?;
///
/// let envelope = client.get_ticket(42).await;
/// ```
#[derive(Clone)]
pub struct GlpiClient {
    /// Sends requests (cloning is cheap).
    executor: Executor,

    /// Opens and closes sessions around each operation.
    sessions: SessionManager,

    /// User appended as observer by `associate_user`.
    observer_user_id: u64,
}

impl GlpiClient {
    /// Creates a new GLPI client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::HttpClient` if the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let executor = Executor::new(config)?;
        Ok(Self {
            sessions: SessionManager::new(executor.clone()),
            executor,
            observer_user_id: config.observer_user_id,
        })
    }

    /// Sanitizes an error for display, removing configured tokens.
    pub fn sanitize_error(&self, error: &GatewayError) -> String {
        self.executor.sanitize(&error.to_string(), &[])
    }

    /// Tests connectivity by opening and closing a session.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::SessionAcquisition` if no session could be opened.
    pub async fn test_connection(&self) -> Result<(), GatewayError> {
        tracing::debug!("Testing connection to GLPI");
        self.sessions.with_session("test_connection", |_| async {}).await?;
        tracing::info!("Connection test successful");
        Ok(())
    }

    /// Validates that an itemtype is a plain identifier.
    ///
    /// Itemtypes are interpolated into URL paths, so anything beyond
    /// `[A-Za-z0-9_]` is refused.
    fn validate_itemtype(itemtype: &str) -> Result<(), GatewayError> {
        if itemtype.is_empty()
            || !itemtype
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(GatewayError::validation(format!(
                "itemtype must be an identifier such as Ticket or Ticket_User, got: {:?}",
                itemtype.chars().take(50).collect::<String>()
            )));
        }
        Ok(())
    }

    /// Validates that an id is positive.
    fn validate_id(id: u64, field_name: &str) -> Result<(), GatewayError> {
        if id == 0 {
            return Err(GatewayError::validation(format!(
                "{} must be a positive integer",
                field_name
            )));
        }
        Ok(())
    }

    /// Runs one request built by `build` inside a fresh session.
    async fn run<F>(&self, operation: &str, build: F) -> ResponseEnvelope
    where
        F: FnOnce(SessionToken) -> ApiRequest,
    {
        let executor = &self.executor;
        let result = self
            .sessions
            .with_session(operation, |token| {
                let request = build(token);
                async move { executor.execute(&request).await }
            })
            .await;

        match result {
            Ok(envelope) => {
                if let Some(error) = &envelope.error {
                    tracing::error!(operation = operation, error = %error, "GLPI operation failed");
                }
                envelope
            }
            Err(e) => ResponseEnvelope::failure(self.sanitize_error(&e)),
        }
    }

    /// Reports a local failure as an envelope.
    fn rejected(&self, operation: &str, error: GatewayError) -> ResponseEnvelope {
        let message = self.sanitize_error(&error);
        tracing::warn!(operation = operation, error = %message, "Rejected before sending");
        ResponseEnvelope::failure(message)
    }

    /// Creates a ticket.
    ///
    /// Sends `POST Ticket/` with `{"input": {"name", "content", "priority"}}`.
    pub async fn create_ticket(&self, ticket: &Ticket) -> ResponseEnvelope {
        let input = match serde_json::to_value(ticket) {
            Ok(input) => input,
            Err(e) => return self.rejected("create_ticket", e.into()),
        };

        self.run("create_ticket", |token| {
            ApiRequest::new(Method::POST, format!("{}/", TICKET_ITEMTYPE), token)
                .with_json(json!({ "input": input }))
        })
        .await
    }

    /// Builds the association list sent by [`associate_user`](Self::associate_user):
    /// the requested association followed by the configured observer.
    pub fn association_payload(
        &self,
        ticket_id: u64,
        user_id: u64,
        participation: ParticipationType,
    ) -> Vec<TicketUser> {
        vec![
            TicketUser {
                tickets_id: ticket_id,
                users_id: user_id,
                kind: participation,
            },
            TicketUser {
                tickets_id: ticket_id,
                users_id: self.observer_user_id,
                kind: ParticipationType::Observer,
            },
        ]
    }

    /// Associates a user with a ticket.
    ///
    /// The configured observer user (`GLPI_OBSERVER_USER_ID`) is always added
    /// to the same ticket as an observer in the same request.
    pub async fn associate_user(
        &self,
        ticket_id: u64,
        user_id: u64,
        participation: ParticipationType,
    ) -> ResponseEnvelope {
        if let Err(e) = Self::validate_id(ticket_id, "ticket_id")
            .and_then(|_| Self::validate_id(user_id, "user_id"))
        {
            return self.rejected("associate_user", e);
        }

        let input = match serde_json::to_value(self.association_payload(
            ticket_id,
            user_id,
            participation,
        )) {
            Ok(input) => input,
            Err(e) => return self.rejected("associate_user", e.into()),
        };

        self.run("associate_user", |token| {
            ApiRequest::new(Method::POST, format!("{}/", TICKET_USER_ITEMTYPE), token)
                .with_json(json!({ "input": input }))
        })
        .await
    }

    /// Searches items of `itemtype` matching `criteria`.
    ///
    /// Unlike the other operations this one fails hard: anything other than
    /// a 2xx answer is returned as an error.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Validation` for a malformed itemtype
    /// - `GatewayError::SessionAcquisition` if no session could be opened
    /// - `GatewayError::Transport` if no response was received
    /// - `GatewayError::RemoteStatus` for a non-2xx response
    pub async fn search(
        &self,
        itemtype: &str,
        criteria: &[Criterion],
    ) -> Result<Value, GatewayError> {
        Self::validate_itemtype(itemtype)?;
        let compiled = criteria::compile(criteria);
        self.search_compiled(itemtype, compiled).await
    }

    /// Searches with criteria given as loosely-typed JSON.
    ///
    /// # Errors
    ///
    /// As [`search`](Self::search), plus `GatewayError::CriteriaShape` for
    /// malformed criteria, raised before any network call.
    pub async fn search_json(&self, itemtype: &str, criteria: &Value) -> Result<Value, GatewayError> {
        Self::validate_itemtype(itemtype)?;
        let compiled = criteria::compile_json(criteria)?;
        self.search_compiled(itemtype, compiled).await
    }

    async fn search_compiled(
        &self,
        itemtype: &str,
        compiled: CompiledCriteria,
    ) -> Result<Value, GatewayError> {
        let path = format!("search/{}", itemtype);
        let query = compiled.to_query_pairs();
        let operation = format!("GET {}", path);

        let executor = &self.executor;
        let envelope = self
            .sessions
            .with_session("search", |token| {
                let request = ApiRequest::new(Method::GET, path, token).with_query(query);
                async move { executor.execute(&request).await }
            })
            .await?;

        if let Some(error) = envelope.error {
            return Err(GatewayError::transport(operation, error));
        }
        if !envelope.is_success() {
            let body = self.executor.sanitize(&envelope.body_text(), &[]);
            let status = envelope.status_code.unwrap_or_default();
            tracing::error!(operation = %operation, status = status, "GLPI search failed");
            return Err(GatewayError::RemoteStatus { status, body });
        }

        Ok(envelope.body.unwrap_or(Value::Null))
    }

    /// Fetches a single item by id (`GET {itemtype}/{id}`).
    pub async fn fetch_by_id(&self, itemtype: &str, id: u64) -> ResponseEnvelope {
        if let Err(e) = Self::validate_itemtype(itemtype).and_then(|_| Self::validate_id(id, "id")) {
            return self.rejected("fetch_by_id", e);
        }

        self.run("fetch_by_id", |token| {
            ApiRequest::new(Method::GET, format!("{}/{}", itemtype, id), token)
        })
        .await
    }

    /// Fetches a ticket by id.
    pub async fn get_ticket(&self, ticket_id: u64) -> ResponseEnvelope {
        self.fetch_by_id(TICKET_ITEMTYPE, ticket_id).await
    }

    /// Fetches a user by id.
    pub async fn get_user(&self, user_id: u64) -> ResponseEnvelope {
        self.fetch_by_id(USER_ITEMTYPE, user_id).await
    }

    /// Lists the search options (valid `field` ids) of an itemtype.
    pub async fn list_search_options(&self, itemtype: &str) -> ResponseEnvelope {
        if let Err(e) = Self::validate_itemtype(itemtype) {
            return self.rejected("list_search_options", e);
        }

        self.run("list_search_options", |token| {
            ApiRequest::new(Method::POST, format!("listSearchOptions/{}", itemtype), token)
        })
        .await
    }

    /// Adds one or more items of any itemtype (`POST {itemtype}/`).
    ///
    /// A JSON payload may be an object or an array of objects to add several
    /// items at once. An upload payload creates e.g. a `Document` from files.
    pub async fn add_item(&self, itemtype: &str, payload: AddPayload) -> ResponseEnvelope {
        if let Err(e) = Self::validate_itemtype(itemtype) {
            return self.rejected("add_item", e);
        }

        tracing::debug!(itemtype = itemtype, content_type = payload.content_type(), "add_item");
        let body = payload.into_body();

        self.run("add_item", |token| {
            ApiRequest::new(Method::POST, format!("{}/", itemtype), token).with_body(body)
        })
        .await
    }
}
