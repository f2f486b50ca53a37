//! MCP server implementation for the GLPI gateway.
//!
//! This module defines the `GatewayServer` struct that implements the MCP
//! `ServerHandler` trait, exposing GLPI operations as tools.
//!
//! HTTP-backed tools answer with the response envelope serialized as JSON,
//! whether GLPI accepted the call or not. Tool errors are reserved for
//! invalid arguments and for `search_items`, which fails on any non-2xx answer.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};

use crate::directory::{self, UserDirectory};
use crate::error::GatewayError;
use crate::glpi_client::{AddPayload, GlpiClient};
use crate::models::ResponseEnvelope;
use crate::tools::{
    AddItemInput, AssociateUserInput, CreateTicketInput, GetTicketInput, GetUserInput,
    ListSearchOptionsInput, LookupUserByPhoneInput, SearchItemsInput,
};

/// The GLPI gateway MCP server.
#[derive(Clone)]
pub struct GatewayServer {
    /// GLPI client for API operations.
    client: GlpiClient,
    /// Phone lookup; `None` when no database is configured.
    directory: Option<UserDirectory>,
    /// Tool router for MCP tool dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl GatewayServer {
    /// Creates a new server instance.
    ///
    /// # Arguments
    ///
    /// * `client` - The GLPI client for API operations
    /// * `directory` - The phone lookup, if a database is configured
    pub fn new(client: GlpiClient, directory: Option<UserDirectory>) -> Self {
        Self {
            client,
            directory,
            tool_router: Self::tool_router(),
        }
    }

    /// Returns "pong" so callers can check the server is up.
    #[tool(description = "Test connectivity to the GLPI gateway. Returns 'pong' if the server is running.")]
    fn ping(&self) -> String {
        tracing::debug!("ping tool called");
        "pong".to_string()
    }

    /// Create a GLPI ticket.
    #[tool(description = "Create a GLPI ticket with a title, a description and a priority from 1 to 6. Returns the response envelope; on success the body holds the new ticket id.")]
    async fn create_ticket(
        &self,
        Parameters(input): Parameters<CreateTicketInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(title = %input.title, priority = input.priority, "create_ticket tool called");

        let ticket = input.to_ticket().map_err(|e| self.reject("create_ticket", &e))?;
        Ok(format_envelope(&self.client.create_ticket(&ticket).await))
    }

    /// Add a user to a ticket.
    #[tool(description = "Associate a user with an existing ticket. participation_type: 1 = requester (default), 2 = assigned technician, 3 = observer. The configured observer user is always added as well.")]
    async fn associate_user(
        &self,
        Parameters(input): Parameters<AssociateUserInput>,
    ) -> Result<String, String> {
        tracing::debug!(
            ticket_id = input.ticket_id,
            user_id = input.user_id,
            participation_type = input.participation_type,
            "associate_user tool called"
        );

        let participation = input
            .participation()
            .map_err(|e| self.reject("associate_user", &e))?;
        let envelope = self
            .client
            .associate_user(input.ticket_id, input.user_id, participation)
            .await;
        Ok(format_envelope(&envelope))
    }

    /// Find a user by mobile number.
    #[tool(description = "Identify an active GLPI user by mobile phone number. Returns {id, name, full_name} with status 200, or status 404 if no active user matches.")]
    async fn lookup_user_by_phone(
        &self,
        Parameters(input): Parameters<LookupUserByPhoneInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!("lookup_user_by_phone tool called");

        let envelope = directory::lookup_user_by_phone(self.directory.as_ref(), &input.phone).await;
        Ok(format_envelope(&envelope))
    }

    /// Search items of one itemtype.
    #[tool(description = "Search GLPI items of an itemtype (e.g. Ticket, User). Criteria are a list of {link?, field, searchtype, value} or nested groups {link?, criteria: [...]}; use list_search_options for field ids. Fails if GLPI does not answer with 2xx.")]
    async fn search_items(
        &self,
        Parameters(input): Parameters<SearchItemsInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(itemtype = %input.itemtype, "search_items tool called");

        let body = self
            .client
            .search_json(&input.itemtype, &input.criteria)
            .await
            .map_err(|e| {
                let sanitized = self.client.sanitize_error(&e);
                if e.is_local() {
                    tracing::warn!(error = %sanitized, itemtype = %input.itemtype, "Search rejected");
                } else {
                    tracing::error!(error = %sanitized, itemtype = %input.itemtype, "Search failed");
                }
                format!("Search of {} failed: {}", input.itemtype, sanitized)
            })?;

        Ok(format_json(&body))
    }

    /// Get a ticket by id.
    #[tool(description = "Get a GLPI ticket by id. Returns the response envelope.")]
    async fn get_ticket(
        &self,
        Parameters(input): Parameters<GetTicketInput>,
    ) -> Result<String, String> {
        tracing::debug!(ticket_id = input.ticket_id, "get_ticket tool called");
        Ok(format_envelope(&self.client.get_ticket(input.ticket_id).await))
    }

    /// Get a user by id.
    #[tool(description = "Get a GLPI user by id. Returns the response envelope.")]
    async fn get_user(&self, Parameters(input): Parameters<GetUserInput>) -> Result<String, String> {
        tracing::debug!(user_id = input.user_id, "get_user tool called");
        Ok(format_envelope(&self.client.get_user(input.user_id).await))
    }

    /// List the search options of an itemtype.
    #[tool(description = "List the search options of a GLPI itemtype. The keys of the returned body are the field ids usable in search_items criteria.")]
    async fn list_search_options(
        &self,
        Parameters(input): Parameters<ListSearchOptionsInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(itemtype = %input.itemtype, "list_search_options tool called");
        Ok(format_envelope(
            &self.client.list_search_options(&input.itemtype).await,
        ))
    }

    /// Add items of any itemtype.
    #[tool(description = "Add one item (object) or several (array of objects) of any GLPI itemtype, e.g. an ITILFollowup on a ticket. Returns the response envelope.")]
    async fn add_item(&self, Parameters(input): Parameters<AddItemInput>) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(itemtype = %input.itemtype, "add_item tool called");

        input.validate().map_err(|e| self.reject("add_item", &e))?;
        let envelope = self
            .client
            .add_item(&input.itemtype, AddPayload::Json(input.input))
            .await;
        Ok(format_envelope(&envelope))
    }

    /// Formats an argument error as a tool error.
    fn reject(&self, tool: &str, error: &GatewayError) -> String {
        let sanitized = self.client.sanitize_error(error);
        tracing::warn!(tool = tool, error = %sanitized, "Invalid tool arguments");
        format!("Invalid arguments for {}: {}", tool, sanitized)
    }
}

#[tool_handler]
impl ServerHandler for GatewayServer {
    /// Returns server information for the MCP initialize handshake.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "GLPI gateway. Create tickets with create_ticket, add people to them with \
                 associate_user, and identify callers with lookup_user_by_phone. \
                 Use list_search_options to find field ids, then search_items to query, \
                 get_ticket / get_user to read, and add_item for anything else \
                 (e.g. follow-ups). Results are envelopes with status_code, body and error. \
                 Start with 'ping' to verify connectivity."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Serializes an envelope for a tool response.
fn format_envelope(envelope: &ResponseEnvelope) -> String {
    serde_json::to_string_pretty(envelope).unwrap_or_else(|e| {
        format!(r#"{{"status_code": null, "error": "failed to encode response: {}"}}"#, e)
    })
}

/// Serializes a JSON body for a tool response.
fn format_json(body: &serde_json::Value) -> String {
    serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_server(base_url: &str) -> GatewayServer {
        let config = Config::new(base_url, "app_tok", "user_tok");
        GatewayServer::new(GlpiClient::new(&config).expect("client"), None)
    }

    async fn mount_session(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/initSession/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"session_token": "sess_abc"})),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/killSession"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    #[test]
    fn test_server_info_has_tools_capability() {
        let server = test_server("https://glpi.example.com/apirest.php");
        let info = server.get_info();
        assert!(info.instructions.is_some());
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn test_ping_tool_returns_pong() {
        let server = test_server("https://glpi.example.com/apirest.php");
        assert_eq!(server.ping(), "pong");
    }

    #[test]
    fn test_format_envelope_omits_empty_fields() {
        let text = format_envelope(&ResponseEnvelope::local(200, json!({"id": 1})));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"status_code": 200, "body": {"id": 1}}));
    }

    #[tokio::test]
    async fn test_create_ticket_rejects_bad_priority() {
        let server = test_server("https://glpi.example.com/apirest.php");
        let input = CreateTicketInput {
            title: "VPN down".to_string(),
            description: String::new(),
            priority: 9,
        };
        let err = server.create_ticket(Parameters(input)).await.unwrap_err();
        assert!(err.contains("priority"));
    }

    #[tokio::test]
    async fn test_lookup_without_database() {
        let server = test_server("https://glpi.example.com/apirest.php");
        let text = server
            .lookup_user_by_phone(Parameters(LookupUserByPhoneInput {
                phone: "5511999990000".to_string(),
            }))
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["status_code"], Value::Null);
        assert!(value["error"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_get_ticket_returns_envelope_on_remote_error() {
        let mock = MockServer::start().await;
        mount_session(&mock).await;
        Mock::given(method("GET"))
            .and(path("/Ticket/5"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!(["ERROR_ITEM_NOT_FOUND", ""])))
            .mount(&mock)
            .await;

        let text = test_server(&mock.uri())
            .get_ticket(Parameters(GetTicketInput { ticket_id: 5 }))
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["status_code"], 404);
        assert_eq!(value["body"][0], "ERROR_ITEM_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_search_items_fails_on_remote_error() {
        let mock = MockServer::start().await;
        mount_session(&mock).await;
        Mock::given(method("GET"))
            .and(path("/search/Ticket"))
            .respond_with(ResponseTemplate::new(401).set_body_string("denied user_tok"))
            .mount(&mock)
            .await;

        let err = test_server(&mock.uri())
            .search_items(Parameters(SearchItemsInput {
                itemtype: "Ticket".to_string(),
                criteria: Value::Null,
            }))
            .await
            .unwrap_err();
        assert!(err.contains("HTTP 401"));
        assert!(!err.contains("user_tok"));
    }

    #[tokio::test]
    async fn test_add_item_rejects_scalar_input() {
        let server = test_server("https://glpi.example.com/apirest.php");
        let err = server
            .add_item(Parameters(AddItemInput {
                itemtype: "ITILFollowup".to_string(),
                input: json!(42),
            }))
            .await
            .unwrap_err();
        assert!(err.contains("add_item"));
    }
}
