//! # GLPI Gateway
//!
//! An MCP (Model Context Protocol) server in front of the GLPI service desk.
//!
//! It exposes GLPI ticketing operations as MCP tools: creating tickets,
//! adding people to them, searching and reading items, and identifying a
//! caller by phone number.
//!
//! ## Features
//!
//! - **Scoped sessions**: every operation opens its own GLPI session and
//!   closes it on every exit path, including cancellation
//! - **Uniform results**: HTTP-backed operations return a
//!   [`ResponseEnvelope`](models::ResponseEnvelope) instead of failing
//! - **Nested search criteria**: criterion trees are flattened into GLPI's
//!   bracketed query keys
//! - **Phone lookup**: active users are matched by mobile number straight
//!   from the GLPI database
//! - **Security**: tokens are never logged or exposed in error messages
//!
//! ## Architecture
//!
//! - [`config`] - Configuration loading from environment variables
//! - [`error`] - Error types with token sanitization
//! - [`executor`] - Sends one HTTP request and normalizes the outcome
//! - [`session`] - Session acquisition and guaranteed release
//! - [`criteria`] - Criteria compiler for the search endpoint
//! - [`glpi_client`] - One method per GLPI operation
//! - [`directory`] - Phone lookup against the GLPI database
//! - [`server`] - MCP server implementation with tool routing
//! - [`models`] - Envelope, criterion and ticket types
//! - [`tools`] - Tool input parameter structs
//!
//! ## Configuration
//!
//! Required:
//!
//! - `GLPI_API_URL`: Base URL of the REST API (e.g. `https://glpi.example.com/apirest.php`)
//! - `GLPI_APP_TOKEN`: Application token
//! - `GLPI_USER_TOKEN`: User token used to open sessions
//!
//! Optional:
//!
//! - `GLPI_OBSERVER_USER_ID`: User added as observer by `associate_user` (default 2)
//! - `GLPI_TIMEOUT_SECS`, `GLPI_CONNECT_TIMEOUT_SECS`: HTTP timeouts
//! - `GLPI_HOST`, `GLPI_PORT`, `GLPI_USER`, `GLPI_PWD`, `GLPI_DATABASE`,
//!   `GLPI_DB_POOL_SIZE`: database used by the phone lookup
//! - `RUST_LOG`: Log level (e.g., `glpi_gateway=debug`)
//!
//! ## Example
//!
//! ```ignore
//! use glpi_gateway::config::Config;
//! use glpi_gateway::glpi_client::GlpiClient;
//! use glpi_gateway::models::{Criterion, SearchType};
//!
//! async fn example() -> Result<(), glpi_gateway::error::GatewayError> {
//!     let config = Config::from_env()?;
//!     let client = GlpiClient::new(&config)?;
//!
//!     let criteria = vec![Criterion::leaf(12i64, SearchType::Equals, "notold")];
//!     let results = client.search("Ticket", &criteria).await?;
//!     println!("{}", results["totalcount"]);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod criteria;
pub mod directory;
pub mod error;
pub mod executor;
pub mod glpi_client;
pub mod models;
pub mod server;
pub mod session;
pub mod tools;
