//! GLPI Gateway - MCP server for the GLPI service desk
//!
//! This binary runs as an MCP server using stdio transport, so an MCP host
//! can work with GLPI tickets through tool calls.
//!
//! # Configuration
//!
//! Set the following environment variables (or use a `.env` file):
//!
//! - `GLPI_API_URL`: Base URL of the GLPI REST API
//! - `GLPI_APP_TOKEN`: Application token
//! - `GLPI_USER_TOKEN`: User token
//! - `GLPI_HOST`, `GLPI_USER`, `GLPI_PWD`, `GLPI_DATABASE`: optional, enables the phone lookup
//!
//! # Usage
//!
//! ```bash
//! GLPI_API_URL=https://glpi.example.com/apirest.php \
//! GLPI_APP_TOKEN=xxx GLPI_USER_TOKEN=yyy ./glpi-gateway
//! ```

use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::{fmt, EnvFilter};

use glpi_gateway::{config, directory::UserDirectory, glpi_client, server};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // stdout is reserved for MCP JSON-RPC messages
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("glpi_gateway=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting GLPI gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::from_env().context("Failed to load configuration")?;

    tracing::debug!(
        api_url = %config.api_url,
        observer_user_id = config.observer_user_id,
        "Configuration loaded"
    );

    let client = glpi_client::GlpiClient::new(&config).context("Failed to create GLPI client")?;

    tracing::info!("Testing connection to GLPI...");
    if let Err(e) = client.test_connection().await {
        tracing::error!(error = %client.sanitize_error(&e), "Connection test failed");
        tracing::warn!(
            "Server will start but may not be able to reach GLPI. \
             Check GLPI_API_URL, the tokens and network connectivity."
        );
    }

    let directory = match &config.database {
        Some(database) => Some(UserDirectory::connect_lazy(database, config.connect_timeout)),
        None => {
            tracing::warn!("GLPI_HOST not set; lookup_user_by_phone will report it is not configured");
            None
        }
    };

    let server = server::GatewayServer::new(client, directory);

    tracing::info!("Server initialized, starting stdio transport");

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })
        .context("Failed to start server")?;

    tracing::info!("Server running, waiting for requests");

    service
        .waiting()
        .await
        .context("Server error during operation")?;

    tracing::info!("Server shutting down");

    Ok(())
}
