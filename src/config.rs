//! Configuration management for the GLPI gateway.
//!
//! This module handles loading configuration from environment variables,
//! with validation to ensure all required values are present. The resulting
//! [`Config`] is built once at startup and handed to every component by
//! reference.

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::GatewayError;

/// Default read timeout for GLPI REST calls, in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout for GLPI REST calls, in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// User appended as observer on every ticket association unless overridden.
pub const DEFAULT_OBSERVER_USER_ID: u64 = 2;

/// Default MySQL port.
const DEFAULT_DB_PORT: u16 = 3306;

/// Default upper bound on pooled database connections.
const DEFAULT_DB_POOL_SIZE: u32 = 5;

/// Configuration for connecting to GLPI.
///
/// The tokens are stored but never logged or exposed in error messages.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the GLPI REST API (e.g., `https://glpi.example.com/apirest.php`).
    pub api_url: String,

    /// Application token identifying this integration (`App-Token` header).
    app_token: String,

    /// Long-lived user token used to open sessions (`Authorization` header).
    user_token: String,

    /// User attached as observer by `associate_user`.
    pub observer_user_id: u64,

    /// Read timeout applied to every REST call, session calls included.
    pub request_timeout: Duration,

    /// Connect timeout applied to every REST call.
    pub connect_timeout: Duration,

    /// Database used by the phone lookup; `None` disables that tool.
    pub database: Option<DatabaseConfig>,
}

/// Connection settings for the GLPI MySQL database.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database user.
    pub user: String,
    /// Database password (may be empty).
    password: String,
    /// Schema name.
    pub database: String,
    /// Maximum number of pooled connections.
    pub pool_size: u32,
}

impl DatabaseConfig {
    /// Returns the database password.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `GLPI_API_URL`: Base URL of the GLPI REST API
    /// - `GLPI_APP_TOKEN`: Application token
    /// - `GLPI_USER_TOKEN`: User token used to open sessions
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if any required variable is missing
    /// or if values fail validation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// dotenvy::dotenv().ok();
    /// let config = Config::from_env()?;
    /// ```
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_source(|name| env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_source<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = required(&lookup, "GLPI_API_URL")?;
        let app_token = required(&lookup, "GLPI_APP_TOKEN")?;
        let user_token = required(&lookup, "GLPI_USER_TOKEN")?;

        let api_url = Self::validate_api_url(api_url)?;
        Self::validate_token("GLPI_APP_TOKEN", &app_token)?;
        Self::validate_token("GLPI_USER_TOKEN", &user_token)?;

        let observer_user_id =
            parsed(&lookup, "GLPI_OBSERVER_USER_ID")?.unwrap_or(DEFAULT_OBSERVER_USER_ID);
        let request_timeout = Duration::from_secs(
            parsed(&lookup, "GLPI_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS),
        );
        let connect_timeout = Duration::from_secs(
            parsed(&lookup, "GLPI_CONNECT_TIMEOUT_SECS")?.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        );

        let database = Self::database_from_source(&lookup)?;

        Ok(Config {
            api_url,
            app_token,
            user_token,
            observer_user_id,
            request_timeout,
            connect_timeout,
            database,
        })
    }

    /// Creates a configuration directly, with defaults for everything optional.
    pub fn new(
        api_url: impl Into<String>,
        app_token: impl Into<String>,
        user_token: impl Into<String>,
    ) -> Self {
        Config {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            app_token: app_token.into(),
            user_token: user_token.into(),
            observer_user_id: DEFAULT_OBSERVER_USER_ID,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            database: None,
        }
    }

    /// Returns the application token.
    pub fn app_token(&self) -> &str {
        &self.app_token
    }

    /// Returns the user token.
    pub fn user_token(&self) -> &str {
        &self.user_token
    }

    /// The database section is enabled by `GLPI_HOST`; user and schema then become mandatory.
    fn database_from_source<F>(lookup: &F) -> Result<Option<DatabaseConfig>, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(host) = optional(lookup, "GLPI_HOST") else {
            return Ok(None);
        };

        let pool_size = parsed(lookup, "GLPI_DB_POOL_SIZE")?.unwrap_or(DEFAULT_DB_POOL_SIZE);
        if pool_size == 0 {
            return Err(GatewayError::invalid_config(
                "GLPI_DB_POOL_SIZE must be at least 1",
            ));
        }

        Ok(Some(DatabaseConfig {
            host,
            port: parsed(lookup, "GLPI_PORT")?.unwrap_or(DEFAULT_DB_PORT),
            user: required(lookup, "GLPI_USER")?,
            password: lookup("GLPI_PWD").unwrap_or_default(),
            database: required(lookup, "GLPI_DATABASE")?,
            pool_size,
        }))
    }

    /// Validates and normalizes the API URL.
    fn validate_api_url(url: String) -> Result<String, GatewayError> {
        let url = url.trim().trim_end_matches('/').to_string();

        let parsed = Url::parse(&url).map_err(|e| {
            GatewayError::invalid_config(format!("GLPI_API_URL is not a valid URL: {}", e))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(GatewayError::invalid_config(
                "GLPI_API_URL must start with http:// or https://",
            ));
        }

        Ok(url)
    }

    /// Validates a token is not a placeholder value.
    fn validate_token(name: &str, token: &str) -> Result<(), GatewayError> {
        let token_lower = token.to_lowercase();
        let placeholder_patterns = ["your_token", "your_app_token", "placeholder", "xxx", "changeme"];

        for pattern in placeholder_patterns {
            if token_lower.contains(pattern) {
                return Err(GatewayError::invalid_config(format!(
                    "{} appears to be a placeholder value",
                    name
                )));
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("observer_user_id", &self.observer_user_id)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// Gets a variable, treating blank values as absent.
fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Gets a required variable, returning an error if missing or empty.
fn required<F>(lookup: &F, name: &str) -> Result<String, GatewayError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, name).ok_or_else(|| GatewayError::missing_env(name))
}

/// Gets and parses an optional variable.
fn parsed<F, T>(lookup: &F, name: &str) -> Result<Option<T>, GatewayError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    optional(lookup, name)
        .map(|value| {
            value.parse::<T>().map_err(|_| {
                GatewayError::invalid_config(format!("{} has an invalid value: {:?}", name, value))
            })
        })
        .transpose()
}
