//! Phone lookup against the GLPI database.
//!
//! This path bypasses the REST API and its sessions entirely: it reads
//! `glpi_users` through a bounded MySQL pool shared by all calls.

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::config::DatabaseConfig;
use crate::error::GatewayError;
use crate::models::{DirectoryUser, ResponseEnvelope};

/// First active user whose mobile number matches the bound pattern.
const FIND_BY_MOBILE_SQL: &str = "\
    SELECT CAST(id AS SIGNED) AS id, name, CONCAT(firstname, ' ', realname) AS full_name \
    FROM glpi_users \
    WHERE is_active = 1 AND mobile LIKE ? \
    ORDER BY id \
    LIMIT 1";

/// Read access to GLPI users by phone number.
#[derive(Clone)]
pub struct UserDirectory {
    pool: MySqlPool,
}

impl UserDirectory {
    /// Creates the pool without opening a connection.
    ///
    /// Connections are opened on first use, so an unreachable database
    /// does not prevent startup. Must be called inside a Tokio runtime.
    pub fn connect_lazy(config: &DatabaseConfig, acquire_timeout: Duration) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password())
            .database(&config.database)
            .charset("utf8mb4")
            .collation("utf8mb4_general_ci");

        let pool = MySqlPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(options);

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            pool_size = config.pool_size,
            "User directory configured"
        );

        Self { pool }
    }

    /// Finds the first active user whose `mobile` matches `phone`.
    ///
    /// `phone` is bound as a `LIKE` pattern, so `%` and `_` act as wildcards.
    ///
    /// # Errors
    ///
    /// - `GatewayError::LookupNotFound` if no active user matches
    /// - `GatewayError::Database` if the query cannot run
    pub async fn find_active_by_mobile(&self, phone: &str) -> Result<DirectoryUser, GatewayError> {
        let user: Option<DirectoryUser> = sqlx::query_as(FIND_BY_MOBILE_SQL)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;

        user.ok_or_else(|| GatewayError::LookupNotFound {
            phone: phone.to_string(),
        })
    }
}

/// Looks up a user by phone and reports the outcome as an envelope.
///
/// `directory` is `None` when no database is configured.
pub async fn lookup_user_by_phone(
    directory: Option<&UserDirectory>,
    phone: &str,
) -> ResponseEnvelope {
    let phone = phone.trim();
    let result = if phone.is_empty() {
        Err(GatewayError::validation("phone is required and cannot be empty"))
    } else {
        match directory {
            Some(directory) => directory.find_active_by_mobile(phone).await,
            None => Err(GatewayError::LookupUnavailable),
        }
    };
    lookup_envelope(result)
}

/// Maps a lookup outcome to the envelope returned to callers.
///
/// A match is `200` with `{id, name, full_name}`; no match is `404` with an
/// error; any other failure has no status.
pub fn lookup_envelope(result: Result<DirectoryUser, GatewayError>) -> ResponseEnvelope {
    match result {
        Ok(user) => match serde_json::to_value(&user) {
            Ok(body) => ResponseEnvelope::local(200, body),
            Err(e) => ResponseEnvelope::failure(GatewayError::from(e).to_string()),
        },
        Err(e @ GatewayError::LookupNotFound { .. }) => {
            tracing::info!(error = %e, "Phone lookup found no user");
            ResponseEnvelope::local_error(404, e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Phone lookup failed");
            ResponseEnvelope::failure(e.to_string())
        }
    }
}
