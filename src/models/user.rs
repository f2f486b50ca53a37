//! Users read directly from the GLPI database.

use serde::Serialize;

/// An active GLPI user matched by the phone lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DirectoryUser {
    /// User id.
    pub id: i64,

    /// Login name.
    pub name: Option<String>,

    /// First name and real name joined by a space; `None` if either is unset.
    pub full_name: Option<String>,
}
