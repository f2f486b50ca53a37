//! Tool input parameter structs for MCP tools.
//!
//! This module defines the input types for each MCP tool, with
//! JSON Schema derivation for MCP tool discovery.
//!
//! # Input Sanitization
//!
//! All input structs with string fields implement `sanitize()` which trims
//! whitespace. This should be called before processing input.

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

use crate::error::GatewayError;
use crate::models::{ParticipationType, Priority, Ticket};

fn default_participation_type() -> u8 {
    ParticipationType::Requester.code()
}

/// Input parameters for the create_ticket tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTicketInput {
    /// Ticket title (required).
    pub title: String,

    /// Detailed description of the problem (HTML allowed).
    pub description: String,

    /// Priority from 1 (very low) to 5 (very high), or 6 (major).
    pub priority: u8,
}

impl CreateTicketInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            priority: self.priority,
        }
    }

    /// Validates the input and builds the ticket to create.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Validation` for an empty title or a priority
    /// outside 1-6.
    pub fn to_ticket(&self) -> Result<Ticket, GatewayError> {
        if self.title.is_empty() {
            return Err(GatewayError::validation("title is required and cannot be empty"));
        }
        Ok(Ticket {
            name: self.title.clone(),
            content: self.description.clone(),
            priority: Priority::new(self.priority)?,
        })
    }
}

/// Input parameters for the associate_user tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AssociateUserInput {
    /// Id of an existing ticket.
    pub ticket_id: u64,

    /// Id of the user to add to the ticket.
    pub user_id: u64,

    /// 1 = requester (default), 2 = assigned technician, 3 = observer.
    #[serde(default = "default_participation_type")]
    pub participation_type: u8,
}

impl AssociateUserInput {
    /// Parses the participation type.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Validation` for codes other than 1, 2 or 3.
    pub fn participation(&self) -> Result<ParticipationType, GatewayError> {
        ParticipationType::from_code(self.participation_type)
    }
}

/// Input parameters for the lookup_user_by_phone tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LookupUserByPhoneInput {
    /// Mobile number as stored in GLPI (SQL `LIKE` wildcards `%` and `_` allowed).
    pub phone: String,
}

impl LookupUserByPhoneInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            phone: self.phone.trim().to_string(),
        }
    }
}

/// Input parameters for the search_items tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchItemsInput {
    /// Itemtype to search, e.g. "Ticket" or "User".
    pub itemtype: String,

    /// List of criteria. A criterion is either
    /// `{"link"?, "field", "searchtype", "value"}` or a group
    /// `{"link"?, "criteria": [...]}`. Omit to list everything.
    #[serde(default)]
    pub criteria: Value,
}

impl SearchItemsInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            itemtype: self.itemtype.trim().to_string(),
            criteria: self.criteria,
        }
    }
}

/// Input parameters for the get_ticket tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetTicketInput {
    /// The ticket id.
    pub ticket_id: u64,
}

/// Input parameters for the get_user tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetUserInput {
    /// The user id.
    pub user_id: u64,
}

/// Input parameters for the list_search_options tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListSearchOptionsInput {
    /// Itemtype whose search options to list, e.g. "Ticket".
    pub itemtype: String,
}

impl ListSearchOptionsInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            itemtype: self.itemtype.trim().to_string(),
        }
    }
}

/// Input parameters for the add_item tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddItemInput {
    /// Itemtype to create, e.g. "ITILFollowup" or "Ticket_User".
    pub itemtype: String,

    /// Fields of the new item, or an array of them to add several at once.
    pub input: Value,
}

impl AddItemInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            itemtype: self.itemtype.trim().to_string(),
            input: self.input,
        }
    }

    /// Checks that `input` is an object or a non-empty array of objects.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Validation` otherwise.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let valid = match &self.input {
            Value::Object(_) => true,
            Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_object),
            _ => false,
        };
        if !valid {
            return Err(GatewayError::validation(
                "input must be an object or a non-empty array of objects",
            ));
        }
        Ok(())
    }
}
