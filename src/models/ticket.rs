//! Ticket and ticket-user descriptors sent to GLPI.

use serde::{Serialize, Serializer};

use crate::error::GatewayError;

/// Ticket priority, 1 (planned) through 6 (critical).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority ("planned").
    pub const MIN: u8 = 1;
    /// Highest priority ("critical").
    pub const MAX: u8 = 6;

    /// Creates a priority, rejecting values outside 1-6.
    pub fn new(value: u8) -> Result<Self, GatewayError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(GatewayError::validation(format!(
                "priority must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    /// Returns the numeric priority.
    pub fn value(self) -> u8 {
        self.0
    }
}

/// Fields accepted when creating a ticket.
///
/// Serializes to the `input` object of `POST Ticket/`.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    /// Ticket title.
    pub name: String,
    /// Ticket description.
    pub content: String,
    /// Ticket priority.
    pub priority: Priority,
}

/// How a user takes part in a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticipationType {
    /// Requester (1).
    #[default]
    Requester,
    /// Assigned technician (2).
    Assigned,
    /// Observer (3).
    Observer,
}

impl ParticipationType {
    /// Returns the GLPI numeric code.
    pub fn code(self) -> u8 {
        match self {
            ParticipationType::Requester => 1,
            ParticipationType::Assigned => 2,
            ParticipationType::Observer => 3,
        }
    }

    /// Parses a GLPI numeric code.
    pub fn from_code(code: u8) -> Result<Self, GatewayError> {
        match code {
            1 => Ok(ParticipationType::Requester),
            2 => Ok(ParticipationType::Assigned),
            3 => Ok(ParticipationType::Observer),
            other => Err(GatewayError::validation(format!(
                "participation_type must be 1 (requester), 2 (assigned) or 3 (observer), got {}",
                other
            ))),
        }
    }
}

impl Serialize for ParticipationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// One ticket/user association (`Ticket_User` item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketUser {
    /// Ticket id.
    pub tickets_id: u64,
    /// User id.
    pub users_id: u64,
    /// Participation type.
    #[serde(rename = "type")]
    pub kind: ParticipationType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_bounds() {
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(7).is_err());
        assert_eq!(Priority::new(6).unwrap().value(), 6);
    }

    #[test]
    fn test_ticket_serializes_to_glpi_fields() {
        let ticket = Ticket {
            name: "Printer jammed".to_string(),
            content: "Third floor printer".to_string(),
            priority: Priority::new(3).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&ticket).unwrap(),
            json!({"name": "Printer jammed", "content": "Third floor printer", "priority": 3})
        );
    }

    #[test]
    fn test_ticket_user_serializes_type_code() {
        let link = TicketUser {
            tickets_id: 10,
            users_id: 5,
            kind: ParticipationType::Assigned,
        };
        assert_eq!(
            serde_json::to_value(&link).unwrap(),
            json!({"tickets_id": 10, "users_id": 5, "type": 2})
        );
    }

    #[test]
    fn test_participation_type_codes() {
        assert_eq!(ParticipationType::default(), ParticipationType::Requester);
        assert_eq!(ParticipationType::from_code(3).unwrap(), ParticipationType::Observer);
        assert!(ParticipationType::from_code(4).is_err());
    }
}
