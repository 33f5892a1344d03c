//! Error types for ticket operations and data providers.

use crate::ticket::TicketStatus;
use thiserror::Error;

/// Result type alias for ticket operations.
pub type Result<T> = std::result::Result<T, TicketError>;

/// Caller-facing error taxonomy.
///
/// Every variant renders a human-readable message suitable for display.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TicketError {
    /// Malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing session, or a role/ownership check failed. Nothing was changed.
    #[error("Not authorized: {0}")]
    Auth(String),

    /// A referenced ticket, user or notification does not exist (or is not
    /// visible to the caller).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The requested status change is not an edge of the lifecycle. The
    /// ticket is unchanged.
    #[error("Cannot move ticket from {from} to {to}: {reason}")]
    InvalidTransition {
        /// Current status
        from: TicketStatus,
        /// Requested status
        to: TicketStatus,
        /// Why the edge was rejected
        reason: String,
    },

    /// The data backend failed and no fallback was available.
    #[error("Data provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl TicketError {
    /// Build a [`TicketError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a [`TicketError::Auth`].
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Build a [`TicketError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Build a [`TicketError::InvalidTransition`].
    #[must_use]
    pub fn invalid_transition(
        from: TicketStatus,
        to: TicketStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            from,
            to,
            reason: reason.into(),
        }
    }
}

/// Errors reported by a data provider.
///
/// The Ticket Store treats any of these as "provider unavailable" for
/// fallback purposes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Backend is not configured or cannot be reached.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure.
    #[error("Request failed: {0}")]
    Request(String),

    /// Response could not be decoded.
    #[error("Response decoding failed: {0}")]
    Decode(String),

    /// Backend rejected a write (e.g. duplicate key).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend returned an error status.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the backend
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            TicketError::not_found("ticket", "abc").to_string(),
            "ticket not found: abc"
        );
        assert_eq!(
            TicketError::invalid_transition(
                TicketStatus::Open,
                TicketStatus::Resolved,
                "not an allowed edge"
            )
            .to_string(),
            "Cannot move ticket from open to resolved: not an allowed edge"
        );
        assert_eq!(
            TicketError::from(ProviderError::Unavailable("offline".to_string())).to_string(),
            "Data provider error: Provider unavailable: offline"
        );
    }
}
