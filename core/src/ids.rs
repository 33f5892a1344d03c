//! Strongly typed identifiers.
//!
//! Every entity is keyed by a UUID wrapped in its own newtype so that a
//! ticket id can never be passed where a user id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a ticket
    TicketId
);
uuid_id!(
    /// Unique identifier for a user, as issued by the identity provider
    UserId
);
uuid_id!(
    /// Unique identifier for a piece of equipment
    EquipmentId
);
uuid_id!(
    /// Unique identifier for an activity log entry
    ActivityId
);
uuid_id!(
    /// Unique identifier for a notification
    NotificationId
);
uuid_id!(
    /// Unique identifier for a media attachment
    MediaId
);
uuid_id!(
    /// Unique identifier for a work session
    WorkSessionId
);

/// Human-readable sequential ticket number, rendered as `TKT-000042`.
///
/// Numbers are assigned by the data provider when a ticket is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketNumber(u64);

impl TicketNumber {
    /// Prefix used when rendering ticket numbers.
    pub const PREFIX: &'static str = "TKT-";

    /// Create a ticket number from its sequence value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the sequence value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The number following this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:06}", Self::PREFIX, self.0)
    }
}

impl FromStr for TicketNumber {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(Self::PREFIX).unwrap_or(s).parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;

    #[test]
    fn ticket_number_renders_with_prefix_and_padding() {
        assert_eq!(TicketNumber::new(42).to_string(), "TKT-000042");
        assert_eq!(TicketNumber::new(1_234_567).to_string(), "TKT-1234567");
    }

    #[test]
    fn ticket_number_parses_with_or_without_prefix() {
        assert_eq!("TKT-000042".parse::<TicketNumber>().unwrap(), TicketNumber::new(42));
        assert_eq!("7".parse::<TicketNumber>().unwrap(), TicketNumber::new(7));
        assert!("TKT-abc".parse::<TicketNumber>().is_err());
    }

    #[test]
    fn ids_are_distinct_and_parse_back() {
        let a = TicketId::new();
        let b = TicketId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<TicketId>().unwrap(), a);
    }

    #[test]
    fn ids_serialize_as_bare_uuid_strings() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
