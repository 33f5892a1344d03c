//! # Fieldops Core
//!
//! Domain types and pure business rules for the Fieldops field-service
//! ticketing service.
//!
//! This crate owns everything that can be decided without I/O:
//!
//! - **Domain model**: tickets, user profiles, equipment, activities,
//!   notifications, media and work sessions
//! - **Lifecycle Engine**: the ticket status state machine and the
//!   set-once lifecycle timestamps
//! - **Access policy**: role-scoped visibility and mutation rules
//! - **Contracts**: the [`provider::DataProvider`] and
//!   [`identity::IdentityProvider`] traits implemented by the runtime and
//!   by external backends
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell: the Lifecycle Engine mutates a
//!   ticket value and returns a description of what happened; the runtime's
//!   Ticket Store persists it, records it and notifies about it.
//! - Dependency Injection via traits (`Clock`, `DataProvider`,
//!   `IdentityProvider`).
//!
//! ## Example
//!
//! ```
//! use fieldops_core::ids::{TicketId, TicketNumber, UserId};
//! use fieldops_core::lifecycle::{LifecycleCommand, LifecycleEngine};
//! use fieldops_core::provider::NewTicket;
//! use fieldops_core::ticket::{TicketDraft, TicketStatus, TicketType};
//! use fieldops_core::user::{Actor, Role};
//! use chrono::Utc;
//!
//! let engineer = Actor::new(UserId::new(), Role::FieldEngineer);
//! let supervisor = Actor::new(UserId::new(), Role::Supervisor);
//! let draft = TicketDraft::new("AC repair", "Unit blowing warm air", TicketType::Fault, "Building A");
//! let mut ticket = NewTicket::from_draft(TicketId::new(), draft, engineer.id, Utc::now())
//!     .into_ticket(TicketNumber::new(1));
//!
//! let engine = LifecycleEngine::default();
//! engine
//!     .apply(
//!         &mut ticket,
//!         &supervisor,
//!         LifecycleCommand::Assign { assignee: engineer.id },
//!         Utc::now(),
//!     )
//!     .unwrap();
//!
//! assert_eq!(ticket.status, TicketStatus::Assigned);
//! assert!(ticket.assigned_at.is_some());
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod access;
pub mod activity;
pub mod equipment;
pub mod error;
pub mod identity;
pub mod ids;
pub mod lifecycle;
pub mod media;
pub mod notification;
pub mod provider;
pub mod stats;
pub mod ticket;
pub mod user;

pub use error::{ProviderError, Result, TicketError};

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// where they are needed.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldops_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
