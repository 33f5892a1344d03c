//! Data Provider contract.
//!
//! The Ticket Store is written against [`DataProvider`] so that a live
//! network backend and the in-memory substitute are interchangeable. Every
//! call returns an explicit `Result<T, ProviderError>`; the caller inspects
//! the result to decide whether to fall back.
//!
//! # Implementations
//!
//! - `RestProvider` (in `fieldops-rest`): live backend over HTTP
//! - `InMemoryProvider` (in `fieldops-runtime`): mock data, also the
//!   fallback target when the live backend fails
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! trait can be used as `Arc<dyn DataProvider>`.

use crate::activity::{Activity, NewActivity};
use crate::equipment::Equipment;
use crate::error::ProviderError;
use crate::ids::{EquipmentId, NotificationId, TicketId, TicketNumber, UserId};
use crate::media::{TicketMedia, WorkSession};
use crate::notification::{NewNotification, Notification};
use crate::stats::UserStats;
use crate::ticket::{
    GeoPoint, Money, Priority, Ticket, TicketDraft, TicketStatus, TicketType,
};
use crate::user::{Role, UserProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::broadcast;

/// Boxed future returned by provider calls.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Ticket query. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketFilter {
    /// Only tickets created by or assigned to this user
    pub involving: Option<UserId>,
    /// Only tickets assigned to this user
    pub assigned_to: Option<UserId>,
    /// Only tickets in this status
    pub status: Option<TicketStatus>,
    /// Only tickets with this priority
    pub priority: Option<Priority>,
    /// Only tickets of this type
    pub ticket_type: Option<TicketType>,
}

impl TicketFilter {
    /// Restrict to tickets created by or assigned to `user`.
    #[must_use]
    pub const fn involving(mut self, user: UserId) -> Self {
        self.involving = Some(user);
        self
    }

    /// Restrict to tickets assigned to `user`.
    #[must_use]
    pub const fn assigned_to(mut self, user: UserId) -> Self {
        self.assigned_to = Some(user);
        self
    }

    /// Restrict to one status.
    #[must_use]
    pub const fn status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to one priority.
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Restrict to one ticket type.
    #[must_use]
    pub const fn ticket_type(mut self, ticket_type: TicketType) -> Self {
        self.ticket_type = Some(ticket_type);
        self
    }

    /// Whether `ticket` satisfies every condition.
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.involving.is_none_or(|user| ticket.involves(user))
            && self.assigned_to.is_none_or(|user| ticket.assigned_to == Some(user))
            && self.status.is_none_or(|status| ticket.status == status)
            && self.priority.is_none_or(|priority| ticket.priority == priority)
            && self.ticket_type.is_none_or(|ticket_type| ticket.ticket_type == ticket_type)
    }
}

/// A ticket about to be persisted. The provider assigns the ticket number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    /// Ticket id chosen by the store
    pub id: TicketId,
    /// Short summary
    pub title: String,
    /// Description
    pub description: String,
    /// Kind of work
    pub ticket_type: TicketType,
    /// Priority
    pub priority: Priority,
    /// Free-text location
    pub location: String,
    /// Optional coordinates
    pub coordinates: Option<GeoPoint>,
    /// Optional equipment reference
    pub equipment_id: Option<EquipmentId>,
    /// Creator
    pub created_by: UserId,
    /// Creation time, also the initial `updated_at`
    pub created_at: DateTime<Utc>,
    /// Due date
    pub due_date: Option<DateTime<Utc>>,
    /// Estimated effort in hours
    pub estimated_hours: Option<f64>,
    /// Estimated cost
    pub estimated_cost: Option<Money>,
}

impl NewTicket {
    /// Build the record for a validated draft.
    #[must_use]
    pub fn from_draft(
        id: TicketId,
        draft: TicketDraft,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            ticket_type: draft.ticket_type,
            priority: draft.priority,
            location: draft.location.trim().to_string(),
            coordinates: draft.coordinates,
            equipment_id: draft.equipment_id,
            created_by,
            created_at,
            due_date: draft.due_date,
            estimated_hours: draft.estimated_hours,
            estimated_cost: draft.estimated_cost,
        }
    }

    /// Produce the stored ticket in its initial `open` state.
    #[must_use]
    pub fn into_ticket(self, ticket_number: TicketNumber) -> Ticket {
        Ticket {
            id: self.id,
            ticket_number,
            title: self.title,
            description: self.description,
            ticket_type: self.ticket_type,
            priority: self.priority,
            status: TicketStatus::Open,
            location: self.location,
            coordinates: self.coordinates,
            equipment_id: self.equipment_id,
            created_by: self.created_by,
            assigned_to: None,
            verified_by: None,
            created_at: self.created_at,
            updated_at: self.created_at,
            assigned_at: None,
            resolved_at: None,
            verified_at: None,
            due_date: self.due_date,
            estimated_hours: self.estimated_hours,
            actual_hours: None,
            estimated_cost: self.estimated_cost,
            actual_cost: None,
        }
    }
}

/// A change observed at the backend. Subscribers reload rather than merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ChangeNotice {
    /// A ticket was created, updated or deleted
    Ticket {
        /// Affected ticket
        id: TicketId,
    },
    /// An activity was appended
    Activity {
        /// Ticket the activity belongs to
        ticket_id: TicketId,
    },
    /// A notification was created or marked read
    Notification {
        /// Recipient
        user_id: UserId,
    },
}

/// Persistence backend for tickets and everything attached to them.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be shared across tasks.
pub trait DataProvider: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Tickets matching `filter`, newest first.
    fn list_tickets(&self, filter: TicketFilter) -> ProviderFuture<'_, Vec<Ticket>>;

    /// One ticket, or `None` if it does not exist.
    fn get_ticket(&self, id: TicketId) -> ProviderFuture<'_, Option<Ticket>>;

    /// Persist a new ticket, assigning its number.
    fn create_ticket(&self, ticket: NewTicket) -> ProviderFuture<'_, Ticket>;

    /// Replace a stored ticket (last write wins).
    fn update_ticket(&self, ticket: Ticket) -> ProviderFuture<'_, Ticket>;

    /// Remove a ticket permanently.
    ///
    /// Media and work sessions go with it; activity entries are kept.
    fn delete_ticket(&self, id: TicketId) -> ProviderFuture<'_, ()>;

    /// User profiles, optionally restricted to one role.
    fn list_users(&self, role: Option<Role>) -> ProviderFuture<'_, Vec<UserProfile>>;

    /// One user profile, or `None`.
    fn get_user(&self, id: UserId) -> ProviderFuture<'_, Option<UserProfile>>;

    /// All equipment.
    fn list_equipment(&self) -> ProviderFuture<'_, Vec<Equipment>>;

    /// Append an activity to a ticket's log.
    fn append_activity(&self, activity: NewActivity) -> ProviderFuture<'_, Activity>;

    /// Activities of a ticket, in any order.
    fn list_activities(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<Activity>>;

    /// Store a notification.
    fn create_notification(
        &self,
        notification: NewNotification,
    ) -> ProviderFuture<'_, Notification>;

    /// Notifications for a user, newest first.
    fn list_notifications(&self, user_id: UserId) -> ProviderFuture<'_, Vec<Notification>>;

    /// Set the read flag. Returns `None` if the notification does not exist.
    fn mark_notification_read(
        &self,
        id: NotificationId,
    ) -> ProviderFuture<'_, Option<Notification>>;

    /// Store an attachment reference.
    fn add_media(&self, media: TicketMedia) -> ProviderFuture<'_, TicketMedia>;

    /// Attachments of a ticket.
    fn list_media(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<TicketMedia>>;

    /// Store a work session.
    fn add_work_session(&self, session: WorkSession) -> ProviderFuture<'_, WorkSession>;

    /// Work sessions of a ticket.
    fn list_work_sessions(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<WorkSession>>;

    /// Workload statistics for a user as of `now`.
    fn user_stats(&self, user_id: UserId, now: DateTime<Utc>) -> ProviderFuture<'_, UserStats>;

    /// Change stream, if the backend offers one.
    fn subscribe(&self) -> Option<broadcast::Receiver<ChangeNotice>> {
        None
    }
}
