//! Notification records produced by the Notification Dispatcher.

use crate::ids::{NotificationId, TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a user is being notified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A ticket was created or assigned to the recipient
    TicketAssigned,
    /// A ticket the recipient cares about changed status
    StatusChange,
    /// A ticket is past its due date
    Overdue,
    /// An overdue critical ticket was escalated
    Escalated,
    /// The recipient's work was verified
    Verified,
}

impl NotificationType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TicketAssigned => "ticket_assigned",
            Self::StatusChange => "status_change",
            Self::Overdue => "overdue",
            Self::Escalated => "escalated",
            Self::Verified => "verified",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivered notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification ID
    pub id: NotificationId,
    /// Recipient
    pub user_id: UserId,
    /// Related ticket
    #[serde(default)]
    pub ticket_id: Option<TicketId>,
    /// Kind of notice
    pub notification_type: NotificationType,
    /// Short headline
    pub title: String,
    /// Body text
    pub message: String,
    /// Read flag, the only mutable field
    pub is_read: bool,
    /// Email delivery was attempted
    pub email_sent: bool,
    /// Push delivery was attempted
    pub push_sent: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A notification about to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    /// Recipient
    pub user_id: UserId,
    /// Related ticket
    pub ticket_id: Option<TicketId>,
    /// Kind of notice
    pub notification_type: NotificationType,
    /// Short headline
    pub title: String,
    /// Body text
    pub message: String,
    /// Email delivery will be attempted
    pub email_sent: bool,
    /// Push delivery will be attempted
    pub push_sent: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    /// Assign an id, producing the stored (unread) record.
    #[must_use]
    pub fn into_notification(self, id: NotificationId) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            ticket_id: self.ticket_id,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            is_read: false,
            email_sent: self.email_sent,
            push_sent: self.push_sent,
            created_at: self.created_at,
        }
    }
}
