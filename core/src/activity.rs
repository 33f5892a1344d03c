//! Activity log entries.
//!
//! Activities are immutable audit records attached to a ticket. They are
//! appended and read, never updated or deleted.

use crate::ids::{ActivityId, TicketId, UserId};
use crate::lifecycle::{Transition, TransitionKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of ticket event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// Ticket created
    Created,
    /// Ticket (re)assigned
    Assigned,
    /// Any other status change
    StatusChange,
    /// Free-text comment
    Comment,
    /// Attachment added
    MediaUpload,
    /// Work verified
    Verification,
}

impl ActivityType {
    /// Activity type recorded for a lifecycle transition.
    #[must_use]
    pub const fn for_transition(kind: &TransitionKind) -> Self {
        match kind {
            TransitionKind::Assigned { .. } => Self::Assigned,
            TransitionKind::Verified => Self::Verification,
            TransitionKind::Unassigned { .. }
            | TransitionKind::Started
            | TransitionKind::Resolved
            | TransitionKind::Closed => Self::StatusChange,
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
            Self::StatusChange => "status_change",
            Self::Comment => "comment",
            Self::MediaUpload => "media_upload",
            Self::Verification => "verification",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded ticket event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity ID
    pub id: ActivityId,
    /// Ticket the activity belongs to
    pub ticket_id: TicketId,
    /// Author
    pub user_id: UserId,
    /// Kind of event
    pub activity_type: ActivityType,
    /// Human-readable description
    pub description: String,
    /// Structured details
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// When it was recorded
    pub created_at: DateTime<Utc>,
}

/// An activity about to be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    /// Ticket the activity belongs to
    pub ticket_id: TicketId,
    /// Author
    pub user_id: UserId,
    /// Kind of event
    pub activity_type: ActivityType,
    /// Human-readable description
    pub description: String,
    /// Structured details
    pub metadata: Option<serde_json::Value>,
    /// When it happened
    pub created_at: DateTime<Utc>,
}

impl NewActivity {
    /// Assign an id, producing the stored record.
    #[must_use]
    pub fn into_activity(self, id: ActivityId) -> Activity {
        Activity {
            id,
            ticket_id: self.ticket_id,
            user_id: self.user_id,
            activity_type: self.activity_type,
            description: self.description,
            metadata: self.metadata,
            created_at: self.created_at,
        }
    }
}

/// Structured metadata recorded for a transition.
#[must_use]
pub fn transition_metadata(transition: &Transition) -> serde_json::Value {
    let mut metadata = serde_json::json!({
        "from": transition.from,
        "to": transition.to,
    });
    match transition.kind {
        TransitionKind::Assigned {
            assignee, previous, ..
        } => {
            metadata["assigned_to"] = serde_json::json!(assignee);
            metadata["previous_assignee"] = serde_json::json!(previous);
        }
        TransitionKind::Unassigned { previous } => {
            metadata["previous_assignee"] = serde_json::json!(previous);
        }
        _ => {}
    }
    metadata
}

/// Order activities newest first; ties keep insertion order reversed.
pub fn sort_newest_first(activities: &mut [Activity]) {
    activities.reverse();
    activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
