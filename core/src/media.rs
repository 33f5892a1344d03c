//! Attachments and time-tracking entries owned by a ticket.

use crate::ids::{MediaId, TicketId, UserId, WorkSessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    /// Photo
    Image,
    /// Video clip
    Video,
    /// Document or report
    Document,
}

/// Reference to a file held by external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketMedia {
    /// Media ID
    pub id: MediaId,
    /// Owning ticket
    pub ticket_id: TicketId,
    /// Uploader
    pub uploaded_by: UserId,
    /// Kind of attachment
    pub media_type: MediaType,
    /// Original file name
    pub file_name: String,
    /// Location in external storage
    pub storage_path: String,
    /// Upload time
    pub created_at: DateTime<Utc>,
}

/// A span of time an engineer spent on a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSession {
    /// Work session ID
    pub id: WorkSessionId,
    /// Owning ticket
    pub ticket_id: TicketId,
    /// Engineer
    pub user_id: UserId,
    /// Start of work
    pub started_at: DateTime<Utc>,
    /// End of work
    pub ended_at: DateTime<Utc>,
    /// Optional notes
    #[serde(default)]
    pub notes: Option<String>,
}

impl WorkSession {
    /// Duration in hours.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hours(&self) -> f64 {
        (self.ended_at - self.started_at).num_seconds() as f64 / 3600.0
    }
}
