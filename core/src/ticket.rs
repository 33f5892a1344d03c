//! The ticket entity and the inputs used to create and edit it.
//!
//! Status-linked fields (`status`, `assigned_to`, `verified_by` and the
//! lifecycle timestamps) are only ever changed by the
//! [`LifecycleEngine`](crate::lifecycle::LifecycleEngine). [`TicketPatch`]
//! carries status and assignment *requests*; it has no way to write a
//! lifecycle timestamp directly.

use crate::error::{Result, TicketError};
use crate::ids::{EquipmentId, TicketId, TicketNumber, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Classification
// ============================================================================

/// Kind of work a ticket tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    /// Something is broken
    Fault,
    /// Planned upkeep
    Maintenance,
    /// Scheduled check
    Inspection,
    /// Equipment or installation upgrade
    Upgrade,
}

impl TicketType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fault => "fault",
            Self::Maintenance => "maintenance",
            Self::Inspection => "inspection",
            Self::Upgrade => "upgrade",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Can wait
    Low,
    /// Default priority
    #[default]
    Medium,
    /// Should be handled soon
    High,
    /// Safety or service impacting
    Critical,
}

impl Priority {
    /// Wire name of the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a ticket.
///
/// ```text
/// open → assigned → in_progress → resolved → verified → closed
///   ↑       │  ↑         │
///   └───────┘  └─────────┘ (unassign / reassign)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Created, nobody assigned
    Open,
    /// Assigned to an engineer
    Assigned,
    /// Work has started
    InProgress,
    /// Work is done, awaiting verification
    Resolved,
    /// Work was checked by a supervisor or admin
    Verified,
    /// Terminal
    Closed,
}

impl TicketStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::Assigned,
        Self::InProgress,
        Self::Resolved,
        Self::Verified,
        Self::Closed,
    ];

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Verified => "verified",
            Self::Closed => "closed",
        }
    }

    /// No status change is permitted once a ticket is closed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Field work is finished; such tickets are never overdue.
    #[must_use]
    pub const fn is_work_complete(self) -> bool {
        matches!(self, Self::Resolved | Self::Verified | Self::Closed)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TicketError::validation(format!("unknown ticket status '{s}'")))
    }
}

// ============================================================================
// Value objects
// ============================================================================

/// WGS84 coordinates of a ticket's location.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point, rejecting out-of-range coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Validation`] when latitude is outside
    /// `[-90, 90]` or longitude outside `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let point = Self { latitude, longitude };
        point.validate()?;
        Ok(point)
    }

    fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(TicketError::validation(format!(
                "coordinates out of range: ({}, {})",
                self.latitude, self.longitude
            )));
        }
        Ok(())
    }
}

/// Monetary amount in cents, avoiding floating point rounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// A unit of field work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique id
    pub id: TicketId,
    /// Human-readable sequential number
    pub ticket_number: TicketNumber,
    /// Short summary
    pub title: String,
    /// Full description of the problem or task
    pub description: String,
    /// Kind of work
    pub ticket_type: TicketType,
    /// Priority
    pub priority: Priority,
    /// Lifecycle state
    pub status: TicketStatus,
    /// Free-text location
    pub location: String,
    /// Optional coordinates
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    /// Optional equipment reference
    #[serde(default)]
    pub equipment_id: Option<EquipmentId>,
    /// Creator
    pub created_by: UserId,
    /// Current assignee
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    /// Who verified the work
    #[serde(default)]
    pub verified_by: Option<UserId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// First assignment time (set once)
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    /// Resolution time (set once)
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Verification time (set once)
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    /// Due date, set at creation
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Estimated effort in hours
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    /// Actual effort in hours
    #[serde(default)]
    pub actual_hours: Option<f64>,
    /// Estimated cost
    #[serde(default)]
    pub estimated_cost: Option<Money>,
    /// Actual cost
    #[serde(default)]
    pub actual_cost: Option<Money>,
}

impl Ticket {
    /// Overdue is derived, never stored: a due date in the past while field
    /// work is still outstanding.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date.is_some_and(|due| due < now) && !self.status.is_work_complete()
    }

    /// Whether `user` created or is assigned to this ticket.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.created_by == user || self.assigned_to == Some(user)
    }

    /// Apply the non-lifecycle fields of a patch.
    ///
    /// Status and assignment requests are ignored here; they go through the
    /// Lifecycle Engine. `updated_at` is refreshed by the caller.
    pub fn apply_fields(&mut self, patch: &TicketPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(ticket_type) = patch.ticket_type {
            self.ticket_type = ticket_type;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(location) = &patch.location {
            self.location.clone_from(location);
        }
        if let Some(coordinates) = patch.coordinates {
            self.coordinates = Some(coordinates);
        }
        if let Some(equipment_id) = patch.equipment_id {
            self.equipment_id = Some(equipment_id);
        }
        if let Some(hours) = patch.estimated_hours {
            self.estimated_hours = Some(hours);
        }
        if let Some(hours) = patch.actual_hours {
            self.actual_hours = Some(hours);
        }
        if let Some(cost) = patch.estimated_cost {
            self.estimated_cost = Some(cost);
        }
        if let Some(cost) = patch.actual_cost {
            self.actual_cost = Some(cost);
        }
    }
}

/// Caller input for creating a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDraft {
    /// Short summary (required)
    pub title: String,
    /// Description (required)
    pub description: String,
    /// Kind of work
    pub ticket_type: TicketType,
    /// Priority
    #[serde(default)]
    pub priority: Priority,
    /// Free-text location (required)
    pub location: String,
    /// Optional coordinates
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    /// Optional equipment reference
    #[serde(default)]
    pub equipment_id: Option<EquipmentId>,
    /// Optional due date
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Estimated effort in hours
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    /// Estimated cost
    #[serde(default)]
    pub estimated_cost: Option<Money>,
}

impl TicketDraft {
    /// Start a draft with the required fields.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        ticket_type: TicketType,
        location: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ticket_type,
            priority: Priority::default(),
            location: location.into(),
            coordinates: None,
            equipment_id: None,
            due_date: None,
            estimated_hours: None,
            estimated_cost: None,
        }
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Reference a piece of equipment.
    #[must_use]
    pub const fn with_equipment(mut self, equipment_id: EquipmentId) -> Self {
        self.equipment_id = Some(equipment_id);
        self
    }

    /// Check required fields and value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("location", &self.location)?;
        if let Some(point) = &self.coordinates {
            point.validate()?;
        }
        require_non_negative("estimated_hours", self.estimated_hours)?;
        Ok(())
    }
}

/// A requested change of assignee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "user_id")]
pub enum Assignment {
    /// Assign (or reassign) to a user
    To(UserId),
    /// Remove the current assignee
    Clear,
}

/// Partial update of a ticket. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketPatch {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New type
    pub ticket_type: Option<TicketType>,
    /// New priority
    pub priority: Option<Priority>,
    /// New location
    pub location: Option<String>,
    /// New coordinates
    pub coordinates: Option<GeoPoint>,
    /// New equipment reference
    pub equipment_id: Option<EquipmentId>,
    /// New effort estimate
    pub estimated_hours: Option<f64>,
    /// Recorded effort
    pub actual_hours: Option<f64>,
    /// New cost estimate
    pub estimated_cost: Option<Money>,
    /// Recorded cost
    pub actual_cost: Option<Money>,
    /// Requested status (handled by the Lifecycle Engine)
    pub status: Option<TicketStatus>,
    /// Requested assignee change (handled by the Lifecycle Engine)
    pub assignment: Option<Assignment>,
}

impl TicketPatch {
    /// A patch requesting only a status change.
    #[must_use]
    pub fn status(status: TicketStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// A patch requesting only an assignee change.
    #[must_use]
    pub fn assignment(assignment: Assignment) -> Self {
        Self {
            assignment: Some(assignment),
            ..Self::default()
        }
    }

    /// Whether the patch touches status or assignment.
    #[must_use]
    pub const fn affects_lifecycle(&self) -> bool {
        self.status.is_some() || self.assignment.is_some()
    }

    /// Check that the fields present are well formed.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(description) = &self.description {
            require_text("description", description)?;
        }
        if let Some(location) = &self.location {
            require_text("location", location)?;
        }
        if let Some(point) = &self.coordinates {
            point.validate()?;
        }
        require_non_negative("estimated_hours", self.estimated_hours)?;
        require_non_negative("actual_hours", self.actual_hours)?;
        Ok(())
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TicketError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(TicketError::validation(format!(
            "{field} must be a non-negative number"
        ))),
        _ => Ok(()),
    }
}
