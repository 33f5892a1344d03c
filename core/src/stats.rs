//! Per-user workload statistics.

use crate::ids::UserId;
use crate::ticket::{Ticket, TicketStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts of the tickets assigned to one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    /// Tickets currently or previously assigned
    pub total_assigned: u32,
    /// Assigned but not started
    pub pending: u32,
    /// In progress
    pub in_progress: u32,
    /// Resolved, verified or closed
    pub completed: u32,
    /// Overdue at the time of computation
    pub overdue: u32,
    /// Mean hours from assignment to resolution over completed tickets
    pub avg_resolution_hours: Option<f64>,
}

impl UserStats {
    /// Compute statistics from the tickets assigned to `user_id`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute<'a>(
        user_id: UserId,
        tickets: impl IntoIterator<Item = &'a Ticket>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut stats = Self::default();
        let mut resolution_seconds = 0i64;
        let mut resolved = 0u32;

        for ticket in tickets.into_iter().filter(|t| t.assigned_to == Some(user_id)) {
            stats.total_assigned += 1;
            match ticket.status {
                TicketStatus::Assigned => stats.pending += 1,
                TicketStatus::InProgress => stats.in_progress += 1,
                TicketStatus::Resolved | TicketStatus::Verified | TicketStatus::Closed => {
                    stats.completed += 1;
                }
                TicketStatus::Open => {}
            }
            if ticket.is_overdue(now) {
                stats.overdue += 1;
            }
            if let (Some(assigned), Some(done)) = (ticket.assigned_at, ticket.resolved_at) {
                resolution_seconds += (done - assigned).num_seconds();
                resolved += 1;
            }
        }

        if resolved > 0 {
            stats.avg_resolution_hours =
                Some(resolution_seconds as f64 / f64::from(resolved) / 3600.0);
        }
        stats
    }
}
