//! Lifecycle Engine - the ticket status state machine.
//!
//! The engine is the only code that changes a ticket's status, assignee,
//! verifier or lifecycle timestamps. It works like a reducer: it validates
//! a [`LifecycleCommand`] against the current ticket, mutates the ticket in
//! place and returns a [`Transition`] describing what happened. Executing
//! the consequences (persisting, recording activity, notifying) is left to
//! the caller.
//!
//! # Transition table
//!
//! | From | To | Precondition | Side effect |
//! |---|---|---|---|
//! | open / assigned / in_progress | assigned | assignee provided | `assigned_at` set if unset |
//! | assigned | in_progress | actor is assignee or elevated | - |
//! | assigned / in_progress | open | assignee cleared | `assigned_to` cleared, `assigned_at` kept |
//! | assigned / in_progress | resolved | actor is assignee or elevated | `resolved_at` set if unset |
//! | resolved | verified | actor is elevated | `verified_at`, `verified_by` set if unset |
//! | verified | closed | - | terminal |
//!
//! Any other edge fails with [`TicketError::InvalidTransition`] and leaves
//! the ticket untouched. Lifecycle timestamps are written at most once and
//! never cleared.

use crate::error::{Result, TicketError};
use crate::ids::UserId;
use crate::ticket::{Assignment, Ticket, TicketPatch, TicketStatus};
use crate::user::Actor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request to move a ticket along its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum LifecycleCommand {
    /// Assign or reassign to `assignee`
    Assign {
        /// New assignee
        assignee: UserId,
    },
    /// Remove the assignee and reopen
    Unassign,
    /// Begin work
    Start,
    /// Mark work done
    Resolve,
    /// Confirm the work
    Verify,
    /// Close the ticket
    Close,
}

impl LifecycleCommand {
    /// Status the ticket ends up in when the command succeeds.
    #[must_use]
    pub const fn target(&self) -> TicketStatus {
        match self {
            Self::Assign { .. } => TicketStatus::Assigned,
            Self::Unassign => TicketStatus::Open,
            Self::Start => TicketStatus::InProgress,
            Self::Resolve => TicketStatus::Resolved,
            Self::Verify => TicketStatus::Verified,
            Self::Close => TicketStatus::Closed,
        }
    }
}

/// What a successful command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TransitionKind {
    /// Ticket (re)assigned
    Assigned {
        /// New assignee
        assignee: UserId,
        /// Assignee before the change
        previous: Option<UserId>,
        /// Whether this stamped `assigned_at`
        first_assignment: bool,
    },
    /// Assignee removed
    Unassigned {
        /// Assignee before the change
        previous: UserId,
    },
    /// Work started
    Started,
    /// Work resolved
    Resolved,
    /// Work verified
    Verified,
    /// Ticket closed
    Closed,
}

/// Description of an applied status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Status before
    pub from: TicketStatus,
    /// Status after
    pub to: TicketStatus,
    /// Who triggered it
    pub actor: UserId,
    /// When it was applied
    pub at: DateTime<Utc>,
    /// What happened
    pub kind: TransitionKind,
}

/// Whether `from → to` is an edge of the lifecycle graph.
#[must_use]
pub const fn is_edge(from: TicketStatus, to: TicketStatus) -> bool {
    use TicketStatus::{Assigned, Closed, InProgress, Open, Resolved, Verified};
    matches!(
        (from, to),
        (Open | Assigned | InProgress, Assigned)
            | (Assigned, InProgress)
            | (Assigned | InProgress, Open | Resolved)
            | (Resolved, Verified)
            | (Verified, Closed)
    )
}

/// Tunable lifecycle rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    /// Allow the current assignee to verify their own work. Off by default.
    pub allow_self_verification: bool,
}

/// Validates and applies lifecycle commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleEngine {
    policy: LifecyclePolicy,
}

impl LifecycleEngine {
    /// Create an engine with the given policy.
    #[must_use]
    pub const fn new(policy: LifecyclePolicy) -> Self {
        Self { policy }
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    /// Translate the status/assignment part of a patch into a command.
    ///
    /// Returns `Ok(None)` when the patch does not change the lifecycle,
    /// including a status equal to the current one and a reassignment to
    /// the current assignee.
    ///
    /// # Errors
    ///
    /// - [`TicketError::Validation`] when the assignment contradicts the
    ///   requested status
    /// - [`TicketError::InvalidTransition`] when `assigned` is requested
    ///   without any assignee
    pub fn command_for(ticket: &Ticket, patch: &TicketPatch) -> Result<Option<LifecycleCommand>> {
        let command = match (patch.assignment, patch.status) {
            (None, None) => return Ok(None),
            (Some(Assignment::To(assignee)), None | Some(TicketStatus::Assigned)) => {
                LifecycleCommand::Assign { assignee }
            }
            (Some(Assignment::Clear), None | Some(TicketStatus::Open)) => {
                if ticket.assigned_to.is_none() && ticket.status == TicketStatus::Open {
                    return Ok(None);
                }
                LifecycleCommand::Unassign
            }
            (Some(Assignment::To(_)), Some(status)) => {
                return Err(TicketError::validation(format!(
                    "assigning a ticket sets its status to assigned, not {status}"
                )));
            }
            (Some(Assignment::Clear), Some(status)) => {
                return Err(TicketError::validation(format!(
                    "unassigning a ticket sets its status to open, not {status}"
                )));
            }
            (None, Some(status)) if status == ticket.status => return Ok(None),
            (None, Some(TicketStatus::Open)) => LifecycleCommand::Unassign,
            (None, Some(TicketStatus::Assigned)) => match ticket.assigned_to {
                Some(assignee) => LifecycleCommand::Assign { assignee },
                None => {
                    return Err(TicketError::invalid_transition(
                        ticket.status,
                        TicketStatus::Assigned,
                        "an assignee is required",
                    ));
                }
            },
            (None, Some(TicketStatus::InProgress)) => LifecycleCommand::Start,
            (None, Some(TicketStatus::Resolved)) => LifecycleCommand::Resolve,
            (None, Some(TicketStatus::Verified)) => LifecycleCommand::Verify,
            (None, Some(TicketStatus::Closed)) => LifecycleCommand::Close,
        };

        if let LifecycleCommand::Assign { assignee } = command {
            if ticket.status == TicketStatus::Assigned && ticket.assigned_to == Some(assignee) {
                return Ok(None);
            }
        }

        Ok(Some(command))
    }

    /// Check a command without applying it.
    ///
    /// # Errors
    ///
    /// Same as [`LifecycleEngine::apply`].
    pub fn check(&self, ticket: &Ticket, actor: &Actor, command: LifecycleCommand) -> Result<()> {
        let from = ticket.status;
        let to = command.target();

        if from.is_terminal() {
            return Err(TicketError::invalid_transition(from, to, "ticket is closed"));
        }
        if !is_edge(from, to) {
            return Err(TicketError::invalid_transition(
                from,
                to,
                "not an allowed lifecycle step",
            ));
        }

        let is_assignee = ticket.assigned_to == Some(actor.id);
        match command {
            LifecycleCommand::Assign { assignee } => {
                if !actor.is_elevated() {
                    if assignee != actor.id {
                        return Err(TicketError::auth(
                            "only supervisors and admins may assign tickets to other users",
                        ));
                    }
                    if ticket.assigned_to.is_some() && !is_assignee {
                        return Err(TicketError::auth(
                            "ticket is already assigned to another user",
                        ));
                    }
                }
            }
            LifecycleCommand::Unassign => {
                if ticket.assigned_to.is_none() {
                    return Err(TicketError::invalid_transition(from, to, "ticket has no assignee"));
                }
                if !actor.is_elevated() && !is_assignee {
                    return Err(TicketError::auth(
                        "only the assignee, a supervisor or an admin may unassign a ticket",
                    ));
                }
            }
            LifecycleCommand::Start | LifecycleCommand::Resolve => {
                if !actor.is_elevated() && !is_assignee {
                    return Err(TicketError::auth(format!(
                        "only the assignee, a supervisor or an admin may move a ticket to {to}"
                    )));
                }
            }
            LifecycleCommand::Verify => {
                if !actor.is_elevated() {
                    return Err(TicketError::auth(
                        "only supervisors and admins may verify tickets",
                    ));
                }
                if is_assignee && !self.policy.allow_self_verification {
                    return Err(TicketError::auth("the assignee may not verify their own work"));
                }
            }
            LifecycleCommand::Close => {}
        }

        Ok(())
    }

    /// Validate and apply a command.
    ///
    /// On success the ticket's status, assignment fields, lifecycle
    /// timestamps and `updated_at` reflect the transition. On error the
    /// ticket is unchanged.
    ///
    /// # Errors
    ///
    /// - [`TicketError::InvalidTransition`] for an edge not in the table,
    ///   any change out of `closed`, or unassigning an unassigned ticket
    /// - [`TicketError::Auth`] when the actor may not trigger this edge
    pub fn apply(
        &self,
        ticket: &mut Ticket,
        actor: &Actor,
        command: LifecycleCommand,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        self.check(ticket, actor, command)?;

        let from = ticket.status;
        let at = monotonic_stamp(ticket, now);

        let kind = match command {
            LifecycleCommand::Assign { assignee } => {
                let previous = ticket.assigned_to.replace(assignee);
                let first_assignment = ticket.assigned_at.is_none();
                ticket.assigned_at.get_or_insert(at);
                TransitionKind::Assigned {
                    assignee,
                    previous,
                    first_assignment,
                }
            }
            LifecycleCommand::Unassign => match ticket.assigned_to.take() {
                Some(previous) => TransitionKind::Unassigned { previous },
                // check() rejects unassigned tickets
                None => {
                    return Err(TicketError::invalid_transition(
                        from,
                        TicketStatus::Open,
                        "ticket has no assignee",
                    ));
                }
            },
            LifecycleCommand::Start => TransitionKind::Started,
            LifecycleCommand::Resolve => {
                ticket.resolved_at.get_or_insert(at);
                TransitionKind::Resolved
            }
            LifecycleCommand::Verify => {
                ticket.verified_at.get_or_insert(at);
                ticket.verified_by.get_or_insert(actor.id);
                TransitionKind::Verified
            }
            LifecycleCommand::Close => TransitionKind::Closed,
        };

        ticket.status = command.target();
        ticket.updated_at = ticket.updated_at.max(at);

        Ok(Transition {
            from,
            to: ticket.status,
            actor: actor.id,
            at,
            kind,
        })
    }
}

/// A timestamp never earlier than any lifecycle timestamp already on the
/// ticket, so stamps stay ordered even if the clock steps backwards.
fn monotonic_stamp(ticket: &Ticket, now: DateTime<Utc>) -> DateTime<Utc> {
    [ticket.assigned_at, ticket.resolved_at, ticket.verified_at]
        .into_iter()
        .flatten()
        .fold(now.max(ticket.created_at), DateTime::max)
}

#[cfg(test)]
mod tests;
