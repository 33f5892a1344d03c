//! Role-scoped access rules.
//!
//! | Role | Sees | May modify | May delete |
//! |---|---|---|---|
//! | admin | every ticket | every ticket | yes |
//! | supervisor | every ticket | every ticket | no |
//! | field engineer | tickets they created or are assigned to | the same | no |

use crate::error::{Result, TicketError};
use crate::provider::TicketFilter;
use crate::ticket::Ticket;
use crate::user::Actor;

/// Whether `actor` may see `ticket`.
#[must_use]
pub fn can_view(actor: &Actor, ticket: &Ticket) -> bool {
    actor.is_elevated() || ticket.involves(actor.id)
}

/// Narrow `filter` to what `actor` may see.
#[must_use]
pub fn scope_filter(actor: &Actor, filter: TicketFilter) -> TicketFilter {
    if actor.is_elevated() {
        filter
    } else {
        filter.involving(actor.id)
    }
}

/// Only the creator, the assignee, a supervisor or an admin may modify a ticket.
///
/// # Errors
///
/// Returns [`TicketError::Auth`] otherwise.
pub fn ensure_can_modify(actor: &Actor, ticket: &Ticket) -> Result<()> {
    if can_view(actor, ticket) {
        Ok(())
    } else {
        Err(TicketError::auth(format!(
            "user {} may not modify ticket {}",
            actor.id, ticket.ticket_number
        )))
    }
}

/// Deletion is restricted to admins.
///
/// # Errors
///
/// Returns [`TicketError::Auth`] for any other role.
pub fn ensure_can_delete(actor: &Actor) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(TicketError::auth("only admins may delete tickets"))
    }
}

/// Require a supervisor or admin for `action`.
///
/// # Errors
///
/// Returns [`TicketError::Auth`] for field engineers.
pub fn ensure_elevated(actor: &Actor, action: &str) -> Result<()> {
    if actor.is_elevated() {
        Ok(())
    } else {
        Err(TicketError::auth(format!(
            "only supervisors and admins may {action}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{TicketId, TicketNumber, UserId};
    use crate::provider::NewTicket;
    use crate::ticket::{TicketDraft, TicketType};
    use crate::user::Role;
    use chrono::Utc;

    fn ticket_by(creator: UserId) -> Ticket {
        let draft = TicketDraft::new("Leak", "Roof leak", TicketType::Fault, "Depot 4");
        NewTicket::from_draft(TicketId::new(), draft, creator, Utc::now())
            .into_ticket(TicketNumber::new(1))
    }

    #[test]
    fn engineers_see_only_their_tickets() {
        let me = Actor::new(UserId::new(), Role::FieldEngineer);
        let mine = ticket_by(me.id);
        let other = ticket_by(UserId::new());
        let mut assigned = ticket_by(UserId::new());
        assigned.assigned_to = Some(me.id);

        assert!(can_view(&me, &mine));
        assert!(can_view(&me, &assigned));
        assert!(!can_view(&me, &other));
        assert!(ensure_can_modify(&me, &other).is_err());
    }

    #[test]
    fn elevated_roles_see_everything() {
        let other = ticket_by(UserId::new());
        for role in [Role::Admin, Role::Supervisor] {
            let actor = Actor::new(UserId::new(), role);
            assert!(can_view(&actor, &other));
            assert!(ensure_can_modify(&actor, &other).is_ok());
        }
    }

    #[test]
    fn only_admins_delete() {
        assert!(ensure_can_delete(&Actor::new(UserId::new(), Role::Admin)).is_ok());
        assert!(ensure_can_delete(&Actor::new(UserId::new(), Role::Supervisor)).is_err());
        assert!(ensure_can_delete(&Actor::new(UserId::new(), Role::FieldEngineer)).is_err());
    }

    #[test]
    fn scope_filter_restricts_engineers_only() {
        let engineer = Actor::new(UserId::new(), Role::FieldEngineer);
        let supervisor = Actor::new(UserId::new(), Role::Supervisor);
        assert_eq!(
            scope_filter(&engineer, TicketFilter::default()).involving,
            Some(engineer.id)
        );
        assert_eq!(scope_filter(&supervisor, TicketFilter::default()).involving, None);
    }
}
