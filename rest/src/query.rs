//! Query-string encoding for PostgREST-style filters.

use fieldops_core::ids::{TicketId, UserId};
use fieldops_core::provider::TicketFilter;

/// `eq.{value}` operator.
pub fn eq(value: impl ToString) -> String {
    format!("eq.{}", value.to_string())
}

/// Rows where `created_by` or `assigned_to` is `user`.
fn involving(user: UserId) -> String {
    format!("(created_by.eq.{user},assigned_to.eq.{user})")
}

/// Query parameters selecting the tickets matched by `filter`, newest first.
pub fn tickets(filter: &TicketFilter) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(6);
    if let Some(user) = filter.involving {
        params.push(("or", involving(user)));
    }
    if let Some(user) = filter.assigned_to {
        params.push(("assigned_to", eq(user)));
    }
    if let Some(status) = filter.status {
        params.push(("status", eq(status)));
    }
    if let Some(priority) = filter.priority {
        params.push(("priority", eq(priority)));
    }
    if let Some(ticket_type) = filter.ticket_type {
        params.push(("ticket_type", eq(ticket_type)));
    }
    params.push(("order", "created_at.desc,ticket_number.desc".to_string()));
    params
}

/// Rows attached to `ticket_id`, newest first.
pub fn by_ticket(ticket_id: TicketId) -> [(&'static str, String); 2] {
    [
        ("ticket_id", eq(ticket_id)),
        ("order", "created_at.desc".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldops_core::ticket::{Priority, TicketStatus};

    #[test]
    fn empty_filter_only_orders() {
        assert_eq!(
            tickets(&TicketFilter::default()),
            vec![("order", "created_at.desc,ticket_number.desc".to_string())]
        );
    }

    #[test]
    fn filter_fields_become_eq_params() {
        let user = UserId::new();
        let filter = TicketFilter::default()
            .involving(user)
            .status(TicketStatus::InProgress)
            .priority(Priority::Critical);

        let params = tickets(&filter);
        assert_eq!(params[0], ("or", format!("(created_by.eq.{user},assigned_to.eq.{user})")));
        assert!(params.contains(&("status", "eq.in_progress".to_string())));
        assert!(params.contains(&("priority", "eq.critical".to_string())));
    }
}
