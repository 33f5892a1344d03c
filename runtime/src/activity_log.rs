//! Activity Log - append-only audit trail per ticket.
//!
//! Each side-effecting Ticket Store operation appends exactly one entry.
//! Descriptions are synthesized here from the operation context; there is
//! no update or delete path.

use crate::health::ProviderHealth;
use crate::router::ProviderRouter;
use chrono::{DateTime, Utc};
use fieldops_core::ProviderError;
use fieldops_core::activity::{self, Activity, ActivityType, NewActivity};
use fieldops_core::ids::UserId;
use fieldops_core::lifecycle::{Transition, TransitionKind};
use fieldops_core::media::{TicketMedia, WorkSession};
use fieldops_core::ticket::Ticket;
use fieldops_core::user::UserProfile;
use serde_json::json;

/// Writes and reads ticket activity through the provider router.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    router: ProviderRouter,
}

impl ActivityLog {
    /// Create an activity log on top of `router`.
    #[must_use]
    pub const fn new(router: ProviderRouter) -> Self {
        Self { router }
    }

    async fn append(
        &self,
        health: &ProviderHealth,
        entry: NewActivity,
    ) -> Result<Activity, ProviderError> {
        self.router
            .call(health, "append_activity", |p| p.append_activity(entry.clone()))
            .await
    }

    /// Record ticket creation.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the entry could not be stored.
    pub async fn record_created(
        &self,
        health: &ProviderHealth,
        ticket: &Ticket,
    ) -> Result<Activity, ProviderError> {
        self.append(
            health,
            NewActivity {
                ticket_id: ticket.id,
                user_id: ticket.created_by,
                activity_type: ActivityType::Created,
                description: format!("Ticket {} created: {}", ticket.ticket_number, ticket.title),
                metadata: Some(json!({
                    "ticket_number": ticket.ticket_number.to_string(),
                    "priority": ticket.priority,
                    "ticket_type": ticket.ticket_type,
                })),
                created_at: ticket.created_at,
            },
        )
        .await
    }

    /// Record a lifecycle transition.
    ///
    /// `assignee` is the profile of the new assignee for assignments, used
    /// for the description; the id is used when it is unknown.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the entry could not be stored.
    pub async fn record_transition(
        &self,
        health: &ProviderHealth,
        ticket: &Ticket,
        transition: &Transition,
        assignee: Option<&UserProfile>,
    ) -> Result<Activity, ProviderError> {
        self.append(
            health,
            NewActivity {
                ticket_id: ticket.id,
                user_id: transition.actor,
                activity_type: ActivityType::for_transition(&transition.kind),
                description: describe_transition(transition, assignee),
                metadata: Some(activity::transition_metadata(transition)),
                created_at: transition.at,
            },
        )
        .await
    }

    /// Record an edit of non-lifecycle fields.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the entry could not be stored.
    pub async fn record_edit(
        &self,
        health: &ProviderHealth,
        ticket: &Ticket,
        author: UserId,
        fields: &[&'static str],
        at: DateTime<Utc>,
    ) -> Result<Activity, ProviderError> {
        self.append(
            health,
            NewActivity {
                ticket_id: ticket.id,
                user_id: author,
                activity_type: ActivityType::StatusChange,
                description: "Ticket details updated".to_string(),
                metadata: Some(json!({ "status": ticket.status, "fields": fields })),
                created_at: at,
            },
        )
        .await
    }

    /// Record a comment.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the entry could not be stored.
    pub async fn record_comment(
        &self,
        health: &ProviderHealth,
        ticket: &Ticket,
        author: UserId,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<Activity, ProviderError> {
        self.append(
            health,
            NewActivity {
                ticket_id: ticket.id,
                user_id: author,
                activity_type: ActivityType::Comment,
                description: text.to_string(),
                metadata: None,
                created_at: at,
            },
        )
        .await
    }

    /// Record an attachment.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the entry could not be stored.
    pub async fn record_media(
        &self,
        health: &ProviderHealth,
        media: &TicketMedia,
    ) -> Result<Activity, ProviderError> {
        self.append(
            health,
            NewActivity {
                ticket_id: media.ticket_id,
                user_id: media.uploaded_by,
                activity_type: ActivityType::MediaUpload,
                description: format!("Uploaded {}", media.file_name),
                metadata: Some(json!({
                    "media_id": media.id,
                    "media_type": media.media_type,
                })),
                created_at: media.created_at,
            },
        )
        .await
    }

    /// Record logged work time.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the entry could not be stored.
    pub async fn record_work(
        &self,
        health: &ProviderHealth,
        work: &WorkSession,
        at: DateTime<Utc>,
    ) -> Result<Activity, ProviderError> {
        self.append(
            health,
            NewActivity {
                ticket_id: work.ticket_id,
                user_id: work.user_id,
                activity_type: ActivityType::Comment,
                description: format!("Logged {:.2} hours of work", work.hours()),
                metadata: Some(json!({
                    "work_session_id": work.id,
                    "hours": work.hours(),
                })),
                created_at: at,
            },
        )
        .await
    }

    /// Entries for a ticket, newest first.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the entries could not be loaded.
    pub async fn for_ticket(
        &self,
        health: &ProviderHealth,
        ticket: &Ticket,
    ) -> Result<Vec<Activity>, ProviderError> {
        let id = ticket.id;
        let mut entries = self
            .router
            .call(health, "list_activities", |p| p.list_activities(id))
            .await?;
        activity::sort_newest_first(&mut entries);
        Ok(entries)
    }
}

/// Human-readable description of a transition.
#[must_use]
pub fn describe_transition(transition: &Transition, assignee: Option<&UserProfile>) -> String {
    match transition.kind {
        TransitionKind::Assigned {
            assignee: id,
            previous,
            ..
        } => {
            let name = assignee.map_or_else(|| id.to_string(), |p| p.display_name().to_string());
            if previous.is_some_and(|prev| prev != id) {
                format!("Ticket reassigned to {name}")
            } else {
                format!("Ticket assigned to {name}")
            }
        }
        TransitionKind::Unassigned { .. } => "Assignee removed, ticket reopened".to_string(),
        TransitionKind::Started => "Work started".to_string(),
        TransitionKind::Resolved => "Ticket resolved".to_string(),
        TransitionKind::Verified => "Work verified".to_string(),
        TransitionKind::Closed => "Ticket closed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldops_core::ticket::TicketStatus;
    use fieldops_core::user::Role;

    fn transition(kind: TransitionKind) -> Transition {
        Transition {
            from: TicketStatus::Open,
            to: TicketStatus::Assigned,
            actor: UserId::new(),
            at: Utc::now(),
            kind,
        }
    }

    #[test]
    fn assignment_names_the_assignee() {
        let ana = UserProfile {
            id: UserId::new(),
            email: "ana@example.com".to_string(),
            full_name: "Ana Lima".to_string(),
            role: Role::FieldEngineer,
            phone: None,
            is_active: true,
            created_at: Utc::now(),
        };
        let t = transition(TransitionKind::Assigned {
            assignee: ana.id,
            previous: None,
            first_assignment: true,
        });

        assert_eq!(describe_transition(&t, Some(&ana)), "Ticket assigned to Ana Lima");
        assert_eq!(
            describe_transition(&t, None),
            format!("Ticket assigned to {}", ana.id)
        );
    }

    #[test]
    fn reassignment_is_described_as_such() {
        let t = transition(TransitionKind::Assigned {
            assignee: UserId::new(),
            previous: Some(UserId::new()),
            first_assignment: false,
        });

        assert!(describe_transition(&t, None).starts_with("Ticket reassigned to "));
    }
}
