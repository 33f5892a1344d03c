//! Ticket Store - the imperative shell around the Lifecycle Engine.
//!
//! Every operation resolves the actor from the [`Session`], enforces
//! role-scoped access, and talks to the data backend through the session's
//! provider routing. Mutations follow a fixed order:
//!
//! 1. persist the ticket
//! 2. append one Activity Log entry
//! 3. hand notices to the Notification Dispatcher
//!
//! Steps 1 and 2 propagate their errors. Step 3 never fails the operation.
//!
//! Concurrent updates to the same ticket are not serialized here; the last
//! write wins at the provider.

use crate::activity_log::ActivityLog;
use crate::health::ProviderHealth;
use crate::metrics::StoreMetrics;
use crate::notify::{self, NotificationDispatcher};
use crate::router::ProviderRouter;
use crate::session::Session;
use chrono::{DateTime, Utc};
use fieldops_core::access;
use fieldops_core::activity::Activity;
use fieldops_core::environment::Clock;
use fieldops_core::equipment::Equipment;
use fieldops_core::identity::IdentityProvider;
use fieldops_core::ids::{MediaId, NotificationId, TicketId, UserId, WorkSessionId};
use fieldops_core::lifecycle::{LifecycleCommand, LifecycleEngine, Transition};
use fieldops_core::media::{MediaType, TicketMedia, WorkSession};
use fieldops_core::notification::Notification;
use fieldops_core::provider::{NewTicket, TicketFilter};
use fieldops_core::stats::UserStats;
use fieldops_core::ticket::{Assignment, Ticket, TicketDraft, TicketPatch};
use fieldops_core::user::{Actor, Role, UserProfile};
use fieldops_core::{Result, TicketError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// An attachment to record against a ticket. The file itself lives in
/// external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUpload {
    /// Kind of file
    pub media_type: MediaType,
    /// Original file name
    pub file_name: String,
    /// Location in external storage
    pub storage_path: String,
}

/// A block of work time to log against a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkLog {
    /// Start of the work
    pub started_at: DateTime<Utc>,
    /// End of the work
    pub ended_at: DateTime<Utc>,
    /// Free-text notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// A ticket with everything attached to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketDetail {
    /// The ticket
    pub ticket: Ticket,
    /// Activity Log, newest first
    pub activities: Vec<Activity>,
    /// Attachments
    pub media: Vec<TicketMedia>,
    /// Logged work
    pub work_sessions: Vec<WorkSession>,
}

/// Single point of truth for reading and mutating tickets.
#[derive(Clone)]
pub struct TicketStore {
    router: ProviderRouter,
    engine: LifecycleEngine,
    clock: Arc<dyn Clock>,
    activity: ActivityLog,
    notifier: NotificationDispatcher,
}

impl std::fmt::Debug for TicketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketStore")
            .field("router", &self.router)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl TicketStore {
    /// Create a store.
    #[must_use]
    pub fn new(
        router: ProviderRouter,
        engine: LifecycleEngine,
        clock: Arc<dyn Clock>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            activity: ActivityLog::new(router.clone()),
            router,
            engine,
            clock,
            notifier,
        }
    }

    /// Open a session for `identity` with its own provider health.
    #[must_use]
    pub fn open_session(
        &self,
        identity: Arc<dyn IdentityProvider>,
        initially_available: bool,
    ) -> Session {
        Session::new(identity, self.router.new_health(initially_available))
    }

    /// The provider routing used by this store.
    #[must_use]
    pub const fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// The Activity Log used by this store.
    #[must_use]
    pub const fn activity_log(&self) -> &ActivityLog {
        &self.activity
    }

    /// The notification queue used by this store.
    #[must_use]
    pub const fn notifier(&self) -> &NotificationDispatcher {
        &self.notifier
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Tickets visible to the signed-in user, newest first.
    ///
    /// Admins and supervisors see every ticket; field engineers see the
    /// tickets they created or are assigned to.
    ///
    /// # Errors
    ///
    /// [`TicketError::Auth`] without a signed-in user,
    /// [`TicketError::Provider`] if the backend fails without fallback.
    pub async fn list(&self, session: &Session) -> Result<Vec<Ticket>> {
        self.list_filtered(session, TicketFilter::default()).await
    }

    /// Visible tickets that also satisfy `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Same as [`TicketStore::list`].
    #[tracing::instrument(skip(self, session))]
    pub async fn list_filtered(
        &self,
        session: &Session,
        filter: TicketFilter,
    ) -> Result<Vec<Ticket>> {
        let started = Instant::now();
        let actor = session.actor()?;
        let filter = access::scope_filter(&actor, filter);

        let mut tickets = self
            .router
            .call(session.health(), "list_tickets", |p| p.list_tickets(filter.clone()))
            .await?;

        // A backend may ignore part of the filter; visibility is enforced here.
        tickets.retain(|ticket| filter.matches(ticket));
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        StoreMetrics::record_operation("list", started.elapsed());
        Ok(tickets)
    }

    /// One visible ticket.
    ///
    /// # Errors
    ///
    /// [`TicketError::NotFound`] if the ticket does not exist or is not
    /// visible to the caller.
    #[tracing::instrument(skip(self, session))]
    pub async fn get(&self, session: &Session, id: TicketId) -> Result<Ticket> {
        let actor = session.actor()?;
        let ticket = self.fetch(session.health(), id).await?;
        if !access::can_view(&actor, &ticket) {
            return Err(TicketError::not_found("ticket", id));
        }
        Ok(ticket)
    }

    /// Visible tickets past their due date with work outstanding.
    ///
    /// # Errors
    ///
    /// Same as [`TicketStore::list`].
    pub async fn overdue(&self, session: &Session) -> Result<Vec<Ticket>> {
        let now = self.clock.now();
        let mut tickets = self.list(session).await?;
        tickets.retain(|ticket| ticket.is_overdue(now));
        Ok(tickets)
    }

    /// A visible ticket with its activities, attachments and work sessions.
    ///
    /// # Errors
    ///
    /// Same as [`TicketStore::get`].
    #[tracing::instrument(skip(self, session))]
    pub async fn detail(&self, session: &Session, id: TicketId) -> Result<TicketDetail> {
        let ticket = self.get(session, id).await?;
        let health = session.health();

        let (activities, media, work_sessions) = futures::try_join!(
            self.activity.for_ticket(health, &ticket),
            self.router.call(health, "list_media", |p| p.list_media(id)),
            self.router
                .call(health, "list_work_sessions", |p| p.list_work_sessions(id)),
        )?;

        Ok(TicketDetail {
            ticket,
            activities,
            media,
            work_sessions,
        })
    }

    /// User profiles, optionally restricted to one role.
    ///
    /// # Errors
    ///
    /// [`TicketError::Auth`] without a signed-in user.
    pub async fn users(&self, session: &Session, role: Option<Role>) -> Result<Vec<UserProfile>> {
        session.actor()?;
        Ok(self
            .router
            .call(session.health(), "list_users", |p| p.list_users(role))
            .await?)
    }

    /// All equipment.
    ///
    /// # Errors
    ///
    /// [`TicketError::Auth`] without a signed-in user.
    pub async fn equipment(&self, session: &Session) -> Result<Vec<Equipment>> {
        session.actor()?;
        Ok(self
            .router
            .call(session.health(), "list_equipment", |p| p.list_equipment())
            .await?)
    }

    /// Workload statistics. Field engineers may only read their own.
    ///
    /// # Errors
    ///
    /// [`TicketError::Auth`] when a field engineer asks for someone else.
    pub async fn user_stats(&self, session: &Session, user_id: UserId) -> Result<UserStats> {
        let actor = session.actor()?;
        if !actor.is_elevated() && actor.id != user_id {
            return Err(TicketError::auth(
                "field engineers may only view their own statistics",
            ));
        }
        let now = self.clock.now();
        Ok(self
            .router
            .call(session.health(), "user_stats", |p| p.user_stats(user_id, now))
            .await?)
    }

    /// Notifications addressed to the signed-in user, newest first.
    ///
    /// # Errors
    ///
    /// [`TicketError::Auth`] without a signed-in user.
    pub async fn notifications(&self, session: &Session) -> Result<Vec<Notification>> {
        let actor = session.actor()?;
        Ok(self
            .router
            .call(session.health(), "list_notifications", |p| {
                p.list_notifications(actor.id)
            })
            .await?)
    }

    /// Mark one of the signed-in user's notifications as read.
    ///
    /// # Errors
    ///
    /// [`TicketError::NotFound`] if the notification does not exist or
    /// belongs to someone else.
    pub async fn mark_notification_read(
        &self,
        session: &Session,
        id: NotificationId,
    ) -> Result<Notification> {
        let own = self.notifications(session).await?;
        if !own.iter().any(|n| n.id == id) {
            return Err(TicketError::not_found("notification", id));
        }
        self.router
            .call(session.health(), "mark_notification_read", |p| {
                p.mark_notification_read(id)
            })
            .await?
            .ok_or_else(|| TicketError::not_found("notification", id))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a ticket owned by the signed-in user.
    ///
    /// The ticket starts `open` with `created_at == updated_at`; the
    /// provider assigns its number.
    ///
    /// # Errors
    ///
    /// [`TicketError::Validation`] for a missing title, description or
    /// location; [`TicketError::Auth`] without a signed-in user.
    #[tracing::instrument(skip(self, session, draft), fields(title = %draft.title))]
    pub async fn create(&self, session: &Session, draft: TicketDraft) -> Result<Ticket> {
        let started = Instant::now();
        let actor = session.actor()?;
        draft.validate()?;
        let health = session.health();

        let record = NewTicket::from_draft(TicketId::new(), draft, actor.id, self.clock.now());
        let ticket = self
            .router
            .call(health, "create_ticket", |p| p.create_ticket(record.clone()))
            .await?;
        self.activity.record_created(health, &ticket).await?;

        tracing::info!(
            ticket_id = %ticket.id,
            ticket_number = %ticket.ticket_number,
            created_by = %actor.id,
            "Ticket created"
        );

        match self.all_users(health).await {
            Ok(users) => {
                self.notifier
                    .dispatch_all(health, notify::plan_created(&ticket, &users));
            }
            Err(error) => {
                tracing::warn!(error = %error, "Could not load recipients for new ticket notice");
            }
        }

        StoreMetrics::record_operation("create", started.elapsed());
        Ok(ticket)
    }

    /// Apply a partial update.
    ///
    /// Status and assignment go through the Lifecycle Engine; other fields
    /// are applied directly. `updated_at` is refreshed on every change. A
    /// patch that changes nothing returns the stored ticket without writing.
    ///
    /// # Errors
    ///
    /// - [`TicketError::NotFound`] if the ticket or the new assignee does not exist
    /// - [`TicketError::Auth`] if the caller may not modify the ticket or
    ///   trigger the transition
    /// - [`TicketError::InvalidTransition`] for an illegal status change
    /// - [`TicketError::Validation`] for a malformed patch
    #[tracing::instrument(skip(self, session, patch))]
    pub async fn update(
        &self,
        session: &Session,
        id: TicketId,
        patch: TicketPatch,
    ) -> Result<Ticket> {
        let started = Instant::now();
        let actor = session.actor()?;
        patch.validate()?;
        let health = session.health();
        let current = self.fetch_for_modify(health, &actor, id).await?;

        let command = if patch.affects_lifecycle() {
            LifecycleEngine::command_for(&current, &patch)?
        } else {
            None
        };
        let fields = changed_fields(&patch);
        if command.is_none() && fields.is_empty() {
            return Ok(current);
        }

        let now = self.clock.now();
        let mut ticket = current;
        let transition = match command {
            Some(command) => Some(self.engine.apply(&mut ticket, &actor, command, now)?),
            None => None,
        };
        let assignee = match command {
            Some(LifecycleCommand::Assign { assignee }) => {
                Some(self.assignee(health, assignee).await?)
            }
            _ => None,
        };
        ticket.apply_fields(&patch);
        ticket.updated_at = ticket.updated_at.max(now);

        let ticket = self
            .router
            .call(health, "update_ticket", |p| p.update_ticket(ticket.clone()))
            .await?;

        if let Some(transition) = &transition {
            self.activity
                .record_transition(health, &ticket, transition, assignee.as_ref())
                .await?;
            self.announce(health, &ticket, transition);
        }
        if !fields.is_empty() {
            self.activity
                .record_edit(health, &ticket, actor.id, &fields, now)
                .await?;
            tracing::debug!(ticket_id = %ticket.id, ?fields, "Ticket fields updated");
        }

        StoreMetrics::record_operation("update", started.elapsed());
        Ok(ticket)
    }

    /// Assign a ticket to `assignee`, or unassign it with `None`.
    ///
    /// Field engineers may only assign tickets to themselves, and only when
    /// the ticket is unassigned or already theirs.
    ///
    /// # Errors
    ///
    /// Same as [`TicketStore::update`].
    pub async fn assign(
        &self,
        session: &Session,
        id: TicketId,
        assignee: Option<UserId>,
    ) -> Result<Ticket> {
        let assignment = assignee.map_or(Assignment::Clear, Assignment::To);
        self.update(session, id, TicketPatch::assignment(assignment)).await
    }

    /// Delete a ticket permanently. Admins only.
    ///
    /// # Errors
    ///
    /// [`TicketError::Auth`] for other roles, [`TicketError::NotFound`] if
    /// the ticket does not exist.
    #[tracing::instrument(skip(self, session))]
    pub async fn delete(&self, session: &Session, id: TicketId) -> Result<()> {
        let actor = session.actor()?;
        access::ensure_can_delete(&actor)?;
        let health = session.health();
        let ticket = self.fetch(health, id).await?;

        self.router
            .call(health, "delete_ticket", |p| p.delete_ticket(id))
            .await?;

        tracing::info!(
            ticket_id = %id,
            ticket_number = %ticket.ticket_number,
            deleted_by = %actor.id,
            "Ticket deleted"
        );
        Ok(())
    }

    /// Add a comment to a ticket's Activity Log.
    ///
    /// # Errors
    ///
    /// [`TicketError::Validation`] for blank text, otherwise as
    /// [`TicketStore::update`].
    #[tracing::instrument(skip(self, session, text))]
    pub async fn comment(&self, session: &Session, id: TicketId, text: &str) -> Result<Activity> {
        let actor = session.actor()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(TicketError::validation("comment is required"));
        }
        let health = session.health();
        let ticket = self.fetch_for_modify(health, &actor, id).await?;

        Ok(self
            .activity
            .record_comment(health, &ticket, actor.id, text, self.clock.now())
            .await?)
    }

    /// Record an attachment and log the upload.
    ///
    /// # Errors
    ///
    /// [`TicketError::Validation`] for a blank file name or storage path,
    /// otherwise as [`TicketStore::update`].
    #[tracing::instrument(skip(self, session))]
    pub async fn attach_media(
        &self,
        session: &Session,
        id: TicketId,
        upload: MediaUpload,
    ) -> Result<TicketMedia> {
        let actor = session.actor()?;
        if upload.file_name.trim().is_empty() {
            return Err(TicketError::validation("file_name is required"));
        }
        if upload.storage_path.trim().is_empty() {
            return Err(TicketError::validation("storage_path is required"));
        }
        let health = session.health();
        let ticket = self.fetch_for_modify(health, &actor, id).await?;

        let media = TicketMedia {
            id: MediaId::new(),
            ticket_id: ticket.id,
            uploaded_by: actor.id,
            media_type: upload.media_type,
            file_name: upload.file_name.trim().to_string(),
            storage_path: upload.storage_path,
            created_at: self.clock.now(),
        };
        let media = self
            .router
            .call(health, "add_media", |p| p.add_media(media.clone()))
            .await?;
        self.activity.record_media(health, &media).await?;
        Ok(media)
    }

    /// Log work time and add it to the ticket's `actual_hours`.
    ///
    /// # Errors
    ///
    /// [`TicketError::Validation`] when the work ends before it starts,
    /// otherwise as [`TicketStore::update`].
    #[tracing::instrument(skip(self, session))]
    pub async fn log_work(
        &self,
        session: &Session,
        id: TicketId,
        work: WorkLog,
    ) -> Result<WorkSession> {
        let actor = session.actor()?;
        if work.ended_at < work.started_at {
            return Err(TicketError::validation("work cannot end before it starts"));
        }
        let health = session.health();
        let mut ticket = self.fetch_for_modify(health, &actor, id).await?;
        let now = self.clock.now();

        let entry = WorkSession {
            id: WorkSessionId::new(),
            ticket_id: ticket.id,
            user_id: actor.id,
            started_at: work.started_at,
            ended_at: work.ended_at,
            notes: work.notes.filter(|notes| !notes.trim().is_empty()),
        };
        let entry = self
            .router
            .call(health, "add_work_session", |p| p.add_work_session(entry.clone()))
            .await?;

        ticket.actual_hours = Some(ticket.actual_hours.unwrap_or(0.0) + entry.hours());
        ticket.updated_at = ticket.updated_at.max(now);
        self.router
            .call(health, "update_ticket", |p| p.update_ticket(ticket.clone()))
            .await?;
        self.activity.record_work(health, &entry, now).await?;
        Ok(entry)
    }

    /// Notify owners of every visible overdue ticket, escalating critical
    /// ones to supervisors. Supervisors and admins only.
    ///
    /// Returns how many notices were queued.
    ///
    /// # Errors
    ///
    /// [`TicketError::Auth`] for field engineers.
    #[tracing::instrument(skip(self, session))]
    pub async fn escalate_overdue(&self, session: &Session) -> Result<usize> {
        let actor = session.actor()?;
        access::ensure_elevated(&actor, "escalate overdue tickets")?;
        let overdue = self.overdue(session).await?;
        if overdue.is_empty() {
            return Ok(0);
        }
        let health = session.health();
        let users = self.all_users(health).await?;

        let queued: usize = overdue
            .iter()
            .map(|ticket| {
                self.notifier
                    .dispatch_all(health, notify::plan_overdue(ticket, &users))
            })
            .sum();
        tracing::info!(tickets = overdue.len(), queued, "Overdue tickets escalated");
        Ok(queued)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn fetch(&self, health: &ProviderHealth, id: TicketId) -> Result<Ticket> {
        self.router
            .call(health, "get_ticket", |p| p.get_ticket(id))
            .await?
            .ok_or_else(|| TicketError::not_found("ticket", id))
    }

    async fn fetch_for_modify(
        &self,
        health: &ProviderHealth,
        actor: &Actor,
        id: TicketId,
    ) -> Result<Ticket> {
        let ticket = self.fetch(health, id).await?;
        access::ensure_can_modify(actor, &ticket)?;
        Ok(ticket)
    }

    async fn assignee(&self, health: &ProviderHealth, id: UserId) -> Result<UserProfile> {
        let profile = self
            .router
            .call(health, "get_user", |p| p.get_user(id))
            .await?
            .ok_or_else(|| TicketError::not_found("user", id))?;
        if !profile.is_active {
            return Err(TicketError::validation(format!(
                "cannot assign to inactive user {}",
                profile.email
            )));
        }
        Ok(profile)
    }

    async fn all_users(&self, health: &ProviderHealth) -> Result<Vec<UserProfile>> {
        Ok(self
            .router
            .call(health, "list_users", |p| p.list_users(None))
            .await?)
    }

    fn announce(&self, health: &ProviderHealth, ticket: &Ticket, transition: &Transition) {
        tracing::info!(
            ticket_id = %ticket.id,
            ticket_number = %ticket.ticket_number,
            from = %transition.from,
            to = %transition.to,
            actor = %transition.actor,
            "Ticket transitioned"
        );
        StoreMetrics::record_transition(transition.to.as_str());
        self.notifier
            .dispatch_all(health, notify::plan_transition(ticket, transition));
    }
}

/// Names of the non-lifecycle fields a patch sets.
fn changed_fields(patch: &TicketPatch) -> Vec<&'static str> {
    [
        ("title", patch.title.is_some()),
        ("description", patch.description.is_some()),
        ("ticket_type", patch.ticket_type.is_some()),
        ("priority", patch.priority.is_some()),
        ("location", patch.location.is_some()),
        ("coordinates", patch.coordinates.is_some()),
        ("equipment_id", patch.equipment_id.is_some()),
        ("estimated_hours", patch.estimated_hours.is_some()),
        ("actual_hours", patch.actual_hours.is_some()),
        ("estimated_cost", patch.estimated_cost.is_some()),
        ("actual_cost", patch.actual_cost.is_some()),
    ]
    .into_iter()
    .filter_map(|(name, set)| set.then_some(name))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldops_core::ticket::{Priority, TicketStatus};

    #[test]
    fn changed_fields_ignores_lifecycle_requests() {
        let patch = TicketPatch {
            title: Some("New title".to_string()),
            priority: Some(Priority::High),
            status: Some(TicketStatus::InProgress),
            ..TicketPatch::default()
        };

        assert_eq!(changed_fields(&patch), vec!["title", "priority"]);
        assert!(changed_fields(&TicketPatch::status(TicketStatus::Resolved)).is_empty());
    }
}
