//! Notification Dispatcher.
//!
//! The Ticket Store hands [`Notice`]s to an outbound bounded queue and moves
//! on. A single worker task drains the queue: it stores the notification
//! record through the provider router, then attempts each configured
//! [`DeliveryChannel`].
//!
//! Delivery is at-most-once. A full or closed queue drops the notice, and a
//! failed record or channel delivery is logged and counted, never retried
//! and never reported to the caller of the store operation.
//!
//! Recipient selection is done by the pure `plan_*` functions so it can be
//! tested without a runtime.

use crate::health::ProviderHealth;
use crate::metrics::NotificationMetrics;
use crate::router::ProviderRouter;
use fieldops_core::environment::Clock;
use fieldops_core::ids::{TicketId, UserId};
use fieldops_core::lifecycle::{Transition, TransitionKind};
use fieldops_core::notification::{NewNotification, Notification, NotificationType};
use fieldops_core::ticket::{Priority, Ticket};
use fieldops_core::user::UserProfile;
use smallvec::SmallVec;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Recipients planned for one event. Most events have one or two.
pub type Notices = SmallVec<[Notice; 4]>;

/// A notification waiting to be stored and delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
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
}

impl Notice {
    fn about(
        ticket: &Ticket,
        user_id: UserId,
        notification_type: NotificationType,
        title: String,
    ) -> Self {
        Self {
            user_id,
            ticket_id: Some(ticket.id),
            notification_type,
            title,
            message: format!("{} - {} ({})", ticket.title, ticket.location, ticket.priority),
        }
    }
}

// ============================================================================
// Recipient planning
// ============================================================================

/// A new ticket notifies every active supervisor and admin.
///
/// The notice is a status change into `open`.
#[must_use]
pub fn plan_created(ticket: &Ticket, users: &[UserProfile]) -> Notices {
    users
        .iter()
        .filter(|user| user.is_active && user.role.is_elevated())
        .map(|user| {
            Notice::about(
                ticket,
                user.id,
                NotificationType::StatusChange,
                format!("New ticket {}", ticket.ticket_number),
            )
        })
        .collect()
}

/// Notices caused by a lifecycle transition.
///
/// - assigned: the new assignee, unless they assigned themselves
/// - resolved: the creator
/// - verified: the assignee, unless they verified their own work
#[must_use]
pub fn plan_transition(ticket: &Ticket, transition: &Transition) -> Notices {
    let mut notices = Notices::new();
    match transition.kind {
        TransitionKind::Assigned { assignee, .. } if assignee != transition.actor => {
            notices.push(Notice::about(
                ticket,
                assignee,
                NotificationType::TicketAssigned,
                format!("Ticket {} assigned to you", ticket.ticket_number),
            ));
        }
        TransitionKind::Resolved => {
            notices.push(Notice::about(
                ticket,
                ticket.created_by,
                NotificationType::StatusChange,
                format!("Ticket {} resolved", ticket.ticket_number),
            ));
        }
        TransitionKind::Verified => {
            if let Some(assignee) = ticket.assigned_to.filter(|a| *a != transition.actor) {
                notices.push(Notice::about(
                    ticket,
                    assignee,
                    NotificationType::Verified,
                    format!("Your work on {} was verified", ticket.ticket_number),
                ));
            }
        }
        _ => {}
    }
    notices
}

/// Notices for an overdue ticket: the assignee (or the creator when
/// unassigned), plus every active supervisor and admin when the ticket is
/// critical.
#[must_use]
pub fn plan_overdue(ticket: &Ticket, users: &[UserProfile]) -> Notices {
    let owner = ticket.assigned_to.unwrap_or(ticket.created_by);
    let mut notices = Notices::new();
    notices.push(Notice::about(
        ticket,
        owner,
        NotificationType::Overdue,
        format!("Ticket {} is overdue", ticket.ticket_number),
    ));

    if ticket.priority == Priority::Critical {
        notices.extend(
            users
                .iter()
                .filter(|user| user.is_active && user.role.is_elevated())
                .map(|user| {
                    Notice::about(
                        ticket,
                        user.id,
                        NotificationType::Escalated,
                        format!("Critical ticket {} escalated", ticket.ticket_number),
                    )
                }),
        );
    }
    notices
}

// ============================================================================
// Delivery channels
// ============================================================================

/// External delivery mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Email
    Email,
    /// Mobile push
    Push,
}

impl ChannelKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel rejected or failed a delivery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{channel} delivery failed: {message}")]
pub struct DeliveryError {
    /// Channel that failed
    pub channel: ChannelKind,
    /// What went wrong
    pub message: String,
}

impl DeliveryError {
    /// Build a delivery error.
    #[must_use]
    pub fn new(channel: ChannelKind, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
        }
    }
}

/// Boxed future returned by [`DeliveryChannel::deliver`].
pub type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;

/// Hands a stored notification to an external delivery mechanism.
pub trait DeliveryChannel: Send + Sync {
    /// Which flag on the record this channel sets.
    fn kind(&self) -> ChannelKind;

    /// Attempt delivery.
    fn deliver<'a>(&'a self, notification: &'a Notification) -> DeliveryFuture<'a>;
}

/// Channel that writes each delivery to the log.
#[derive(Debug, Clone, Copy)]
pub struct LoggingChannel {
    kind: ChannelKind,
}

impl LoggingChannel {
    /// Logging channel standing in for email.
    #[must_use]
    pub const fn email() -> Self {
        Self {
            kind: ChannelKind::Email,
        }
    }

    /// Logging channel standing in for push.
    #[must_use]
    pub const fn push() -> Self {
        Self {
            kind: ChannelKind::Push,
        }
    }
}

impl DeliveryChannel for LoggingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn deliver<'a>(&'a self, notification: &'a Notification) -> DeliveryFuture<'a> {
        Box::pin(async move {
            tracing::info!(
                channel = %self.kind,
                user_id = %notification.user_id,
                notification_type = %notification.notification_type,
                title = %notification.title,
                "Notification delivered"
            );
            Ok(())
        })
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

enum Envelope {
    Notice {
        notice: Notice,
        health: ProviderHealth,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle to the outbound notification queue.
///
/// Cloning yields another sender for the same queue. The worker stops once
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Envelope>,
}

impl NotificationDispatcher {
    /// Start the worker and return the queue handle.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(
        router: ProviderRouter,
        channels: Vec<Arc<dyn DeliveryChannel>>,
        clock: Arc<dyn Clock>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = Worker {
            router,
            channels,
            clock,
        };
        let handle = tokio::spawn(worker.run(rx));
        (Self { tx }, handle)
    }

    /// Enqueue a notice without waiting.
    ///
    /// The record is written through the provider selected by `health`.
    /// Returns `false` if the notice was dropped.
    pub fn dispatch(&self, health: &ProviderHealth, notice: Notice) -> bool {
        let envelope = Envelope::Notice {
            notice,
            health: health.clone(),
        };
        match self.tx.try_send(envelope) {
            Ok(()) => {
                NotificationMetrics::record_enqueued();
                true
            }
            Err(mpsc::error::TrySendError::Full(Envelope::Notice { notice, .. })) => {
                tracing::warn!(
                    user_id = %notice.user_id,
                    notification_type = %notice.notification_type,
                    "Notification queue full, dropping notice"
                );
                NotificationMetrics::record_dropped();
                false
            }
            Err(_) => {
                tracing::warn!("Notification worker stopped, dropping notice");
                NotificationMetrics::record_dropped();
                false
            }
        }
    }

    /// Enqueue several notices. Returns how many were accepted.
    pub fn dispatch_all(
        &self,
        health: &ProviderHealth,
        notices: impl IntoIterator<Item = Notice>,
    ) -> usize {
        notices
            .into_iter()
            .filter(|notice| self.dispatch(health, notice.clone()))
            .count()
    }

    /// Wait until every notice enqueued before this call has been processed.
    ///
    /// Returns `false` if the worker is no longer running.
    pub async fn flush(&self) -> bool {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Envelope::Flush(done)).await.is_err() {
            return false;
        }
        wait.await.is_ok()
    }
}

struct Worker {
    router: ProviderRouter,
    channels: Vec<Arc<dyn DeliveryChannel>>,
    clock: Arc<dyn Clock>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<Envelope>) {
        tracing::debug!(channels = self.channels.len(), "Notification worker started");
        while let Some(envelope) = rx.recv().await {
            match envelope {
                Envelope::Notice { notice, health } => self.process(notice, &health).await,
                Envelope::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        tracing::debug!("Notification worker stopped");
    }

    fn attempts(&self, kind: ChannelKind) -> bool {
        self.channels.iter().any(|channel| channel.kind() == kind)
    }

    async fn process(&self, notice: Notice, health: &ProviderHealth) {
        let record = NewNotification {
            user_id: notice.user_id,
            ticket_id: notice.ticket_id,
            notification_type: notice.notification_type,
            title: notice.title,
            message: notice.message,
            email_sent: self.attempts(ChannelKind::Email),
            push_sent: self.attempts(ChannelKind::Push),
            created_at: self.clock.now(),
        };

        let notification = match self
            .router
            .call(health, "create_notification", |p| {
                p.create_notification(record.clone())
            })
            .await
        {
            Ok(notification) => {
                NotificationMetrics::record_created();
                notification
            }
            Err(error) => {
                tracing::warn!(
                    user_id = %record.user_id,
                    error = %error,
                    "Failed to store notification"
                );
                NotificationMetrics::record_failed();
                return;
            }
        };

        for channel in &self.channels {
            if let Err(error) = channel.deliver(&notification).await {
                tracing::warn!(
                    notification_id = %notification.id,
                    error = %error,
                    "Notification delivery failed"
                );
                NotificationMetrics::record_delivery_failure(channel.kind().as_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

    use super::*;
    use crate::mock::InMemoryProvider;
    use chrono::Utc;
    use fieldops_core::environment::SystemClock;
    use fieldops_core::ids::TicketNumber;
    use fieldops_core::provider::{DataProvider, NewTicket};
    use fieldops_core::ticket::{TicketDraft, TicketStatus, TicketType};
    use fieldops_core::user::Role;

    fn profile(role: Role, active: bool) -> UserProfile {
        UserProfile {
            id: UserId::new(),
            email: format!("{role}@example.com"),
            full_name: role.to_string(),
            role,
            phone: None,
            is_active: active,
            created_at: Utc::now(),
        }
    }

    fn ticket(created_by: UserId) -> Ticket {
        let draft = TicketDraft::new("AC repair", "warm air", TicketType::Fault, "Building A");
        NewTicket::from_draft(TicketId::new(), draft, created_by, Utc::now())
            .into_ticket(TicketNumber::new(12))
    }

    fn transition(actor: UserId, kind: TransitionKind) -> Transition {
        Transition {
            from: TicketStatus::Open,
            to: TicketStatus::Assigned,
            actor,
            at: Utc::now(),
            kind,
        }
    }

    // ========================================================================
    // Planning
    // ========================================================================

    #[test]
    fn created_notifies_active_elevated_users() {
        let admin = profile(Role::Admin, true);
        let supervisor = profile(Role::Supervisor, true);
        let retired = profile(Role::Supervisor, false);
        let engineer = profile(Role::FieldEngineer, true);
        let users = vec![admin.clone(), supervisor.clone(), retired, engineer.clone()];

        let notices = plan_created(&ticket(engineer.id), &users);

        let recipients: Vec<_> = notices.iter().map(|n| n.user_id).collect();
        assert_eq!(recipients, vec![admin.id, supervisor.id]);
        assert!(notices.iter().all(|n| n.title == "New ticket TKT-000012"));
        assert!(
            notices
                .iter()
                .all(|n| n.notification_type == NotificationType::StatusChange)
        );
    }

    #[test]
    fn assignment_notifies_assignee_unless_self_assigned() {
        let supervisor = UserId::new();
        let engineer = UserId::new();
        let t = ticket(engineer);

        let notices = plan_transition(
            &t,
            &transition(
                supervisor,
                TransitionKind::Assigned {
                    assignee: engineer,
                    previous: None,
                    first_assignment: true,
                },
            ),
        );
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].user_id, engineer);
        assert_eq!(notices[0].notification_type, NotificationType::TicketAssigned);

        let self_assigned = plan_transition(
            &t,
            &transition(
                engineer,
                TransitionKind::Assigned {
                    assignee: engineer,
                    previous: None,
                    first_assignment: true,
                },
            ),
        );
        assert!(self_assigned.is_empty());
    }

    #[test]
    fn resolution_notifies_creator() {
        let creator = UserId::new();
        let notices = plan_transition(
            &ticket(creator),
            &transition(UserId::new(), TransitionKind::Resolved),
        );

        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].user_id, creator);
        assert_eq!(notices[0].notification_type, NotificationType::StatusChange);
    }

    #[test]
    fn verification_notifies_assignee() {
        let engineer = UserId::new();
        let mut t = ticket(UserId::new());
        t.assigned_to = Some(engineer);

        let notices = plan_transition(&t, &transition(UserId::new(), TransitionKind::Verified));

        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].notification_type, NotificationType::Verified);
        assert!(plan_transition(&t, &transition(UserId::new(), TransitionKind::Started)).is_empty());
    }

    #[test]
    fn critical_overdue_escalates_to_supervisors() {
        let supervisor = profile(Role::Supervisor, true);
        let creator = UserId::new();
        let mut t = ticket(creator);

        let plain = plan_overdue(&t, std::slice::from_ref(&supervisor));
        assert_eq!(plain.len(), 1);
        assert_eq!(plain[0].user_id, creator);

        t.priority = Priority::Critical;
        let escalated = plan_overdue(&t, std::slice::from_ref(&supervisor));
        assert_eq!(escalated.len(), 2);
        assert_eq!(escalated[1].user_id, supervisor.id);
        assert_eq!(escalated[1].notification_type, NotificationType::Escalated);
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    struct BrokenChannel;

    impl DeliveryChannel for BrokenChannel {
        fn kind(&self) -> ChannelKind {
            ChannelKind::Push
        }

        fn deliver<'a>(&'a self, _notification: &'a Notification) -> DeliveryFuture<'a> {
            Box::pin(async { Err(DeliveryError::new(ChannelKind::Push, "gateway down")) })
        }
    }

    fn dispatcher(
        channels: Vec<Arc<dyn DeliveryChannel>>,
        capacity: usize,
    ) -> (NotificationDispatcher, Arc<InMemoryProvider>, ProviderHealth) {
        let mock = Arc::new(InMemoryProvider::new());
        let router = ProviderRouter::mock_only(mock.clone());
        let health = router.new_health(true);
        let (dispatcher, _worker) =
            NotificationDispatcher::spawn(router, channels, Arc::new(SystemClock), capacity);
        (dispatcher, mock, health)
    }

    fn notice(user_id: UserId) -> Notice {
        Notice {
            user_id,
            ticket_id: None,
            notification_type: NotificationType::StatusChange,
            title: "Hello".to_string(),
            message: "World".to_string(),
        }
    }

    #[tokio::test]
    async fn worker_stores_record_with_attempted_channels() {
        let (dispatcher, mock, health) = dispatcher(vec![Arc::new(LoggingChannel::email())], 8);
        let user = UserId::new();

        assert!(dispatcher.dispatch(&health, notice(user)));
        assert!(dispatcher.flush().await);

        let stored = mock.list_notifications(user).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].email_sent);
        assert!(!stored[0].push_sent);
        assert!(!stored[0].is_read);
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let (dispatcher, mock, health) = dispatcher(vec![Arc::new(BrokenChannel)], 8);
        let user = UserId::new();

        dispatcher.dispatch(&health, notice(user));
        dispatcher.dispatch(&health, notice(user));
        assert!(dispatcher.flush().await);

        let stored = mock.list_notifications(user).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|n| n.push_sent));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_drops_instead_of_blocking() {
        let (dispatcher, _mock, health) = dispatcher(Vec::new(), 1);
        let user = UserId::new();

        // The worker cannot run until this task yields, so the second
        // notice finds the queue full.
        assert!(dispatcher.dispatch(&health, notice(user)));
        assert!(!dispatcher.dispatch(&health, notice(user)));
        assert_eq!(dispatcher.dispatch_all(&health, [notice(user), notice(user)]), 0);
    }
}
