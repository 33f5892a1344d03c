//! Scriptable data providers for exercising fallback routing.
//!
//! - [`FailingProvider`]: every call fails, as if the backend were down
//! - [`FlakyProvider`]: the first N calls fail, then calls go through to an
//!   inner provider, as if the backend had a transient outage

use chrono::{DateTime, Utc};
use fieldops_core::ProviderError;
use fieldops_core::activity::{Activity, NewActivity};
use fieldops_core::equipment::Equipment;
use fieldops_core::ids::{NotificationId, TicketId, UserId};
use fieldops_core::media::{TicketMedia, WorkSession};
use fieldops_core::notification::{NewNotification, Notification};
use fieldops_core::provider::{ChangeNotice, DataProvider, NewTicket, ProviderFuture, TicketFilter};
use fieldops_core::stats::UserStats;
use fieldops_core::ticket::Ticket;
use fieldops_core::user::{Role, UserProfile};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

fn outage<'a, T: Send + 'a>() -> ProviderFuture<'a, T> {
    Box::pin(async { Err(ProviderError::Unavailable("simulated outage".to_string())) })
}

/// Provider whose every call fails with [`ProviderError::Unavailable`].
#[derive(Debug, Default)]
pub struct FailingProvider {
    calls: AtomicUsize,
}

impl FailingProvider {
    /// Create a failing provider.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    /// How many calls were attempted.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<'a, T: Send + 'a>(&self) -> ProviderFuture<'a, T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        outage()
    }
}

impl DataProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn list_tickets(&self, _filter: TicketFilter) -> ProviderFuture<'_, Vec<Ticket>> {
        self.fail()
    }

    fn get_ticket(&self, _id: TicketId) -> ProviderFuture<'_, Option<Ticket>> {
        self.fail()
    }

    fn create_ticket(&self, _ticket: NewTicket) -> ProviderFuture<'_, Ticket> {
        self.fail()
    }

    fn update_ticket(&self, _ticket: Ticket) -> ProviderFuture<'_, Ticket> {
        self.fail()
    }

    fn delete_ticket(&self, _id: TicketId) -> ProviderFuture<'_, ()> {
        self.fail()
    }

    fn list_users(&self, _role: Option<Role>) -> ProviderFuture<'_, Vec<UserProfile>> {
        self.fail()
    }

    fn get_user(&self, _id: UserId) -> ProviderFuture<'_, Option<UserProfile>> {
        self.fail()
    }

    fn list_equipment(&self) -> ProviderFuture<'_, Vec<Equipment>> {
        self.fail()
    }

    fn append_activity(&self, _activity: NewActivity) -> ProviderFuture<'_, Activity> {
        self.fail()
    }

    fn list_activities(&self, _ticket_id: TicketId) -> ProviderFuture<'_, Vec<Activity>> {
        self.fail()
    }

    fn create_notification(
        &self,
        _notification: NewNotification,
    ) -> ProviderFuture<'_, Notification> {
        self.fail()
    }

    fn list_notifications(&self, _user_id: UserId) -> ProviderFuture<'_, Vec<Notification>> {
        self.fail()
    }

    fn mark_notification_read(
        &self,
        _id: NotificationId,
    ) -> ProviderFuture<'_, Option<Notification>> {
        self.fail()
    }

    fn add_media(&self, _media: TicketMedia) -> ProviderFuture<'_, TicketMedia> {
        self.fail()
    }

    fn list_media(&self, _ticket_id: TicketId) -> ProviderFuture<'_, Vec<TicketMedia>> {
        self.fail()
    }

    fn add_work_session(&self, _session: WorkSession) -> ProviderFuture<'_, WorkSession> {
        self.fail()
    }

    fn list_work_sessions(&self, _ticket_id: TicketId) -> ProviderFuture<'_, Vec<WorkSession>> {
        self.fail()
    }

    fn user_stats(&self, _user_id: UserId, _now: DateTime<Utc>) -> ProviderFuture<'_, UserStats> {
        self.fail()
    }
}

/// Provider that fails its first `failures` calls, then delegates.
pub struct FlakyProvider {
    inner: Arc<dyn DataProvider>,
    remaining_failures: AtomicUsize,
    calls: AtomicUsize,
}

impl std::fmt::Debug for FlakyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyProvider")
            .field("inner", &self.inner.name())
            .field("remaining_failures", &self.remaining_failures)
            .field("calls", &self.calls)
            .finish()
    }
}

impl FlakyProvider {
    /// Wrap `inner`, failing the first `failures` calls.
    #[must_use]
    pub fn new(inner: Arc<dyn DataProvider>, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many calls reached this provider, failed or not.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether the scripted failures are used up.
    #[must_use]
    pub fn recovered(&self) -> bool {
        self.remaining_failures.load(Ordering::SeqCst) == 0
    }

    fn gate<'a, T: Send + 'a>(
        &'a self,
        call: impl FnOnce(&'a dyn DataProvider) -> ProviderFuture<'a, T>,
    ) -> ProviderFuture<'a, T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail { outage() } else { call(self.inner.as_ref()) }
    }
}

impl DataProvider for FlakyProvider {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn list_tickets(&self, filter: TicketFilter) -> ProviderFuture<'_, Vec<Ticket>> {
        self.gate(|p| p.list_tickets(filter))
    }

    fn get_ticket(&self, id: TicketId) -> ProviderFuture<'_, Option<Ticket>> {
        self.gate(|p| p.get_ticket(id))
    }

    fn create_ticket(&self, ticket: NewTicket) -> ProviderFuture<'_, Ticket> {
        self.gate(|p| p.create_ticket(ticket))
    }

    fn update_ticket(&self, ticket: Ticket) -> ProviderFuture<'_, Ticket> {
        self.gate(|p| p.update_ticket(ticket))
    }

    fn delete_ticket(&self, id: TicketId) -> ProviderFuture<'_, ()> {
        self.gate(|p| p.delete_ticket(id))
    }

    fn list_users(&self, role: Option<Role>) -> ProviderFuture<'_, Vec<UserProfile>> {
        self.gate(|p| p.list_users(role))
    }

    fn get_user(&self, id: UserId) -> ProviderFuture<'_, Option<UserProfile>> {
        self.gate(|p| p.get_user(id))
    }

    fn list_equipment(&self) -> ProviderFuture<'_, Vec<Equipment>> {
        self.gate(|p| p.list_equipment())
    }

    fn append_activity(&self, activity: NewActivity) -> ProviderFuture<'_, Activity> {
        self.gate(|p| p.append_activity(activity))
    }

    fn list_activities(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<Activity>> {
        self.gate(|p| p.list_activities(ticket_id))
    }

    fn create_notification(
        &self,
        notification: NewNotification,
    ) -> ProviderFuture<'_, Notification> {
        self.gate(|p| p.create_notification(notification))
    }

    fn list_notifications(&self, user_id: UserId) -> ProviderFuture<'_, Vec<Notification>> {
        self.gate(|p| p.list_notifications(user_id))
    }

    fn mark_notification_read(
        &self,
        id: NotificationId,
    ) -> ProviderFuture<'_, Option<Notification>> {
        self.gate(|p| p.mark_notification_read(id))
    }

    fn add_media(&self, media: TicketMedia) -> ProviderFuture<'_, TicketMedia> {
        self.gate(|p| p.add_media(media))
    }

    fn list_media(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<TicketMedia>> {
        self.gate(|p| p.list_media(ticket_id))
    }

    fn add_work_session(&self, session: WorkSession) -> ProviderFuture<'_, WorkSession> {
        self.gate(|p| p.add_work_session(session))
    }

    fn list_work_sessions(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<WorkSession>> {
        self.gate(|p| p.list_work_sessions(ticket_id))
    }

    fn user_stats(&self, user_id: UserId, now: DateTime<Utc>) -> ProviderFuture<'_, UserStats> {
        self.gate(|p| p.user_stats(user_id, now))
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ChangeNotice>> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;
    use fieldops_runtime::mock::InMemoryProvider;

    #[tokio::test]
    async fn failing_provider_counts_calls() {
        let provider = FailingProvider::new();

        assert!(provider.list_tickets(TicketFilter::default()).await.is_err());
        assert!(provider.list_equipment().await.is_err());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn flaky_provider_recovers_after_scripted_failures() {
        let provider = FlakyProvider::new(Arc::new(InMemoryProvider::new()), 2);

        assert!(provider.list_equipment().await.is_err());
        assert!(!provider.recovered());
        assert!(provider.list_equipment().await.is_err());
        assert!(provider.recovered());
        assert!(provider.list_equipment().await.unwrap().is_empty());
        assert_eq!(provider.calls(), 3);
    }
}
