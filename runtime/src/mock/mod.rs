//! In-memory data provider.
//!
//! Serves as the demo backend and as the fallback target when the live
//! provider fails. Every write publishes a [`ChangeNotice`] so the live feed
//! works against it.

pub mod fixtures;

use chrono::{DateTime, Utc};
use fieldops_core::ProviderError;
use fieldops_core::activity::{Activity, NewActivity};
use fieldops_core::equipment::Equipment;
use fieldops_core::ids::{ActivityId, NotificationId, TicketId, TicketNumber, UserId};
use fieldops_core::media::{TicketMedia, WorkSession};
use fieldops_core::notification::{NewNotification, Notification};
use fieldops_core::provider::{ChangeNotice, DataProvider, NewTicket, ProviderFuture, TicketFilter};
use fieldops_core::stats::UserStats;
use fieldops_core::ticket::Ticket;
use fieldops_core::user::{Role, UserProfile};
use fixtures::Fixtures;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const CHANGE_BUFFER: usize = 64;

#[derive(Debug)]
struct MockState {
    tickets: Vec<Ticket>,
    users: Vec<UserProfile>,
    equipment: Vec<Equipment>,
    activities: Vec<Activity>,
    notifications: Vec<Notification>,
    media: Vec<TicketMedia>,
    work_sessions: Vec<WorkSession>,
    next_number: TicketNumber,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            tickets: Vec::new(),
            users: Vec::new(),
            equipment: Vec::new(),
            activities: Vec::new(),
            notifications: Vec::new(),
            media: Vec::new(),
            work_sessions: Vec::new(),
            next_number: TicketNumber::new(1),
        }
    }
}

impl MockState {
    fn ticket_mut(&mut self, id: TicketId) -> Result<&mut Ticket, ProviderError> {
        self.tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| missing("ticket", id))
    }

    fn ensure_ticket(&self, id: TicketId) -> Result<(), ProviderError> {
        if self.tickets.iter().any(|t| t.id == id) {
            Ok(())
        } else {
            Err(missing("ticket", id))
        }
    }
}

fn missing(entity: &str, id: impl std::fmt::Display) -> ProviderError {
    ProviderError::Api {
        status: 404,
        message: format!("{entity} {id} not found"),
    }
}

fn done<'a, T: Send + 'a>(result: Result<T, ProviderError>) -> ProviderFuture<'a, T> {
    Box::pin(std::future::ready(result))
}

/// Mock provider keeping every record in memory.
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    state: Arc<Mutex<MockState>>,
    changes: broadcast::Sender<ChangeNotice>,
}

impl InMemoryProvider {
    /// An empty provider.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            changes,
        }
    }

    /// A provider preloaded with `fixtures`.
    ///
    /// Ticket numbering continues after the highest fixture number.
    #[must_use]
    pub fn with_fixtures(fixtures: Fixtures) -> Self {
        let provider = Self::new();
        if let Ok(mut state) = provider.state.lock() {
            state.next_number = fixtures
                .tickets
                .iter()
                .map(|t| t.ticket_number)
                .max()
                .map_or(TicketNumber::new(1), |n| n.next());
            state.users = fixtures.users;
            state.equipment = fixtures.equipment;
            state.tickets = fixtures.tickets;
        }
        provider
    }

    /// A provider loaded with the demo data set.
    #[must_use]
    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self::with_fixtures(fixtures::demo(now))
    }

    /// Add or replace a user profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the state lock is poisoned.
    pub fn upsert_user(&self, profile: UserProfile) -> Result<(), ProviderError> {
        self.with_state(|state| {
            state.users.retain(|u| u.id != profile.id);
            state.users.push(profile);
            Ok(())
        })
    }

    /// Add or replace a piece of equipment.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the state lock is poisoned.
    pub fn upsert_equipment(&self, equipment: Equipment) -> Result<(), ProviderError> {
        self.with_state(|state| {
            state.equipment.retain(|e| e.id != equipment.id);
            state.equipment.push(equipment);
            Ok(())
        })
    }

    /// Every stored ticket, ignoring visibility.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the state lock is poisoned.
    pub fn all_tickets(&self) -> Result<Vec<Ticket>, ProviderError> {
        self.with_state(|state| Ok(state.tickets.clone()))
    }

    /// Every stored user profile, including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the state lock is poisoned.
    pub fn all_users(&self) -> Result<Vec<UserProfile>, ProviderError> {
        self.with_state(|state| Ok(state.users.clone()))
    }

    /// Every stored notification.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the state lock is poisoned.
    pub fn all_notifications(&self) -> Result<Vec<Notification>, ProviderError> {
        self.with_state(|state| Ok(state.notifications.clone()))
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut MockState) -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ProviderError::Unavailable("mock state lock poisoned".to_string()))?;
        f(&mut state)
    }

    fn publish(&self, notice: ChangeNotice) {
        // No subscribers is not an error.
        let _ = self.changes.send(notice);
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for InMemoryProvider {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    fn list_tickets(&self, filter: TicketFilter) -> ProviderFuture<'_, Vec<Ticket>> {
        done(self.with_state(|state| {
            let mut tickets: Vec<Ticket> = state
                .tickets
                .iter()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect();
            tickets.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then(b.ticket_number.cmp(&a.ticket_number))
            });
            Ok(tickets)
        }))
    }

    fn get_ticket(&self, id: TicketId) -> ProviderFuture<'_, Option<Ticket>> {
        done(self.with_state(|state| Ok(state.tickets.iter().find(|t| t.id == id).cloned())))
    }

    fn create_ticket(&self, ticket: NewTicket) -> ProviderFuture<'_, Ticket> {
        let result = self.with_state(|state| {
            if state.tickets.iter().any(|t| t.id == ticket.id) {
                return Err(ProviderError::Conflict(format!(
                    "ticket {} already exists",
                    ticket.id
                )));
            }
            let number = state.next_number;
            state.next_number = number.next();
            let stored = ticket.into_ticket(number);
            state.tickets.push(stored.clone());
            Ok(stored)
        });
        if let Ok(ticket) = &result {
            self.publish(ChangeNotice::Ticket { id: ticket.id });
        }
        done(result)
    }

    fn update_ticket(&self, ticket: Ticket) -> ProviderFuture<'_, Ticket> {
        let result = self.with_state(|state| {
            let stored = state.ticket_mut(ticket.id)?;
            *stored = ticket;
            Ok(stored.clone())
        });
        if let Ok(ticket) = &result {
            self.publish(ChangeNotice::Ticket { id: ticket.id });
        }
        done(result)
    }

    fn delete_ticket(&self, id: TicketId) -> ProviderFuture<'_, ()> {
        let result = self.with_state(|state| {
            state.ensure_ticket(id)?;
            state.tickets.retain(|t| t.id != id);
            state.media.retain(|m| m.ticket_id != id);
            state.work_sessions.retain(|w| w.ticket_id != id);
            Ok(())
        });
        if result.is_ok() {
            self.publish(ChangeNotice::Ticket { id });
        }
        done(result)
    }

    fn list_users(&self, role: Option<Role>) -> ProviderFuture<'_, Vec<UserProfile>> {
        done(self.with_state(|state| {
            let mut users: Vec<UserProfile> = state
                .users
                .iter()
                .filter(|u| role.is_none_or(|r| u.role == r))
                .cloned()
                .collect();
            users.sort_by(|a, b| a.full_name.cmp(&b.full_name));
            Ok(users)
        }))
    }

    fn get_user(&self, id: UserId) -> ProviderFuture<'_, Option<UserProfile>> {
        done(self.with_state(|state| Ok(state.users.iter().find(|u| u.id == id).cloned())))
    }

    fn list_equipment(&self) -> ProviderFuture<'_, Vec<Equipment>> {
        done(self.with_state(|state| Ok(state.equipment.clone())))
    }

    fn append_activity(&self, activity: NewActivity) -> ProviderFuture<'_, Activity> {
        let result = self.with_state(|state| {
            state.ensure_ticket(activity.ticket_id)?;
            let stored = activity.into_activity(ActivityId::new());
            state.activities.push(stored.clone());
            Ok(stored)
        });
        if let Ok(activity) = &result {
            self.publish(ChangeNotice::Activity {
                ticket_id: activity.ticket_id,
            });
        }
        done(result)
    }

    fn list_activities(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<Activity>> {
        done(self.with_state(|state| {
            Ok(state
                .activities
                .iter()
                .filter(|a| a.ticket_id == ticket_id)
                .cloned()
                .collect())
        }))
    }

    fn create_notification(&self, notification: NewNotification) -> ProviderFuture<'_, Notification> {
        let result = self.with_state(|state| {
            let stored = notification.into_notification(NotificationId::new());
            state.notifications.push(stored.clone());
            Ok(stored)
        });
        if let Ok(notification) = &result {
            self.publish(ChangeNotice::Notification {
                user_id: notification.user_id,
            });
        }
        done(result)
    }

    fn list_notifications(&self, user_id: UserId) -> ProviderFuture<'_, Vec<Notification>> {
        done(self.with_state(|state| {
            let mut notifications: Vec<Notification> = state
                .notifications
                .iter()
                .filter(|n| n.user_id == user_id)
                .cloned()
                .collect();
            notifications.reverse();
            notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(notifications)
        }))
    }

    fn mark_notification_read(&self, id: NotificationId) -> ProviderFuture<'_, Option<Notification>> {
        let result = self.with_state(|state| {
            Ok(state.notifications.iter_mut().find(|n| n.id == id).map(|n| {
                n.is_read = true;
                n.clone()
            }))
        });
        if let Ok(Some(notification)) = &result {
            self.publish(ChangeNotice::Notification {
                user_id: notification.user_id,
            });
        }
        done(result)
    }

    fn add_media(&self, media: TicketMedia) -> ProviderFuture<'_, TicketMedia> {
        done(self.with_state(|state| {
            state.ensure_ticket(media.ticket_id)?;
            state.media.push(media.clone());
            Ok(media)
        }))
    }

    fn list_media(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<TicketMedia>> {
        done(self.with_state(|state| {
            Ok(state
                .media
                .iter()
                .filter(|m| m.ticket_id == ticket_id)
                .cloned()
                .collect())
        }))
    }

    fn add_work_session(&self, session: WorkSession) -> ProviderFuture<'_, WorkSession> {
        done(self.with_state(|state| {
            state.ensure_ticket(session.ticket_id)?;
            state.work_sessions.push(session.clone());
            Ok(session)
        }))
    }

    fn list_work_sessions(&self, ticket_id: TicketId) -> ProviderFuture<'_, Vec<WorkSession>> {
        done(self.with_state(|state| {
            Ok(state
                .work_sessions
                .iter()
                .filter(|w| w.ticket_id == ticket_id)
                .cloned()
                .collect())
        }))
    }

    fn user_stats(&self, user_id: UserId, now: DateTime<Utc>) -> ProviderFuture<'_, UserStats> {
        done(self.with_state(|state| Ok(UserStats::compute(user_id, &state.tickets, now))))
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ChangeNotice>> {
        Some(self.changes.subscribe())
    }
}
