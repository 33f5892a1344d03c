//! Live ticket feed.
//!
//! [`TicketFeed`] keeps a snapshot of the tickets visible to a session. It
//! listens to the active provider's change stream, to the session's routing
//! flag and to sign-in changes, and on any of them it reloads the whole
//! visible set. Intermediate states may
//! be skipped; the snapshot eventually reflects the backend.

use crate::session::Session;
use crate::store::TicketStore;
use fieldops_core::provider::ChangeNotice;
use fieldops_core::ticket::Ticket;
use fieldops_core::user::UserProfile;
use fieldops_core::{Result, TicketError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Background reload loop publishing the visible ticket set.
///
/// The loop stops when the feed is dropped.
#[derive(Debug)]
pub struct TicketFeed {
    snapshot: watch::Receiver<Vec<Ticket>>,
    task: JoinHandle<()>,
}

impl TicketFeed {
    /// Load the initial snapshot and start listening.
    ///
    /// The feed follows the change stream of whichever provider the session
    /// is routed to, switching streams when the session falls back to the
    /// mock. A provider without a change stream still reloads on sign-in
    /// changes.
    ///
    /// # Errors
    ///
    /// Returns the error of the initial load.
    pub async fn start(store: TicketStore, session: Session) -> Result<Self> {
        let routing = session.health().watch();
        let changes = subscribe(&store, &session);
        let identity = session.identity().subscribe();
        let initial = store.list(&session).await?;
        let (tx, snapshot) = watch::channel(initial);

        let task = tokio::spawn(run(store, session, changes, routing, identity, tx));
        Ok(Self { snapshot, task })
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Ticket> {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Ticket>> {
        self.snapshot.clone()
    }
}

impl Drop for TicketFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    store: TicketStore,
    session: Session,
    mut changes: Option<broadcast::Receiver<ChangeNotice>>,
    mut routing: watch::Receiver<bool>,
    mut identity: watch::Receiver<Option<UserProfile>>,
    tx: watch::Sender<Vec<Ticket>>,
) {
    let mut routing_open = true;
    loop {
        tokio::select! {
            notice = next_change(&mut changes) => match notice {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    coalesce(&mut changes);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Change stream closed");
                    changes = None;
                    continue;
                }
            },
            changed = routing.changed(), if routing_open => {
                if changed.is_err() {
                    routing_open = false;
                    continue;
                }
                tracing::debug!("Session switched provider, following its change stream");
                changes = subscribe(&store, &session);
            }
            changed = identity.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        if tx.is_closed() {
            break;
        }
        reload(&store, &session, &tx).await;
    }
    tracing::debug!("Ticket feed stopped");
}

fn subscribe(store: &TicketStore, session: &Session) -> Option<broadcast::Receiver<ChangeNotice>> {
    let changes = store.router().subscribe(session.health());
    if changes.is_none() {
        tracing::debug!("Active provider has no change stream, feed reloads on sign-in only");
    }
    changes
}

async fn next_change(
    changes: &mut Option<broadcast::Receiver<ChangeNotice>>,
) -> std::result::Result<ChangeNotice, broadcast::error::RecvError> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Drop notices already queued; one reload covers them all.
fn coalesce(changes: &mut Option<broadcast::Receiver<ChangeNotice>>) {
    if let Some(rx) = changes {
        while rx.try_recv().is_ok() {}
    }
}

async fn reload(store: &TicketStore, session: &Session, tx: &watch::Sender<Vec<Ticket>>) {
    match store.list(session).await {
        Ok(tickets) => {
            tracing::debug!(count = tickets.len(), "Ticket feed reloaded");
            tx.send_replace(tickets);
        }
        Err(TicketError::Auth(_)) => {
            tx.send_replace(Vec::new());
        }
        Err(error) => {
            tracing::warn!(error = %error, "Ticket feed reload failed, keeping previous snapshot");
        }
    }
}
