//! Recording delivery channel.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use fieldops_core::notification::Notification;
use fieldops_runtime::notify::{ChannelKind, DeliveryChannel, DeliveryError, DeliveryFuture};
use std::sync::{Arc, Mutex};

/// Delivery channel that keeps every notification it is handed.
///
/// Clones share the same record, so a test can keep one handle and give
/// another to the dispatcher.
///
/// # Example
///
/// ```
/// use fieldops_testing::RecordingChannel;
///
/// let channel = RecordingChannel::email();
/// assert!(channel.delivered().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct RecordingChannel {
    kind: ChannelKind,
    failing: bool,
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingChannel {
    fn with(kind: ChannelKind, failing: bool) -> Self {
        Self {
            kind,
            failing,
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An email channel that accepts everything.
    #[must_use]
    pub fn email() -> Self {
        Self::with(ChannelKind::Email, false)
    }

    /// A push channel that accepts everything.
    #[must_use]
    pub fn push() -> Self {
        Self::with(ChannelKind::Push, false)
    }

    /// A channel that records each notification, then reports failure.
    #[must_use]
    pub fn failing(kind: ChannelKind) -> Self {
        Self::with(kind, true)
    }

    /// Everything handed to this channel, in order.
    #[must_use]
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap().clone()
    }

    /// Forget recorded deliveries.
    pub fn clear(&self) {
        self.delivered.lock().unwrap().clear();
    }
}

impl DeliveryChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn deliver<'a>(&'a self, notification: &'a Notification) -> DeliveryFuture<'a> {
        Box::pin(async move {
            self.delivered.lock().unwrap().push(notification.clone());
            if self.failing {
                Err(DeliveryError::new(self.kind, "simulated delivery failure"))
            } else {
                Ok(())
            }
        })
    }
}
