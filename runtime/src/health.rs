//! Session-scoped provider health.
//!
//! [`ProviderHealth`] is a one-directional circuit breaker for the live data
//! provider. It starts either available or tripped. The first live failure
//! trips it, after which every call in the session is routed to the mock
//! provider. There is no half-open state and no automatic recovery.
//!
//! Each [`Session`](crate::session::Session) owns its own health value, so
//! concurrent sessions never influence each other's routing.
//!
//! # Example
//!
//! ```rust
//! use fieldops_runtime::health::ProviderHealth;
//!
//! let health = ProviderHealth::new(true);
//! assert!(health.is_available());
//!
//! assert!(health.trip("connection refused"));
//! assert!(!health.trip("timeout")); // already tripped
//!
//! let snapshot = health.snapshot();
//! assert!(!snapshot.available);
//! assert_eq!(snapshot.trip_reason.as_deref(), Some("connection refused"));
//! ```

use crate::metrics::ProviderMetrics;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

/// Reason recorded when a session starts without a live provider.
pub const NOT_CONFIGURED: &str = "live provider not configured";

#[derive(Debug)]
struct HealthState {
    available: AtomicBool,
    trip_reason: OnceLock<String>,
    changes: watch::Sender<bool>,
    // Metrics
    live_calls: AtomicU64,
    fallback_calls: AtomicU64,
}

/// Shared "live provider is available" flag for one session.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    state: Arc<HealthState>,
}

impl ProviderHealth {
    /// Create a health flag in the given initial state.
    #[must_use]
    pub fn new(available: bool) -> Self {
        if available {
            Self::from_parts(true, None)
        } else {
            Self::from_parts(false, Some("disabled by configuration".to_string()))
        }
    }

    /// A flag that starts tripped with `reason`.
    #[must_use]
    pub fn tripped(reason: impl Into<String>) -> Self {
        Self::from_parts(false, Some(reason.into()))
    }

    fn from_parts(available: bool, reason: Option<String>) -> Self {
        let trip_reason = OnceLock::new();
        if let Some(reason) = reason {
            let _ = trip_reason.set(reason);
        }
        Self {
            state: Arc::new(HealthState {
                available: AtomicBool::new(available),
                trip_reason,
                changes: watch::channel(available).0,
                live_calls: AtomicU64::new(0),
                fallback_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Whether calls should still be attempted against the live provider.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state.available.load(Ordering::Acquire)
    }

    /// Mark the live provider unavailable for the rest of the session.
    ///
    /// Returns `true` if this call performed the trip, `false` if the flag
    /// was already tripped. The first reason wins.
    pub fn trip(&self, reason: impl Into<String>) -> bool {
        if !self.state.available.swap(false, Ordering::AcqRel) {
            return false;
        }
        let reason = reason.into();
        tracing::warn!(
            reason = %reason,
            "Live provider marked unavailable, routing to mock provider for the rest of the session"
        );
        ProviderMetrics::record_trip();
        let _ = self.state.trip_reason.set(reason);
        self.state.changes.send_replace(false);
        true
    }

    /// Receiver that observes the flag; it changes at most once, on trip.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.changes.subscribe()
    }

    /// Why the flag was tripped, if it was.
    #[must_use]
    pub fn trip_reason(&self) -> Option<&str> {
        self.state.trip_reason.get().map(String::as_str)
    }

    pub(crate) fn record_live_call(&self) {
        self.state.live_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback_call(&self) {
        self.state.fallback_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of the flag and its counters.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            available: self.is_available(),
            trip_reason: self.trip_reason().map(ToString::to_string),
            live_calls: self.state.live_calls.load(Ordering::Relaxed),
            fallback_calls: self.state.fallback_calls.load(Ordering::Relaxed),
        }
    }
}

/// Counters for provider routing within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// Whether the live provider is still in use
    pub available: bool,
    /// Reason for the trip, if tripped
    pub trip_reason: Option<String>,
    /// Calls attempted against the live provider
    pub live_calls: u64,
    /// Calls served by the mock provider
    pub fallback_calls: u64,
}

impl HealthSnapshot {
    /// Share of calls served by the mock provider (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fallback_rate(&self) -> f64 {
        let total = self.live_calls + self.fallback_calls;
        if total == 0 {
            return 0.0;
        }
        self.fallback_calls as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_configured_state() {
        assert!(ProviderHealth::new(true).is_available());

        let disabled = ProviderHealth::new(false);
        assert!(!disabled.is_available());
        assert_eq!(disabled.trip_reason(), Some("disabled by configuration"));
    }

    #[test]
    fn trip_is_one_directional_and_keeps_first_reason() {
        let health = ProviderHealth::new(true);

        assert!(health.trip("boom"));
        assert!(!health.trip("again"));
        assert!(!health.is_available());
        assert_eq!(health.trip_reason(), Some("boom"));
    }

    #[test]
    fn clones_share_state() {
        let health = ProviderHealth::new(true);
        let other = health.clone();

        other.trip("shared");

        assert!(!health.is_available());
    }

    #[test]
    fn watchers_see_the_trip() {
        let health = ProviderHealth::new(true);
        let mut rx = health.watch();
        assert!(*rx.borrow_and_update());

        health.trip("refused");

        assert!(rx.has_changed().unwrap_or(false));
        assert!(!*rx.borrow_and_update());
    }

    #[test]
    fn separate_flags_do_not_interfere() {
        let a = ProviderHealth::new(true);
        let b = ProviderHealth::new(true);

        a.trip("session a failed");

        assert!(!a.is_available());
        assert!(b.is_available());
    }

    #[test]
    fn fallback_rate_counts_routed_calls() {
        let health = ProviderHealth::tripped(NOT_CONFIGURED);
        assert!((health.snapshot().fallback_rate() - 0.0).abs() < f64::EPSILON);

        health.record_live_call();
        health.record_fallback_call();
        health.record_fallback_call();
        health.record_fallback_call();

        let snapshot = health.snapshot();
        assert_eq!(snapshot.live_calls, 1);
        assert_eq!(snapshot.fallback_calls, 3);
        assert!((snapshot.fallback_rate() - 0.75).abs() < f64::EPSILON);
    }
}
