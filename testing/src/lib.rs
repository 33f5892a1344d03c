//! # Fieldops Testing
//!
//! Testing utilities and helpers for the Fieldops ticketing service.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - Scriptable data providers ([`FailingProvider`], [`FlakyProvider`])
//! - A delivery channel that records what it was given ([`RecordingChannel`])
//! - Profile and draft builders ([`fixtures`])
//! - A [`TestHarness`] wiring store, mock provider and notification worker
//!
//! ## Example
//!
//! ```
//! use fieldops_testing::{TestHarness, fixtures};
//! use fieldops_core::user::Role;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let harness = TestHarness::new();
//! let engineer = harness.add_user(Role::FieldEngineer, "Ana Lima");
//! let session = harness.session(&engineer);
//!
//! let ticket = harness.store.create(&session, fixtures::draft("AC repair")).await?;
//! assert_eq!(harness.store.list(&session).await?.len(), 1);
//! # let _ = ticket;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Duration, Utc};
use fieldops_core::environment::Clock;
use std::sync::Mutex;

pub mod channels;
pub mod harness;
pub mod providers;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Duration, Mutex, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use fieldops_testing::mocks::FixedClock;
    /// use fieldops_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Clock that only moves when told to.
    ///
    /// # Example
    ///
    /// ```
    /// use fieldops_testing::mocks::ManualClock;
    /// use fieldops_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = ManualClock::default();
    /// let start = clock.now();
    /// clock.advance(Duration::hours(2));
    /// assert_eq!(clock.now() - start, Duration::hours(2));
    /// ```
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock stopped at `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward (or backward, with a negative duration).
        pub fn advance(&self, by: Duration) {
            if let Ok(mut time) = self.time.lock() {
                *time += by;
            }
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            if let Ok(mut current) = self.time.lock() {
                *current = time;
            }
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(test_clock().now())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }
}

/// Builders for profiles and drafts.
pub mod fixtures {
    use super::{DateTime, Utc};
    use fieldops_core::ids::UserId;
    use fieldops_core::ticket::{TicketDraft, TicketType};
    use fieldops_core::user::{Role, UserProfile};

    /// An active profile with an email derived from `name`.
    #[must_use]
    pub fn user(role: Role, name: &str) -> UserProfile {
        UserProfile {
            id: UserId::new(),
            email: format!("{}@fieldops.test", name.to_lowercase().replace(' ', ".")),
            full_name: name.to_string(),
            role,
            phone: None,
            is_active: true,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// A valid fault draft at "Building A".
    #[must_use]
    pub fn draft(title: &str) -> TicketDraft {
        TicketDraft::new(
            title,
            format!("{title} reported by tenant"),
            TicketType::Fault,
            "Building A",
        )
    }
}

// Re-export commonly used items
pub use channels::RecordingChannel;
pub use harness::TestHarness;
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use providers::{FailingProvider, FlakyProvider};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::default();
        let start = clock.now();

        clock.advance(Duration::minutes(30));
        assert_eq!(clock.now(), start + Duration::minutes(30));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn fixture_user_is_active() {
        let user = fixtures::user(fieldops_core::user::Role::Supervisor, "Sam Ortiz");
        assert!(user.is_active);
        assert_eq!(user.email, "sam.ortiz@fieldops.test");
    }
}
