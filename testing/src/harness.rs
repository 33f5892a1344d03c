//! Store-level test harness.
//!
//! [`TestHarness`] builds the application the same way production does,
//! with a manual clock, an empty mock provider and a [`RecordingChannel`].
//! It can also put a scripted "remote" provider in front of the mock to
//! exercise fallback routing.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use crate::channels::RecordingChannel;
use crate::fixtures;
use crate::mocks::ManualClock;
use crate::providers::FlakyProvider;
use fieldops_core::lifecycle::LifecyclePolicy;
use fieldops_core::provider::DataProvider;
use fieldops_core::user::{Role, UserProfile};
use fieldops_runtime::app::{App, AppBuilder};
use fieldops_runtime::config::Config;
use fieldops_runtime::mock::InMemoryProvider;
use fieldops_runtime::notify::DeliveryChannel;
use fieldops_runtime::session::{IdentityHandle, Session};
use fieldops_runtime::store::TicketStore;
use std::sync::Arc;

/// A running store with handles to everything behind it.
pub struct TestHarness {
    /// The store under test
    pub store: TicketStore,
    /// The mock provider (fallback target)
    pub mock: Arc<InMemoryProvider>,
    /// Backing data of the scripted live provider, if any
    pub remote: Option<Arc<InMemoryProvider>>,
    /// The scripted live provider, if any
    pub flaky: Option<Arc<FlakyProvider>>,
    /// The clock the store reads
    pub clock: Arc<ManualClock>,
    /// Records every delivered notification
    pub channel: RecordingChannel,
    app: App,
}

/// Options for [`TestHarness::build`].
#[derive(Debug, Clone, Default)]
pub struct HarnessOptions {
    /// Put a live provider in front of the mock that fails this many calls
    pub live_failures: Option<usize>,
    /// Disable the mock fallback flag
    pub fallback_disabled: bool,
    /// Lifecycle rules
    pub policy: LifecyclePolicy,
    /// Notification queue capacity
    pub queue_capacity: Option<usize>,
}

impl TestHarness {
    /// Mock-only harness.
    #[must_use]
    pub fn new() -> Self {
        Self::build(HarnessOptions::default())
    }

    /// Harness whose live provider fails its first `failures` calls.
    #[must_use]
    pub fn with_flaky_live(failures: usize, fallback: bool) -> Self {
        Self::build(HarnessOptions {
            live_failures: Some(failures),
            fallback_disabled: !fallback,
            ..HarnessOptions::default()
        })
    }

    /// Harness built from explicit options.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn build(options: HarnessOptions) -> Self {
        let mut config = Config::default();
        config.provider.seed_mock_data = false;
        config.provider.mock_fallback = !options.fallback_disabled;
        config.lifecycle = options.policy;
        if let Some(capacity) = options.queue_capacity {
            config.notifications.queue_capacity = capacity;
        }

        let clock = Arc::new(ManualClock::default());
        let channel = RecordingChannel::email();
        let mock = Arc::new(InMemoryProvider::new());

        let mut builder = AppBuilder::new(config)
            .with_clock(clock.clone())
            .with_mock(mock.clone())
            .with_channels(vec![Arc::new(channel.clone()) as Arc<dyn DeliveryChannel>]);

        let (remote, flaky) = match options.live_failures {
            Some(failures) => {
                let remote = Arc::new(InMemoryProvider::new());
                let flaky = Arc::new(FlakyProvider::new(remote.clone(), failures));
                builder = builder.with_live_provider(flaky.clone() as Arc<dyn DataProvider>);
                (Some(remote), Some(flaky))
            }
            None => (None, None),
        };

        let app = builder.build().unwrap();
        Self {
            store: app.store(),
            mock,
            remote,
            flaky,
            clock,
            channel,
            app,
        }
    }

    /// Register an active user with every backing provider.
    pub fn add_user(&self, role: Role, name: &str) -> UserProfile {
        let profile = fixtures::user(role, name);
        self.mock.upsert_user(profile.clone()).unwrap();
        if let Some(remote) = &self.remote {
            remote.upsert_user(profile.clone()).unwrap();
        }
        profile
    }

    /// A session signed in as `profile`.
    #[must_use]
    pub fn session(&self, profile: &UserProfile) -> Session {
        self.app
            .session(Arc::new(IdentityHandle::signed_in(profile.clone())))
    }

    /// A session whose identity can be changed by the caller.
    #[must_use]
    pub fn session_with(&self, identity: &IdentityHandle) -> Session {
        self.app.session(Arc::new(identity.clone()))
    }

    /// Wait for queued notifications to be stored and delivered.
    pub async fn flush(&self) {
        assert!(self.store.notifier().flush().await, "notification worker stopped");
    }

    /// Stop the notification worker.
    pub async fn shutdown(self) {
        self.app.shutdown().await;
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
