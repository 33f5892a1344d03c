//! Live/mock provider routing.
//!
//! [`ProviderRouter`] holds the live provider (if one is configured) and the
//! in-memory mock. Every data call goes through [`ProviderRouter::call`],
//! which consults the session's [`ProviderHealth`]:
//!
//! - available: try the live provider; on error either trip the flag and
//!   retry the same call against the mock (fallback enabled) or return the
//!   error (fallback disabled)
//! - tripped: go straight to the mock

use crate::health::ProviderHealth;
use crate::metrics::ProviderMetrics;
use fieldops_core::ProviderError;
use fieldops_core::provider::{ChangeNotice, DataProvider, ProviderFuture};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Routes provider calls between the live backend and the mock.
#[derive(Clone)]
pub struct ProviderRouter {
    live: Option<Arc<dyn DataProvider>>,
    mock: Arc<dyn DataProvider>,
    fallback_enabled: bool,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("live", &self.live.as_ref().map(|p| p.name()))
            .field("mock", &self.mock.name())
            .field("fallback_enabled", &self.fallback_enabled)
            .finish()
    }
}

impl ProviderRouter {
    /// Create a router.
    ///
    /// `fallback_enabled` is the mock-fallback feature flag. When it is off,
    /// a live failure propagates and the health flag is left untouched.
    #[must_use]
    pub fn new(
        live: Option<Arc<dyn DataProvider>>,
        mock: Arc<dyn DataProvider>,
        fallback_enabled: bool,
    ) -> Self {
        Self {
            live,
            mock,
            fallback_enabled,
        }
    }

    /// A router with no live provider.
    #[must_use]
    pub fn mock_only(mock: Arc<dyn DataProvider>) -> Self {
        Self::new(None, mock, true)
    }

    /// Whether a live provider is configured.
    #[must_use]
    pub const fn has_live(&self) -> bool {
        self.live.is_some()
    }

    /// Whether live failures fall back to the mock.
    #[must_use]
    pub const fn fallback_enabled(&self) -> bool {
        self.fallback_enabled
    }

    /// Health flag for a new session.
    ///
    /// Without a live provider the session starts tripped.
    #[must_use]
    pub fn new_health(&self, initially_available: bool) -> ProviderHealth {
        if self.live.is_none() {
            return ProviderHealth::tripped(crate::health::NOT_CONFIGURED);
        }
        ProviderHealth::new(initially_available)
    }

    /// The provider a call would be routed to right now.
    #[must_use]
    pub fn active(&self, health: &ProviderHealth) -> &Arc<dyn DataProvider> {
        match &self.live {
            Some(live) if health.is_available() => live,
            _ => &self.mock,
        }
    }

    /// Change stream of the currently active provider.
    #[must_use]
    pub fn subscribe(&self, health: &ProviderHealth) -> Option<broadcast::Receiver<ChangeNotice>> {
        self.active(health).subscribe()
    }

    /// Run `op` against the provider selected by `health`.
    ///
    /// # Errors
    ///
    /// Returns the live provider's error when fallback is disabled, or the
    /// mock provider's error when the call was routed there.
    pub async fn call<T, F>(
        &self,
        health: &ProviderHealth,
        operation: &'static str,
        op: F,
    ) -> Result<T, ProviderError>
    where
        F: for<'a> Fn(&'a dyn DataProvider) -> ProviderFuture<'a, T> + Send + Sync,
        T: Send,
    {
        if let Some(live) = self.live.as_ref().filter(|_| health.is_available()) {
            health.record_live_call();
            ProviderMetrics::record_call(live.name(), operation);
            match op(live.as_ref()).await {
                Ok(value) => return Ok(value),
                Err(error) if !self.fallback_enabled => {
                    tracing::warn!(
                        operation,
                        provider = live.name(),
                        error = %error,
                        "Live provider call failed and mock fallback is disabled"
                    );
                    ProviderMetrics::record_error(live.name(), operation);
                    return Err(error);
                }
                Err(error) => {
                    ProviderMetrics::record_error(live.name(), operation);
                    health.trip(format!("{operation}: {error}"));
                }
            }
        }

        health.record_fallback_call();
        ProviderMetrics::record_call(self.mock.name(), operation);
        ProviderMetrics::record_fallback(operation);
        tracing::debug!(operation, provider = self.mock.name(), "Routing call to mock provider");
        op(self.mock.as_ref()).await
    }
}
