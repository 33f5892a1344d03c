//! Application bootstrap.
//!
//! [`AppBuilder`] turns a [`Config`] into a running [`App`]: it picks the
//! live provider (the REST backend when configured), prepares the mock,
//! starts the notification worker and, optionally, the metrics endpoint.
//!
//! # Example
//!
//! ```rust,no_run
//! use fieldops_runtime::app::AppBuilder;
//! use fieldops_runtime::config::Config;
//!
//! # async fn example() -> Result<(), fieldops_runtime::app::AppError> {
//! let app = AppBuilder::new(Config::from_env()).build()?;
//! let store = app.store();
//! # let _ = store;
//! app.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::metrics::{MetricsError, MetricsServer};
use crate::mock::InMemoryProvider;
use crate::notify::{DeliveryChannel, LoggingChannel, NotificationDispatcher};
use crate::router::ProviderRouter;
use crate::session::Session;
use crate::store::TicketStore;
use fieldops_core::ProviderError;
use fieldops_core::environment::{Clock, SystemClock};
use fieldops_core::identity::IdentityProvider;
use fieldops_core::lifecycle::LifecycleEngine;
use fieldops_core::provider::DataProvider;
use fieldops_rest::RestProvider;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors raised while starting the application.
#[derive(Debug, Error)]
pub enum AppError {
    /// The live backend client could not be built
    #[error("Live backend setup failed: {0}")]
    Backend(#[from] ProviderError),
    /// The metrics endpoint could not be started
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Step-by-step application setup.
pub struct AppBuilder {
    config: Config,
    clock: Arc<dyn Clock>,
    live: Option<Arc<dyn DataProvider>>,
    mock: Option<Arc<InMemoryProvider>>,
    channels: Option<Vec<Arc<dyn DeliveryChannel>>>,
}

impl AppBuilder {
    /// Start from `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            live: None,
            mock: None,
            channels: None,
        }
    }

    /// Use `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use `live` as the live provider instead of the configured backend.
    #[must_use]
    pub fn with_live_provider(mut self, live: Arc<dyn DataProvider>) -> Self {
        self.live = Some(live);
        self
    }

    /// Use an existing mock provider.
    #[must_use]
    pub fn with_mock(mut self, mock: Arc<InMemoryProvider>) -> Self {
        self.mock = Some(mock);
        self
    }

    /// Replace the default logging channels.
    #[must_use]
    pub fn with_channels(mut self, channels: Vec<Arc<dyn DeliveryChannel>>) -> Self {
        self.channels = Some(channels);
        self
    }

    fn live_provider(&self) -> Result<Option<Arc<dyn DataProvider>>, AppError> {
        if let Some(live) = &self.live {
            return Ok(Some(Arc::clone(live)));
        }
        let backend = &self.config.backend;
        match (&backend.url, &backend.api_key) {
            (Some(url), Some(api_key)) => {
                let client = RestProvider::new(url, api_key, backend.request_timeout())?;
                tracing::info!(url = %url, "Live backend configured");
                Ok(Some(Arc::new(client)))
            }
            _ => {
                tracing::info!("No live backend configured, sessions use the mock provider");
                Ok(None)
            }
        }
    }

    /// Build the application.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if the live client or metrics endpoint fails to start.
    pub fn build(self) -> Result<App, AppError> {
        let live = self.live_provider()?;

        let mock = match self.mock {
            Some(mock) => mock,
            None if self.config.provider.seed_mock_data => {
                Arc::new(InMemoryProvider::seeded(self.clock.now()))
            }
            None => Arc::new(InMemoryProvider::new()),
        };
        let mock_dyn: Arc<dyn DataProvider> = mock.clone();
        let router = ProviderRouter::new(live, mock_dyn, self.config.provider.mock_fallback);

        let channels = self.channels.unwrap_or_else(|| {
            vec![
                Arc::new(LoggingChannel::email()) as Arc<dyn DeliveryChannel>,
                Arc::new(LoggingChannel::push()),
            ]
        });
        let (notifier, worker) = NotificationDispatcher::spawn(
            router.clone(),
            channels,
            Arc::clone(&self.clock),
            self.config.notifications.queue_capacity,
        );

        let metrics = match self.config.telemetry.metrics_addr {
            Some(addr) => {
                let mut server = MetricsServer::new(addr);
                server.start()?;
                Some(server)
            }
            None => None,
        };

        let engine = LifecycleEngine::new(self.config.lifecycle);
        let store = TicketStore::new(router, engine, self.clock, notifier);

        tracing::info!(
            live = store.router().has_live(),
            mock_fallback = store.router().fallback_enabled(),
            allow_self_verification = engine.policy().allow_self_verification,
            "Application ready"
        );

        Ok(App {
            config: self.config,
            store,
            mock,
            worker,
            metrics,
        })
    }
}

/// A running application.
pub struct App {
    config: Config,
    store: TicketStore,
    mock: Arc<InMemoryProvider>,
    worker: JoinHandle<()>,
    metrics: Option<MetricsServer>,
}

impl App {
    /// The loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// A handle to the Ticket Store.
    #[must_use]
    pub fn store(&self) -> TicketStore {
        self.store.clone()
    }

    /// The mock provider, also the fallback target.
    #[must_use]
    pub fn mock(&self) -> Arc<InMemoryProvider> {
        Arc::clone(&self.mock)
    }

    /// Open a session whose initial health follows the configuration.
    #[must_use]
    pub fn session(&self, identity: Arc<dyn IdentityProvider>) -> Session {
        self.store
            .open_session(identity, self.config.provider.initially_available)
    }

    /// Rendered Prometheus metrics, when the endpoint is running.
    #[must_use]
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.as_ref().and_then(MetricsServer::render)
    }

    /// Deliver queued notifications, then stop the worker.
    pub async fn shutdown(self) {
        if !self.store.notifier().flush().await {
            tracing::warn!("Notification worker already stopped");
        }
        self.worker.abort();
        tracing::info!("Application stopped");
    }
}
