//! Prometheus metrics for observability and monitoring.
//!
//! Metric families:
//! - Provider calls, errors, fallbacks and circuit trips
//! - Lifecycle transitions by target status
//! - Notification queueing and delivery
//!
//! Recording is a no-op until a recorder is installed, so library code can
//! record unconditionally.
//!
//! # Example
//!
//! ```rust,no_run
//! use fieldops_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics endpoint.
///
/// Serves metrics over HTTP on the configured address for scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the Prometheus recorder and HTTP listener.
    ///
    /// Must be called from within a Tokio runtime; the HTTP listener runs
    /// as a background task.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                tokio::spawn(async move {
                    // `ExporterError` implements neither Display nor Debug in 0.15.
                    if exporter.await.is_err() {
                        tracing::warn!("Metrics exporter stopped");
                    }
                });
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    // Provider
    describe_counter!(
        "fieldops_provider_calls_total",
        "Provider calls by provider and operation"
    );
    describe_counter!(
        "fieldops_provider_errors_total",
        "Failed live provider calls by provider and operation"
    );
    describe_counter!(
        "fieldops_provider_fallbacks_total",
        "Calls served by the mock provider"
    );
    describe_counter!(
        "fieldops_provider_trips_total",
        "Sessions that stopped using the live provider after a failure"
    );

    // Lifecycle
    describe_counter!(
        "fieldops_ticket_transitions_total",
        "Applied lifecycle transitions by target status"
    );
    describe_histogram!(
        "fieldops_store_operation_duration_seconds",
        "Ticket Store operation latency"
    );

    // Notifications
    describe_counter!(
        "fieldops_notifications_enqueued_total",
        "Notices accepted by the outbound queue"
    );
    describe_counter!(
        "fieldops_notifications_dropped_total",
        "Notices dropped because the queue was full or closed"
    );
    describe_counter!(
        "fieldops_notifications_created_total",
        "Notification records created"
    );
    describe_counter!(
        "fieldops_notifications_failed_total",
        "Notification records that could not be created"
    );
    describe_counter!(
        "fieldops_notification_deliveries_failed_total",
        "Channel deliveries that failed"
    );
}

/// Provider routing metrics recorder.
pub struct ProviderMetrics;

impl ProviderMetrics {
    /// Record a provider call.
    pub fn record_call(provider: &'static str, operation: &'static str) {
        counter!("fieldops_provider_calls_total", "provider" => provider, "operation" => operation)
            .increment(1);
    }

    /// Record a failed live call.
    pub fn record_error(provider: &'static str, operation: &'static str) {
        counter!("fieldops_provider_errors_total", "provider" => provider, "operation" => operation)
            .increment(1);
    }

    /// Record a call served by the mock.
    pub fn record_fallback(operation: &'static str) {
        counter!("fieldops_provider_fallbacks_total", "operation" => operation).increment(1);
    }

    /// Record a session tripping its health flag.
    pub fn record_trip() {
        counter!("fieldops_provider_trips_total").increment(1);
    }
}

/// Ticket Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record an applied transition.
    pub fn record_transition(to: &'static str) {
        counter!("fieldops_ticket_transitions_total", "to" => to).increment(1);
    }

    /// Record how long a store operation took.
    pub fn record_operation(operation: &'static str, duration: Duration) {
        histogram!("fieldops_store_operation_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }
}

/// Notification metrics recorder.
pub struct NotificationMetrics;

impl NotificationMetrics {
    /// Record a notice accepted by the queue.
    pub fn record_enqueued() {
        counter!("fieldops_notifications_enqueued_total").increment(1);
    }

    /// Record a dropped notice.
    pub fn record_dropped() {
        counter!("fieldops_notifications_dropped_total").increment(1);
    }

    /// Record a created notification record.
    pub fn record_created() {
        counter!("fieldops_notifications_created_total").increment(1);
    }

    /// Record a notification record that could not be created.
    pub fn record_failed() {
        counter!("fieldops_notifications_failed_total").increment(1);
    }

    /// Record a failed channel delivery.
    pub fn record_delivery_failure(channel: &'static str) {
        counter!("fieldops_notification_deliveries_failed_total", "channel" => channel)
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_is_inert_until_started() {
        let server = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        assert!(server.render().is_none());
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        ProviderMetrics::record_call("in_memory", "list_tickets");
        ProviderMetrics::record_trip();
        StoreMetrics::record_transition("assigned");
        NotificationMetrics::record_dropped();
    }
}
