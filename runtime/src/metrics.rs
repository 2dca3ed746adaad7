//! Prometheus metrics for observability and monitoring.
//!
//! The store records its own metrics through the `metrics` facade:
//! - Actions processed and reducer execution time
//! - Effects executed, by effect type
//! - Cancellations issued and results discarded after cancellation
//! - Shutdown progress
//!
//! Nothing is exported until a recorder is installed. Binaries call
//! [`MetricsExporter::install`] once at startup and render the snapshot when
//! they need it.
//!
//! # Example
//!
//! ```rust,no_run
//! use little_lemon_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

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

/// In-process Prometheus exporter.
///
/// Installs the global recorder and keeps the handle used to render the
/// text exposition format.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe the store metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g. by another test), this logs a
    /// warning and succeeds without a handle; metrics keep flowing to the
    /// existing recorder.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render the current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl std::fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsExporter")
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

/// Register descriptions for every metric the store records.
///
/// Safe to call more than once.
pub fn register_metrics() {
    describe_counter!(
        "store.commands.total",
        "Total number of actions processed by stores"
    );
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Reducer execution time in seconds"
    );
    describe_histogram!(
        "store.effects.count",
        "Number of effects returned per reducer call"
    );
    describe_counter!(
        "store.effects.executed",
        "Total number of effects executed, labelled by type"
    );
    describe_counter!(
        "store.effects.cancelled",
        "Total number of cancellation requests issued"
    );
    describe_counter!(
        "store.effects.discarded",
        "Effect results dropped because their effect was cancelled"
    );
    describe_gauge!(
        "store.effects.pending",
        "Effects currently running across all stores"
    );
    describe_counter!("store.shutdown.initiated", "Shutdowns started");
    describe_counter!("store.shutdown.completed", "Shutdowns that drained all effects");
    describe_counter!("store.shutdown.timeout", "Shutdowns that timed out");
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shutting down"
    );
}
