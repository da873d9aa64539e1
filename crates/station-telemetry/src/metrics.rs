//! Prometheus metrics for the station core.
//!
//! All metrics follow the naming convention: `station_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Handler invocations by mode (sync/async/post/route) and outcome
    pub static ref DISPATCH_TOTAL: CounterVec = CounterVec::new(
        Opts::new("station_dispatch_total", "Handler invocations"),
        &["mode", "outcome"]
    ).expect("metric creation failed");

    /// Time callers spend in a synchronous dispatch
    pub static ref SYNC_DISPATCH_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "station_dispatch_sync_duration_seconds",
            "Time spent waiting on synchronous dispatch"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("bucket layout"))
    ).expect("metric creation failed");

    // =========================================================================
    // MODULES AND WIRING
    // =========================================================================

    /// Modules currently started
    pub static ref MODULES_RUNNING: Gauge = Gauge::new(
        "station_modules_running",
        "Number of modules in the Started state"
    ).expect("metric creation failed");

    /// Live connections between modules
    pub static ref CONNECTIONS_ACTIVE: Gauge = Gauge::new(
        "station_connections_active",
        "Number of resolved module connections"
    ).expect("metric creation failed");

    /// Connection declarations dropped because an endpoint was missing
    pub static ref CONNECTIONS_DROPPED: Counter = Counter::new(
        "station_connections_dropped_total",
        "Connection declarations that could not be resolved"
    ).expect("metric creation failed");

    /// Events emitted by modules
    pub static ref EVENTS_EMITTED: Counter = Counter::new(
        "station_events_emitted_total",
        "Events emitted by modules"
    ).expect("metric creation failed");

    /// Notify broadcasts by type
    pub static ref NOTIFY_BROADCASTS: CounterVec = CounterVec::new(
        Opts::new("station_notify_broadcasts_total", "Notify broadcasts"),
        &["kind"]
    ).expect("metric creation failed");

    // =========================================================================
    // POOL
    // =========================================================================

    /// Recurring timer executions
    pub static ref TIMER_RUNS: CounterVec = CounterVec::new(
        Opts::new("station_timer_runs_total", "Recurring timer executions"),
        &["timer"]
    ).expect("metric creation failed");

    // =========================================================================
    // UI BRIDGE
    // =========================================================================

    /// Actions received from the UI
    pub static ref UI_ACTIONS: Counter = Counter::new(
        "station_ui_actions_total",
        "Actions dispatched from the UI"
    ).expect("metric creation failed");
}

/// Handle for the registered metrics.
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    /// Render the registry in Prometheus text format.
    pub fn render(&self) -> Result<String, TelemetryError> {
        encode(&self.registry)
    }
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(DISPATCH_TOTAL.clone()),
        Box::new(SYNC_DISPATCH_DURATION.clone()),
        Box::new(MODULES_RUNNING.clone()),
        Box::new(CONNECTIONS_ACTIVE.clone()),
        Box::new(CONNECTIONS_DROPPED.clone()),
        Box::new(EVENTS_EMITTED.clone()),
        Box::new(NOTIFY_BROADCASTS.clone()),
        Box::new(TIMER_RUNS.clone()),
        Box::new(UI_ACTIONS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    encode(&REGISTRY)
}

fn encode(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Record one dispatch outcome.
pub fn record_dispatch(mode: &str, outcome: &str) {
    DISPATCH_TOTAL.with_label_values(&[mode, outcome]).inc();
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
