use crate::context::TelemetryLabels;
use tracing::debug;

/// Records a counter via the `metrics` facade; a no-op until a recorder is
/// installed. Labels are logged alongside so they aren't silently dropped
/// when no recorder is wired up.
pub fn record_counter(name: &'static str, value: u64, labels: &TelemetryLabels) {
    metrics::counter!(name).increment(value);
    debug!(metric = name, value, tags = ?labels.tags(), "counter");
}

pub fn record_histogram(name: &'static str, value: f64, labels: &TelemetryLabels) {
    metrics::histogram!(name).record(value);
    debug!(metric = name, value, tags = ?labels.tags(), "histogram");
}

pub fn record_gauge(name: &'static str, value: i64, labels: &TelemetryLabels) {
    metrics::gauge!(name).set(value as f64);
    debug!(metric = name, value, tags = ?labels.tags(), "gauge");
}
