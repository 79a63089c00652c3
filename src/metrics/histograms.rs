//! Histogram metrics

use super::labels;

/// Time spent in the connect-and-ping sequence, in milliseconds
pub fn connect_duration(backend: &'static str, duration_ms: u64) {
    metrics::histogram!("datastore_connect_duration_ms", labels::BACKEND => backend)
        .record(duration_ms as f64);
}

/// Time spent in a liveness probe, in milliseconds
pub fn ping_duration(backend: &'static str, duration_ms: u64) {
    metrics::histogram!("datastore_ping_duration_ms", labels::BACKEND => backend)
        .record(duration_ms as f64);
}
