//! Metrics emitted by datastore operations
//!
//! Recorded through the `metrics` facade; nothing is exported unless the host
//! application installs a recorder.
//!
//! * `datastore_connect_attempts_total{backend}`
//! * `datastore_connects_total{backend, outcome, error}`
//! * `datastore_connect_duration_ms{backend}`
//! * `datastore_pings_total{backend, outcome}`
//! * `datastore_ping_duration_ms{backend}`
//! * `datastore_transactions_total{outcome}`
//! * `datastore_rollback_failures_total`

pub mod counters;
pub mod histograms;
pub mod labels;
