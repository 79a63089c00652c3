//! Counter metrics

use super::labels;

/// Record the start of the (single) connect attempt for a datastore
pub fn connect_attempted(backend: &'static str) {
    metrics::counter!("datastore_connect_attempts_total", labels::BACKEND => backend).increment(1);
}

/// Record the outcome of a connect attempt
pub fn connect_completed(backend: &'static str, error: Option<&'static str>) {
    let outcome = if error.is_some() {
        labels::OUTCOME_FAILURE
    } else {
        labels::OUTCOME_SUCCESS
    };
    metrics::counter!(
        "datastore_connects_total",
        labels::BACKEND => backend,
        labels::OUTCOME => outcome,
        labels::ERROR => error.unwrap_or("none")
    )
    .increment(1);
}

/// Record a liveness probe outcome
pub fn ping_completed(backend: &'static str, ok: bool) {
    let outcome = if ok {
        labels::OUTCOME_SUCCESS
    } else {
        labels::OUTCOME_FAILURE
    };
    metrics::counter!(
        "datastore_pings_total",
        labels::BACKEND => backend,
        labels::OUTCOME => outcome
    )
    .increment(1);
}

/// Record how a transaction ended
pub fn transaction_completed(outcome: &'static str) {
    metrics::counter!("datastore_transactions_total", labels::OUTCOME => outcome).increment(1);
}

/// Record a failed rollback
pub fn rollback_failed() {
    metrics::counter!("datastore_rollback_failures_total").increment(1);
}
