//! Prometheus metrics for the relay node
//!
//! Exposed on /metrics for Prometheus scraping.

#![allow(dead_code)]

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec,
};

lazy_static! {
    // Submission metrics
    pub static ref SUBMISSIONS: CounterVec = register_counter_vec!(
        "relay_submissions_total",
        "Total signature/affirmation submissions received",
        &["direction", "flow", "outcome"]
    ).unwrap();

    pub static ref QUORUMS_REACHED: CounterVec = register_counter_vec!(
        "relay_quorums_reached_total",
        "Total messages that reached the signature threshold",
        &["direction", "flow"]
    ).unwrap();

    // Execution metrics
    pub static ref EXECUTIONS: CounterVec = register_counter_vec!(
        "relay_executions_total",
        "Total execution attempts after quorum",
        &["direction", "outcome"]
    ).unwrap();

    pub static ref EXECUTION_FAILURES: CounterVec = register_counter_vec!(
        "relay_execution_failures_total",
        "Execution failures by error category",
        &["direction", "category"]
    ).unwrap();

    // Fix metrics
    pub static ref FIXES: CounterVec = register_counter_vec!(
        "relay_fixes_total",
        "Fix attempts on failed messages",
        &["direction", "outcome"]
    ).unwrap();

    // Ledger metrics
    pub static ref LEDGER_RESERVE: GaugeVec = register_gauge_vec!(
        "relay_ledger_reserve",
        "Remaining backing reserve per direction (base units)",
        &["direction"]
    ).unwrap();

    // Health metrics
    pub static ref UP: Gauge = register_gauge!(
        "relay_up",
        "Whether the relay node is up and running"
    ).unwrap();
}

/// Record a submission result
pub fn record_submission(direction: &str, flow: &str, accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    SUBMISSIONS
        .with_label_values(&[direction, flow, outcome])
        .inc();
}

/// Record a freshly reached quorum
pub fn record_quorum(direction: &str, flow: &str) {
    QUORUMS_REACHED.with_label_values(&[direction, flow]).inc();
}

/// Record an execution attempt outcome
pub fn record_execution(direction: &str, success: bool) {
    let outcome = if success { "executed" } else { "failed" };
    EXECUTIONS.with_label_values(&[direction, outcome]).inc();
}

/// Record an execution failure by category
pub fn record_execution_failure(direction: &str, category: &str) {
    EXECUTION_FAILURES
        .with_label_values(&[direction, category])
        .inc();
}

/// Record a fix attempt outcome
pub fn record_fix(direction: &str, success: bool) {
    let outcome = if success { "executed" } else { "failed" };
    FIXES.with_label_values(&[direction, outcome]).inc();
}

/// Update the remaining reserve gauge
pub fn set_ledger_reserve(direction: &str, reserve: u128) {
    LEDGER_RESERVE
        .with_label_values(&[direction])
        .set(reserve as f64);
}
