//! Prometheus metrics for lockdown observability
//!
//! Counters are bumped from the raise, check and lift paths. None of them feed
//! back into a lockdown decision.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};

use crate::lockdown::Level;

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Level Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Current lockdown level (0 = none, 1 = integrity, 2 = confidentiality).
    ///
    /// Mirrors the process-wide `LockdownState`; other instances never
    /// touch it.
    pub static ref LOCKDOWN_LEVEL: Gauge = register_gauge!(
        "lockdown_level",
        "Current lockdown level (0 none, 1 integrity, 2 confidentiality)"
    ).expect("failed to register LOCKDOWN_LEVEL metric");

    /// Successful raises, by triggering source.
    ///
    /// Labels:
    /// - source: "Kernel configuration", "command line", "control surface", ...
    pub static ref LOCKDOWN_RAISES: CounterVec = register_counter_vec!(
        "lockdown_raises_total",
        "Successful lockdown level raises per source",
        &["source", "level"]
    ).expect("failed to register LOCKDOWN_RAISES metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Enforcement Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Operations refused by the enforcement check.
    ///
    /// Labels:
    /// - reason: registry label (e.g., "debugfs access")
    pub static ref LOCKDOWN_DENIALS: CounterVec = register_counter_vec!(
        "lockdown_denials_total",
        "Operations refused by lockdown per reason",
        &["reason"]
    ).expect("failed to register LOCKDOWN_DENIALS metric");

    /// Checks made with a reason code outside the valid range (caller bugs).
    pub static ref LOCKDOWN_INVALID_CODES: Counter = register_counter!(
        "lockdown_invalid_reason_total",
        "Enforcement checks made with an invalid reason code"
    ).expect("failed to register LOCKDOWN_INVALID_CODES metric");

    /// Emergency lifts performed from the physical trigger.
    pub static ref LOCKDOWN_LIFTS: Counter = register_counter!(
        "lockdown_lifts_total",
        "Emergency lockdown lifts"
    ).expect("failed to register LOCKDOWN_LIFTS metric");
}

/// Touch the metrics so they show up in the registry before the first event.
pub fn init() {
    let _ = LOCKDOWN_LEVEL.get();
    let _ = LOCKDOWN_INVALID_CODES.get();
    let _ = LOCKDOWN_LIFTS.get();
}

pub fn record_raise(source: &str, level: Level) {
    LOCKDOWN_RAISES.with_label_values(&[source, level.label()]).inc();
}

pub fn record_denial(label: &str) {
    LOCKDOWN_DENIALS.with_label_values(&[label]).inc();
}

pub fn record_invalid_code() {
    LOCKDOWN_INVALID_CODES.inc();
}

pub fn record_lift() {
    LOCKDOWN_LIFTS.inc();
}

/// Render every registered metric in the Prometheus text format.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
