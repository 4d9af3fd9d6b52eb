//! Enforcement check consulted before a sensitive operation
//!
//! The check only reads the level. Every path that cannot reach a clean
//! answer reports "restricted".

use std::fmt;

use super::reason::{Restriction, CODE_CONFIDENTIALITY_MAX};
use super::state::{self, LockdownState, ADVISORY};
use crate::metrics;

/// Is `what` currently forbidden on `state`?
pub fn is_restricted(state: &LockdownState, what: Restriction) -> bool {
    if state.level() < what.required_level() {
        return false;
    }

    if let Some(label) = what.label() {
        let actor = current_actor();
        tracing::warn!(
            target: "lockdown",
            actor = %actor,
            reason = label,
            "Lockdown: {}: {} is restricted; see {}",
            actor,
            label,
            ADVISORY
        );
        metrics::record_denial(label);
    }
    true
}

/// Raw-code variant for hook callers. Codes outside the checkable range are
/// a caller bug and are always reported as restricted.
pub fn is_restricted_code(state: &LockdownState, code: u32) -> bool {
    match Restriction::from_code(code) {
        Some(what) => is_restricted(state, what),
        None => {
            tracing::error!(
                target: "lockdown",
                code = code,
                max = CODE_CONFIDENTIALITY_MAX,
                "Invalid lockdown reason"
            );
            metrics::record_invalid_code();
            true
        }
    }
}

/// Hook-style wrapper: `Err(Denied)` when the operation must be refused.
pub fn check(state: &LockdownState, what: Restriction) -> Result<(), Denied> {
    if is_restricted(state, what) {
        Err(Denied { what })
    } else {
        Ok(())
    }
}

/// [`is_restricted`] against the process-wide state.
pub fn locked_down(what: Restriction) -> bool {
    is_restricted(state::global(), what)
}

/// [`is_restricted_code`] against the process-wide state.
pub fn locked_down_code(code: u32) -> bool {
    is_restricted_code(state::global(), code)
}

/// Name of whoever is asking: the thread name, as the task name would be.
fn current_actor() -> String {
    let thread = std::thread::current();
    format!(
        "{}[{}]",
        thread.name().unwrap_or("<unnamed>"),
        std::process::id()
    )
}

/// Refusal returned by [`check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denied {
    pub what: Restriction,
}

impl Denied {
    pub fn errno(&self) -> nix::errno::Errno {
        nix::errno::Errno::EPERM
    }
}

impl fmt::Display for Denied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.what.label() {
            Some(label) => write!(f, "{} is restricted by lockdown", label),
            None => write!(f, "operation restricted by lockdown"),
        }
    }
}

impl std::error::Error for Denied {}
