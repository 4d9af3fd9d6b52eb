//! The process-wide lockdown level and its one-way raise primitive
//!
//! ```text
//!   raise(src, L) ──► fetch_max(level, L) ──► prev < L ?
//!                                              │yes        │no
//!                                              ▼           ▼
//!                                        notice + Ok   AlreadyAtOrAbove
//! ```
//!
//! `fetch_max` is a single atomic read-modify-write, so two racing raises can
//! never lose the higher of the two and nothing in this module can store a
//! lower value. The only downward store is `lift`, which is crate-private and
//! only reachable from the physical-presence trigger.

use lazy_static::lazy_static;
use prometheus::Gauge;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use super::reason::Level;
use crate::metrics;

/// Advisory reference attached to every notice.
pub const ADVISORY: &str = "https://wiki.debian.org/SecureBoot";

lazy_static! {
    /// The lockdown level of this process. Starts at the floor; boot
    /// initialization raises it before any control surface is handed out.
    static ref KERNEL_LOCKDOWN: LockdownState =
        LockdownState::with_gauge(metrics::LOCKDOWN_LEVEL.clone());
}

/// The single process-wide instance.
pub fn global() -> &'static LockdownState {
    &KERNEL_LOCKDOWN
}

// ═══════════════════════════════════════════════════════════════════════════
// LockdownState
// ═══════════════════════════════════════════════════════════════════════════
// WHAT IT IS:
//   One atomic level plus the raise primitive. Readers take a single
//   Acquire load, writers go through raise().
//
// INVARIANT:
//   level() never decreases except across lift(). The attached gauge, if
//   any, is only ever set to a level() read under `publish`, so it follows
//   the same order.
// ═══════════════════════════════════════════════════════════════════════════

pub struct LockdownState {
    level: AtomicU8,
    gauge: Option<Gauge>,
    publish: Mutex<()>,
}

impl LockdownState {
    pub fn new() -> Self {
        Self {
            level: AtomicU8::new(Level::None as u8),
            gauge: None,
            publish: Mutex::new(()),
        }
    }

    /// A state that mirrors its level into `gauge`.
    pub fn with_gauge(gauge: Gauge) -> Self {
        gauge.set(0.0);
        Self {
            gauge: Some(gauge),
            ..Self::new()
        }
    }

    /// Current level. May lag a raise that is still in flight, never one
    /// that has already returned.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Acquire))
    }

    pub fn is_locked_down(&self) -> bool {
        self.level() != Level::None
    }

    /// Raise the level to `target` on behalf of `source`.
    ///
    /// Returns `AlreadyAtOrAbove` without touching anything when the current
    /// level already covers `target`; lowering through here is impossible.
    pub fn raise(&self, source: &str, target: Level) -> Result<(), LockdownError> {
        let previous = Level::from_u8(self.level.fetch_max(target.as_u8(), Ordering::AcqRel));

        if previous >= target {
            return Err(LockdownError::AlreadyAtOrAbove {
                current: previous,
                requested: target,
            });
        }

        tracing::warn!(
            target: "lockdown",
            source = source,
            level = %target,
            "Kernel is locked down from {}; see {}",
            source,
            ADVISORY
        );
        metrics::record_raise(source, target);
        self.publish_level();
        Ok(())
    }

    /// Drop straight to the floor. Callers must be the physical trigger.
    #[cfg_attr(not(any(feature = "allow-lift", test)), allow(dead_code))]
    pub(crate) fn lift(&self) -> Level {
        let previous = Level::from_u8(self.level.swap(Level::None.as_u8(), Ordering::AcqRel));
        self.publish_level();
        previous
    }

    /// Copy the stored level into the gauge. Reading under the lock means a
    /// slow publisher can never overwrite a newer, higher value with the
    /// target it raised to.
    fn publish_level(&self) {
        if let Some(gauge) = &self.gauge {
            let _guard = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
            gauge.set(f64::from(self.level().as_u8()));
        }
    }
}

impl Default for LockdownState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockdownState")
            .field("level", &self.level())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// LockdownError
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockdownError {
    /// The level already covers the request; treated as permission denied.
    AlreadyAtOrAbove { current: Level, requested: Level },
}

impl LockdownError {
    pub fn errno(&self) -> nix::errno::Errno {
        match self {
            LockdownError::AlreadyAtOrAbove { .. } => nix::errno::Errno::EPERM,
        }
    }
}

impl fmt::Display for LockdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockdownError::AlreadyAtOrAbove { current, requested } => write!(
                f,
                "lockdown already at {} (requested {})",
                current, requested
            ),
        }
    }
}

impl std::error::Error for LockdownError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_starts_at_floor() {
        let state = LockdownState::new();
        assert_eq!(state.level(), Level::None);
        assert!(!state.is_locked_down());
    }

    #[test]
    fn test_raise_is_idempotent() {
        let state = LockdownState::new();
        assert!(state.raise("test", Level::Integrity).is_ok());
        assert_eq!(
            state.raise("test", Level::Integrity),
            Err(LockdownError::AlreadyAtOrAbove {
                current: Level::Integrity,
                requested: Level::Integrity,
            })
        );
        assert_eq!(state.level(), Level::Integrity);
    }

    #[test]
    fn test_raise_never_lowers() {
        let state = LockdownState::new();
        state.raise("test", Level::Confidentiality).unwrap();

        let err = state.raise("test", Level::Integrity).unwrap_err();
        assert_eq!(err.errno(), nix::errno::Errno::EPERM);
        assert!(state.raise("test", Level::None).is_err());
        assert_eq!(state.level(), Level::Confidentiality);
    }

    #[test]
    fn test_raise_to_floor_from_floor_is_noop() {
        let state = LockdownState::new();
        assert!(state.raise("test", Level::None).is_err());
        assert_eq!(state.level(), Level::None);
    }

    #[test]
    fn test_concurrent_raises_keep_maximum() {
        for _ in 0..50 {
            let state = Arc::new(LockdownState::new());
            let handles: Vec<_> = [Level::Integrity, Level::Confidentiality, Level::Integrity]
                .into_iter()
                .map(|target| {
                    let state = Arc::clone(&state);
                    thread::spawn(move || state.raise("race", target).is_ok())
                })
                .collect();

            let successes = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();

            assert_eq!(state.level(), Level::Confidentiality);
            assert!((1..=2).contains(&successes));
        }
    }

    #[test]
    fn test_lift_resets_to_floor() {
        let state = LockdownState::new();
        state.raise("test", Level::Confidentiality).unwrap();
        assert_eq!(state.lift(), Level::Confidentiality);
        assert_eq!(state.level(), Level::None);
        assert!(state.raise("test", Level::Integrity).is_ok());
    }

    #[test]
    fn test_gauge_tracks_racing_raises() {
        for _ in 0..2000 {
            let gauge = Gauge::new("lockdown_level_race", "race").unwrap();
            let state = Arc::new(LockdownState::with_gauge(gauge.clone()));
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = [Level::Integrity, Level::Confidentiality]
                .into_iter()
                .map(|target| {
                    let state = Arc::clone(&state);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        let _ = state.raise("race", target);
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(state.level(), Level::Confidentiality);
            assert_eq!(gauge.get(), 2.0);
        }
    }

    #[test]
    fn test_gauge_follows_lift() {
        let gauge = Gauge::new("lockdown_level_lift", "lift").unwrap();
        let state = LockdownState::with_gauge(gauge.clone());
        assert_eq!(gauge.get(), 0.0);

        state.raise("test", Level::Integrity).unwrap();
        assert_eq!(gauge.get(), 1.0);
        let _ = state.raise("test", Level::Integrity);
        assert_eq!(gauge.get(), 1.0);

        state.lift();
        assert_eq!(gauge.get(), 0.0);
    }

    #[test]
    fn test_plain_state_leaves_global_gauge_alone() {
        let state = LockdownState::new();
        state.raise("test", Level::Confidentiality).unwrap();
        assert_eq!(global().level(), Level::None);
        assert_eq!(metrics::LOCKDOWN_LEVEL.get(), f64::from(global().level().as_u8()));
    }
}
