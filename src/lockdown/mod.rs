//! Lockdown: a one-way restriction ratchet
//!
//! The level only moves up. Hooks ask [`is_restricted`] before a sensitive
//! operation; the level is raised at boot, through the control surface, and
//! (with `allow-lift`) reset by a physical key press.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  boot::initialize      build policy, then lockdown=<tier>       │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │ raise()
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  state::LockdownState  AtomicU8, fetch_max only                 │
//! └─────────────────────────────────────────────────────────────────┘
//!        ▲ raise()                 │ level()             ▲ lift()
//!        │                         ▼                     │
//! ┌──────────────┐   ┌─────────────────────────┐   ┌──────────────┐
//! │ control file │   │ enforce::is_restricted  │   │ lift (SysRq) │
//! └──────────────┘   └─────────────────────────┘   └──────────────┘
//! ```

pub mod boot;
pub mod control;
pub mod enforce;
#[cfg(any(feature = "allow-lift", test))]
pub mod lift;
pub mod reason;
pub mod state;

pub use boot::{BootError, BootPolicy, BootReport};
pub use control::{ControlError, ControlFile};
pub use enforce::{check, is_restricted, is_restricted_code, locked_down, locked_down_code, Denied};
pub use reason::{Level, Reason, Restriction, Tier};
pub use state::{global, LockdownError, LockdownState};
