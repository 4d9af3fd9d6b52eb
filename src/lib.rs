//! lockdown-ratchet - a one-way security lockdown level
//!
//! Once raised, the lockdown level refuses an increasing set of sensitive
//! operations (raw hardware access, unsigned code, kernel memory inspection)
//! and can only be lowered by an operator at the physical console.
//!
//! # Modules
//!
//! - `lockdown` - level state, enforcement check, control surface, boot
//!   policy and the emergency lift
//! - `config` - JSON configuration for the host binary
//! - `metrics` - Prometheus metrics for raises, denials and lifts
//! - `tracing` - log subscriber setup
//!
//! # Quick Start
//!
//! ```ignore
//! use lockdown_ratchet::lockdown::{self, boot, Reason};
//!
//! // Before anything else can reach the hooks
//! boot::initialize(lockdown::global(), &boot::BootPolicy::from_build(), &cmdline);
//!
//! // In a hook
//! if lockdown::locked_down(Reason::DevMem.into()) {
//!     return Err(Errno::EPERM);
//! }
//! ```

pub mod config;
pub mod lockdown;
pub mod metrics;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use config::LockdownConfig;
pub use lockdown::{ControlFile, Level, LockdownState, Reason, Restriction, Tier};
