//! Control surface: the `lockdown` file a privileged operator reads and writes
//!
//! # Read
//!
//! One line, every selectable level in ascending order, the active one in
//! brackets:
//!
//! ```text
//! none [integrity] confidentiality
//! ```
//!
//! # Write
//!
//! A level label, optionally followed by one newline. Matching is exact and
//! case-sensitive. A label at or below the current level is refused the same
//! way an unknown label is.
//!
//! Who may open the file is the host's business; nothing here checks
//! credentials.

use std::collections::TryReserveError;
use std::fmt;

use super::reason::Level;
use super::state::LockdownState;

/// Name the surface is registered under.
pub const CONTROL_FILE_NAME: &str = "lockdown";
/// Owner read/write only.
pub const CONTROL_FILE_MODE: u32 = 0o600;
/// Source recorded for raises that arrive through this surface.
pub const CONTROL_SOURCE: &str = "control surface";
/// Size of the fixed report buffer.
const REPORT_CAPACITY: usize = 80;

pub struct ControlFile<'a> {
    state: &'a LockdownState,
}

impl<'a> ControlFile<'a> {
    pub fn new(state: &'a LockdownState) -> Self {
        Self { state }
    }

    pub fn name(&self) -> &'static str {
        CONTROL_FILE_NAME
    }

    pub fn mode(&self) -> u32 {
        CONTROL_FILE_MODE
    }

    /// Build the report line for the current level.
    pub fn render(&self) -> String {
        let current = self.state.level();
        let mut report = String::with_capacity(REPORT_CAPACITY);

        for level in Level::SELECTABLE {
            if !report.is_empty() {
                report.push(' ');
            }
            if level == current {
                report.push('[');
                report.push_str(level.label());
                report.push(']');
            } else {
                report.push_str(level.label());
            }
        }

        if !report.is_empty() {
            report.push('\n');
        }
        report.truncate(REPORT_CAPACITY);
        report
    }

    /// Copy the report starting at `offset` into `buf`. Returns the number of
    /// bytes copied, 0 once `offset` is past the end.
    pub fn read(&self, buf: &mut [u8], offset: u64) -> usize {
        let report = self.render();
        let bytes = report.as_bytes();

        let start = match usize::try_from(offset) {
            Ok(start) if start < bytes.len() => start,
            _ => return 0,
        };
        let n = buf.len().min(bytes.len() - start);
        buf[..n].copy_from_slice(&bytes[start..start + n]);
        n
    }

    /// Apply a level request. Returns the number of bytes consumed.
    pub fn write(&self, payload: &[u8]) -> Result<usize, ControlError> {
        let mut request = Vec::new();
        request.try_reserve_exact(payload.len())?;
        request.extend_from_slice(payload);

        // The payload is a C-style string: anything past a NUL is ignored.
        if let Some(nul) = request.iter().position(|b| *b == 0) {
            request.truncate(nul);
        }
        if request.last() == Some(&b'\n') {
            request.pop();
        }

        let label = std::str::from_utf8(&request).map_err(|_| ControlError::InvalidArgument)?;
        let level = Level::from_label(label).ok_or(ControlError::InvalidArgument)?;

        self.state.raise(CONTROL_SOURCE, level).map_err(|e| {
            tracing::debug!(target: "lockdown", error = %e, "control write rejected");
            ControlError::InvalidArgument
        })?;

        Ok(payload.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ControlError
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum ControlError {
    /// Unknown label, or a level not above the current one.
    InvalidArgument,
    /// Could not buffer the payload.
    OutOfMemory(TryReserveError),
}

impl ControlError {
    pub fn errno(&self) -> nix::errno::Errno {
        match self {
            ControlError::InvalidArgument => nix::errno::Errno::EINVAL,
            ControlError::OutOfMemory(_) => nix::errno::Errno::ENOMEM,
        }
    }
}

impl From<TryReserveError> for ControlError {
    fn from(e: TryReserveError) -> Self {
        ControlError::OutOfMemory(e)
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::InvalidArgument => write!(f, "invalid argument"),
            ControlError::OutOfMemory(e) => write!(f, "out of memory: {}", e),
        }
    }
}

impl std::error::Error for ControlError {}
