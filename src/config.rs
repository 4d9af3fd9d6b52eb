//! Runtime configuration for the lockdown host
//!
//! Loaded from JSON. Everything has a default, so an empty object is a valid
//! config. A configured `force` tier can only add to the build policy.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::lockdown::{BootPolicy, Tier};

/// Where the kernel command line is read from by default.
pub const DEFAULT_CMDLINE_PATH: &str = "/proc/cmdline";
/// Default `EnvFilter` directive.
pub const DEFAULT_LOG_FILTER: &str = "info,lockdown_ratchet=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockdownConfig {
    /// Tier forced on top of the build policy.
    pub force: Option<Tier>,
    /// File holding the boot command line.
    pub cmdline_path: PathBuf,
    pub log_format: LogFormat,
    pub log_filter: String,
}

impl Default for LockdownConfig {
    fn default() -> Self {
        Self {
            force: None,
            cmdline_path: PathBuf::from(DEFAULT_CMDLINE_PATH),
            log_format: LogFormat::Text,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl LockdownConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&raw)?)
    }

    /// Build policy plus whatever this config forces.
    pub fn boot_policy(&self) -> BootPolicy {
        BootPolicy::from_build().strengthen(self.force)
    }

    /// Read the command line from `cmdline_path`; a missing file reads as
    /// empty.
    pub fn read_cmdline(&self) -> String {
        match std::fs::read_to_string(&self.cmdline_path) {
            Ok(cmdline) => cmdline,
            Err(e) => {
                tracing::warn!(
                    path = %self.cmdline_path.display(),
                    error = %e,
                    "unable to read boot command line"
                );
                String::new()
            }
        }
    }
}
