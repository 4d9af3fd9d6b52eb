//! Boot-time lockdown: build policy first, then the `lockdown=` parameter
//!
//! Both sources go through [`LockdownState::raise`], so whichever asks for the
//! higher tier wins no matter the order, and applying either twice is
//! harmless.

use std::fmt;

use super::reason::{Level, Tier};
use super::state::{LockdownError, LockdownState};

/// Command-line key recognised by [`parse_cmdline`].
pub const BOOT_PARAM: &str = "lockdown";
/// Source recorded for raises forced by the build.
pub const SOURCE_BUILD: &str = "Kernel configuration";
/// Source recorded for raises requested on the command line.
pub const SOURCE_CMDLINE: &str = "command line";

#[cfg(all(feature = "force-integrity", feature = "force-confidentiality"))]
compile_error!("features `force-integrity` and `force-confidentiality` are mutually exclusive");

/// Tier forced at build time, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootPolicy {
    pub forced: Option<Tier>,
}

impl BootPolicy {
    /// Policy selected by the `force-*` cargo features.
    pub fn from_build() -> Self {
        let forced = if cfg!(feature = "force-confidentiality") {
            Some(Tier::Confidentiality)
        } else if cfg!(feature = "force-integrity") {
            Some(Tier::Integrity)
        } else {
            None
        };
        Self { forced }
    }

    /// Combine with a runtime-configured tier. Can only make the policy
    /// stricter.
    pub fn strengthen(self, extra: Option<Tier>) -> Self {
        Self {
            forced: self.forced.max(extra),
        }
    }
}

/// Parse the value of one `lockdown=` occurrence.
pub fn parse_param(value: Option<&str>) -> Result<Tier, BootError> {
    match value {
        Some("integrity") => Ok(Tier::Integrity),
        Some("confidentiality") => Ok(Tier::Confidentiality),
        other => Err(BootError::InvalidValue(other.map(str::to_owned))),
    }
}

/// Every `lockdown` occurrence on a kernel command line, in order.
///
/// `lockdown` alone yields `None`; `lockdown=` yields `Some("")`.
pub fn parse_cmdline(cmdline: &str) -> Vec<Option<&str>> {
    cmdline
        .split_whitespace()
        .filter_map(|token| match token.split_once('=') {
            Some((key, value)) if key == BOOT_PARAM => Some(Some(value)),
            None if token == BOOT_PARAM => Some(None),
            _ => None,
        })
        .collect()
}

/// What boot initialization did.
#[derive(Debug, Default)]
pub struct BootReport {
    /// Sources whose raise took effect, with the level reached.
    pub applied: Vec<(&'static str, Level)>,
    /// Malformed command-line values; each was skipped.
    pub errors: Vec<BootError>,
}

/// Apply `policy`, then every `lockdown=` value in `cmdline`.
///
/// Must run before the control surface or enforcement hooks are reachable.
/// Bad values are logged and collected, never fatal.
pub fn initialize(state: &LockdownState, policy: &BootPolicy, cmdline: &str) -> BootReport {
    let mut report = BootReport::default();

    if let Some(tier) = policy.forced {
        apply(state, SOURCE_BUILD, tier, &mut report);
    }

    for value in parse_cmdline(cmdline) {
        match parse_param(value) {
            Ok(tier) => apply(state, SOURCE_CMDLINE, tier, &mut report),
            Err(e) => {
                tracing::error!(target: "lockdown", error = %e, "ignoring boot parameter");
                report.errors.push(e);
            }
        }
    }

    tracing::info!(
        target: "lockdown",
        level = %state.level(),
        raises = report.applied.len(),
        errors = report.errors.len(),
        "lockdown boot policy applied"
    );
    report
}

fn apply(state: &LockdownState, source: &'static str, tier: Tier, report: &mut BootReport) {
    let level = Level::from(tier);
    match state.raise(source, level) {
        Ok(()) => report.applied.push((source, level)),
        Err(LockdownError::AlreadyAtOrAbove { current, .. }) => {
            tracing::debug!(
                target: "lockdown",
                source = source,
                requested = %level,
                current = %current,
                "boot lockdown request already covered"
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BootError
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    /// `lockdown` with no value, or a value other than the two tiers.
    InvalidValue(Option<String>),
}

impl BootError {
    pub fn errno(&self) -> nix::errno::Errno {
        nix::errno::Errno::EINVAL
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::InvalidValue(None) => write!(f, "{}: missing value", BOOT_PARAM),
            BootError::InvalidValue(Some(v)) => {
                write!(f, "{}: unrecognized value {:?}", BOOT_PARAM, v)
            }
        }
    }
}

impl std::error::Error for BootError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param(Some("integrity")), Ok(Tier::Integrity));
        assert_eq!(parse_param(Some("confidentiality")), Ok(Tier::Confidentiality));
        assert_eq!(parse_param(None), Err(BootError::InvalidValue(None)));
        assert_eq!(
            parse_param(Some("")),
            Err(BootError::InvalidValue(Some(String::new())))
        );
        assert!(parse_param(Some("Integrity")).is_err());
        assert!(parse_param(Some("none")).is_err());
    }

    #[test]
    fn test_parse_cmdline() {
        let cmdline = "BOOT_IMAGE=/vmlinuz ro quiet lockdown=integrity lockdownx=1 lockdown";
        assert_eq!(parse_cmdline(cmdline), vec![Some("integrity"), None]);
        assert!(parse_cmdline("root=/dev/sda1 quiet").is_empty());
    }

    #[test]
    fn test_policy_strengthen_never_weakens() {
        let policy = BootPolicy {
            forced: Some(Tier::Confidentiality),
        };
        assert_eq!(
            policy.strengthen(Some(Tier::Integrity)).forced,
            Some(Tier::Confidentiality)
        );
        assert_eq!(
            BootPolicy::default().strengthen(Some(Tier::Integrity)).forced,
            Some(Tier::Integrity)
        );
        assert_eq!(policy.strengthen(None).forced, Some(Tier::Confidentiality));
    }

    #[test]
    fn test_build_policy_matches_features() {
        let policy = BootPolicy::from_build();
        if cfg!(feature = "force-confidentiality") {
            assert_eq!(policy.forced, Some(Tier::Confidentiality));
        } else if cfg!(feature = "force-integrity") {
            assert_eq!(policy.forced, Some(Tier::Integrity));
        } else {
            assert_eq!(policy.forced, None);
        }
    }

    #[test]
    fn test_forced_confidentiality_beats_cmdline_integrity() {
        let state = LockdownState::new();
        let policy = BootPolicy {
            forced: Some(Tier::Confidentiality),
        };
        let report = initialize(&state, &policy, "quiet lockdown=integrity");

        assert_eq!(state.level(), Level::Confidentiality);
        assert_eq!(report.applied, vec![(SOURCE_BUILD, Level::Confidentiality)]);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_cmdline_only() {
        let state = LockdownState::new();
        let report = initialize(&state, &BootPolicy::default(), "lockdown=integrity");
        assert_eq!(state.level(), Level::Integrity);
        assert_eq!(report.applied, vec![(SOURCE_CMDLINE, Level::Integrity)]);
    }

    #[test]
    fn test_bad_values_are_reported_and_skipped() {
        let state = LockdownState::new();
        let report = initialize(
            &state,
            &BootPolicy::default(),
            "lockdown=bogus lockdown= lockdown lockdown=confidentiality",
        );
        assert_eq!(state.level(), Level::Confidentiality);
        assert_eq!(report.errors.len(), 3);
        assert_eq!(report.errors[0].errno(), nix::errno::Errno::EINVAL);
    }

    #[test]
    fn test_initialize_twice_is_idempotent() {
        let state = LockdownState::new();
        let policy = BootPolicy {
            forced: Some(Tier::Integrity),
        };
        initialize(&state, &policy, "lockdown=integrity");
        let second = initialize(&state, &policy, "lockdown=integrity");
        assert_eq!(state.level(), Level::Integrity);
        assert!(second.applied.is_empty());
    }
}
