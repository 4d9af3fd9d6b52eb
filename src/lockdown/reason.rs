//! Reason registry: lockdown levels, tiers and the restrictions they gate
//!
//! Tier membership is decided by an explicit `match` on each reason, never by
//! where a value happens to sit in a numeric range. The numeric codes only
//! exist for callers that still speak the raw hook ABI.
//!
//! ```text
//! ┌──────────┬────────────────────────────────────────────────────────┐
//! │ Level    │ Denies                                                 │
//! ├──────────┼────────────────────────────────────────────────────────┤
//! │ none     │ nothing                                                │
//! │ integrity│ every integrity-tier reason                            │
//! │ confid.  │ every integrity-tier AND confidentiality-tier reason   │
//! └──────────┴────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two restriction tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Stops persistent modification of the running kernel.
    Integrity,
    /// Additionally stops extraction of kernel memory and secrets.
    Confidentiality,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::Integrity => "integrity",
            Tier::Confidentiality => "confidentiality",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The current lockdown level, from least to most restrictive.
///
/// `repr(u8)` so the level can live in an atomic; the discriminants are
/// internal and never leave the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Level {
    None = 0,
    Integrity = 1,
    Confidentiality = 2,
}

impl Level {
    /// Levels offered by the control surface, ascending.
    pub const SELECTABLE: [Level; 3] = [Level::None, Level::Integrity, Level::Confidentiality];

    pub fn label(self) -> &'static str {
        match self {
            Level::None => "none",
            Level::Integrity => Tier::Integrity.label(),
            Level::Confidentiality => Tier::Confidentiality.label(),
        }
    }

    /// Exact, case-sensitive lookup among the selectable labels.
    pub fn from_label(label: &str) -> Option<Level> {
        Self::SELECTABLE.into_iter().find(|level| level.label() == label)
    }

    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    /// Anything above the top level saturates to it; the stored value only
    /// ever comes from `as_u8`.
    pub(crate) fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::None,
            1 => Level::Integrity,
            _ => Level::Confidentiality,
        }
    }
}

impl From<Tier> for Level {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Integrity => Level::Integrity,
            Tier::Confidentiality => Level::Confidentiality,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A concrete sensitive operation gated by lockdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    // Integrity tier
    ModuleSignature,
    DevMem,
    EfiTest,
    Kexec,
    Hibernation,
    PciAccess,
    Ioport,
    Msr,
    AcpiTables,
    PcmciaCis,
    Tiocsserial,
    ModuleParameters,
    Mmiotrace,
    Debugfs,
    // Confidentiality tier
    Kcore,
    Kprobes,
    BpfRead,
    Perf,
    Tracefs,
}

impl Reason {
    pub const ALL: [Reason; 19] = [
        Reason::ModuleSignature,
        Reason::DevMem,
        Reason::EfiTest,
        Reason::Kexec,
        Reason::Hibernation,
        Reason::PciAccess,
        Reason::Ioport,
        Reason::Msr,
        Reason::AcpiTables,
        Reason::PcmciaCis,
        Reason::Tiocsserial,
        Reason::ModuleParameters,
        Reason::Mmiotrace,
        Reason::Debugfs,
        Reason::Kcore,
        Reason::Kprobes,
        Reason::BpfRead,
        Reason::Perf,
        Reason::Tracefs,
    ];

    pub fn tier(self) -> Tier {
        match self {
            Reason::ModuleSignature
            | Reason::DevMem
            | Reason::EfiTest
            | Reason::Kexec
            | Reason::Hibernation
            | Reason::PciAccess
            | Reason::Ioport
            | Reason::Msr
            | Reason::AcpiTables
            | Reason::PcmciaCis
            | Reason::Tiocsserial
            | Reason::ModuleParameters
            | Reason::Mmiotrace
            | Reason::Debugfs => Tier::Integrity,
            Reason::Kcore | Reason::Kprobes | Reason::BpfRead | Reason::Perf | Reason::Tracefs => {
                Tier::Confidentiality
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Reason::ModuleSignature => "unsigned module loading",
            Reason::DevMem => "/dev/mem,kmem,port",
            Reason::EfiTest => "/dev/efi_test access",
            Reason::Kexec => "kexec of unsigned images",
            Reason::Hibernation => "hibernation",
            Reason::PciAccess => "direct PCI access",
            Reason::Ioport => "raw io port access",
            Reason::Msr => "raw MSR access",
            Reason::AcpiTables => "modifying ACPI tables",
            Reason::PcmciaCis => "direct PCMCIA CIS storage",
            Reason::Tiocsserial => "reconfiguration of serial port IO",
            Reason::ModuleParameters => "unsafe module parameters",
            Reason::Mmiotrace => "unsafe mmio",
            Reason::Debugfs => "debugfs access",
            Reason::Kcore => "/proc/kcore access",
            Reason::Kprobes => "use of kprobes",
            Reason::BpfRead => "use of bpf to read kernel RAM",
            Reason::Perf => "unsafe use of perf",
            Reason::Tracefs => "use of tracefs",
        }
    }
}

/// What a caller asks about: a concrete reason or a whole tier boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Restriction {
    Reason(Reason),
    Boundary(Tier),
}

/// Raw code of the floor.
pub const CODE_NONE: u32 = 0;
/// Raw code of the integrity boundary.
pub const CODE_INTEGRITY_MAX: u32 = 15;
/// Raw code of the confidentiality ceiling; checks must stay below it.
pub const CODE_CONFIDENTIALITY_MAX: u32 = 21;

impl Restriction {
    /// The lowest level at which this restriction is in force.
    pub fn required_level(self) -> Level {
        match self {
            Restriction::Reason(reason) => reason.tier().into(),
            Restriction::Boundary(tier) => tier.into(),
        }
    }

    pub fn label(self) -> Option<&'static str> {
        match self {
            Restriction::Reason(reason) => Some(reason.label()),
            Restriction::Boundary(tier) => Some(tier.label()),
        }
    }

    /// Decode a raw hook code. Only codes strictly between the floor and the
    /// confidentiality ceiling are checkable.
    pub fn from_code(code: u32) -> Option<Restriction> {
        match code {
            CODE_INTEGRITY_MAX => Some(Restriction::Boundary(Tier::Integrity)),
            1..=14 => Some(Restriction::Reason(Reason::ALL[(code - 1) as usize])),
            16..=20 => Some(Restriction::Reason(Reason::ALL[(code - 2) as usize])),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Restriction::Boundary(Tier::Integrity) => CODE_INTEGRITY_MAX,
            Restriction::Boundary(Tier::Confidentiality) => CODE_CONFIDENTIALITY_MAX,
            Restriction::Reason(reason) => {
                let idx = Reason::ALL
                    .iter()
                    .position(|r| *r == reason)
                    .unwrap_or_default() as u32;
                match reason.tier() {
                    Tier::Integrity => idx + 1,
                    Tier::Confidentiality => idx + 2,
                }
            }
        }
    }
}

impl From<Reason> for Restriction {
    fn from(reason: Reason) -> Self {
        Restriction::Reason(reason)
    }
}

/// Total registry lookup over the raw code space, floor and ceiling included.
pub fn label_for_code(code: u32) -> Option<&'static str> {
    match code {
        CODE_NONE => Some(Level::None.label()),
        CODE_CONFIDENTIALITY_MAX => Some(Tier::Confidentiality.label()),
        _ => Restriction::from_code(code).and_then(Restriction::label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        assert!(Level::None < Level::Integrity);
        assert!(Level::Integrity < Level::Confidentiality);
        assert_eq!(Level::SELECTABLE.len(), 3);
    }

    #[test]
    fn test_tier_split() {
        let integrity = Reason::ALL.iter().filter(|r| r.tier() == Tier::Integrity).count();
        let confidentiality = Reason::ALL
            .iter()
            .filter(|r| r.tier() == Tier::Confidentiality)
            .count();
        assert_eq!(integrity, 14);
        assert_eq!(confidentiality, 5);
        assert_eq!(Reason::BpfRead.tier(), Tier::Confidentiality);
        assert_eq!(Reason::Debugfs.tier(), Tier::Integrity);
    }

    #[test]
    fn test_labels_are_unique() {
        let mut labels: Vec<&str> = Reason::ALL.iter().map(|r| r.label()).collect();
        labels.extend(Level::SELECTABLE.iter().map(|l| l.label()));
        let before = labels.len();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), before);
    }

    #[test]
    fn test_from_label_is_case_sensitive() {
        assert_eq!(Level::from_label("integrity"), Some(Level::Integrity));
        assert_eq!(Level::from_label("Integrity"), None);
        assert_eq!(Level::from_label("integrity "), None);
        assert_eq!(Level::from_label("debugfs access"), None);
    }

    #[test]
    fn test_code_round_trip_matches_wire_table() {
        assert_eq!(Restriction::from_code(1), Some(Reason::ModuleSignature.into()));
        assert_eq!(Restriction::from_code(14), Some(Reason::Debugfs.into()));
        assert_eq!(
            Restriction::from_code(15),
            Some(Restriction::Boundary(Tier::Integrity))
        );
        assert_eq!(Restriction::from_code(16), Some(Reason::Kcore.into()));
        assert_eq!(Restriction::from_code(20), Some(Reason::Tracefs.into()));

        for code in 1..CODE_CONFIDENTIALITY_MAX {
            let restriction = Restriction::from_code(code).unwrap();
            assert_eq!(restriction.code(), code);
        }
    }

    #[test]
    fn test_invalid_codes() {
        assert_eq!(Restriction::from_code(CODE_NONE), None);
        assert_eq!(Restriction::from_code(CODE_CONFIDENTIALITY_MAX), None);
        assert_eq!(Restriction::from_code(u32::MAX), None);
    }

    #[test]
    fn test_registry_lookup() {
        assert_eq!(label_for_code(0), Some("none"));
        assert_eq!(label_for_code(7), Some("raw io port access"));
        assert_eq!(label_for_code(15), Some("integrity"));
        assert_eq!(label_for_code(18), Some("use of bpf to read kernel RAM"));
        assert_eq!(label_for_code(21), Some("confidentiality"));
        assert_eq!(label_for_code(22), None);
    }
}
