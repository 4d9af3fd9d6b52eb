//! lockdownctl - host the lockdown control surface for an operator
//!
//! Applies the boot policy, then runs each command in order against the
//! process-wide lockdown state:
//!
//! ```text
//! lockdownctl [--config FILE] [--cmdline STRING] <command>...
//!
//!   status            print the control surface line
//!   set <label>       write <label> to the control surface (CAP_SYS_ADMIN)
//!   check <reason>    snake_case reason name or raw code
//!   metrics           dump Prometheus metrics
//! ```

use std::iter::Peekable;
use std::path::PathBuf;
use std::process::ExitCode;

use lockdown_ratchet::config::LockdownConfig;
use lockdown_ratchet::lockdown::{self, boot, ControlFile, Reason};
use lockdown_ratchet::{metrics, tracing as logging};

/// Leading `--config` / `--cmdline` options.
#[derive(Debug, Default, PartialEq)]
struct Flags {
    config_path: Option<PathBuf>,
    cmdline: Option<String>,
}

/// Consume the leading options, leaving the commands in `args`. A flag
/// without a value is a usage error.
fn parse_flags<I: Iterator<Item = String>>(args: &mut Peekable<I>) -> Result<Flags, String> {
    let mut flags = Flags::default();
    while let Some(flag) = args.next_if(|a| a == "--config" || a == "--cmdline") {
        let Some(value) = args.next() else {
            return Err(format!("{} needs a value", flag));
        };
        if flag == "--config" {
            flags.config_path = Some(PathBuf::from(value));
        } else {
            flags.cmdline = Some(value);
        }
    }
    Ok(flags)
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1).peekable();
    let Flags {
        config_path,
        cmdline,
    } = match parse_flags(&mut args) {
        Ok(flags) => flags,
        Err(e) => {
            eprintln!("lockdownctl: {}", e);
            return ExitCode::from(2);
        }
    };

    let config = match config_path {
        Some(path) => match LockdownConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("lockdownctl: {}: {}", path.display(), e);
                return ExitCode::from(2);
            }
        },
        None => LockdownConfig::default(),
    };

    if let Err(e) = logging::init_tracing(config.log_format, Some(&config.log_filter)) {
        eprintln!("lockdownctl: logging disabled: {}", e);
    }
    metrics::init();

    // Nothing below may see the state before boot policy is applied.
    let state = lockdown::global();
    let cmdline = cmdline.unwrap_or_else(|| config.read_cmdline());
    let report = boot::initialize(state, &config.boot_policy(), &cmdline);
    for error in &report.errors {
        eprintln!("lockdownctl: {}", error);
    }

    let control = ControlFile::new(state);
    let commands: Vec<String> = args.collect();
    let mut commands = commands.iter().map(String::as_str);
    let mut status = ExitCode::SUCCESS;

    while let Some(command) = commands.next() {
        match command {
            "status" => print!("{}", control.render()),
            "set" => {
                let Some(label) = commands.next() else {
                    eprintln!("lockdownctl: set needs a level");
                    return ExitCode::from(2);
                };
                if !is_privileged() {
                    eprintln!("lockdownctl: set requires CAP_SYS_ADMIN");
                    return ExitCode::from(nix::errno::Errno::EACCES as u8);
                }
                let payload = format!("{}\n", label);
                match control.write(payload.as_bytes()) {
                    Ok(n) => tracing::debug!(bytes = n, "control write accepted"),
                    Err(e) => {
                        eprintln!("lockdownctl: set {}: {}", label, e);
                        status = ExitCode::from(e.errno() as u8);
                    }
                }
            }
            "check" => {
                let Some(name) = commands.next() else {
                    eprintln!("lockdownctl: check needs a reason");
                    return ExitCode::from(2);
                };
                let restricted = match parse_reason(name) {
                    ReasonArg::Named(reason) => lockdown::locked_down(reason.into()),
                    ReasonArg::Code(code) => lockdown::locked_down_code(code),
                    ReasonArg::Unknown => {
                        eprintln!("lockdownctl: unknown reason {:?}", name);
                        return ExitCode::from(2);
                    }
                };
                println!("{}: {}", name, if restricted { "restricted" } else { "allowed" });
            }
            "metrics" => print!("{}", metrics::gather_text()),
            other => {
                eprintln!("lockdownctl: unknown command {:?}", other);
                return ExitCode::from(2);
            }
        }
    }

    status
}

enum ReasonArg {
    Named(Reason),
    Code(u32),
    Unknown,
}

fn parse_reason(arg: &str) -> ReasonArg {
    if let Ok(code) = arg.parse::<u32>() {
        return ReasonArg::Code(code);
    }
    match serde_json::from_value(serde_json::Value::String(arg.to_string())) {
        Ok(reason) => ReasonArg::Named(reason),
        Err(_) => ReasonArg::Unknown,
    }
}

/// The control surface is owner-only; stand in for that with CAP_SYS_ADMIN.
fn is_privileged() -> bool {
    caps::has_cap(None, caps::CapSet::Effective, caps::Capability::CAP_SYS_ADMIN).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Peekable<std::vec::IntoIter<String>> {
        list.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
            .peekable()
    }

    #[test]
    fn test_flags_then_commands() {
        let mut rest = args(&["--cmdline", "lockdown=integrity", "--config", "/etc/ld.json", "status"]);
        let flags = parse_flags(&mut rest).unwrap();
        assert_eq!(flags.cmdline.as_deref(), Some("lockdown=integrity"));
        assert_eq!(flags.config_path, Some(PathBuf::from("/etc/ld.json")));
        assert_eq!(rest.next().as_deref(), Some("status"));
    }

    #[test]
    fn test_flag_without_value_is_rejected() {
        assert_eq!(
            parse_flags(&mut args(&["--config"])),
            Err("--config needs a value".to_string())
        );
        assert_eq!(
            parse_flags(&mut args(&["status", "--cmdline"])).map(|f| f.cmdline),
            Ok(None)
        );
        assert!(parse_flags(&mut args(&["--cmdline"])).is_err());
    }

    #[test]
    fn test_reason_arguments() {
        assert!(matches!(parse_reason("debugfs"), ReasonArg::Named(Reason::Debugfs)));
        assert!(matches!(parse_reason("21"), ReasonArg::Code(21)));
        assert!(matches!(parse_reason("Debugfs"), ReasonArg::Unknown));
    }
}
