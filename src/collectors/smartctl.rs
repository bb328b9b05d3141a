use crate::collectors::scan;
use crate::config::SmartctlConfig;
use crate::models::device::Interface;
use serde::Serialize;
use std::process::Command;
use tracing::debug;

/// Result of one smartctl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// None when the process could not be spawned or was killed.
    pub exit_code: Option<i32>,
    pub stdout:    String,
    pub stderr:    String,
}

impl Invocation {
    pub fn new(exit_code: Option<i32>, stdout: impl Into<String>) -> Self {
        Self { exit_code, stdout: stdout.into(), stderr: String::new() }
    }

    pub fn status(&self) -> Option<ExitStatus> {
        ExitStatus::from_code(self.exit_code)
    }

    /// Message describing why the run produced nothing usable, or None if
    /// the output should be parsed.
    pub fn failure(&self) -> Option<String> {
        match self.status() {
            Some(status) if !status.is_collaborator_failure() => None,
            Some(status) => Some(format!("smartctl exit status {}: {}", status.0, status.describe().join(", "))),
            None => Some(match self.exit_code {
                Some(code) => format!("smartctl exit code {} outside status range", code),
                None       => "smartctl did not run to completion".to_string(),
            }),
        }
    }

    /// stdout followed by stderr, for diagnostics.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// smartctl's exit status bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitStatus(pub u8);

impl ExitStatus {
    pub const COMMAND_LINE:       u8 = 1 << 0;
    pub const OPEN_FAILED:        u8 = 1 << 1;
    pub const SMART_CMD_FAILED:   u8 = 1 << 2;
    pub const DISK_FAILING:       u8 = 1 << 3;
    pub const PREFAIL_THRESHOLD:  u8 = 1 << 4;
    pub const PAST_THRESHOLD:     u8 = 1 << 5;
    pub const ERROR_LOG:          u8 = 1 << 6;
    pub const SELF_TEST_ERRORS:   u8 = 1 << 7;

    const DESCRIPTIONS: [&'static str; 8] = [
        "command line did not parse",
        "device open failed",
        "SMART command failed",
        "disk failing",
        "pre-fail attribute at threshold",
        "attribute was at threshold in the past",
        "device error log has entries",
        "self-test log has errors",
    ];

    /// None for codes that cannot be a status byte (negative, above 255,
    /// or the process never exited).
    pub fn from_code(code: Option<i32>) -> Option<Self> {
        code.and_then(|c| u8::try_from(c).ok()).map(ExitStatus)
    }

    pub fn has(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    /// Bits 0 and 1 mean smartctl never read the device.
    pub fn is_collaborator_failure(&self) -> bool {
        self.has(Self::COMMAND_LINE) || self.has(Self::OPEN_FAILED)
    }

    pub fn describe(&self) -> Vec<&'static str> {
        Self::DESCRIPTIONS
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.has(1 << bit))
            .map(|(_, d)| *d)
            .collect()
    }
}

/// Runs smartctl against a device path.
pub trait SmartctlRunner: Send + Sync {
    fn run(&self, path: &str, args: &[&str]) -> Invocation;

    /// Whether invocations ask for elevated privilege.
    fn elevation_requested(&self) -> bool {
        false
    }
}

/// A device path reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevicePath {
    pub path:  String,
    pub hint:  Option<Interface>,
    /// smartctl `-d` type to pass back on every invocation.
    pub dtype: Option<String>,
}

impl DevicePath {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let hint = Interface::from_path(&path);
        Self { path, hint, dtype: None }
    }

    pub fn with_dtype(mut self, dtype: impl Into<String>) -> Self {
        let dtype = dtype.into();
        if self.hint.is_none() {
            self.hint = Interface::from_dtype(&dtype);
        }
        self.dtype = Some(dtype);
        self
    }
}

/// Lists the device paths present on the host.
pub trait DeviceEnumerator: Send + Sync {
    fn enumerate(&self) -> Vec<DevicePath>;
}

/// Process-backed runner and enumerator.
#[derive(Debug, Clone)]
pub struct Smartctl {
    pub binary:     String,
    pub sudo:       bool,
    pub extra_args: Vec<String>,
}

impl Default for Smartctl {
    fn default() -> Self {
        Self { binary: "smartctl".into(), sudo: false, extra_args: Vec::new() }
    }
}

impl Smartctl {
    pub fn from_config(cfg: &SmartctlConfig) -> Self {
        Self {
            binary:     cfg.binary.clone(),
            sudo:       cfg.sudo,
            extra_args: cfg.extra_args.clone(),
        }
    }

    fn command(&self) -> Command {
        if self.sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("-n").arg(&self.binary);
            cmd
        } else {
            Command::new(&self.binary)
        }
    }

    fn exec(&self, args: &[&str]) -> Invocation {
        let mut cmd = self.command();
        cmd.args(&self.extra_args).args(args);
        debug!(binary = %self.binary, ?args, sudo = self.sudo, "running smartctl");

        // smartctl sets status bits even when the report is complete, so the
        // exit code is handed back rather than checked here.
        match cmd.output() {
            Ok(out) => Invocation {
                exit_code: out.status.code(),
                stdout:    String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr:    String::from_utf8_lossy(&out.stderr).into_owned(),
            },
            Err(e) => Invocation {
                exit_code: None,
                stdout:    String::new(),
                stderr:    format!("failed to run {}: {}", self.binary, e),
            },
        }
    }
}

impl SmartctlRunner for Smartctl {
    fn run(&self, path: &str, args: &[&str]) -> Invocation {
        let mut full: Vec<&str> = args.to_vec();
        full.push(path);
        self.exec(&full)
    }

    fn elevation_requested(&self) -> bool {
        self.sudo
    }
}

impl DeviceEnumerator for Smartctl {
    fn enumerate(&self) -> Vec<DevicePath> {
        let inv = self.exec(&["--scan-open"]);
        if let Some(reason) = inv.failure() {
            debug!(%reason, "device scan failed");
            return Vec::new();
        }
        scan::parse_scan(&inv.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_policy() {
        // 127: command not found, bits 0 and 1 set
        assert!(Invocation::new(Some(127), "").failure().is_some());
        assert!(Invocation::new(Some(2), "").failure().is_some());
        assert!(Invocation::new(None, "").failure().is_some());
        assert!(Invocation::new(Some(-1), "").failure().is_some());
        assert!(Invocation::new(Some(300), "").failure().is_some());

        assert!(Invocation::new(Some(0), "").failure().is_none());
        // disk failing + self-test errors are informational
        assert!(Invocation::new(Some(8 | 128), "").failure().is_none());
    }

    #[test]
    fn test_exit_status_describe() {
        let status = ExitStatus(ExitStatus::DISK_FAILING | ExitStatus::ERROR_LOG);
        assert_eq!(status.describe(), vec!["disk failing", "device error log has entries"]);
        assert!(!status.is_collaborator_failure());
    }

    #[test]
    fn test_device_path_hints() {
        assert_eq!(DevicePath::new("/dev/nvme0").hint, Some(Interface::Nvme));
        assert_eq!(DevicePath::new("/dev/csmi0,1").hint, Some(Interface::Csmi));
        let p = DevicePath::new("/dev/sda").with_dtype("megaraid,0");
        assert_eq!(p.hint, Some(Interface::Csmi));
        assert_eq!(p.dtype.as_deref(), Some("megaraid,0"));
    }
}
