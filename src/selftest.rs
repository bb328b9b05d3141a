//! Self-test control: start a test, follow it to a terminal state, or abort it.
//!
//! ```text
//! Idle ──request──▶ Requested ──poll──▶ Running ──poll──▶ Completed | Aborted | Failed
//!   ▲                   │                  │
//!   └──── rejected ─────┘                  └──abort──▶ Aborted
//! ```
//!
//! Progress lives in [`SelfTestProgress`], replaced on every poll. Log rows
//! are never modified; the finalized row arrives with the next refresh.

use crate::collectors::smartctl::SmartctlRunner;
use crate::error::{Error, Result};
use crate::models::device::{Degradation, Device};
use crate::models::test_entry::{SelfTestProgress, TestEntry, TestStatus, TestType};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestKind {
    Short,
    Long,
    Conveyance,
    /// LBA span, inclusive.
    Selective { start: u64, end: u64 },
}

impl TestKind {
    /// Argument to `smartctl -t`.
    pub fn arg(&self) -> String {
        match self {
            TestKind::Short                   => "short".into(),
            TestKind::Long                    => "long".into(),
            TestKind::Conveyance              => "conveyance".into(),
            TestKind::Selective { start, end } => format!("select,{}-{}", start, end),
        }
    }

    pub fn test_type(&self) -> TestType {
        match self {
            TestKind::Short            => TestType::Short,
            TestKind::Long             => TestType::Extended,
            TestKind::Conveyance       => TestType::Conveyance,
            TestKind::Selective { .. } => TestType::Selective,
        }
    }
}

impl FromStr for TestKind {
    type Err = String;

    /// `short`, `long`, `conveyance` or `select,START-END`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "short"                => return Ok(TestKind::Short),
            "long" | "extended"    => return Ok(TestKind::Long),
            "conveyance"           => return Ok(TestKind::Conveyance),
            _ => {}
        }
        let span = lower
            .strip_prefix("select,")
            .or_else(|| lower.strip_prefix("selective,"))
            .ok_or_else(|| format!("unknown self-test kind '{}'", s))?;
        let (start, end) = span
            .split_once('-')
            .ok_or_else(|| format!("selective span '{}' is not START-END", span))?;
        let start = start.trim().parse::<u64>().map_err(|e| format!("bad start LBA: {}", e))?;
        let end = end.trim().parse::<u64>().map_err(|e| format!("bad end LBA: {}", e))?;
        if end < start {
            return Err(format!("selective span {}-{} ends before it starts", start, end));
        }
        Ok(TestKind::Selective { start, end })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TestState {
    Idle,
    /// Start command accepted, no progress seen yet.
    Requested,
    Running { remaining: u8 },
    Completed(TestEntry),
    /// Finalized row, if the log still had it.
    Aborted(Option<TestEntry>),
    Failed(Option<TestEntry>),
}

impl TestState {
    pub fn label(&self) -> &'static str {
        match self {
            TestState::Idle           => "idle",
            TestState::Requested      => "requested",
            TestState::Running { .. } => "running",
            TestState::Completed(_)   => "completed",
            TestState::Aborted(_)     => "aborted",
            TestState::Failed(_)      => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TestState::Completed(_) | TestState::Aborted(_) | TestState::Failed(_))
    }

    fn in_flight(&self) -> bool {
        matches!(self, TestState::Requested | TestState::Running { .. })
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestState::Running { remaining } => write!(f, "running ({}% remaining)", remaining),
            other                            => f.write_str(other.label()),
        }
    }
}

/// Drives one self-test on one device.
pub struct SelfTestController<'r> {
    runner:   &'r dyn SmartctlRunner,
    state:    TestState,
    kind:     Option<TestKind>,
    /// Log as it was when the test was requested.
    baseline: Vec<TestEntry>,
    progress: Option<SelfTestProgress>,
}

impl<'r> SelfTestController<'r> {
    pub fn new(runner: &'r dyn SmartctlRunner) -> Self {
        Self { runner, state: TestState::Idle, kind: None, baseline: Vec::new(), progress: None }
    }

    pub fn state(&self) -> &TestState {
        &self.state
    }

    pub fn kind(&self) -> Option<TestKind> {
        self.kind
    }

    /// Latest progress report while running.
    pub fn progress(&self) -> Option<&SelfTestProgress> {
        self.progress.as_ref()
    }

    fn transition(&mut self, device: &Device, next: TestState) {
        if next != self.state {
            info!(path = device.path(), from = %self.state, to = %next, "self-test state");
        }
        self.state = next;
    }

    /// Take over a test already running on the drive, e.g. one started by
    /// an earlier process. `device` should be freshly refreshed.
    pub fn attach(&mut self, device: &Device) -> &TestState {
        if self.state.in_flight() {
            return &self.state;
        }
        let live = device
            .progress()
            .cloned()
            .or_else(|| device.tests().iter().find(|e| e.in_progress()).map(progress_from_row));
        if let Some(progress) = live {
            self.baseline = device.tests().iter().filter(|e| !e.in_progress()).cloned().collect();
            self.kind = None;
            let remaining = progress.percent_remaining;
            self.progress = Some(progress);
            self.transition(device, TestState::Running { remaining });
        }
        &self.state
    }

    /// Ask the drive to start a test.
    pub fn request(&mut self, device: &mut Device, kind: TestKind) -> Result<()> {
        if self.state.in_flight() {
            return Err(Error::InvalidTransition { action: "request a test", state: self.state.label() });
        }

        // rows already in the log must not be mistaken for this run
        let log_known = device.last_report().map_or(false, |r| r.test_log_present);
        if !log_known {
            debug!(path = device.path(), "reading self-test log before request");
            device.refresh(self.runner);
        }

        self.baseline = device.tests().to_vec();
        self.progress = None;
        self.kind = Some(kind);

        let arg = kind.arg();
        let inv = self.runner.run(device.path(), &device.command_args(&["-t", arg.as_str()]));
        let reject = |reason: String| Error::TestRejected { path: device.path().to_string(), reason };

        if let Some(reason) = inv.failure() {
            self.transition(device, TestState::Idle);
            return Err(reject(reason));
        }
        let lower = inv.stdout.to_ascii_lowercase();
        if lower.contains("can't start self-test without aborting current test") {
            self.transition(device, TestState::Idle);
            return Err(reject("another self-test is running".into()));
        }
        if !lower.contains("has begun") {
            self.transition(device, TestState::Idle);
            let line = inv.stdout.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("no confirmation");
            return Err(reject(line.trim().to_string()));
        }

        self.transition(device, TestState::Requested);
        Ok(())
    }

    /// Refresh the device and advance the state.
    pub fn poll(&mut self, device: &mut Device) -> Result<&TestState> {
        match self.state {
            TestState::Idle => {
                return Err(Error::InvalidTransition { action: "poll", state: self.state.label() });
            }
            ref s if s.is_terminal() => return Ok(&self.state),
            _ => {}
        }

        let report = device.refresh(self.runner);
        if let Some(Degradation::CollaboratorFailure { message, .. }) = &report.degradation {
            warn!(path = device.path(), %message, "self-test poll failed, state unchanged");
            return Ok(&self.state);
        }

        let live = device
            .progress()
            .cloned()
            .or_else(|| device.tests().iter().find(|e| e.in_progress()).map(progress_from_row));
        if let Some(progress) = live {
            let remaining = progress.percent_remaining;
            self.progress = Some(progress);
            self.transition(device, TestState::Running { remaining });
            return Ok(&self.state);
        }

        if !report.test_log_present || report.is_degraded() {
            warn!(path = device.path(), degradation = ?report.degradation, "self-test log unreadable, state unchanged");
            return Ok(&self.state);
        }

        let requested = self.state == TestState::Requested;
        match (requested, self.finalized_row(device)) {
            (true, None) => {
                debug!(path = device.path(), "self-test not started yet");
            }
            (_, Some(row)) => {
                let next = match row.status {
                    TestStatus::CompletedWithoutError                    => TestState::Completed(row),
                    TestStatus::AbortedByHost | TestStatus::Interrupted  => TestState::Aborted(Some(row)),
                    _                                                    => TestState::Failed(Some(row)),
                };
                self.progress = None;
                self.transition(device, next);
            }
            (_, None) => {
                warn!(path = device.path(), "self-test finished but its log row is missing, log may have rotated");
                self.progress = None;
                self.transition(device, TestState::Failed(None));
            }
        }
        Ok(&self.state)
    }

    /// Send `-X`. The state moves to Aborted only once smartctl confirms.
    pub fn abort(&mut self, device: &mut Device) -> Result<()> {
        if !self.state.in_flight() {
            return Err(Error::InvalidTransition { action: "abort", state: self.state.label() });
        }

        let inv = self.runner.run(device.path(), &device.command_args(&["-X"]));
        let confirmed = inv.failure().is_none() && inv.stdout.to_ascii_lowercase().contains("aborted");
        if !confirmed {
            let reason = inv.failure().unwrap_or_else(|| "abort not acknowledged".into());
            return Err(Error::TestRejected { path: device.path().to_string(), reason });
        }

        device.refresh(self.runner);
        let row = self.finalized_row(device);
        self.progress = None;
        self.transition(device, TestState::Aborted(row));
        Ok(())
    }

    /// Poll until a terminal state, sleeping `delay` between polls. Stops
    /// early after `max_polls` polls when non-zero.
    pub fn run_to_completion(&mut self, device: &mut Device, delay: Duration, max_polls: u32) -> Result<TestState> {
        let mut polls = 0u32;
        loop {
            let state = self.poll(device)?.clone();
            polls += 1;
            if state.is_terminal() || (max_polls != 0 && polls >= max_polls) {
                return Ok(state);
            }
            thread::sleep(delay);
        }
    }

    /// Newest log row that was not in the log when the test was requested.
    fn finalized_row(&self, device: &Device) -> Option<TestEntry> {
        let tests = device.tests();
        let count = |rows: &[TestEntry], row: &TestEntry| rows.iter().filter(|r| same_run(r, row)).count();
        tests
            .iter()
            .filter(|row| !row.in_progress())
            .find(|row| count(tests, *row) > count(&self.baseline, *row))
            .filter(|row| self.kind.map_or(true, |k| row.test_type == k.test_type() || row.test_type == TestType::Unknown))
            .cloned()
    }
}

/// Log indices shift as rows are added, so rows are matched on content.
/// Two identical runs are told apart by how often they occur.
fn same_run(a: &TestEntry, b: &TestEntry) -> bool {
    a.description == b.description
        && a.status_text == b.status_text
        && a.hours == b.hours
        && a.lba == b.lba
}

fn progress_from_row(row: &TestEntry) -> SelfTestProgress {
    SelfTestProgress {
        test_type:         Some(row.test_type),
        percent_remaining: row.remaining,
        status_text:       row.status_text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("short".parse::<TestKind>(), Ok(TestKind::Short));
        assert_eq!("Extended".parse::<TestKind>(), Ok(TestKind::Long));
        assert_eq!("select,10-20".parse::<TestKind>(), Ok(TestKind::Selective { start: 10, end: 20 }));
        assert!("select,20-10".parse::<TestKind>().is_err());
        assert!("offline".parse::<TestKind>().is_err());
        assert_eq!(TestKind::Selective { start: 0, end: 99 }.arg(), "select,0-99");
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(TestState::Running { remaining: 40 }.to_string(), "running (40% remaining)");
        assert!(TestState::Failed(None).is_terminal());
        assert!(!TestState::Requested.is_terminal());
        assert_matches!(TestState::Aborted(None), TestState::Aborted(None));
    }
}
