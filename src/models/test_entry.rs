use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestType {
    Short,
    Extended,
    Conveyance,
    Selective,
    /// Plain offline data collection.
    Offline,
    Vendor,
    Unknown,
}

impl TestType {
    pub fn label(&self) -> &'static str {
        match self {
            TestType::Short      => "Short",
            TestType::Extended   => "Extended",
            TestType::Conveyance => "Conveyance",
            TestType::Selective  => "Selective",
            TestType::Offline    => "Offline",
            TestType::Vendor     => "Vendor",
            TestType::Unknown    => "?",
        }
    }

    /// Classify a Test_Description cell. ATA says `Short offline`, SCSI
    /// says `Background long`, NVMe just `Extended`.
    pub fn from_description(desc: &str) -> Self {
        let d = desc.to_ascii_lowercase();
        if d.contains("short") {
            TestType::Short
        } else if d.contains("extended") || d.contains("long") {
            TestType::Extended
        } else if d.contains("conveyance") {
            TestType::Conveyance
        } else if d.contains("selective") {
            TestType::Selective
        } else if d.contains("vendor") {
            TestType::Vendor
        } else if d.trim() == "offline" {
            TestType::Offline
        } else {
            TestType::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    Unknown,
    Electrical,
    ServoSeek,
    Read,
    HandlingDamage,
    Segment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestStatus {
    CompletedWithoutError,
    AbortedByHost,
    /// Interrupted by a host or controller reset.
    Interrupted,
    FatalError,
    /// Ran to completion and found a fault.
    Failed(FailureKind),
    InProgress,
    Unknown,
}

impl TestStatus {
    /// Map a status phrase to its variant. Tolerates case, punctuation and
    /// spacing differences between interfaces and smartctl versions.
    pub fn classify(text: &str) -> Self {
        let norm = normalize(text);
        let has = |needle: &str| norm.contains(needle);

        if has("in progress") {
            TestStatus::InProgress
        } else if has("without error") {
            TestStatus::CompletedWithoutError
        } else if has("interrupted") || (has("aborted") && has("reset")) {
            TestStatus::Interrupted
        } else if has("aborted") {
            TestStatus::AbortedByHost
        } else if has("fatal") || has("unknown error") {
            TestStatus::FatalError
        } else if has("failure") || has("failed") || has("segment") || has("damage") {
            TestStatus::Failed(failure_kind(&norm))
        } else if norm == "completed" {
            TestStatus::CompletedWithoutError
        } else {
            TestStatus::Unknown
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::FatalError | TestStatus::Failed(_))
    }
}

fn failure_kind(norm: &str) -> FailureKind {
    if norm.contains("electrical") {
        FailureKind::Electrical
    } else if norm.contains("servo") || norm.contains("seek") {
        FailureKind::ServoSeek
    } else if norm.contains("read") {
        FailureKind::Read
    } else if norm.contains("handling") {
        FailureKind::HandlingDamage
    } else if norm.contains("segment") {
        FailureKind::Segment
    } else {
        FailureKind::Unknown
    }
}

/// Lowercase, punctuation to spaces, whitespace collapsed.
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One row of a self-test history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestEntry {
    /// Log index; 1 (or 0 on NVMe) is the newest.
    pub num:         u32,
    pub test_type:   TestType,
    /// Test_Description cell verbatim.
    pub description: String,
    pub status:      TestStatus,
    /// Status cell verbatim.
    pub status_text: String,
    /// Only meaningful while in progress; 0 otherwise.
    pub remaining:   u8,
    pub hours:       Option<u64>,
    /// First failing LBA; None when the log shows `-`.
    pub lba:         Option<u64>,
    /// SCSI segment number, when reported.
    pub segment:     Option<u32>,
}

impl TestEntry {
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    pub fn in_progress(&self) -> bool {
        self.status == TestStatus::InProgress
    }
}

impl fmt::Display for TestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.hours.map(|h| h.to_string()).unwrap_or_else(|| "-".into());
        let lba   = self.lba.map(|l| l.to_string()).unwrap_or_else(|| "-".into());
        write!(f, "SMART Self-test [{}|{}] hrs:{} lba:{}", self.description, self.status_text, hours, lba)
    }
}

/// Live state of a self-test the drive reports as currently executing.
///
/// Kept apart from the parsed log: the log is replaced wholesale on every
/// refresh, this record is replaced on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelfTestProgress {
    pub test_type:         Option<TestType>,
    pub percent_remaining: u8,
    pub status_text:       String,
}

impl SelfTestProgress {
    /// Synthesized newest-first log row for interfaces whose log does not
    /// carry an in-progress line (NVMe).
    pub fn as_entry(&self, num: u32, hours: Option<u64>) -> TestEntry {
        let test_type = self.test_type.unwrap_or(TestType::Unknown);
        TestEntry {
            num,
            test_type,
            description: test_type.label().to_string(),
            status:      TestStatus::InProgress,
            status_text: self.status_text.clone(),
            remaining:   self.percent_remaining,
            hours,
            lba:         None,
            segment:     None,
        }
    }
}
