//! Shared fixtures: canned smartctl reports and a scripted runner.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use smartview::{DeviceEnumerator, DevicePath, Invocation, SmartctlRunner};

pub const ATA_HEADER: &str = "\
smartctl 7.3 2022-02-28 r5338 [x86_64-linux-6.1.0] (local build)
Copyright (C) 2002-22, Bruce Allen, Christian Franke, www.smartmontools.org

=== START OF INFORMATION SECTION ===
Model Family:     Western Digital Blue
Device Model:     WDC WD10EZEX-08WN4A0
Serial Number:    WD-WCC6Y0KXXXXX
Firmware Version: 01.01A01
User Capacity:    1,000,204,886,016 bytes [1.00 TB]
Rotation Rate:    7200 rpm
ATA Version is:   ACS-3 T13/2161-D revision 3b
SMART support is: Available - device has SMART capability.
SMART support is: Enabled
";

pub const ATA_HEALTH_PASSED: &str = "
=== START OF READ SMART DATA SECTION ===
SMART overall-health self-assessment test result: PASSED
";

pub const ATA_ATTRIBUTES: &str = "
ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE
  5 Reallocated_Sector_Ct   0x0033   200   200   140    Pre-fail  Always       -       0
  9 Power_On_Hours          0x0032   071   071   000    Old_age   Always       -       21450
194 Temperature_Celsius     0x0022   112   098   000    Old_age   Always       -       35
";

pub const ATA_LOG_EMPTY: &str = "
SMART Self-test log structure revision number 1
No self-tests have been logged.  [To run self-tests, use: smartctl -t]
";

pub const ATA_LOG: &str = "
SMART Self-test log structure revision number 1
Num  Test_Description    Status                  Remaining  LifeTime(hours)  LBA_of_first_error
# 1  Short offline       Completed without error       00%     21400         -
# 2  Extended offline    Completed without error       00%     20000         -
";

/// Log read refused under low privilege; smartctl sets exit bit 2.
pub const ATA_LOG_UNREADABLE: &str = "
Read SMART Self-test Log failed: Operation not permitted
";

pub const NVME: &str = "\
=== START OF INFORMATION SECTION ===
Model Number:                       Samsung SSD 970 EVO Plus 1TB
Serial Number:                      S4EWNX0N123456
Firmware Version:                   2B2QEXM7
PCI Vendor/Subsystem ID:            0x144d
NVMe Version:                       1.3
Total NVM Capacity:                 1,000,204,886,016 [1.00 TB]
Optional Admin Commands (0x0017):   Security Format Frmw_DL Self_Test

=== START OF SMART DATA SECTION ===
SMART overall-health self-assessment test result: PASSED

SMART/Health Information (NVMe Log 0x02)
Critical Warning:                   0x00
Temperature:                        41 Celsius
Available Spare:                    100%
Available Spare Threshold:          10%
Percentage Used:                    3%
Data Units Read:                    12,345,678 [6.32 TB]
Data Units Written:                 9,876,543 [5.05 TB]
Power Cycles:                       1,234
Power On Hours:                     4,567
Unsafe Shutdowns:                   56
Media and Data Integrity Errors:    0
Error Information Log Entries:      12
";

pub const SAS: &str = "\
=== START OF INFORMATION SECTION ===
Vendor:               SEAGATE
Product:              ST4000NM0023
Revision:             0004
User Capacity:        4,000,787,030,016 bytes [4.00 TB]
Serial number:        Z1Z0ABCD
Transport protocol:   SAS (SPL-3)

=== START OF READ SMART DATA SECTION ===
SMART Health Status: OK

Current Drive Temperature:     34 C
Drive Trip Temperature:        68 C

Accumulated power on time, hours:minutes 38542:17
Accumulated start-stop cycles:  43
Elements in grown defect list: 0
Non-medium error count:        12
";

pub const OPEN_FAILED: &str = "\
smartctl 7.3 2022-02-28 r5338 [x86_64-linux-6.1.0] (local build)

Smartctl open device: /dev/sdz failed: No such device
";

pub const TEST_STARTED: &str = "\
=== START OF OFFLINE IMMEDIATE AND SELF-TEST SECTION ===
Sending command: \"Execute SMART Short self-test routine immediately in off-line mode\".
Drive command \"Execute SMART Short self-test routine immediately in off-line mode\" successful.
Testing has begun.
Please wait 2 minutes for test to complete.
";

pub const TEST_BUSY: &str = "\
=== START OF OFFLINE IMMEDIATE AND SELF-TEST SECTION ===
Can't start self-test without aborting current test (90% remaining),
add '-t force' option to override, or run 'smartctl -X' to abort test.
";

pub const TEST_ABORTED: &str = "\
=== START OF OFFLINE IMMEDIATE AND SELF-TEST SECTION ===
Sending command: \"Abort SMART off-line mode self-test routine\".
Self-testing aborted!
";

/// Full ATA report with the given extra sections appended.
pub fn ata_report(sections: &[&str]) -> String {
    let mut text = String::from(ATA_HEADER);
    for s in sections {
        text.push_str(s);
    }
    text
}

/// ATA report while a test is running with `remaining` percent to go.
pub fn ata_running(remaining: u8, log: &str) -> String {
    let status = format!(
        "
General SMART Values:
Self-test execution status:      ( 249)\tSelf-test routine in progress...
\t\t\t\t\t{}% of test remaining.
Total time to complete Offline
",
        remaining
    );
    ata_report(&[ATA_HEALTH_PASSED, &status, ATA_ATTRIBUTES, log])
}

pub fn ok(text: impl Into<String>) -> Invocation {
    Invocation::new(Some(0), text)
}

/// Hands back queued invocations per device path. The last one queued
/// for a path is repeated once the queue runs down to it.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<Invocation>>>,
    calls:   Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, path: &str, inv: Invocation) -> &Self {
        self.scripts.lock().entry(path.to_string()).or_default().push_back(inv);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }

    /// Every argument list sent to `path`, in order.
    pub fn args_for(&self, path: &str) -> Vec<Vec<String>> {
        self.calls.lock().iter().filter(|(p, _)| p == path).map(|(_, a)| a.clone()).collect()
    }
}

impl SmartctlRunner for ScriptedRunner {
    fn run(&self, path: &str, args: &[&str]) -> Invocation {
        self.calls
            .lock()
            .push((path.to_string(), args.iter().map(|a| a.to_string()).collect()));

        let mut scripts = self.scripts.lock();
        match scripts.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Invocation::new(Some(2), OPEN_FAILED.replace("/dev/sdz", path)),
        }
    }
}

/// Reports a fixed list of paths.
pub struct StaticEnumerator(pub Vec<DevicePath>);

impl StaticEnumerator {
    pub fn paths(paths: &[&str]) -> Self {
        Self(paths.iter().map(|p| DevicePath::new(*p)).collect())
    }
}

impl DeviceEnumerator for StaticEnumerator {
    fn enumerate(&self) -> Vec<DevicePath> {
        self.0.clone()
    }
}
