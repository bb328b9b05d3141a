//! smartview: a typed, queryable model of disk health built from smartctl
//! text output.
//!
//! [`Device`] parses one device's report, [`DeviceList`] discovers and
//! deduplicates every device on a host, and [`SelfTestController`] drives a
//! self-test to completion. smartctl itself is reached only through the
//! [`SmartctlRunner`] and [`DeviceEnumerator`] traits.

pub mod alerts;
pub mod collectors;
pub mod config;
pub mod device_list;
pub mod error;
pub mod models;
pub mod parse;
pub mod selftest;
pub mod util;

pub use collectors::smartctl::{DeviceEnumerator, DevicePath, ExitStatus, Invocation, Smartctl, SmartctlRunner};
pub use device_list::DeviceList;
pub use error::{Error, Result};
pub use models::attribute::Attribute;
pub use models::device::{Degradation, Device, Interface, ParseReport, SharedDevice};
pub use models::health::Assessment;
pub use models::test_entry::{SelfTestProgress, TestEntry};
pub use parse::Confidence;
pub use selftest::{SelfTestController, TestKind, TestState};
