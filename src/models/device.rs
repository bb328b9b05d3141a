use crate::collectors::smartctl::{DevicePath, ExitStatus, Invocation, SmartctlRunner};
use crate::models::attribute::{Attribute, AttributeLayout, WhenFailed, TEMPERATURE_IDS};
use crate::models::health::{Assessment, HealthLine, NvmeHealth, ScsiCounters};
use crate::models::test_entry::{SelfTestProgress, TestEntry};
use crate::parse::{self, health, identity, Classification, Confidence, Grammar};
use chrono::{DateTime, Local};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Protocol family a device is reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Interface {
    Sata,
    Sas,
    Nvme,
    /// RAID controller passthrough (CSMI, MegaRAID, Areca, ...).
    Csmi,
    Unknown,
}

impl Interface {
    pub fn label(&self) -> &'static str {
        match self {
            Interface::Sata    => "SATA",
            Interface::Sas     => "SAS",
            Interface::Nvme    => "NVMe",
            Interface::Csmi    => "CSMI",
            Interface::Unknown => "?",
        }
    }

    /// Map a smartctl `-d` type to an interface.
    pub fn from_dtype(dtype: &str) -> Option<Self> {
        let d = dtype.to_ascii_lowercase();
        let family = d.split(|c| c == ',' || c == '+').next().unwrap_or("");
        match family {
            "ata" | "sat" | "sata"                       => Some(Interface::Sata),
            f if f.starts_with("usb")                    => Some(Interface::Sata),
            "scsi" | "sas"                               => Some(Interface::Sas),
            "nvme"                                       => Some(Interface::Nvme),
            f if ["csmi", "megaraid", "areca", "3ware", "cciss", "aacraid"]
                .iter()
                .any(|p| f.starts_with(p))               => Some(Interface::Csmi),
            _                                            => None,
        }
    }

    /// Interface implied by the device node name alone.
    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next().unwrap_or(path);
        if name.starts_with("csmi") {
            Some(Interface::Csmi)
        } else if name.starts_with("nvme") {
            Some(Interface::Nvme)
        } else {
            None
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rotation {
    SolidState,
    Rpm(u32),
}

/// Identity fields from the information section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub model:          Option<String>,
    pub family:         Option<String>,
    pub serial:         Option<String>,
    pub firmware:       Option<String>,
    pub capacity_bytes: Option<u64>,
    /// Bracketed human form, e.g. `500 GB`.
    pub capacity_text:  Option<String>,
    pub rotation:       Option<Rotation>,
}

impl Identity {
    pub fn is_ssd(&self) -> Option<bool> {
        self.rotation.map(|r| r == Rotation::SolidState)
    }
}

/// Feature flags the report advertises. `None` means not reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub smart_available:    Option<bool>,
    pub smart_enabled:      Option<bool>,
    pub self_test:          Option<bool>,
    pub conveyance:         Option<bool>,
    pub selective:          Option<bool>,
    pub short_minutes:      Option<u32>,
    pub extended_minutes:   Option<u32>,
    pub conveyance_minutes: Option<u32>,
    pub attribute_layout:   Option<AttributeLayout>,
}

/// Why a parse pass produced less than a full picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Degradation {
    /// smartctl failed to run or could not open the device.
    CollaboratorFailure { exit_code: Option<i32>, message: String },
    /// The output did not match any known interface.
    Unclassified,
    /// Interface recognised but no usable rows were found.
    NoData,
}

/// An identity field that changed between two passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub field:    &'static str,
    pub previous: String,
    pub current:  String,
}

/// Outcome of one parse pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub confidence:    Confidence,
    pub interface:     Interface,
    pub exit_status:   Option<ExitStatus>,
    pub skipped_rows:  usize,
    pub discrepancies: Vec<Discrepancy>,
    pub degradation:   Option<Degradation>,
    /// The self-test log section was readable, even if it held no rows.
    pub test_log_present: bool,
}

impl ParseReport {
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }
}

/// Everything one invocation yields, built without touching the device.
#[derive(Debug, Clone)]
struct Snapshot {
    classification: Classification,
    identity:       Identity,
    capabilities:   Capabilities,
    attributes:     BTreeMap<u8, Attribute>,
    tests:          Vec<TestEntry>,
    progress:       Option<SelfTestProgress>,
    health_line:    HealthLine,
    nvme:           Option<NvmeHealth>,
    scsi:           Option<ScsiCounters>,
    temperature:    Option<i32>,
    power_on_hours: Option<u64>,
    skipped:        usize,
    test_log:       bool,
    confidence:     Confidence,
    degradation:    Option<Degradation>,
}

impl Snapshot {
    fn empty(classification: Classification, degradation: Degradation) -> Self {
        Self {
            classification,
            identity:       Identity::default(),
            capabilities:   Capabilities::default(),
            attributes:     BTreeMap::new(),
            tests:          Vec::new(),
            progress:       None,
            health_line:    HealthLine::Absent,
            nvme:           None,
            scsi:           None,
            temperature:    None,
            power_on_hours: None,
            skipped:        0,
            test_log:       false,
            confidence:     Confidence::Unknown,
            degradation:    Some(degradation),
        }
    }

    fn build(inv: &Invocation, hint: Option<Interface>) -> Self {
        if let Some(message) = inv.failure() {
            let classification = Classification {
                interface: Interface::Unknown,
                grammar:   Grammar::Null,
                raw:       Some(inv.combined()),
                reason:    message.clone(),
            };
            let degradation = Degradation::CollaboratorFailure { exit_code: inv.exit_code, message };
            return Self::empty(classification, degradation);
        }

        let text = inv.stdout.as_str();
        let classification = parse::classify(text, hint);
        let grammar = classification.grammar;
        if classification.interface == Interface::Unknown {
            return Self::empty(classification, Degradation::Unclassified);
        }

        let attr_table = grammar.attributes(text);
        let test_table = grammar.tests(text);
        let mut attributes = BTreeMap::new();
        for attr in attr_table.rows {
            attributes.entry(attr.id).or_insert(attr);
        }

        let nvme = grammar.nvme_health(text);
        let scsi = grammar.scsi_counters(text);
        let health_line = grammar.health_line(text);

        let temperature = match grammar {
            Grammar::Nvme => nvme.as_ref().and_then(|n| n.temperature_celsius),
            Grammar::Scsi => health::scsi_temperature(text),
            _ => TEMPERATURE_IDS
                .iter()
                .find_map(|id| attributes.get(id).and_then(Attribute::temperature)),
        };
        let power_on_hours = match grammar {
            Grammar::Nvme => nvme.as_ref().and_then(|n| n.power_on_hours),
            Grammar::Scsi => health::scsi_power_on_hours(text),
            _ => attributes.get(&9).and_then(|a| a.raw_value),
        };

        let mut capabilities = identity::parse_capabilities(text, classification.interface);
        capabilities.attribute_layout = grammar.attribute_layout();

        let recognised = attributes.len()
            + test_table.rows.len()
            + nvme.as_ref().map_or(0, NvmeHealth::field_count)
            + usize::from(scsi.is_some())
            + usize::from(health_line != HealthLine::Absent);
        let skipped = attr_table.skipped + test_table.skipped;

        let sections_present = match grammar {
            Grammar::Ata(_) => attr_table.present && test_table.present,
            Grammar::Scsi   => health_line != HealthLine::Absent,
            Grammar::Nvme   => nvme.is_some(),
            Grammar::Null   => false,
        };
        let (confidence, degradation) = if recognised == 0 {
            (Confidence::Partial, Some(Degradation::NoData))
        } else if skipped == 0 && sections_present {
            (Confidence::Full, None)
        } else {
            (Confidence::Partial, None)
        };

        Self {
            identity: identity::parse_identity(text, classification.interface),
            capabilities,
            attributes,
            test_log: test_table.present,
            tests: test_table.rows,
            progress: grammar.progress(text),
            health_line,
            nvme,
            scsi,
            temperature,
            power_on_hours,
            skipped,
            confidence,
            degradation,
            classification,
        }
    }

    /// PASS needs an affirmative health line and no attribute failing now.
    fn assessment(&self) -> Assessment {
        let failing_now = self.attributes.values().any(|a| a.when_failed == WhenFailed::Now);
        match self.health_line {
            HealthLine::Failed             => Assessment::Fail,
            _ if failing_now               => Assessment::Fail,
            HealthLine::Passed             => Assessment::Pass,
            HealthLine::Absent             => Assessment::Unknown,
        }
    }
}

/// One physical storage device and its most recent parsed state.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    path:           String,
    hint:           Option<Interface>,
    dtype:          Option<String>,
    interface:      Interface,
    grammar:        Grammar,
    identity:       Identity,
    capabilities:   Capabilities,
    attributes:     BTreeMap<u8, Attribute>,
    tests:          Vec<TestEntry>,
    progress:       Option<SelfTestProgress>,
    health_line:    HealthLine,
    assessment:     Assessment,
    nvme:           Option<NvmeHealth>,
    scsi:           Option<ScsiCounters>,
    temperature:    Option<i32>,
    power_on_hours: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_output:     Option<String>,
    last_report:    Option<ParseReport>,
    refreshed_at:   Option<DateTime<Local>>,
}

impl Device {
    pub fn new(path: impl Into<String>) -> Self {
        Self::from_path(&DevicePath::new(path))
    }

    pub fn from_path(dev: &DevicePath) -> Self {
        Self {
            path:           dev.path.clone(),
            hint:           dev.hint,
            dtype:          dev.dtype.clone(),
            interface:      Interface::Unknown,
            grammar:        Grammar::Null,
            identity:       Identity::default(),
            capabilities:   Capabilities::default(),
            attributes:     BTreeMap::new(),
            tests:          Vec::new(),
            progress:       None,
            health_line:    HealthLine::Absent,
            assessment:     Assessment::Unknown,
            nvme:           None,
            scsi:           None,
            temperature:    None,
            power_on_hours: None,
            raw_output:     None,
            last_report:    None,
            refreshed_at:   None,
        }
    }

    /// Arguments for a full report, with the enumeration `-d` type when known.
    pub fn report_args(&self) -> Vec<&str> {
        report_args(self.dtype.as_deref())
    }

    /// Arguments for any other smartctl command against this device.
    pub fn command_args<'a>(&'a self, command: &[&'a str]) -> Vec<&'a str> {
        let mut args = command.to_vec();
        if let Some(dtype) = self.dtype.as_deref() {
            args.extend(["-d", dtype]);
        }
        args
    }

    /// Run smartctl and parse its report.
    pub fn refresh(&mut self, runner: &dyn SmartctlRunner) -> ParseReport {
        let inv = runner.run(&self.path, &self.report_args());
        self.parse(&inv)
    }

    /// Replace the device state with what `inv` reports. Tables are
    /// replaced wholesale, never merged.
    pub fn parse(&mut self, inv: &Invocation) -> ParseReport {
        let snapshot = Snapshot::build(inv, self.hint);
        self.apply(snapshot, inv.status())
    }

    fn apply(&mut self, snap: Snapshot, exit_status: Option<ExitStatus>) -> ParseReport {
        let discrepancies = self.revalidate_identity(&snap.identity);
        let interface = snap.classification.interface;
        let assessment = match snap.degradation {
            Some(Degradation::NoData) if self.interface == interface => self.assessment,
            Some(_) => Assessment::Unknown,
            None    => snap.assessment(),
        };

        if let Some(degradation) = &snap.degradation {
            debug!(path = %self.path, ?degradation, "degraded parse");
        }

        let report = ParseReport {
            confidence:    snap.confidence,
            interface,
            exit_status,
            skipped_rows:  snap.skipped,
            discrepancies,
            degradation:   snap.degradation,
            test_log_present: snap.test_log,
        };

        self.interface      = interface;
        self.grammar        = snap.classification.grammar;
        self.raw_output     = snap.classification.raw;
        self.capabilities   = snap.capabilities;
        self.attributes     = snap.attributes;
        self.tests          = snap.tests;
        self.progress       = snap.progress;
        self.health_line    = snap.health_line;
        self.assessment     = assessment;
        self.nvme           = snap.nvme;
        self.scsi           = snap.scsi;
        self.temperature    = snap.temperature;
        self.power_on_hours = snap.power_on_hours;
        self.last_report    = Some(report.clone());
        self.refreshed_at   = Some(Local::now());
        report
    }

    /// Overwrite identity fields the new pass reported, recording any that
    /// disagree with the previous pass. Fields the new pass lacks are kept.
    fn revalidate_identity(&mut self, new: &Identity) -> Vec<Discrepancy> {
        let mut out = Vec::new();
        let path = &self.path;
        let mut check = |field: &'static str, old: &mut Option<String>, new: &Option<String>| {
            let new = match new {
                Some(v) => v,
                None    => return,
            };
            if let Some(prev) = old.as_ref().filter(|prev| *prev != new) {
                warn!(%path, field, previous = %prev, current = %new, "device identity changed");
                out.push(Discrepancy { field, previous: prev.clone(), current: new.clone() });
            }
            *old = Some(new.clone());
        };
        check("model", &mut self.identity.model, &new.model);
        check("serial", &mut self.identity.serial, &new.serial);
        check("firmware", &mut self.identity.firmware, &new.firmware);
        check("family", &mut self.identity.family, &new.family);
        check("capacity", &mut self.identity.capacity_text, &new.capacity_text);

        if new.capacity_bytes.is_some() {
            self.identity.capacity_bytes = new.capacity_bytes;
        }
        if new.rotation.is_some() {
            self.identity.rotation = new.rotation;
        }
        out
    }

    pub fn path(&self) -> &str                         { &self.path }
    pub fn hint(&self) -> Option<Interface>            { self.hint }
    pub fn dtype(&self) -> Option<&str>                { self.dtype.as_deref() }
    pub fn interface(&self) -> Interface               { self.interface }
    pub fn grammar(&self) -> Grammar                   { self.grammar }
    pub fn identity(&self) -> &Identity                { &self.identity }
    pub fn model(&self) -> Option<&str>                { self.identity.model.as_deref() }
    pub fn serial(&self) -> Option<&str>               { self.identity.serial.as_deref() }
    pub fn firmware(&self) -> Option<&str>             { self.identity.firmware.as_deref() }
    pub fn capacity_bytes(&self) -> Option<u64>        { self.identity.capacity_bytes }
    pub fn capabilities(&self) -> &Capabilities        { &self.capabilities }
    pub fn assessment(&self) -> Assessment             { self.assessment }
    pub fn health_line(&self) -> HealthLine            { self.health_line }
    pub fn attributes(&self) -> &BTreeMap<u8, Attribute> { &self.attributes }
    pub fn attribute(&self, id: u8) -> Option<&Attribute> { self.attributes.get(&id) }
    /// Self-test log, newest first.
    pub fn tests(&self) -> &[TestEntry]                { &self.tests }
    pub fn progress(&self) -> Option<&SelfTestProgress> { self.progress.as_ref() }
    pub fn nvme(&self) -> Option<&NvmeHealth>          { self.nvme.as_ref() }
    pub fn scsi(&self) -> Option<&ScsiCounters>        { self.scsi.as_ref() }
    pub fn temperature(&self) -> Option<i32>           { self.temperature }
    pub fn power_on_hours(&self) -> Option<u64>        { self.power_on_hours }
    /// Verbatim output of the last pass when it could not be classified.
    pub fn raw_output(&self) -> Option<&str>           { self.raw_output.as_deref() }
    pub fn last_report(&self) -> Option<&ParseReport>  { self.last_report.as_ref() }
    pub fn refreshed_at(&self) -> Option<DateTime<Local>> { self.refreshed_at }

    pub fn latest_test(&self) -> Option<&TestEntry> {
        self.tests.first()
    }

    pub fn is_degraded(&self) -> bool {
        self.last_report.as_ref().map_or(false, ParseReport::is_degraded)
    }

    /// Log rows with the live test prepended when the log itself does not
    /// carry an in-progress row.
    pub fn timeline(&self) -> Vec<TestEntry> {
        let mut rows = Vec::with_capacity(self.tests.len() + 1);
        if let Some(progress) = &self.progress {
            if !self.tests.iter().any(TestEntry::in_progress) {
                rows.push(progress.as_entry(0, self.power_on_hours));
            }
        }
        rows.extend(self.tests.iter().cloned());
        rows
    }
}

fn report_args(dtype: Option<&str>) -> Vec<&str> {
    let mut args = vec!["-a"];
    if let Some(dtype) = dtype {
        args.extend(["-d", dtype]);
    }
    args
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} device on {} mod:{} sn:{}",
            self.interface,
            self.path,
            self.model().unwrap_or("?"),
            self.serial().unwrap_or("?"),
        )
    }
}

/// A device shared between threads. Refreshes run smartctl and parse
/// without holding the lock; only the final swap is guarded.
#[derive(Debug, Clone)]
pub struct SharedDevice(Arc<Mutex<Device>>);

impl SharedDevice {
    pub fn new(device: Device) -> Self {
        Self(Arc::new(Mutex::new(device)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Device> {
        self.0.lock()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Device {
        self.0.lock().clone()
    }

    pub fn refresh(&self, runner: &dyn SmartctlRunner) -> ParseReport {
        let (path, hint, dtype) = {
            let dev = self.0.lock();
            (dev.path.clone(), dev.hint, dev.dtype.clone())
        };
        let inv = runner.run(&path, &report_args(dtype.as_deref()));
        let snapshot = Snapshot::build(&inv, hint);
        self.0.lock().apply(snapshot, inv.status())
    }
}

impl From<Device> for SharedDevice {
    fn from(device: Device) -> Self {
        Self::new(device)
    }
}
