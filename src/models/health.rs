use serde::Serialize;
use std::fmt;

/// The tool's coarse verdict for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Assessment {
    Unknown,
    Pass,
    Fail,
}

impl Assessment {
    pub fn label(&self) -> &'static str {
        match self {
            Assessment::Unknown => "    ?",
            Assessment::Pass    => " PASS",
            Assessment::Fail    => " FAIL",
        }
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().trim())
    }
}

/// What the summary line (ATA/NVMe `overall-health`, SCSI `Health Status`) said.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthLine {
    Absent,
    Passed,
    Failed,
}

/// NVMe SMART / Health Information Log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NvmeHealth {
    pub critical_warning:           u8,
    pub temperature_celsius:        Option<i32>,
    pub available_spare_pct:        Option<u8>,
    pub available_spare_threshold:  Option<u8>,
    pub percentage_used:            Option<u8>,
    pub data_units_read:            Option<u64>,   // units of 1000 * 512 bytes
    pub data_units_written:         Option<u64>,
    pub power_cycles:               Option<u64>,
    pub power_on_hours:             Option<u64>,
    pub unsafe_shutdowns:           Option<u64>,
    pub media_errors:               Option<u64>,
    pub error_log_entries:          Option<u64>,
}

impl NvmeHealth {
    /// Approximate bytes read (1 unit = 512 KB).
    pub fn bytes_read(&self) -> Option<u64>    { self.data_units_read.map(|u| u * 512 * 1000) }
    pub fn bytes_written(&self) -> Option<u64> { self.data_units_written.map(|u| u * 512 * 1000) }

    pub fn spare_below_threshold(&self) -> bool {
        matches!(
            (self.available_spare_pct, self.available_spare_threshold),
            (Some(spare), Some(thr)) if spare < thr
        )
    }

    /// Number of fields the log actually reported.
    pub fn field_count(&self) -> usize {
        [
            self.temperature_celsius.is_some(),
            self.available_spare_pct.is_some(),
            self.available_spare_threshold.is_some(),
            self.percentage_used.is_some(),
            self.data_units_read.is_some(),
            self.data_units_written.is_some(),
            self.power_cycles.is_some(),
            self.power_on_hours.is_some(),
            self.unsafe_shutdowns.is_some(),
            self.media_errors.is_some(),
            self.error_log_entries.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// SCSI/SAS error counters from the summary section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScsiCounters {
    pub grown_defects:       Option<u64>,
    pub non_medium_errors:   Option<u64>,
    pub start_stop_cycles:   Option<u64>,
    pub trip_temperature:    Option<i32>,
}

impl ScsiCounters {
    pub fn is_empty(&self) -> bool {
        self == &ScsiCounters::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nvme_bytes_and_spare() {
        let log = NvmeHealth {
            data_units_written:        Some(2),
            available_spare_pct:       Some(5),
            available_spare_threshold: Some(10),
            ..NvmeHealth::default()
        };
        assert_eq!(log.bytes_written(), Some(1_024_000));
        assert_eq!(log.bytes_read(), None);
        assert!(log.spare_below_threshold());
        assert_eq!(log.field_count(), 3);
    }

    #[test]
    fn test_assessment_display() {
        assert_eq!(Assessment::Pass.to_string(), "PASS");
        assert_eq!(Assessment::Unknown.to_string(), "?");
    }
}
