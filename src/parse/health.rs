use super::identity::field;
use super::leading_integer;
use crate::models::health::{HealthLine, NvmeHealth, ScsiCounters};

/// ATA and NVMe: `SMART overall-health self-assessment test result: PASSED`
pub fn overall_health(text: &str) -> HealthLine {
    let line = text
        .lines()
        .find(|l| l.contains("overall-health self-assessment test result:"));
    let value = match line.and_then(|l| l.split_once("result:")) {
        Some((_, v)) => v.trim().to_ascii_uppercase(),
        None         => return HealthLine::Absent,
    };
    if value.starts_with("PASSED") {
        HealthLine::Passed
    } else if value.contains("FAIL") {
        HealthLine::Failed
    } else {
        HealthLine::Absent
    }
}

/// SCSI: `SMART Health Status: OK`. Anything else the drive prints there is
/// a failure prediction.
pub fn scsi_health_status(text: &str) -> HealthLine {
    match field(text, "SMART Health Status") {
        Some(v) if v.eq_ignore_ascii_case("ok") => HealthLine::Passed,
        Some(_)                                 => HealthLine::Failed,
        None                                    => HealthLine::Absent,
    }
}

fn percent(value: &str) -> Option<u8> {
    leading_integer(value).and_then(|v| u8::try_from(v).ok())
}

/// NVMe `SMART/Health Information` section. None when no field was found.
pub fn nvme_health(text: &str) -> Option<NvmeHealth> {
    let warning = field(text, "Critical Warning").and_then(leading_integer);
    let log = NvmeHealth {
        critical_warning:          warning.unwrap_or(0) as u8,
        temperature_celsius:       field(text, "Temperature").and_then(leading_integer).map(|t| t as i32),
        available_spare_pct:       field(text, "Available Spare").and_then(percent),
        available_spare_threshold: field(text, "Available Spare Threshold").and_then(percent),
        percentage_used:           field(text, "Percentage Used").and_then(percent),
        data_units_read:           field(text, "Data Units Read").and_then(leading_integer),
        data_units_written:        field(text, "Data Units Written").and_then(leading_integer),
        power_cycles:              field(text, "Power Cycles").and_then(leading_integer),
        power_on_hours:            field(text, "Power On Hours").and_then(leading_integer),
        unsafe_shutdowns:          field(text, "Unsafe Shutdowns").and_then(leading_integer),
        media_errors:              field(text, "Media and Data Integrity Errors").and_then(leading_integer),
        error_log_entries:         field(text, "Error Information Log Entries").and_then(leading_integer),
    };
    if warning.is_none() && log.field_count() == 0 {
        None
    } else {
        Some(log)
    }
}

/// SCSI summary counters. None when the report carries none of them.
pub fn scsi_counters(text: &str) -> Option<ScsiCounters> {
    let counters = ScsiCounters {
        grown_defects:     field(text, "Elements in grown defect list").and_then(leading_integer),
        non_medium_errors: field(text, "Non-medium error count").and_then(leading_integer),
        start_stop_cycles: field(text, "Accumulated start-stop cycles").and_then(leading_integer),
        trip_temperature:  field(text, "Drive Trip Temperature").and_then(leading_integer).map(|t| t as i32),
    };
    (!counters.is_empty()).then_some(counters)
}

/// SCSI `Current Drive Temperature:     34 C`
pub fn scsi_temperature(text: &str) -> Option<i32> {
    field(text, "Current Drive Temperature")
        .and_then(leading_integer)
        .map(|t| t as i32)
}

/// SCSI power-on time, either
/// `Accumulated power on time, hours:minutes 38542:17` or
/// `number of hours powered up = 38542.28`.
pub fn scsi_power_on_hours(text: &str) -> Option<u64> {
    for line in text.lines().map(str::trim) {
        if line.starts_with("Accumulated power on time") {
            if let Some(hours) = line.split_whitespace().last().and_then(leading_integer) {
                return Some(hours);
            }
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("number of hours powered up") {
                return leading_integer(value);
            }
        }
    }
    None
}
