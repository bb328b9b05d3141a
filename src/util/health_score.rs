use crate::models::attribute::WhenFailed;
use crate::models::device::{Device, Interface};
use crate::models::health::Assessment;

/// Compute a 0-100 health score from SMART data.
/// 100 = pristine, 0 = hard failure. None when the device has no usable
/// data (unknown interface).
/// Points are deducted for bad attributes, high temperature, failed
/// self-tests and NVMe wear.
pub fn health_score(dev: &Device) -> Option<u8> {
    if dev.interface() == Interface::Unknown {
        return None;
    }
    if dev.assessment() == Assessment::Fail {
        return Some(0);
    }

    let mut score: i32 = 100;

    // Temperature penalty
    if let Some(t) = dev.temperature() {
        if dev.identity().is_ssd() == Some(false) {
            if t >= 60      { score -= 20; }
            else if t >= 50 { score -= 10; }
        } else {
            if t >= 70      { score -= 20; }
            else if t >= 55 { score -= 10; }
        }
    }

    // ATA SMART critical attribute penalties
    for attr in dev.attributes().values() {
        let raw = attr.raw_value.unwrap_or(0);
        match attr.id {
            5   => { // Reallocated_Sector_Ct
                if raw > 100 { score -= 30; }
                else if raw > 0 { score -= 15; }
            }
            197 => { // Current_Pending_Sector
                if raw > 0 { score -= 25; }
            }
            198 => { // Offline_Uncorrectable
                if raw > 0 { score -= 40; }
            }
            _ => {}
        }
        if attr.is_at_risk() { score -= 10; }
        if attr.when_failed == WhenFailed::Past { score -= 10; }
    }

    // NVMe-specific penalties
    if let Some(nvme) = dev.nvme() {
        match nvme.percentage_used.unwrap_or(0) {
            90..=u8::MAX => { score -= 30; }
            70..=89      => { score -= 15; }
            50..=69      => { score -=  5; }
            _            => {}
        }
        if nvme.media_errors.unwrap_or(0) > 0 { score -= 25; }
        if nvme.spare_below_threshold() { score -= 20; }
    }

    // SCSI grown defects
    if dev.scsi().and_then(|s| s.grown_defects).unwrap_or(0) > 0 {
        score -= 15;
    }

    if dev.latest_test().map_or(false, |t| t.is_failure()) {
        score -= 20;
    }

    Some(score.clamp(0, 100) as u8)
}

/// Short display string for the score.
pub fn score_str(dev: &Device) -> String {
    match health_score(dev) {
        Some(s) => format!("{:>3}", s),
        None    => "  ?".to_string(),
    }
}
