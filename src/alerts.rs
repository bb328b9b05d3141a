use crate::config::AlertConfig;
use crate::models::attribute::WhenFailed;
use crate::models::device::{Degradation, Device};
use crate::models::health::Assessment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[serde(rename = "warn", alias = "warning")]
    Warning,
    #[serde(rename = "crit", alias = "critical")]
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info     => "INFO",
            Severity::Warning  => "WARN",
            Severity::Critical => "CRIT",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub severity: Severity,
    pub device:   String,
    pub message:  String,
}

impl Alert {
    fn new(severity: Severity, dev: &Device, message: impl Into<String>) -> Self {
        Self { severity, device: dev.path().to_string(), message: message.into() }
    }

    pub fn prefix(&self) -> String {
        format!("[{}] ", self.device)
    }
}

/// Evaluate all alert conditions against the current device state.
/// Returns a freshly built list sorted Critical → Warning → Info.
pub fn evaluate(devices: &[Device], cfg: &AlertConfig) -> Vec<Alert> {
    let thr = &cfg.thresholds;
    let mut alerts: Vec<Alert> = Vec::new();

    for dev in devices {
        // ── Degraded parse ────────────────────────────────────────────
        if let Some(degradation) = dev.last_report().and_then(|r| r.degradation.as_ref()) {
            let message = match degradation {
                Degradation::CollaboratorFailure { message, .. } => {
                    format!("no SMART data: {} (try --sudo)", message)
                }
                Degradation::Unclassified => "smartctl output not recognised".to_string(),
                Degradation::NoData       => "smartctl returned no health data".to_string(),
            };
            alerts.push(Alert::new(Severity::Info, dev, message));
        }

        // ── Overall health ────────────────────────────────────────────
        if dev.assessment() == Assessment::Fail {
            alerts.push(Alert::new(Severity::Critical, dev, "SMART health check FAILED"));
        }

        // ── Temperature thresholds (config-driven) ────────────────────
        if let Some(temp) = dev.temperature() {
            let (warn, crit) = if dev.identity().is_ssd() == Some(false) {
                (thr.temperature_warn_hdd, thr.temperature_crit_hdd)
            } else {
                (thr.temperature_warn_ssd, thr.temperature_crit_ssd)
            };
            if temp >= crit {
                alerts.push(Alert::new(
                    Severity::Critical,
                    dev,
                    format!("Temperature {}°C ≥ critical threshold {}°C", temp, crit),
                ));
            } else if temp >= warn {
                alerts.push(Alert::new(
                    Severity::Warning,
                    dev,
                    format!("Temperature {}°C ≥ warning threshold {}°C", temp, warn),
                ));
            }
        }

        // ── Attribute table ───────────────────────────────────────────
        for attr in dev.attributes().values() {
            match attr.when_failed {
                WhenFailed::Now => alerts.push(Alert::new(
                    Severity::Critical,
                    dev,
                    format!("Attribute {} failing now", attr.name),
                )),
                WhenFailed::Past => alerts.push(Alert::new(
                    Severity::Warning,
                    dev,
                    format!("Attribute {} failed in the past", attr.name),
                )),
                WhenFailed::Never if attr.is_at_risk() => alerts.push(Alert::new(
                    Severity::Warning,
                    dev,
                    format!(
                        "Pre-fail attr {} value {} near threshold {}",
                        attr.name,
                        attr.value.unwrap_or(0),
                        attr.thresh.unwrap_or(0)
                    ),
                )),
                WhenFailed::Never => {}
            }
        }

        for rule in &cfg.smart_rules {
            let attr = match dev.attribute(rule.attr) {
                Some(a) => a,
                None    => continue,
            };
            let raw = match attr.raw_value {
                Some(r) => r,
                None    => continue,
            };
            if rule.matches(raw) {
                let message = rule
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("{} raw value {}", attr.name, raw));
                alerts.push(Alert::new(rule.severity, dev, message));
            }
        }

        // ── NVMe-specific ─────────────────────────────────────────────
        if let Some(nvme) = dev.nvme() {
            if let Some(errors) = nvme.media_errors.filter(|e| *e > 0) {
                alerts.push(Alert::new(
                    Severity::Warning,
                    dev,
                    format!("{} uncorrectable media error(s)", errors),
                ));
            }
            if nvme.spare_below_threshold() {
                alerts.push(Alert::new(
                    Severity::Warning,
                    dev,
                    format!(
                        "NVMe spare {}% below threshold {}%",
                        nvme.available_spare_pct.unwrap_or(0),
                        nvme.available_spare_threshold.unwrap_or(0)
                    ),
                ));
            }
            if nvme.critical_warning != 0 {
                alerts.push(Alert::new(
                    Severity::Critical,
                    dev,
                    format!("NVMe critical warning byte: 0x{:02X}", nvme.critical_warning),
                ));
            }
            if let Some(used) = nvme.percentage_used {
                if thr.nvme_wear_crit_pct > 0 && used >= thr.nvme_wear_crit_pct {
                    alerts.push(Alert::new(Severity::Critical, dev, format!("NVMe wear {}% used", used)));
                } else if thr.nvme_wear_warn_pct > 0 && used >= thr.nvme_wear_warn_pct {
                    alerts.push(Alert::new(Severity::Warning, dev, format!("NVMe wear {}% used", used)));
                }
            }
        }

        // ── SCSI counters ─────────────────────────────────────────────
        if let Some(defects) = dev.scsi().and_then(|s| s.grown_defects).filter(|d| *d > 0) {
            alerts.push(Alert::new(
                Severity::Warning,
                dev,
                format!("{} element(s) in grown defect list", defects),
            ));
        }

        // ── Self-test history ─────────────────────────────────────────
        if let Some(latest) = dev.latest_test().filter(|t| t.is_failure()) {
            alerts.push(Alert::new(
                Severity::Warning,
                dev,
                format!("Last self-test ({}) {}", latest.description, latest.status_text),
            ));
        }
    }

    // Sort: Critical first, then Warning, then Info
    alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::smartctl::Invocation;

    const FAILING: &str = "\
Device Model:     ST2000DM001
Rotation Rate:    7200 rpm
SMART overall-health self-assessment test result: FAILED!

ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE
  5 Reallocated_Sector_Ct   0x0033   001   001   036    Pre-fail  Always   FAILING_NOW 4000
194 Temperature_Celsius     0x0022   052   040   000    Old_age   Always       -       52
198 Offline_Uncorrectable   0x0010   100   100   000    Old_age   Offline      -       8
";

    #[test]
    fn test_failing_disk_alerts() {
        let mut dev = Device::new("/dev/sdb");
        dev.parse(&Invocation::new(Some(8), FAILING));
        let alerts = evaluate(&[dev], &AlertConfig::default());

        assert_eq!(alerts[0].severity, Severity::Critical);
        assert!(alerts.iter().any(|a| a.message == "SMART health check FAILED"));
        assert!(alerts.iter().any(|a| a.message.contains("Reallocated_Sector_Ct failing now")));
        // HDD warn threshold is 50
        assert!(alerts.iter().any(|a| a.severity == Severity::Warning && a.message.starts_with("Temperature 52")));
        assert!(alerts.iter().any(|a| a.severity == Severity::Critical && a.message == "Offline_Uncorrectable raw value 8"));
    }

    #[test]
    fn test_degraded_device_is_info() {
        let mut dev = Device::new("/dev/sdc");
        dev.parse(&Invocation::new(Some(2), ""));
        let alerts = evaluate(&[dev], &AlertConfig::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Info);
        assert_eq!(alerts[0].prefix(), "[/dev/sdc] ");
    }
}
