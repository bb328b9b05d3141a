use crate::alerts::Alert;
use crate::config::DevicesConfig;
use crate::models::attribute::WhenFailed;
use crate::models::device::Device;
use crate::util::health_score::{health_score, score_str};
use crate::util::human::{fmt_bytes, fmt_hours, fmt_opt};
use serde_json::{json, Value};

/// Generate a human-readable health report to a String.
pub fn generate(devices: &[Device], alerts: &[Alert], names: &DevicesConfig) -> String {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut out = String::new();

    out.push_str("═══════════════════════════════════════════════\n");
    out.push_str(&format!("  smartview Health Report · {}\n", now));
    out.push_str("═══════════════════════════════════════════════\n\n");

    // ── Active alerts ──────────────────────────────────────────────────
    out.push_str(&format!("── Active Alerts ({}) ─────────────────────────\n", alerts.len()));
    if alerts.is_empty() {
        out.push_str("  ● All devices nominal\n");
    } else {
        for a in alerts {
            out.push_str(&format!("  [{}]  {}{}\n", a.severity.label(), a.prefix(), a.message));
        }
    }
    out.push('\n');

    // ── Devices ────────────────────────────────────────────────────────
    out.push_str(&format!("── Devices ({}) ───────────────────────────────\n", devices.len()));
    for dev in devices {
        out.push_str(&device_section(dev, names.alias(dev.path())));
        out.push('\n');
    }

    out.push_str("═══════════════════════════════════════════════\n");
    out
}

fn device_section(dev: &Device, alias: Option<&str>) -> String {
    let mut out = String::new();
    let name = match alias {
        Some(a) => format!("{} ({})", dev.path(), a),
        None    => dev.path().to_string(),
    };
    let cap = dev
        .identity()
        .capacity_text
        .clone()
        .or_else(|| dev.capacity_bytes().map(fmt_bytes))
        .unwrap_or_else(|| "—".into());

    out.push_str(&format!(
        "  {:12}  {:4}  SMART:{:5}  Score:{}  Temp:{:6}  Cap:{:10}  {}\n",
        name,
        dev.interface().label(),
        dev.assessment().label().trim(),
        score_str(dev),
        fmt_opt(dev.temperature(), "°C"),
        cap,
        dev.model().unwrap_or("Unknown"),
    ));
    out.push_str(&format!(
        "  Serial: {}  Firmware: {}\n",
        dev.serial().unwrap_or("—"),
        dev.firmware().unwrap_or("—")
    ));

    if let Some(report) = dev.last_report() {
        if let Some(degradation) = &report.degradation {
            out.push_str(&format!("  Degraded: {:?}\n", degradation));
        }
        if report.skipped_rows > 0 {
            out.push_str(&format!("  Skipped rows: {}\n", report.skipped_rows));
        }
    }

    // NVMe endurance
    if let Some(nvme) = dev.nvme() {
        out.push_str(&format!(
            "  Endurance: {} used  |  Written: {}  |  POH: {}\n",
            fmt_opt(nvme.percentage_used, "%"),
            nvme.bytes_written().map(fmt_bytes).unwrap_or_else(|| "—".into()),
            dev.power_on_hours().map(fmt_hours).unwrap_or_else(|| "—".into()),
        ));
    } else if let Some(poh) = dev.power_on_hours() {
        out.push_str(&format!("  Power On: {}\n", fmt_hours(poh)));
    }

    // Attributes worth a look
    for attr in dev.attributes().values() {
        if attr.is_at_risk() || attr.when_failed != WhenFailed::Never {
            out.push_str(&format!("  ! {}\n", attr));
        }
    }

    if let Some(progress) = dev.progress() {
        out.push_str(&format!(
            "  Self-test running: {}% remaining ({})\n",
            progress.percent_remaining, progress.status_text
        ));
    }
    if let Some(latest) = dev.latest_test() {
        out.push_str(&format!(
            "  Last self-test: {} · {} at {}\n",
            latest.description,
            latest.status_text,
            latest.hours.map(|h| format!("{} h", h)).unwrap_or_else(|| "—".into()),
        ));
    }
    out
}

/// One-shot JSON snapshot of every device.
pub fn json_snapshot(devices: &[Device], alerts: &[Alert]) -> Value {
    let devices: Vec<Value> = devices
        .iter()
        .map(|dev| {
            json!({
                "device":       dev,
                "health_score": health_score(dev),
                "capacity_hr":  dev.capacity_bytes().map(fmt_bytes),
            })
        })
        .collect();

    json!({
        "smartview_version": env!("CARGO_PKG_VERSION"),
        "timestamp":         chrono::Local::now().to_rfc3339(),
        "devices":           devices,
        "alerts":            alerts,
    })
}
