use super::attribute::detect_layout;
use super::Grammar;
use crate::models::attribute::AttributeLayout;
use crate::models::device::Interface;
use serde::Serialize;
use tracing::debug;

/// Which interface a report belongs to and how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub interface: Interface,
    pub grammar:   Grammar,
    /// Unrecognised output, kept verbatim for diagnostics.
    pub raw:       Option<String>,
    pub reason:    String,
}

impl Classification {
    fn known(interface: Interface, grammar: Grammar, reason: impl Into<String>) -> Self {
        Self { interface, grammar, raw: None, reason: reason.into() }
    }

    fn unknown(text: &str, reason: impl Into<String>) -> Self {
        Self {
            interface: Interface::Unknown,
            grammar:   Grammar::Null,
            raw:       Some(text.to_string()),
            reason:    reason.into(),
        }
    }
}

const ERROR_BANNERS: &[&str] = &[
    "unable to detect device type",
    "please specify device type",
    "permission denied",
    "operation not permitted",
    "no such device",
];

const NVME_MARKERS: &[&str] = &[
    "NVMe Version:",
    "SMART/Health Information (NVMe Log",
    "PCI Vendor/Subsystem ID:",
];

const ATA_MARKERS: &[&str] = &["ATA Version is:", "SATA Version is:", "Device Model:"];

/// Decide the interface of a report. `hint` comes from enumeration and is
/// used only when the banner itself is silent.
pub fn classify(text: &str, hint: Option<Interface>) -> Classification {
    if text.trim().is_empty() {
        return Classification::unknown(text, "empty output");
    }

    let open_failed = text.lines().any(|l| {
        let lower = l.to_ascii_lowercase();
        lower.starts_with("smartctl open device") && lower.contains("failed")
    });
    if open_failed {
        return Classification::unknown(text, "device open failed");
    }

    let has_line = |marker: &str| text.lines().any(|l| l.trim_start().starts_with(marker));
    let layout = attribute_layout(text);

    if NVME_MARKERS.iter().any(|m| has_line(*m)) {
        return Classification::known(Interface::Nvme, Grammar::Nvme, "NVMe banner");
    }

    if ATA_MARKERS.iter().any(|m| has_line(*m)) || layout.is_some() {
        let grammar = Grammar::Ata(layout.unwrap_or(AttributeLayout::Default));
        return match hint {
            Some(Interface::Csmi) => Classification::known(Interface::Csmi, grammar, "ATA banner behind RAID passthrough"),
            _                     => Classification::known(Interface::Sata, grammar, "ATA banner"),
        };
    }

    let sas_transport = text
        .lines()
        .filter_map(|l| l.trim_start().strip_prefix("Transport protocol:"))
        .any(|v| v.contains("SAS"));
    if sas_transport || has_line("SMART Health Status:") || (has_line("Vendor:") && has_line("Product:")) {
        return Classification::known(Interface::Sas, Grammar::Scsi, "SCSI banner");
    }

    // inside a recognised report an error line only costs its section
    let lower = text.to_ascii_lowercase();
    if let Some(banner) = ERROR_BANNERS.iter().find(|b| lower.contains(**b)) {
        return Classification::unknown(text, format!("error banner: {}", banner));
    }

    match hint {
        Some(h) if h != Interface::Unknown && text.contains("=== START OF") => {
            debug!(interface = h.label(), "banner silent, using enumeration hint");
            Classification::known(h, grammar_for(h), "enumeration hint")
        }
        _ => Classification::unknown(text, "unrecognised banner"),
    }
}

fn attribute_layout(text: &str) -> Option<AttributeLayout> {
    text.lines().find_map(detect_layout)
}

fn grammar_for(interface: Interface) -> Grammar {
    match interface {
        Interface::Sata | Interface::Csmi => Grammar::Ata(AttributeLayout::Default),
        Interface::Sas                    => Grammar::Scsi,
        Interface::Nvme                   => Grammar::Nvme,
        Interface::Unknown                => Grammar::Null,
    }
}
