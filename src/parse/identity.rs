use super::leading_integer;
use crate::models::device::{Capabilities, Identity, Interface, Rotation};

/// Values of every `Key: value` line whose key matches case-insensitively.
/// A parenthesised code between key and colon is skipped, as in
/// `Optional Admin Commands (0x0017):`.
pub fn fields<'a>(text: &'a str, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    text.lines().filter_map(move |line| {
        let t = line.trim_start();
        let head = t.get(..key.len())?;
        if !head.eq_ignore_ascii_case(key) {
            return None;
        }
        let mut rest = t[key.len()..].trim_start();
        if let Some(code) = rest.strip_prefix('(') {
            rest = code.split_once(')')?.1.trim_start();
        }
        let value = rest.strip_prefix(':')?;
        Some(value.trim())
    })
}

/// First matching field with a non-empty value.
pub fn field<'a>(text: &'a str, key: &'a str) -> Option<&'a str> {
    fields(text, key).find(|v| !v.is_empty())
}

fn owned(v: Option<&str>) -> Option<String> {
    v.map(str::to_string)
}

pub fn parse_identity(text: &str, interface: Interface) -> Identity {
    let model = match interface {
        Interface::Nvme => field(text, "Model Number").map(str::to_string),
        Interface::Sas  => scsi_model(text),
        _ => field(text, "Device Model")
            .or_else(|| field(text, "Model Number"))
            .map(str::to_string)
            .or_else(|| scsi_model(text)),
    };
    let firmware = field(text, "Firmware Version").or_else(|| field(text, "Revision"));

    let capacity_line = field(text, "User Capacity")
        .or_else(|| field(text, "Total NVM Capacity"))
        .or_else(|| field(text, "Namespace 1 Size/Capacity"));

    Identity {
        model,
        family:         owned(field(text, "Model Family")),
        serial:         owned(field(text, "Serial Number")),
        firmware:       owned(firmware),
        capacity_bytes: capacity_line.and_then(leading_integer),
        capacity_text:  capacity_line.and_then(bracketed).map(str::to_string),
        rotation:       field(text, "Rotation Rate").and_then(parse_rotation),
    }
}

/// SCSI banners split the model across `Vendor:` and `Product:`.
fn scsi_model(text: &str) -> Option<String> {
    match (field(text, "Vendor"), field(text, "Product")) {
        (Some(vendor), Some(product)) => Some(format!("{} {}", vendor, product)),
        (None, Some(product))         => Some(product.to_string()),
        _                             => None,
    }
}

/// `500,107,862,016 bytes [500 GB]` → `500 GB`
fn bracketed(value: &str) -> Option<&str> {
    let open = value.find('[')?;
    let close = value[open..].find(']')? + open;
    Some(value[open + 1..close].trim())
}

fn parse_rotation(value: &str) -> Option<Rotation> {
    if value.to_ascii_lowercase().contains("solid state") {
        return Some(Rotation::SolidState);
    }
    leading_integer(value).map(|rpm| Rotation::Rpm(rpm as u32))
}

pub fn parse_capabilities(text: &str, interface: Interface) -> Capabilities {
    let mut caps = Capabilities::default();

    for value in fields(text, "SMART support is") {
        let v = value.to_ascii_lowercase();
        if v.starts_with("available") {
            caps.smart_available = Some(true);
        } else if v.starts_with("unavailable") {
            caps.smart_available = Some(false);
        } else if v.starts_with("enabled") {
            caps.smart_enabled = Some(true);
        } else if v.starts_with("disabled") {
            caps.smart_enabled = Some(false);
        }
    }

    match interface {
        Interface::Sata | Interface::Csmi => {
            for line in text.lines().map(str::trim) {
                match line {
                    "Self-test supported."                => caps.self_test = Some(true),
                    "No Self-test supported."             => caps.self_test = Some(false),
                    "Conveyance Self-test supported."     => caps.conveyance = Some(true),
                    "No Conveyance Self-test supported."  => caps.conveyance = Some(false),
                    "Selective Self-test supported."      => caps.selective = Some(true),
                    "No Selective Self-test supported."   => caps.selective = Some(false),
                    _ => {}
                }
            }
            parse_polling_times(text, &mut caps);
        }
        Interface::Nvme => {
            if let Some(admin) = field(text, "Optional Admin Commands") {
                caps.self_test = Some(admin.contains("Self_Test"));
            }
            caps.conveyance = Some(false);
            caps.selective = Some(false);
        }
        Interface::Sas => {
            caps.self_test = caps.smart_available;
            caps.conveyance = Some(false);
            caps.selective = Some(false);
        }
        Interface::Unknown => {}
    }
    caps
}

/// ATA prints each polling time on the line after its routine name:
/// `Short self-test routine` / `recommended polling time: \t (   2) minutes.`
fn parse_polling_times(text: &str, caps: &mut Capabilities) {
    let mut pending: Option<&str> = None;
    for line in text.lines() {
        let t = line.trim().to_ascii_lowercase();
        for kind in ["short", "extended", "conveyance"] {
            if t.starts_with(&format!("{} self-test routine", kind)) {
                pending = Some(kind);
            }
        }
        if !t.contains("recommended polling time") {
            continue;
        }
        let minutes = t
            .find('(')
            .and_then(|i| leading_integer(&t[i + 1..]));
        match (pending.take(), minutes) {
            (Some("short"), Some(m))      => caps.short_minutes = Some(m as u32),
            (Some("extended"), Some(m))   => caps.extended_minutes = Some(m as u32),
            (Some("conveyance"), Some(m)) => caps.conveyance_minutes = Some(m as u32),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATA_INFO: &str = "\
=== START OF INFORMATION SECTION ===
Model Family:     Western Digital Blue
Device Model:     WDC WD5000AAKS-60Z1A0
Serial Number:    WD-WCAWF1234567
Firmware Version: 12.01B02
User Capacity:    500,107,862,016 bytes [500 GB]
Rotation Rate:    7200 rpm
SMART support is: Available - device has SMART capability.
SMART support is: Enabled

Offline data collection
capabilities: \t\t\t (0x7b) SMART execute Offline immediate.
\t\t\t\t\tSelf-test supported.
\t\t\t\t\tConveyance Self-test supported.
\t\t\t\t\tSelective Self-test supported.
Short self-test routine
recommended polling time: \t (   2) minutes.
Extended self-test routine
recommended polling time: \t (  83) minutes.
Conveyance self-test routine
recommended polling time: \t (   5) minutes.
";

    #[test]
    fn test_ata_identity() {
        let id = parse_identity(ATA_INFO, Interface::Sata);
        assert_eq!(id.model.as_deref(), Some("WDC WD5000AAKS-60Z1A0"));
        assert_eq!(id.family.as_deref(), Some("Western Digital Blue"));
        assert_eq!(id.serial.as_deref(), Some("WD-WCAWF1234567"));
        assert_eq!(id.firmware.as_deref(), Some("12.01B02"));
        assert_eq!(id.capacity_bytes, Some(500_107_862_016));
        assert_eq!(id.capacity_text.as_deref(), Some("500 GB"));
        assert_eq!(id.rotation, Some(Rotation::Rpm(7200)));
    }

    #[test]
    fn test_ata_capabilities() {
        let caps = parse_capabilities(ATA_INFO, Interface::Sata);
        assert_eq!(caps.smart_available, Some(true));
        assert_eq!(caps.smart_enabled, Some(true));
        assert_eq!(caps.self_test, Some(true));
        assert_eq!(caps.conveyance, Some(true));
        assert_eq!(caps.selective, Some(true));
        assert_eq!(caps.short_minutes, Some(2));
        assert_eq!(caps.extended_minutes, Some(83));
        assert_eq!(caps.conveyance_minutes, Some(5));
    }

    #[test]
    fn test_scsi_identity() {
        let text = "Vendor:               SEAGATE\nProduct:              ST4000NM0023\nRevision:             0004\nSerial number:        Z1Z0ABCD\nRotation Rate:        Solid State Device\n";
        let id = parse_identity(text, Interface::Sas);
        assert_eq!(id.model.as_deref(), Some("SEAGATE ST4000NM0023"));
        assert_eq!(id.firmware.as_deref(), Some("0004"));
        assert_eq!(id.serial.as_deref(), Some("Z1Z0ABCD"));
        assert_eq!(id.rotation, Some(Rotation::SolidState));
    }

    #[test]
    fn test_field_key_must_be_followed_by_colon() {
        let text = "Temperature Sensor 1:  40 Celsius\nTemperature:   38 Celsius\n";
        assert_eq!(field(text, "Temperature"), Some("38 Celsius"));
    }

    #[test]
    fn test_nvme_self_test_from_admin_commands() {
        let text = "NVMe Version:   1.3\nOptional Admin Commands (0x0017):   Security Format Frmw_DL Self_Test\n";
        let caps = parse_capabilities(text, Interface::Nvme);
        assert_eq!(caps.self_test, Some(true));
        assert_eq!(caps.selective, Some(false));

        let text = "Optional Admin Commands (0x0006):   Format Frmw_DL\n";
        assert_eq!(parse_capabilities(text, Interface::Nvme).self_test, Some(false));
    }
}
