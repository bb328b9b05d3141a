use crate::collectors::smartctl::DevicePath;
use tracing::debug;

/// Parse `smartctl --scan-open` output.
///
/// ```text
/// /dev/sda -d sat # /dev/sda [SAT], ATA device
/// /dev/nvme0 -d nvme # /dev/nvme0, NVMe device
/// # /dev/sdc -d scsi # /dev/sdc, SCSI device open failed: Permission denied
/// ```
pub fn parse_scan(text: &str) -> Vec<DevicePath> {
    let mut out: Vec<DevicePath> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            debug!(line, "scan comment, device not opened");
            continue;
        }

        let entry = match line.split_once('#') {
            Some((entry, _)) => entry,
            None            => line,
        };
        let mut tokens = entry.split_whitespace();
        let path = match tokens.next() {
            Some(p) => p,
            None    => continue,
        };

        let mut device = DevicePath::new(path);
        while let Some(tok) = tokens.next() {
            if tok == "-d" {
                if let Some(dtype) = tokens.next() {
                    device = device.with_dtype(dtype);
                }
            }
        }

        if out.iter().any(|d| d.path == device.path && d.dtype == device.dtype) {
            continue;
        }
        out.push(device);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::Interface;

    #[test]
    fn test_parse_scan() {
        let text = "\
/dev/sda -d sat # /dev/sda [SAT], ATA device
/dev/sdb -d scsi # /dev/sdb, SCSI device
/dev/nvme0 -d nvme # /dev/nvme0, NVMe device
/dev/bus/0 -d megaraid,4 # /dev/bus/0 [megaraid_disk_04], SCSI device
# /dev/sdc -d scsi # /dev/sdc, SCSI device open failed: Permission denied
/dev/sda -d sat # duplicate
";
        let devices = parse_scan(text);
        assert_eq!(devices.len(), 4);
        assert_eq!(devices[0].path, "/dev/sda");
        assert_eq!(devices[0].dtype.as_deref(), Some("sat"));
        assert_eq!(devices[0].hint, Some(Interface::Sata));
        assert_eq!(devices[1].hint, Some(Interface::Sas));
        assert_eq!(devices[2].hint, Some(Interface::Nvme));
        assert_eq!(devices[3].hint, Some(Interface::Csmi));
    }

    #[test]
    fn test_path_without_type() {
        let devices = parse_scan("/dev/csmi0,2\n");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].hint, Some(Interface::Csmi));
        assert_eq!(devices[0].dtype, None);
    }
}
