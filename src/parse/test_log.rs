use super::{leading_integer, section_after, RowParse, Table};
use crate::models::test_entry::{SelfTestProgress, TestEntry, TestStatus, TestType};
use serde::Serialize;
use tracing::debug;

/// Self-test log column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogLayout {
    /// `# 1  Short offline  Completed without error  00%  23734  -`
    Ata,
    /// `# 1  Background short  Completed  -  38542  - [-   -    -]`
    Scsi,
    /// ` 0   Short  Completed without error  4567  -  -  -  -  -`
    Nvme,
}

impl LogLayout {
    /// Fixed columns to the right of the status text.
    fn trailing(&self) -> usize {
        match self {
            LogLayout::Ata  => 3, // remaining, hours, lba
            LogLayout::Scsi => 3, // segment, hours, lba
            LogLayout::Nvme => 6, // hours, lba, nsid, seg, sct, code
        }
    }
}

/// Parse one line of a self-test log.
pub fn parse_row(line: &str, layout: LogLayout) -> RowParse<TestEntry> {
    let trimmed = line.trim();
    let body = match layout {
        LogLayout::Ata | LogLayout::Scsi => match trimmed.strip_prefix('#') {
            Some(rest) => rest.trim_start(),
            None       => return RowParse::NotARow,
        },
        LogLayout::Nvme => {
            if !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
                return RowParse::NotARow;
            }
            trimmed
        }
    };

    let digits_end = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
    let num = match body[..digits_end].parse::<u32>() {
        Ok(n) => n,
        Err(_) => return RowParse::Malformed("missing log index".into()),
    };
    let mut body = &body[digits_end..];

    // SCSI rows end in a sense-key triple: `[SK ASC ASQ]`
    if layout == LogLayout::Scsi && body.trim_end().ends_with(']') {
        if let Some(open) = body.rfind('[') {
            body = &body[..open];
        }
    }

    let tokens: Vec<&str> = body.split_whitespace().collect();
    let trailing = layout.trailing();
    if tokens.len() < trailing + 2 {
        return RowParse::Malformed(format!("expected at least {} columns", trailing + 3));
    }
    let (middle, right) = tokens.split_at(tokens.len() - trailing);

    let desc_len = description_len(middle, layout);
    if middle.len() <= desc_len {
        return RowParse::Malformed("missing status".into());
    }
    let description = middle[..desc_len].join(" ");
    let status_text = middle[desc_len..].join(" ");
    let status = TestStatus::classify(&status_text);

    let (remaining, hours, lba, segment) = match layout {
        LogLayout::Ata => {
            let pct = match percent(right[0]) {
                Some(p) => p,
                None    => return RowParse::Malformed(format!("bad remaining column {}", right[0])),
            };
            (pct, right[1], right[2], None)
        }
        LogLayout::Scsi => {
            let segment = match right[0] {
                "-" => None,
                s   => s.parse::<u32>().ok(),
            };
            (0, right[1], right[2], segment)
        }
        LogLayout::Nvme => {
            let segment = match right[3] {
                "-" => None,
                s   => s.parse::<u32>().ok(),
            };
            (0, right[0], right[1], segment)
        }
    };

    let hours = match hours {
        "-" | "NOW" => None,
        h => match h.parse::<u64>() {
            Ok(h)  => Some(h),
            Err(_) => return RowParse::Malformed(format!("bad lifetime hours {}", h)),
        },
    };
    let lba = match lba {
        "-" => None,
        l => match leading_integer(l) {
            Some(v) => Some(v),
            None    => return RowParse::Malformed(format!("bad LBA column {}", l)),
        },
    };

    RowParse::Row(TestEntry {
        num,
        test_type: TestType::from_description(&description),
        description,
        status,
        status_text,
        remaining: if status == TestStatus::InProgress { remaining } else { 0 },
        hours,
        lba,
        segment,
    })
}

/// How many leading tokens of the middle span belong to Test_Description.
fn description_len(middle: &[&str], layout: LogLayout) -> usize {
    let second = middle.get(1).map(|s| s.to_ascii_lowercase());
    match layout {
        LogLayout::Ata => match second.as_deref() {
            Some("offline") | Some("captive") => 2,
            Some(s) if s.starts_with('(')     => 2, // Vendor (0x50)
            _                                 => 1,
        },
        LogLayout::Scsi => match middle[0] {
            "Background" | "Foreground" => 2,
            _                           => 1,
        },
        LogLayout::Nvme => {
            if middle[0].eq_ignore_ascii_case("vendor") { 2 } else { 1 }
        }
    }
}

fn percent(cell: &str) -> Option<u8> {
    let n = cell.strip_suffix('%')?.parse::<u8>().ok()?;
    (n <= 100).then_some(n)
}

fn is_log_header(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("Num") && t.contains("Test")
}

/// Parse the self-test history. Rows come back newest first whatever the
/// raw order was.
pub fn parse_log(text: &str, layout: LogLayout) -> Table<TestEntry> {
    let lines = match section_after(text, is_log_header) {
        Some(lines) => lines,
        None => {
            let lower = text.to_ascii_lowercase();
            let empty_log = lower
                .lines()
                .any(|l| l.contains("no self-tests have been logged") || l.contains("no self-tests logged"));
            return Table { rows: Vec::new(), skipped: 0, present: empty_log };
        }
    };

    let mut table = Table { rows: Vec::new(), skipped: 0, present: true };
    for line in &lines {
        match parse_row(line, layout) {
            RowParse::Row(entry) => table.rows.push(entry),
            RowParse::Malformed(reason) => {
                debug!(line = line.trim(), %reason, "skipping self-test row");
                table.skipped += 1;
            }
            RowParse::NotARow => {}
        }
    }
    table.rows.sort_by_key(|e| e.num);
    table
}

/// The drive's report of a test currently executing, if any.
pub fn parse_progress(text: &str, layout: LogLayout) -> Option<SelfTestProgress> {
    match layout {
        LogLayout::Nvme => nvme_progress(text),
        LogLayout::Ata | LogLayout::Scsi => ata_progress(text),
    }
}

/// `Self-test execution status:      ( 249)\tSelf-test routine in progress...`
/// followed by an indented `90% of test remaining.` line.
fn ata_progress(text: &str) -> Option<SelfTestProgress> {
    let mut lines = text.lines();
    let first = lines.by_ref().find(|l| l.trim_start().starts_with("Self-test execution status:"))?;
    let mut status = first.split_once(':').map(|(_, v)| v.to_string()).unwrap_or_default();
    for cont in lines {
        if !cont.starts_with(char::is_whitespace) || cont.trim().is_empty() {
            break;
        }
        status.push(' ');
        status.push_str(cont.trim());
    }

    // drop the `( 249)` status byte
    let status = match status.find(')') {
        Some(i) if status.trim_start().starts_with('(') => status[i + 1..].to_string(),
        _ => status,
    };
    let status_text = status.split_whitespace().collect::<Vec<_>>().join(" ");
    if !status_text.to_ascii_lowercase().contains("in progress") {
        return None;
    }
    Some(SelfTestProgress {
        test_type:         None,
        percent_remaining: percent_before_sign(&status_text).unwrap_or(100),
        status_text,
    })
}

/// `Self-test status: Short self-test in progress (10% completed)`
fn nvme_progress(text: &str) -> Option<SelfTestProgress> {
    let line = text.lines().find(|l| l.trim_start().starts_with("Self-test status:"))?;
    let status_text = line.split_once(':')?.1.trim().to_string();
    let lower = status_text.to_ascii_lowercase();
    if lower.starts_with("no self-test") || !lower.contains("in progress") {
        return None;
    }
    let completed = percent_before_sign(&status_text).unwrap_or(0);
    Some(SelfTestProgress {
        test_type:         Some(TestType::from_description(&status_text)),
        percent_remaining: 100 - completed,
        status_text,
    })
}

fn percent_before_sign(text: &str) -> Option<u8> {
    let idx = text.find('%')?;
    let digits: String = text[..idx]
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse::<u8>().ok().filter(|p| *p <= 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_entry::FailureKind;

    const ATA_LOG: &str = "\
SMART Self-test log structure revision number 1
Num  Test_Description    Status                  Remaining  LifeTime(hours)  LBA_of_first_error
# 1  Short offline       Completed without error       00%     23734         -
# 2  Extended offline    Completed: read failure       90%     23700         123456789
# 3  Short offline       Interrupted (host reset)      00%     23650         -
#10  Conveyance offline  Aborted by host               00%     100           -
";

    const SCSI_LOG: &str = "\
SMART Self-test log
Num  Test              Status                 segment  LifeTime  LBA_first_err [SK ASC ASQ]
     Description                              number   (hours)
# 1  Background short  Completed                   -   38542                 - [-   -    -]
# 2  Background long   Failed in segment -->       3   38400              1234 [0x3 0x11 0x0]
";

    const NVME_LOG: &str = "\
Self-test Log (NVMe Log 0x06)
Self-test status: Extended self-test in progress (35% completed)
Num  Test_Description  Status                       Power_on_Hours  Failing_LBA  NSID Seg SCT Code
 1   Short             Aborted: Controller Reset              4500            -     -   -   -    -
 0   Extended          Completed without error                4567            -     -   -   -    -
";

    #[test]
    fn test_ata_rows() {
        let table = parse_log(ATA_LOG, LogLayout::Ata);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.skipped, 0);

        let first = &table.rows[0];
        assert_eq!(first.num, 1);
        assert_eq!(first.test_type, TestType::Short);
        assert_eq!(first.description, "Short offline");
        assert_eq!(first.status, TestStatus::CompletedWithoutError);
        assert_eq!(first.hours, Some(23734));
        assert_eq!(first.lba, None);

        let failed = &table.rows[1];
        assert_eq!(failed.status, TestStatus::Failed(FailureKind::Read));
        assert_eq!(failed.lba, Some(123_456_789));
        // remaining only counts while in progress
        assert_eq!(failed.remaining, 0);

        assert_eq!(table.rows[3].num, 10);
        assert_eq!(table.rows[3].test_type, TestType::Conveyance);
    }

    #[test]
    fn test_ata_in_progress_row() {
        let row = parse_row("# 1  Extended offline    Self-test routine in progress 90%     23735         -", LogLayout::Ata);
        match row {
            RowParse::Row(e) => {
                assert_eq!(e.status, TestStatus::InProgress);
                assert_eq!(e.remaining, 90);
                assert_eq!(e.status_text, "Self-test routine in progress");
            }
            other => panic!("expected row, got {:?}", other),
        }
    }

    #[test]
    fn test_scsi_rows() {
        let table = parse_log(SCSI_LOG, LogLayout::Scsi);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].test_type, TestType::Short);
        assert_eq!(table.rows[0].status, TestStatus::CompletedWithoutError);
        assert_eq!(table.rows[1].status, TestStatus::Failed(FailureKind::Segment));
        assert_eq!(table.rows[1].segment, Some(3));
        assert_eq!(table.rows[1].lba, Some(1234));
    }

    #[test]
    fn test_nvme_rows_sorted_newest_first() {
        let table = parse_log(NVME_LOG, LogLayout::Nvme);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].num, 0);
        assert_eq!(table.rows[0].test_type, TestType::Extended);
        assert_eq!(table.rows[1].status, TestStatus::Interrupted);
    }

    #[test]
    fn test_nvme_progress() {
        let p = parse_progress(NVME_LOG, LogLayout::Nvme).unwrap();
        assert_eq!(p.test_type, Some(TestType::Extended));
        assert_eq!(p.percent_remaining, 65);
        assert!(parse_progress("Self-test status: No self-test in progress\n", LogLayout::Nvme).is_none());
    }

    #[test]
    fn test_ata_progress_spans_lines() {
        let text = "Self-test execution status:      ( 249)\tSelf-test routine in progress...\n\t\t\t\t\t90% of test remaining.\nTotal time to complete Offline \n";
        let p = parse_progress(text, LogLayout::Ata).unwrap();
        assert_eq!(p.percent_remaining, 90);
        assert!(p.status_text.starts_with("Self-test routine in progress"));

        let idle = "Self-test execution status:      (   0)\tThe previous self-test routine completed\n\t\t\t\t\twithout error or no self-test has ever \n\t\t\t\t\tbeen run.\n";
        assert!(parse_progress(idle, LogLayout::Ata).is_none());
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let text = "\
Num  Test_Description    Status                  Remaining  LifeTime(hours)  LBA_of_first_error
# 1  Short offline       Completed without error       00%     23734         -
# 2  Short offline       Completed without error       abc     23000         -
# 3  Short
";
        let table = parse_log(text, LogLayout::Ata);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.skipped, 2);
    }

    #[test]
    fn test_empty_log_is_present() {
        let table = parse_log("SMART Self-test log structure revision number 1\nNo self-tests have been logged.  [To run self-tests, use: smartctl -t]\n", LogLayout::Ata);
        assert!(table.present);
        assert!(table.rows.is_empty());
    }
}
