use super::{leading_integer, section_after, split_columns, RowParse, Table};
use crate::models::attribute::{AttrType, Attribute, AttributeLayout, UpdatePolicy, WhenFailed};
use tracing::debug;

/// Recognise the table header and pick its column layout.
pub fn detect_layout(header: &str) -> Option<AttributeLayout> {
    if !is_header(header) {
        return None;
    }
    let cols: Vec<&str> = header.split_whitespace().collect();
    if cols.contains(&"FLAGS") || (cols.contains(&"FAIL") && !cols.contains(&"TYPE")) {
        Some(AttributeLayout::Brief)
    } else {
        Some(AttributeLayout::Default)
    }
}

fn is_header(line: &str) -> bool {
    line.trim_start().starts_with("ID#") && line.contains("ATTRIBUTE_NAME")
}

/// Parse one line of the attribute table.
pub fn parse_row(line: &str, layout: AttributeLayout) -> RowParse<Attribute> {
    let first = match line.split_whitespace().next() {
        Some(tok) => tok,
        None      => return RowParse::NotARow,
    };
    if !first.chars().all(|c| c.is_ascii_digit()) {
        return RowParse::NotARow;
    }

    let fixed = match layout {
        AttributeLayout::Default => 9,
        AttributeLayout::Brief   => 7,
    };
    let (cols, raw) = match split_columns(line, fixed) {
        Some((cols, raw)) if !raw.is_empty() => (cols, raw),
        _ => return RowParse::Malformed(format!("expected {} columns plus raw value", fixed + 1)),
    };

    let id = match cols[0].parse::<u16>() {
        Ok(id @ 1..=255) => id as u8,
        _ => return RowParse::Malformed(format!("attribute id {} out of range", cols[0])),
    };

    let (value, worst, thresh) = match (norm(cols[3]), norm(cols[4]), norm(cols[5])) {
        (Ok(v), Ok(w), Ok(t)) => (v, w, t),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return RowParse::Malformed(e),
    };

    let flags = cols[2];
    let (attr_type, updated, fail_token) = match layout {
        AttributeLayout::Default => (
            AttrType::from_token(cols[6]),
            UpdatePolicy::from_token(cols[7]),
            cols[8],
        ),
        AttributeLayout::Brief => {
            let mut chars = flags.chars();
            let attr_type = match chars.next() {
                Some('P') => AttrType::PreFail,
                Some('-') => AttrType::OldAge,
                _         => AttrType::Unknown,
            };
            let updated = match chars.next() {
                Some('O') => UpdatePolicy::Always,
                Some('-') => UpdatePolicy::Offline,
                _         => UpdatePolicy::Unknown,
            };
            (attr_type, updated, cols[6])
        }
    };

    let when_failed = match WhenFailed::from_token(fail_token) {
        Some(w) => w,
        None    => return RowParse::Malformed(format!("unexpected when-failed token {}", fail_token)),
    };

    let name = match cols[1] {
        ""   => "Unknown_Attribute",
        name => name,
    };

    RowParse::Row(Attribute {
        id,
        name: name.to_string(),
        flags: flags.to_string(),
        value,
        worst,
        thresh,
        attr_type,
        updated,
        when_failed,
        raw_value: leading_integer(raw),
        raw: raw.to_string(),
    })
}

/// Normalized value cell. `---` is absent; anything above 255 means the
/// columns are misaligned.
fn norm(cell: &str) -> Result<Option<u8>, String> {
    if cell.chars().all(|c| c == '-') {
        return Ok(None);
    }
    match cell.parse::<u32>() {
        Ok(v) if v <= 255 => Ok(Some(v as u8)),
        Ok(v)             => Err(format!("normalized value {} outside 0-255", v)),
        Err(_)            => Err(format!("non-numeric normalized value {}", cell)),
    }
}

/// Parse the vendor attribute table out of a full report. When the header
/// announces a different layout than `layout`, the header wins.
pub fn parse_table(text: &str, layout: AttributeLayout) -> Table<Attribute> {
    let mut found = layout;
    let lines = match section_after(text, |l| match detect_layout(l) {
        Some(detected) => { found = detected; true }
        None => false,
    }) {
        Some(lines) => lines,
        None        => return Table::absent(),
    };
    parse_rows(&lines, found)
}

fn parse_rows(lines: &[&str], layout: AttributeLayout) -> Table<Attribute> {
    let mut table = Table { rows: Vec::new(), skipped: 0, present: true };
    for line in lines {
        match parse_row(line, layout) {
            RowParse::Row(attr) => {
                if table.rows.iter().any(|a: &Attribute| a.id == attr.id) {
                    debug!(id = attr.id, "duplicate attribute id, keeping first");
                    table.skipped += 1;
                } else {
                    table.rows.push(attr);
                }
            }
            RowParse::Malformed(reason) => {
                debug!(line = line.trim(), %reason, "skipping attribute row");
                table.skipped += 1;
            }
            RowParse::NotARow => {}
        }
    }
    table
}
