//! Text grammars for smartctl reports.
//!
//! Every entry point here is total: unrecognised input degrades to an empty
//! table, an absent field, or an unknown interface, never to an error.

pub mod attribute;
pub mod classify;
pub mod health;
pub mod identity;
pub mod test_log;

#[cfg(test)]
mod proptest;

use crate::models::attribute::{Attribute, AttributeLayout};
use crate::models::health::{HealthLine, NvmeHealth, ScsiCounters};
use crate::models::test_entry::{SelfTestProgress, TestEntry};
use serde::Serialize;

pub use classify::{classify, Classification};
pub use test_log::LogLayout;

/// Outcome of feeding one line to a row parser.
#[derive(Debug, Clone, PartialEq)]
pub enum RowParse<T> {
    Row(T),
    /// Header, legend, separator or blank.
    NotARow,
    /// Looked like a data row but did not fit the grammar.
    Malformed(String),
}

/// Rows recovered from one report section.
#[derive(Debug, Clone)]
pub struct Table<T> {
    pub rows:    Vec<T>,
    pub skipped: usize,
    /// The section header was found, even if no rows followed.
    pub present: bool,
}

impl<T> Table<T> {
    pub fn absent() -> Self {
        Self { rows: Vec::new(), skipped: 0, present: false }
    }
}

/// How much of a report the parser could make sense of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Confidence {
    Unknown,
    Partial,
    Full,
}

/// Per-interface parsing strategy, chosen once per pass by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grammar {
    /// ATA/SATA and RAID passthrough to ATA disks.
    Ata(AttributeLayout),
    Scsi,
    Nvme,
    /// Unrecognised output: every section is empty.
    Null,
}

impl Grammar {
    pub fn attributes(&self, text: &str) -> Table<Attribute> {
        match self {
            Grammar::Ata(layout) => attribute::parse_table(text, *layout),
            _                    => Table::absent(),
        }
    }

    pub fn tests(&self, text: &str) -> Table<TestEntry> {
        match self.log_layout() {
            Some(layout) => test_log::parse_log(text, layout),
            None         => Table::absent(),
        }
    }

    pub fn progress(&self, text: &str) -> Option<SelfTestProgress> {
        test_log::parse_progress(text, self.log_layout()?)
    }

    pub fn health_line(&self, text: &str) -> HealthLine {
        match self {
            Grammar::Ata(_) | Grammar::Nvme => health::overall_health(text),
            Grammar::Scsi                   => health::scsi_health_status(text),
            Grammar::Null                   => HealthLine::Absent,
        }
    }

    pub fn nvme_health(&self, text: &str) -> Option<NvmeHealth> {
        match self {
            Grammar::Nvme => health::nvme_health(text),
            _             => None,
        }
    }

    pub fn scsi_counters(&self, text: &str) -> Option<ScsiCounters> {
        match self {
            Grammar::Scsi => health::scsi_counters(text),
            _             => None,
        }
    }

    pub fn attribute_layout(&self) -> Option<AttributeLayout> {
        match self {
            Grammar::Ata(layout) => Some(*layout),
            _                    => None,
        }
    }

    fn log_layout(&self) -> Option<LogLayout> {
        match self {
            Grammar::Ata(_) => Some(LogLayout::Ata),
            Grammar::Scsi   => Some(LogLayout::Scsi),
            Grammar::Nvme   => Some(LogLayout::Nvme),
            Grammar::Null   => None,
        }
    }
}

/// Split off the first `n` whitespace-delimited columns and return them with
/// the trimmed remainder of the line. None if the line has fewer columns.
pub(crate) fn split_columns(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut cols = Vec::with_capacity(n);
    let mut rest = line.trim_start();
    while cols.len() < n {
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        cols.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    Some((cols, rest.trim_end()))
}

/// Lines following the first header line matching `is_header`, up to the
/// next blank line. None when no header is found.
pub(crate) fn section_after<'a>(text: &'a str, mut is_header: impl FnMut(&str) -> bool) -> Option<Vec<&'a str>> {
    let mut lines = text.lines();
    lines.by_ref().find(|l| is_header(*l))?;
    Some(lines.take_while(|l| !l.trim().is_empty()).collect())
}

/// Leading integer of a cell: decimal digits, or hex after `0x`. Thousands
/// separators are accepted in decimal.
pub(crate) fn leading_integer(cell: &str) -> Option<u64> {
    let cell = cell.trim();
    if let Some(hex) = cell.strip_prefix("0x").or_else(|| cell.strip_prefix("0X")) {
        let digits: String = hex.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
        return u64::from_str_radix(&digits, 16).ok();
    }
    let digits: String = cell
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    digits.parse().ok()
}
