//! Property-based tests for the text grammars.
//!
//! 1. **Numeric round-trip**: rendering an attribute row and parsing it back
//!    keeps id, value, worst, threshold and raw value.
//! 2. **Envelope rejection**: a row outside 0-255 is skipped and the rest of
//!    the table survives.
//! 3. **Ordering**: self-test rows come back newest first whatever order the
//!    log lists them in.
//! 4. **Determinism**: status classification ignores case.

#![cfg(test)]

use proptest::prelude::*;

use super::attribute::{parse_row, parse_table};
use super::test_log::{parse_log, LogLayout};
use super::RowParse;
use crate::models::attribute::{AttrType, Attribute, AttributeLayout, UpdatePolicy, WhenFailed};
use crate::models::test_entry::TestStatus;

// =============================================================================
// Strategies
// =============================================================================

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,22}"
}

fn attribute_strategy() -> impl Strategy<Value = Attribute> {
    (1u8..=255, name_strategy(), any::<u8>(), any::<u8>(), any::<u8>(), any::<bool>(), any::<u64>()).prop_map(
        |(id, name, value, worst, thresh, prefail, raw)| Attribute {
            id,
            name,
            flags:       if prefail { "PO--CK".into() } else { "-O--CK".into() },
            value:       Some(value),
            worst:       Some(worst),
            thresh:      Some(thresh),
            attr_type:   if prefail { AttrType::PreFail } else { AttrType::OldAge },
            updated:     UpdatePolicy::Always,
            when_failed: WhenFailed::Never,
            raw_value:   Some(raw),
            raw:         raw.to_string(),
        },
    )
}

fn layout_strategy() -> impl Strategy<Value = AttributeLayout> {
    prop_oneof![Just(AttributeLayout::Default), Just(AttributeLayout::Brief)]
}

const STATUS_PHRASES: &[&str] = &[
    "Completed without error",
    "Aborted by host",
    "Interrupted (host reset)",
    "Fatal or unknown error",
    "Completed: read failure",
    "Completed: electrical failure",
    "Self-test routine in progress",
    "Failed in segment -->",
];

// =============================================================================
// Attribute rows
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: a rendered row parses back to the same numeric fields.
    #[test]
    fn prop_attribute_numeric_roundtrip(attr in attribute_strategy(), layout in layout_strategy()) {
        let line = attr.to_row(layout);
        match parse_row(&line, layout) {
            RowParse::Row(parsed) => {
                prop_assert_eq!(parsed.id, attr.id);
                prop_assert_eq!(parsed.value, attr.value);
                prop_assert_eq!(parsed.worst, attr.worst);
                prop_assert_eq!(parsed.thresh, attr.thresh);
                prop_assert_eq!(parsed.raw_value, attr.raw_value);
                prop_assert_eq!(parsed.attr_type, attr.attr_type);
            }
            other => prop_assert!(false, "row {:?} did not parse: {:?}", line, other),
        }
    }

    /// Property: one out-of-envelope row is dropped, the others survive.
    #[test]
    fn prop_out_of_envelope_row_skipped(
        attrs in prop::collection::vec(attribute_strategy(), 1..12),
        bad_value in 256u32..100_000,
        bad_at in any::<prop::sample::Index>(),
    ) {
        let mut seen = std::collections::HashSet::new();
        let attrs: Vec<Attribute> = attrs.into_iter().filter(|a| seen.insert(a.id)).collect();

        let mut lines: Vec<String> = attrs.iter().map(|a| a.to_row(AttributeLayout::Default)).collect();
        let bad = format!(
            "{:>3} {:<23} 0x0033   {:>5} 100   010    Pre-fail  Always       -       0",
            1, "Broken_Row", bad_value
        );
        lines.insert(bad_at.index(lines.len() + 1), bad);

        let text = format!(
            "ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE\n{}\n",
            lines.join("\n")
        );
        let table = parse_table(&text, AttributeLayout::Default);
        prop_assert_eq!(table.rows.len(), attrs.len());
        prop_assert_eq!(table.skipped, 1);
        for (parsed, original) in table.rows.iter().zip(&attrs) {
            prop_assert_eq!(parsed.id, original.id);
        }
    }

    /// Property: log rows are returned newest first.
    #[test]
    fn prop_test_log_newest_first(order in Just((1u32..=21).collect::<Vec<_>>()).prop_shuffle()) {
        let mut text = String::from("Num  Test_Description    Status                  Remaining  LifeTime(hours)  LBA_of_first_error\n");
        for n in &order {
            text.push_str(&format!("#{:>2}  Short offline       Completed without error       00%     {:>5}         -\n", n, 1000 - n));
        }
        let table = parse_log(&text, LogLayout::Ata);
        let nums: Vec<u32> = table.rows.iter().map(|e| e.num).collect();
        prop_assert_eq!(nums, (1u32..=21).collect::<Vec<_>>());
    }

    /// Property: classification is case-insensitive and deterministic.
    #[test]
    fn prop_status_classification_ignores_case(idx in 0..STATUS_PHRASES.len(), upper in any::<bool>()) {
        let phrase = STATUS_PHRASES[idx];
        let variant = if upper { phrase.to_uppercase() } else { phrase.to_lowercase() };
        prop_assert_eq!(TestStatus::classify(&variant), TestStatus::classify(phrase));
    }
}
