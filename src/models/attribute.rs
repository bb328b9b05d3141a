use serde::Serialize;
use std::fmt;

/// Attribute IDs whose raw value carries a temperature in °C.
pub const TEMPERATURE_IDS: &[u8] = &[194, 190];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttrType {
    PreFail,
    OldAge,
    Unknown,
}

impl AttrType {
    pub fn label(&self) -> &'static str {
        match self {
            AttrType::PreFail => "Pre-fail",
            AttrType::OldAge  => "Old_age",
            AttrType::Unknown => "?",
        }
    }

    /// Case-insensitive match against smartctl's TYPE column vocabulary.
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().replace('-', "_").as_str() {
            "pre_fail" | "prefail" => AttrType::PreFail,
            "old_age"  | "oldage"  => AttrType::OldAge,
            _                      => AttrType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdatePolicy {
    Always,
    Offline,
    Unknown,
}

impl UpdatePolicy {
    pub fn label(&self) -> &'static str {
        match self {
            UpdatePolicy::Always  => "Always",
            UpdatePolicy::Offline => "Offline",
            UpdatePolicy::Unknown => "?",
        }
    }

    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "always"  => UpdatePolicy::Always,
            "offline" => UpdatePolicy::Offline,
            _         => UpdatePolicy::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WhenFailed {
    Never,
    Now,
    Past,
}

impl WhenFailed {
    /// Label in the default table layout.
    pub fn label(&self) -> &'static str {
        match self {
            WhenFailed::Never => "-",
            WhenFailed::Now   => "FAILING_NOW",
            WhenFailed::Past  => "In_the_past",
        }
    }

    /// Label in the `-f brief` layout.
    pub fn brief_label(&self) -> &'static str {
        match self {
            WhenFailed::Never => "-",
            WhenFailed::Now   => "NOW",
            WhenFailed::Past  => "Past",
        }
    }

    /// Accepts both layouts' spellings. None means the column is misaligned.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "-"                    => Some(WhenFailed::Never),
            "failing_now" | "now"  => Some(WhenFailed::Now),
            "in_the_past" | "past" => Some(WhenFailed::Past),
            _                      => None,
        }
    }
}

/// Column layout of a vendor attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeLayout {
    /// `ID# ATTRIBUTE_NAME FLAG VALUE WORST THRESH TYPE UPDATED WHEN_FAILED RAW_VALUE`
    Default,
    /// `ID# ATTRIBUTE_NAME FLAGS VALUE WORST THRESH FAIL RAW_VALUE` (smartctl `-f brief`)
    Brief,
}

/// One row of the vendor SMART attribute table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub id:          u8,
    pub name:        String,
    /// Flag column as printed: `0x002f` or `PO--CK`.
    pub flags:       String,
    pub value:       Option<u8>,
    pub worst:       Option<u8>,
    pub thresh:      Option<u8>,
    pub attr_type:   AttrType,
    pub updated:     UpdatePolicy,
    pub when_failed: WhenFailed,
    /// Leading integer of the raw column, if any.
    pub raw_value:   Option<u64>,
    /// Raw column verbatim, e.g. `36 (Min/Max 20/48)`.
    pub raw:         String,
}

impl Attribute {
    /// True if this pre-fail attribute is within 10 points of its threshold.
    pub fn is_at_risk(&self) -> bool {
        match (self.value, self.thresh) {
            (Some(v), Some(t)) => self.attr_type == AttrType::PreFail && t > 0 && v <= t.saturating_add(10),
            _ => false,
        }
    }

    /// Current value has reached a non-zero threshold.
    pub fn is_failing(&self) -> bool {
        match (self.value, self.thresh) {
            (Some(v), Some(t)) => t > 0 && v <= t,
            _ => false,
        }
    }

    /// Temperature in °C for the temperature attributes; the value sits in
    /// the low byte when the drive packs min/max into the upper bytes.
    pub fn temperature(&self) -> Option<i32> {
        if !TEMPERATURE_IDS.contains(&self.id) {
            return None;
        }
        let raw = self.raw_value?;
        let celsius = if raw > 255 { raw & 0xff } else { raw };
        Some(celsius as i32)
    }

    /// Render this attribute as one smartctl table row.
    pub fn to_row(&self, layout: AttributeLayout) -> String {
        match layout {
            AttributeLayout::Default => format!(
                "{:>3} {:<23} {:<8} {:>5} {:>5} {:>5}    {:<9} {:<8} {:>11}    {}",
                self.id,
                self.name,
                self.flags,
                fmt_norm(self.value),
                fmt_norm(self.worst),
                fmt_norm(self.thresh),
                self.attr_type.label(),
                self.updated.label(),
                self.when_failed.label(),
                self.raw,
            ),
            AttributeLayout::Brief => format!(
                "{:>3} {:<23} {:<8} {:>5} {:>5} {:>5}  {:<4} {}",
                self.id,
                self.name,
                self.flags,
                fmt_norm(self.value),
                fmt_norm(self.worst),
                fmt_norm(self.thresh),
                self.when_failed.brief_label(),
                self.raw,
            ),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SMART Attribute '{}' {}/{} raw:{}",
            self.name,
            fmt_norm(self.value),
            fmt_norm(self.thresh),
            self.raw,
        )
    }
}

/// Normalized values print zero-padded; absent ones as `---`.
fn fmt_norm(v: Option<u8>) -> String {
    match v {
        Some(v) => format!("{:03}", v),
        None    => "---".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_attr(raw_value: u64) -> Attribute {
        Attribute {
            id:          194,
            name:        "Temperature_Celsius".into(),
            flags:       "0x0022".into(),
            value:       Some(36),
            worst:       Some(48),
            thresh:      Some(0),
            attr_type:   AttrType::OldAge,
            updated:     UpdatePolicy::Always,
            when_failed: WhenFailed::Never,
            raw_value:   Some(raw_value),
            raw:         raw_value.to_string(),
        }
    }

    #[test]
    fn test_temperature_low_byte() {
        assert_eq!(temp_attr(36).temperature(), Some(36));
        // 0x0030_0014_0024: max 48, min 20, current 36
        assert_eq!(temp_attr(0x0030_0014_0024).temperature(), Some(36));
    }

    #[test]
    fn test_type_tokens_case_insensitive() {
        assert_eq!(AttrType::from_token("PRE-FAIL"), AttrType::PreFail);
        assert_eq!(AttrType::from_token("old_age"), AttrType::OldAge);
        assert_eq!(AttrType::from_token("Weird"), AttrType::Unknown);
        assert_eq!(UpdatePolicy::from_token("OFFLINE"), UpdatePolicy::Offline);
        assert_eq!(UpdatePolicy::from_token("sometimes"), UpdatePolicy::Unknown);
    }

    #[test]
    fn test_absent_threshold_never_at_risk() {
        let mut a = temp_attr(36);
        a.attr_type = AttrType::PreFail;
        a.thresh = None;
        assert!(!a.is_at_risk());
        assert!(!a.is_failing());
        assert!(a.to_row(AttributeLayout::Default).contains("---"));
    }

    #[test]
    fn test_at_risk_and_failing() {
        let mut a = temp_attr(0);
        a.attr_type = AttrType::PreFail;
        a.value = Some(145);
        a.thresh = Some(140);
        assert!(a.is_at_risk());
        assert!(!a.is_failing());
        a.value = Some(140);
        assert!(a.is_failing());
    }
}
