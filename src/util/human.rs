/// Format a raw byte count into a human-readable string: "12.5 MB"
pub fn fmt_bytes(bytes: u64) -> String {
    let b = bytes as f64;
    const TB: f64 = 1_099_511_627_776.0;
    const GB: f64 = 1_073_741_824.0;
    const MB: f64 = 1_048_576.0;
    const KB: f64 = 1_024.0;
    if b >= TB      { format!("{:.1} TB", b / TB) }
    else if b >= GB { format!("{:.1} GB", b / GB) }
    else if b >= MB { format!("{:.1} MB", b / MB) }
    else if b >= KB { format!("{:.1} KB", b / KB) }
    else            { format!("{:.0} B",  b) }
}

/// Format an optional value, "—" when absent.
pub fn fmt_opt<T: std::fmt::Display>(v: Option<T>, unit: &str) -> String {
    match v {
        Some(v) => format!("{}{}", v, unit),
        None    => "—".to_string(),
    }
}

/// Power-on hours as "1y 42d (9,774 h)" style text.
pub fn fmt_hours(hours: u64) -> String {
    let days = hours / 24;
    let grouped = group_thousands(hours);
    if days >= 365 {
        format!("{}y {}d ({} h)", days / 365, days % 365, grouped)
    } else if days > 0 {
        format!("{}d ({} h)", days, grouped)
    } else {
        format!("{} h", grouped)
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_bytes() {
        assert_eq!(fmt_bytes(512), "512 B");
        assert_eq!(fmt_bytes(500_107_862_016), "465.8 GB");
    }

    #[test]
    fn test_fmt_hours() {
        assert_eq!(fmt_hours(5), "5 h");
        assert_eq!(fmt_hours(48), "2d (48 h)");
        assert_eq!(fmt_hours(9_774), "1y 42d (9,774 h)");
        assert_eq!(fmt_opt(None::<i32>, "°C"), "—");
    }
}
