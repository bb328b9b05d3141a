use crate::alerts::Severity;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub smartctl: SmartctlConfig,

    #[serde(default)]
    pub devices: DevicesConfig,

    #[serde(default)]
    pub selftest: SelfTestConfig,

    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartctlConfig {
    /// smartctl binary name or absolute path
    pub binary: String,
    /// Prefix every invocation with `sudo -n`
    pub sudo: bool,
    /// Extra arguments passed before the command, e.g. ["-f", "brief"]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Glob-style patterns of device paths or names to skip (e.g. "/dev/sr*", "loop*")
    pub exclude: Vec<String>,
    /// Friendly aliases: { "/dev/sda" = "boot-ssd" }
    pub aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfTestConfig {
    /// Delay between progress polls in seconds
    pub poll_interval_sec: u64,
    /// Give up after this many polls (0 = no limit)
    pub max_polls: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub thresholds: AlertThresholds,
    /// Per-attribute SMART alert rules evaluated against raw values.
    #[serde(default = "SmartAlertRule::defaults")]
    pub smart_rules: Vec<SmartAlertRule>,
}

/// Raw-value condition on one attribute.
///
/// ```toml
/// [[alerts.smart_rules]]
/// attr     = 199     # UDMA_CRC_Error_Count
/// op       = ">="    # gt lt eq ne gte lte, or the symbol
/// value    = 10
/// severity = "warn"  # info, warn, crit
/// message  = "cable errors"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartAlertRule {
    pub attr:     u8,
    pub op:       CompareOp,
    pub value:    u64,
    pub severity: Severity,
    /// Replaces the generated `<name> raw value <n>` text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message:  Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Gte,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Lte,
    #[serde(alias = "==")]
    Eq,
    #[serde(alias = "!=")]
    Ne,
}

impl CompareOp {
    pub fn holds(self, lhs: u64, rhs: u64) -> bool {
        match self {
            CompareOp::Gt  => lhs > rhs,
            CompareOp::Gte => lhs >= rhs,
            CompareOp::Lt  => lhs < rhs,
            CompareOp::Lte => lhs <= rhs,
            CompareOp::Eq  => lhs == rhs,
            CompareOp::Ne  => lhs != rhs,
        }
    }
}

impl SmartAlertRule {
    fn any_count(attr: u8, severity: Severity) -> Self {
        Self { attr, op: CompareOp::Gt, value: 0, severity, message: None }
    }

    /// Reallocated and pending sectors warn, offline uncorrectable is critical.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::any_count(5, Severity::Warning),
            Self::any_count(197, Severity::Warning),
            Self::any_count(198, Severity::Critical),
        ]
    }

    pub fn matches(&self, raw_value: u64) -> bool {
        self.op.holds(raw_value, self.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub temperature_warn_ssd: i32,
    pub temperature_crit_ssd: i32,
    pub temperature_warn_hdd: i32,
    pub temperature_crit_hdd: i32,
    /// NVMe Percentage Used warning level. 0 = disabled.
    pub nvme_wear_warn_pct:   u8,
    /// NVMe Percentage Used critical level. 0 = disabled.
    pub nvme_wear_crit_pct:   u8,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for SmartctlConfig {
    fn default() -> Self {
        Self { binary: "smartctl".into(), sudo: false, extra_args: Vec::new() }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            exclude: vec!["loop*".into(), "sr*".into(), "ram*".into(), "zram*".into()],
            aliases: HashMap::new(),
        }
    }
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self { poll_interval_sec: 30, max_polls: 0 }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            thresholds:  AlertThresholds::default(),
            smart_rules: SmartAlertRule::defaults(),
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            temperature_warn_ssd: 55,
            temperature_crit_ssd: 70,
            temperature_warn_hdd: 50,
            temperature_crit_hdd: 60,
            nvme_wear_warn_pct:   80,
            nvme_wear_crit_pct:   95,
        }
    }
}

impl DevicesConfig {
    /// Patterns match either the full path or the node name.
    pub fn is_excluded(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.exclude
            .iter()
            .any(|pat| glob_match(pat, path) || glob_match(pat, name))
    }

    pub fn alias(&self, path: &str) -> Option<&str> {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.aliases
            .get(path)
            .or_else(|| self.aliases.get(name))
            .map(String::as_str)
    }
}

/// Simple glob match: `*` matches any number of chars, no other wildcards.
fn glob_match(pattern: &str, name: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        name.starts_with(prefix)
    } else {
        pattern == name
    }
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    /// Load the default config file, writing defaults on first run.
    pub fn load() -> Self {
        let path = match Self::config_path() {
            Some(p) => p,
            None    => return Config::default(),
        };
        match Self::load_from(&path) {
            Ok(c)  => c,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "using default config");
                // best effort
                let _ = try_write_defaults(&path);
                Config::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("smartview").join("smartview.toml"))
    }
}

fn try_write_defaults(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(Error::Config(format!("{} exists but could not be parsed", path.display())));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# smartview configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}
