use anyhow::{bail, Context, Result};
use clap::Parser;
use smartview::alerts::{self, Severity};
use smartview::config::Config;
use smartview::util::report;
use smartview::{
    DeviceEnumerator, DeviceList, DevicePath, Device, SelfTestController, Smartctl, SmartctlRunner, TestKind,
    TestState,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "smartview", about = "Disk health from smartctl, as a typed model", version)]
struct Cli {
    /// Run smartctl through `sudo -n`
    #[arg(long)]
    sudo: bool,

    /// Device path to query (repeatable). Default: everything `smartctl --scan-open` finds
    #[arg(short, long = "device")]
    devices: Vec<String>,

    /// smartctl `-d` type for the given devices (e.g. sat, nvme, megaraid,0)
    #[arg(short = 'd', long = "type")]
    dtype: Option<String>,

    /// Print a one-shot JSON snapshot of all devices and exit
    #[arg(long)]
    json: bool,

    /// Print a human-readable health report and exit
    #[arg(long)]
    report: bool,

    /// One-shot health check: exit 0=OK, 1=WARNING, 2=CRITICAL (nagios/cron compatible)
    #[arg(long)]
    check: bool,

    /// Start a self-test and follow it: short, long, conveyance or select,START-END
    #[arg(long, value_name = "KIND")]
    test: Option<TestKind>,

    /// Abort the self-test running on --device
    #[arg(long)]
    abort: bool,

    /// Config file (default: ~/.config/smartview/smartview.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging (overridden by SMARTVIEW_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = match &cli.config {
        Some(path) => Config::load_from(path).with_context(|| format!("loading {}", path.display()))?,
        None       => Config::load(),
    };
    if cli.sudo {
        cfg.smartctl.sudo = true;
    }
    let smartctl = Smartctl::from_config(&cfg.smartctl);

    if let Some(kind) = cli.test {
        return run_self_test(&cli, &cfg, &smartctl, kind);
    }
    if cli.abort {
        return run_abort(&cli, &smartctl);
    }

    let list = discover(&cli, &cfg, &smartctl);
    let devices = list.devices();
    let active = alerts::evaluate(devices, &cfg.alerts);

    if cli.json {
        let snapshot = report::json_snapshot(devices, &active);
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    if cli.report {
        print!("{}", report::generate(devices, &active, &cfg.devices));
        return Ok(());
    }
    if cli.check {
        return run_check(devices.len(), &active);
    }

    for dev in devices {
        println!("{:>5}  {}", dev.assessment().label(), dev);
    }
    if devices.is_empty() {
        eprintln!("no devices found{}", if smartctl.elevation_requested() { "" } else { " (try --sudo)" });
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SMARTVIEW_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn requested_paths(cli: &Cli) -> Vec<DevicePath> {
    cli.devices
        .iter()
        .map(|p| {
            let dev = DevicePath::new(p.as_str());
            match &cli.dtype {
                Some(d) => dev.with_dtype(d.as_str()),
                None    => dev,
            }
        })
        .collect()
}

/// Paths given with `--device`, in order.
struct Requested(Vec<DevicePath>);

impl DeviceEnumerator for Requested {
    fn enumerate(&self) -> Vec<DevicePath> {
        self.0.clone()
    }
}

fn discover(cli: &Cli, cfg: &Config, smartctl: &Smartctl) -> DeviceList {
    let keep = |p: &DevicePath| !cfg.devices.is_excluded(&p.path);
    if cli.devices.is_empty() {
        DeviceList::discover_where(smartctl, smartctl, keep)
    } else {
        DeviceList::discover_where(&Requested(requested_paths(cli)), smartctl, keep)
    }
}

fn single_device(cli: &Cli) -> Result<Device> {
    match requested_paths(cli).as_slice() {
        [one] => Ok(Device::from_path(one)),
        []    => bail!("--device is required"),
        _     => bail!("exactly one --device is required"),
    }
}

fn run_self_test(cli: &Cli, cfg: &Config, smartctl: &Smartctl, kind: TestKind) -> Result<()> {
    let mut dev = single_device(cli)?;
    dev.refresh(smartctl);

    let mut ctl = SelfTestController::new(smartctl);
    ctl.request(&mut dev, kind)?;
    println!("{}: {} self-test started", dev.path(), kind.arg());

    let delay = Duration::from_secs(cfg.selftest.poll_interval_sec.max(1));
    let state = ctl.run_to_completion(&mut dev, delay, cfg.selftest.max_polls)?;
    match &state {
        TestState::Completed(row) => println!("{}: {}", dev.path(), row),
        TestState::Aborted(Some(row)) | TestState::Failed(Some(row)) => {
            println!("{}: {} ({})", dev.path(), state, row);
        }
        other => println!("{}: {}", dev.path(), other),
    }
    if matches!(state, TestState::Failed(_)) {
        std::process::exit(2);
    }
    Ok(())
}

fn run_abort(cli: &Cli, smartctl: &Smartctl) -> Result<()> {
    let mut dev = single_device(cli)?;
    dev.refresh(smartctl);

    let mut ctl = SelfTestController::new(smartctl);
    if !matches!(ctl.attach(&dev), TestState::Running { .. }) {
        bail!("{}: no self-test running", dev.path());
    }
    ctl.abort(&mut dev)?;
    println!("{}: {}", dev.path(), ctl.state());
    Ok(())
}

fn run_check(device_count: usize, active: &[alerts::Alert]) -> Result<()> {
    let has_crit = active.iter().any(|a| a.severity == Severity::Critical);
    let has_warn = active.iter().any(|a| a.severity == Severity::Warning);

    if active.is_empty() {
        println!("OK · {} device(s), no alerts", device_count);
        std::process::exit(0);
    }

    for a in active {
        println!("[{}] {}{}", a.severity.label(), a.prefix(), a.message);
    }

    if has_crit {
        std::process::exit(2);
    } else if has_warn {
        std::process::exit(1);
    }
    Ok(())
}
