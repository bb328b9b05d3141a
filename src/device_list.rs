use crate::collectors::smartctl::{DeviceEnumerator, DevicePath, SmartctlRunner};
use crate::error::{Error, Result};
use crate::models::device::{Device, Interface, ParseReport};
use crate::parse::Confidence;
use serde::Serialize;
use std::thread;
use tracing::{debug, warn};

/// All devices found on a host, deduplicated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceList {
    devices: Vec<Device>,
}

impl DeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate, then build and parse one device per path.
    pub fn discover(enumerator: &dyn DeviceEnumerator, runner: &dyn SmartctlRunner) -> Self {
        Self::discover_where(enumerator, runner, |_| true)
    }

    /// Like [`DeviceList::discover`], skipping paths `keep` rejects before
    /// smartctl is run against them.
    pub fn discover_where(
        enumerator: &dyn DeviceEnumerator,
        runner:     &dyn SmartctlRunner,
        keep:       impl Fn(&DevicePath) -> bool,
    ) -> Self {
        let paths: Vec<DevicePath> = enumerator.enumerate().into_iter().filter(|p| keep(p)).collect();
        debug!(count = paths.len(), elevated = runner.elevation_requested(), "discovering devices");

        // one smartctl run per path; each thread owns its device
        let devices: Vec<Device> = thread::scope(|s| {
            let handles: Vec<_> = paths
                .iter()
                .map(|p| {
                    s.spawn(move || {
                        let mut dev = Device::from_path(p);
                        dev.refresh(runner);
                        dev
                    })
                })
                .collect();
            handles
                .into_iter()
                .zip(&paths)
                .map(|(h, p)| {
                    h.join().unwrap_or_else(|_| {
                        warn!(path = %p.path, "device parse panicked");
                        Device::from_path(p)
                    })
                })
                .collect()
        });

        Self::from_devices(devices)
    }

    /// Collect already-parsed devices, dropping duplicates.
    pub fn from_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let mut list = Self::new();
        for dev in devices {
            list.insert(dev);
        }
        list
    }

    /// Add a device. A device reachable through several paths keeps the
    /// slot of its first appearance and the most complete parse.
    pub fn insert(&mut self, dev: Device) {
        match self.devices.iter().position(|kept| same_device(kept, &dev)) {
            Some(i) if rank(&dev) > rank(&self.devices[i]) => {
                debug!(kept = dev.path(), dropped = self.devices[i].path(), "duplicate device, keeping more complete path");
                self.devices[i] = dev;
            }
            Some(i) => {
                debug!(kept = self.devices[i].path(), dropped = dev.path(), "duplicate device");
            }
            None => self.devices.push(dev),
        }
    }

    /// Re-run smartctl for every device.
    pub fn refresh_all(&mut self, runner: &dyn SmartctlRunner) -> Vec<ParseReport> {
        thread::scope(|s| {
            let handles: Vec<_> = self
                .devices
                .iter_mut()
                .map(|dev| s.spawn(move || dev.refresh(runner)))
                .collect();
            handles.into_iter().filter_map(|h| h.join().ok()).collect()
        })
    }

    /// Re-run smartctl for one device.
    pub fn refresh_device(&mut self, path: &str, runner: &dyn SmartctlRunner) -> Result<ParseReport> {
        let dev = self.get_mut(path).ok_or_else(|| Error::UnknownDevice(path.to_string()))?;
        Ok(dev.refresh(runner))
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn get(&self, path: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.path() == path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.path() == path)
    }

    pub fn find_by_serial(&self, serial: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| d.serial().map_or(false, |s| s.eq_ignore_ascii_case(serial)))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn into_devices(self) -> Vec<Device> {
        self.devices
    }
}

impl<'a> IntoIterator for &'a DeviceList {
    type Item = &'a Device;
    type IntoIter = std::slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

fn same_device(a: &Device, b: &Device) -> bool {
    let same_path = a.path() == b.path() && a.dtype() == b.dtype() && a.interface() == b.interface();
    let same_serial = match (a.serial(), b.serial()) {
        (Some(x), Some(y)) => !x.is_empty() && x.eq_ignore_ascii_case(y),
        _ => false,
    };
    same_path || same_serial
}

/// Known interface beats Unknown, then parse confidence, then row count.
fn rank(dev: &Device) -> (bool, Confidence, usize) {
    let confidence = dev.last_report().map_or(Confidence::Unknown, |r| r.confidence);
    (
        dev.interface() != Interface::Unknown,
        confidence,
        dev.attributes().len() + dev.tests().len(),
    )
}
