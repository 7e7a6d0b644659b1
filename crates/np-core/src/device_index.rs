use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use np_packet::MacAddr;

use crate::device::Device;
use crate::error::ConfigError;

/// An immutable snapshot of the device set: `ip -> devices` and `mac ->
/// device` built together so a lookup never observes a partial update.
#[derive(Debug, Default)]
struct Snapshot {
    devices: Vec<Arc<Device>>,
    by_ip: HashMap<Ipv4Addr, Vec<Arc<Device>>>,
    by_mac: HashMap<MacAddr, Arc<Device>>,
}

impl Snapshot {
    fn build(devices: Vec<Device>) -> Result<Self, ConfigError> {
        validate(&devices)?;
        let devices: Vec<Arc<Device>> = devices.into_iter().map(Arc::new).collect();
        let mut by_ip: HashMap<Ipv4Addr, Vec<Arc<Device>>> = HashMap::new();
        let mut by_mac: HashMap<MacAddr, Arc<Device>> = HashMap::new();
        for device in &devices {
            for ip in &device.ip_addresses {
                by_ip.entry(*ip).or_default().push(Arc::clone(device));
            }
            by_mac.insert(device.mac, Arc::clone(device));
        }
        Ok(Snapshot {
            devices,
            by_ip,
            by_mac,
        })
    }
}

fn validate(devices: &[Device]) -> Result<(), ConfigError> {
    let mut seen_macs: HashMap<MacAddr, Vec<String>> = HashMap::new();
    let mut seen_ips: HashMap<Ipv4Addr, Vec<String>> = HashMap::new();
    for device in devices {
        if device.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if device.ip_addresses.is_empty() {
            return Err(ConfigError::NoAddresses(device.name.clone()));
        }
        seen_macs.entry(device.mac).or_default().push(device.name.clone());
        for ip in &device.ip_addresses {
            seen_ips.entry(*ip).or_default().push(device.name.clone());
        }
        if let Some(pool) = &device.dhcp {
            if !pool.is_valid() {
                return Err(ConfigError::InvalidDhcpPool {
                    device: device.name.clone(),
                    start: pool.start.to_string(),
                    end: pool.end.to_string(),
                });
            }
        }
    }
    if let Some((mac, names)) = seen_macs.into_iter().find(|(_, names)| names.len() > 1) {
        return Err(ConfigError::DuplicateMac(mac.to_string(), names));
    }
    if let Some((ip, names)) = seen_ips.into_iter().find(|(_, names)| names.len() > 1) {
        return Err(ConfigError::DuplicateIp(ip.to_string(), names));
    }
    Ok(())
}

/// O(1) lookup of virtual devices by IP and by MAC, swapped as a single
/// immutable snapshot on reload so no lookup ever sees a partially updated
/// map. Readers never block on a writer: they clone the current `Arc` under
/// a short-lived lock and then read the (now-frozen) snapshot lock-free.
#[derive(Debug)]
pub struct DeviceIndex {
    current: Mutex<Arc<Snapshot>>,
}

impl DeviceIndex {
    pub fn new(devices: Vec<Device>) -> Result<Self, ConfigError> {
        let snapshot = Snapshot::build(devices)?;
        Ok(DeviceIndex {
            current: Mutex::new(Arc::new(snapshot)),
        })
    }

    /// Atomically replaces the device set. Existing readers that already
    /// cloned the prior `Arc<Snapshot>` keep seeing it until they look up
    /// again; nobody observes a mixture of old and new devices.
    pub fn reload(&self, devices: Vec<Device>) -> Result<(), ConfigError> {
        let snapshot = Snapshot::build(devices)?;
        let mut guard = self.current.lock().expect("device index mutex poisoned");
        *guard = Arc::new(snapshot);
        Ok(())
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.lock().expect("device index mutex poisoned"))
    }

    pub fn get_by_ip(&self, ip: Ipv4Addr) -> Vec<Arc<Device>> {
        self.snapshot()
            .by_ip
            .get(&ip)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_by_mac(&self, mac: MacAddr) -> Option<Arc<Device>> {
        self.snapshot().by_mac.get(&mac).cloned()
    }

    pub fn get_all(&self) -> Vec<Arc<Device>> {
        self.snapshot().devices.clone()
    }

    pub fn count(&self) -> usize {
        self.snapshot().devices.len()
    }
}
