use std::net::Ipv4Addr;

use np_packet::MacAddr;
use serde::{Deserialize, Serialize};

/// A coarse classification used only for display/MIB purposes (e.g. the
/// advertised `sysDescr`); it has no effect on which handlers run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Router,
    Switch,
    Server,
    Printer,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtpConfig {
    pub system_type: Option<String>,
    pub welcome_banner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SnmpConfig {
    pub community: String,
    pub sys_name: Option<String>,
    pub sys_descr: Option<String>,
    /// Extra OID -> OctetString answers, e.g. for custom MIB extras.
    /// Keys are dotted OID strings, e.g. `"1.3.6.1.2.1.1.1.0"`.
    #[serde(default)]
    pub extra_oids: std::collections::BTreeMap<String, String>,
}

/// A contiguous DHCP address pool, inclusive of both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpPoolConfig {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
}

fn default_lease_ttl_secs() -> u64 {
    3600
}

impl DhcpPoolConfig {
    pub fn is_valid(&self) -> bool {
        u32::from(self.start) <= u32::from(self.end)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(self.start) <= u32::from(ip) && u32::from(ip) <= u32::from(self.end)
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        let start = u32::from(self.start);
        let end = u32::from(self.end);
        (start..=end).map(Ipv4Addr::from)
    }
}

/// Which discovery protocols a device advertises, and at what cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborAdvertConfig {
    #[serde(default)]
    pub lldp: bool,
    #[serde(default)]
    pub cdp: bool,
    #[serde(default)]
    pub edp: bool,
    #[serde(default)]
    pub fdp: bool,
    pub sys_descr: Option<String>,
    #[serde(default = "default_advertise_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_advertise_ttl_secs")]
    pub ttl_secs: u32,
}

fn default_advertise_interval_secs() -> u64 {
    30
}

fn default_advertise_ttl_secs() -> u32 {
    120
}

impl NeighborAdvertConfig {
    pub fn enabled_protocols(&self) -> Vec<crate::neighbor::NeighborProtocol> {
        use crate::neighbor::NeighborProtocol::*;
        let mut out = Vec::new();
        if self.lldp {
            out.push(Lldp);
        }
        if self.cdp {
            out.push(Cdp);
        }
        if self.edp {
            out.push(Edp);
        }
        if self.fdp {
            out.push(Fdp);
        }
        out
    }
}

/// An immutable-after-construction virtual device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub device_type: DeviceType,
    #[serde(with = "mac_serde")]
    pub mac: MacAddr,
    pub ip_addresses: Vec<Ipv4Addr>,
    #[serde(default)]
    pub ftp: Option<FtpConfig>,
    #[serde(default)]
    pub snmp: Option<SnmpConfig>,
    #[serde(default)]
    pub dhcp: Option<DhcpPoolConfig>,
    #[serde(default)]
    pub neighbor: Option<NeighborAdvertConfig>,
}

impl Device {
    /// Index 0 of `ip_addresses` is the primary address used for
    /// broadcast-origin fields (gratuitous ARP, PASV, DHCP server-id, ...).
    pub fn primary_ip(&self) -> Option<Ipv4Addr> {
        self.ip_addresses.first().copied()
    }
}

/// The configuration collaborator's view of the device set. The excluded
/// config loader is responsible for producing one of these from disk; this
/// crate never reads a file or parses a document format itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub devices: Vec<Device>,
}

/// Numeric verbosity level the logging collaborator maintains; the core
/// consults it read-only and ORs it with `tracing`'s own level filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct DebugConfig(pub u8);

impl DebugConfig {
    pub fn at_least(&self, level: u8) -> bool {
        self.0 >= level
    }
}

mod mac_serde {
    use np_packet::MacAddr;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(mac: &MacAddr, s: S) -> Result<S::Ok, S::Error> {
        mac.to_string().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<MacAddr, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
