//! Neighbor-discovery table shared by the LLDP/CDP/EDP/FDP handlers: each
//! protocol upserts what it last heard from a peer, and expired rows are
//! swept out by the stack's periodic cleanup tick.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeighborProtocol {
    Lldp,
    Cdp,
    Edp,
    Fdp,
}

impl NeighborProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeighborProtocol::Lldp => "lldp",
            NeighborProtocol::Cdp => "cdp",
            NeighborProtocol::Edp => "edp",
            NeighborProtocol::Fdp => "fdp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NeighborKey {
    local_device: String,
    protocol: NeighborProtocol,
    remote_chassis_id: String,
    remote_port: String,
}

#[derive(Debug, Clone)]
pub struct NeighborRecord {
    pub local_device: String,
    pub protocol: NeighborProtocol,
    pub remote_chassis_id: String,
    pub remote_port: String,
    pub remote_sys_descr: Option<String>,
    expires_at: Instant,
}

const DEFAULT_TTL: Duration = Duration::from_secs(180);

#[derive(Debug, Default)]
pub struct NeighborTable {
    rows: Mutex<HashMap<NeighborKey, NeighborRecord>>,
}

impl NeighborTable {
    pub fn new() -> Self {
        NeighborTable::default()
    }

    /// Records or refreshes a neighbor sighting. A non-positive TTL falls
    /// back to [`DEFAULT_TTL`]; an empty `local_device` or
    /// `remote_chassis_id` is silently ignored since it can't be a real key.
    pub fn upsert(
        &self,
        local_device: &str,
        protocol: NeighborProtocol,
        remote_chassis_id: &str,
        remote_port: &str,
        remote_sys_descr: Option<String>,
        ttl_secs: i64,
    ) {
        if local_device.is_empty() || remote_chassis_id.is_empty() {
            return;
        }
        let ttl = if ttl_secs > 0 {
            Duration::from_secs(ttl_secs as u64)
        } else {
            DEFAULT_TTL
        };
        let key = NeighborKey {
            local_device: local_device.to_string(),
            protocol,
            remote_chassis_id: remote_chassis_id.to_string(),
            remote_port: remote_port.to_string(),
        };
        let record = NeighborRecord {
            local_device: local_device.to_string(),
            protocol,
            remote_chassis_id: remote_chassis_id.to_string(),
            remote_port: remote_port.to_string(),
            remote_sys_descr,
            expires_at: Instant::now() + ttl,
        };
        self.rows
            .lock()
            .expect("neighbor table mutex poisoned")
            .insert(key, record);
    }

    pub fn list(&self) -> Vec<NeighborRecord> {
        self.rows
            .lock()
            .expect("neighbor table mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn list_for_device(&self, local_device: &str) -> Vec<NeighborRecord> {
        self.rows
            .lock()
            .expect("neighbor table mutex poisoned")
            .values()
            .filter(|r| r.local_device == local_device)
            .cloned()
            .collect()
    }

    /// Removes every row whose TTL has elapsed; returns how many were swept.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut rows = self.rows.lock().expect("neighbor table mutex poisoned");
        let before = rows.len();
        rows.retain(|_, record| record.expires_at > now);
        before - rows.len()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("neighbor table mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
