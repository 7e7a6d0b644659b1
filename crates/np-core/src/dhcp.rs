//! Per-device DHCP lease bookkeeping. The wire-level message parsing and
//! response construction live in `handlers::dhcp`; this module only tracks
//! which IP belongs to which client MAC and for how long.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use np_packet::MacAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Offered,
    Bound,
}

#[derive(Debug, Clone)]
struct Lease {
    ip: Ipv4Addr,
    state: LeaseState,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseInfo {
    pub ip: Ipv4Addr,
    pub state: LeaseState,
}

#[derive(Debug, Default)]
pub struct DhcpLeaseTable {
    /// Keyed by (device name, client MAC); a device's pool is only ever
    /// consulted for that device's own leases.
    leases: Mutex<HashMap<(String, MacAddr), Lease>>,
}

impl DhcpLeaseTable {
    pub fn new() -> Self {
        DhcpLeaseTable::default()
    }

    pub fn lease_of(&self, device: &str, mac: MacAddr) -> Option<LeaseInfo> {
        self.leases
            .lock()
            .expect("dhcp lease table mutex poisoned")
            .get(&(device.to_string(), mac))
            .map(|l| LeaseInfo {
                ip: l.ip,
                state: l.state,
            })
    }

    /// Picks the lowest address in `pool` not currently held (offered or
    /// bound, unexpired) by a *different* MAC, preferring to re-offer the
    /// same IP already associated with `mac` if one exists and is still
    /// free of conflict.
    pub fn allocate(
        &self,
        device: &str,
        mac: MacAddr,
        pool: impl Iterator<Item = Ipv4Addr>,
        ttl: Duration,
    ) -> Option<Ipv4Addr> {
        let mut leases = self.leases.lock().expect("dhcp lease table mutex poisoned");
        let now = Instant::now();
        leases.retain(|_, lease| lease.expires_at > now);

        if let Some(existing) = leases.get(&(device.to_string(), mac)) {
            return Some(existing.ip);
        }

        let taken: std::collections::HashSet<Ipv4Addr> = leases
            .iter()
            .filter(|((dev, m), _)| dev == device && *m != mac)
            .map(|(_, lease)| lease.ip)
            .collect();

        let candidate = pool.into_iter().find(|ip| !taken.contains(ip))?;
        leases.insert(
            (device.to_string(), mac),
            Lease {
                ip: candidate,
                state: LeaseState::Offered,
                expires_at: now + ttl,
            },
        );
        Some(candidate)
    }

    /// Transitions an offered lease to Bound if `ip` matches what was
    /// offered to `mac`; returns whether the bind succeeded.
    pub fn bind(&self, device: &str, mac: MacAddr, ip: Ipv4Addr, ttl: Duration) -> bool {
        let mut leases = self.leases.lock().expect("dhcp lease table mutex poisoned");
        match leases.get_mut(&(device.to_string(), mac)) {
            Some(lease) if lease.ip == ip => {
                lease.state = LeaseState::Bound;
                lease.expires_at = Instant::now() + ttl;
                true
            }
            _ => false,
        }
    }

    pub fn release(&self, device: &str, mac: MacAddr) {
        self.leases
            .lock()
            .expect("dhcp lease table mutex poisoned")
            .remove(&(device.to_string(), mac));
    }

    /// Removes every lease whose TTL has elapsed; returns how many were
    /// reclaimed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut leases = self.leases.lock().expect("dhcp lease table mutex poisoned");
        let before = leases.len();
        leases.retain(|_, lease| lease.expires_at > now);
        before - leases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_picks_next_free_and_reoffers_to_same_mac() {
        let table = DhcpLeaseTable::new();
        let mac = MacAddr([1; 6]);
        let pool = [
            Ipv4Addr::new(10, 0, 0, 100),
            Ipv4Addr::new(10, 0, 0, 101),
        ];
        let first = table
            .allocate("d1", mac, pool.into_iter(), Duration::from_secs(60))
            .unwrap();
        assert_eq!(first, pool[0]);
        let again = table
            .allocate("d1", mac, pool.into_iter(), Duration::from_secs(60))
            .unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn allocate_skips_ips_held_by_other_macs() {
        let table = DhcpLeaseTable::new();
        let pool = [Ipv4Addr::new(10, 0, 0, 100), Ipv4Addr::new(10, 0, 0, 101)];
        table
            .allocate("d1", MacAddr([1; 6]), pool.into_iter(), Duration::from_secs(60))
            .unwrap();
        let second = table
            .allocate("d1", MacAddr([2; 6]), pool.into_iter(), Duration::from_secs(60))
            .unwrap();
        assert_eq!(second, pool[1]);
    }

    #[test]
    fn bind_requires_matching_offered_ip() {
        let table = DhcpLeaseTable::new();
        let mac = MacAddr([1; 6]);
        let ip = table
            .allocate(
                "d1",
                mac,
                [Ipv4Addr::new(10, 0, 0, 100)].into_iter(),
                Duration::from_secs(60),
            )
            .unwrap();
        assert!(!table.bind("d1", mac, Ipv4Addr::new(10, 0, 0, 200), Duration::from_secs(3600)));
        assert!(table.bind("d1", mac, ip, Duration::from_secs(3600)));
        assert_eq!(
            table.lease_of("d1", mac),
            Some(LeaseInfo {
                ip,
                state: LeaseState::Bound
            })
        );
    }

    #[test]
    fn release_frees_the_lease_for_reallocation() {
        let table = DhcpLeaseTable::new();
        let pool = [Ipv4Addr::new(10, 0, 0, 100)];
        let mac_a = MacAddr([1; 6]);
        let mac_b = MacAddr([2; 6]);
        table
            .allocate("d1", mac_a, pool.into_iter(), Duration::from_secs(60))
            .unwrap();
        assert!(table.allocate("d1", mac_b, pool.into_iter(), Duration::from_secs(60)).is_none());
        table.release("d1", mac_a);
        assert!(table.allocate("d1", mac_b, pool.into_iter(), Duration::from_secs(60)).is_some());
    }
}
