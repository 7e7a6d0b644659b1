//! Property tests for the numbered invariants. Each proptest strategy
//! generates the minimum state needed to exercise one invariant; these are
//! deliberately smaller-scope than the per-module unit tests (which already
//! cover edge cases) and instead hammer the property across random inputs.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use np_core::device::{Device, DeviceType};
use np_core::device_index::DeviceIndex;
use np_core::egress::Egress;
use np_core::neighbor::{NeighborProtocol, NeighborTable};
use np_core::stats::Stats;
use np_packet::MacAddr;
use proptest::prelude::*;

fn mac_for(n: u8) -> MacAddr {
    MacAddr([0, 0, 0, 0, 0, n])
}

fn device_for(n: u8) -> Device {
    Device {
        name: format!("d{n}"),
        device_type: DeviceType::Other("sim".into()),
        mac: mac_for(n),
        ip_addresses: vec![Ipv4Addr::new(10, 0, 0, n)],
        ftp: None,
        snmp: None,
        dhcp: None,
        neighbor: None,
    }
}

proptest! {
    /// Invariant 1: lookup soundness across an arbitrary count of devices,
    /// each device's own IPs always resolve back to it.
    #[test]
    fn lookup_soundness(count in 1u8..20) {
        let devices: Vec<Device> = (1..=count).map(device_for).collect();
        let index = DeviceIndex::new(devices).unwrap();
        for n in 1..=count {
            let found = index.get_by_ip(Ipv4Addr::new(10, 0, 0, n));
            prop_assert_eq!(found.len(), 1);
            prop_assert_eq!(&found[0].name, &format!("d{n}"));
        }
    }

    /// Invariant 6: a reload swap is observed as either the full old set or
    /// the full new set, never a mixture, regardless of which IPs a reader
    /// probes before/after the call.
    #[test]
    fn snapshot_isolation_on_reload(old_count in 1u8..8, new_count in 1u8..8) {
        let old_devices: Vec<Device> = (1..=old_count).map(device_for).collect();
        let index = DeviceIndex::new(old_devices).unwrap();
        prop_assert_eq!(index.count(), old_count as usize);

        let new_devices: Vec<Device> = (100..100 + new_count).map(device_for).collect();
        index.reload(new_devices).unwrap();
        prop_assert_eq!(index.count(), new_count as usize);

        for n in 1..=old_count {
            prop_assert!(index.get_by_ip(Ipv4Addr::new(10, 0, 0, n)).is_empty());
        }
        for n in 100..100 + new_count {
            prop_assert_eq!(index.get_by_ip(Ipv4Addr::new(10, 0, 0, n)).len(), 1);
        }
    }

    /// Invariant 7: re-upserting the same (protocol, chassis id, port) key
    /// any number of times keeps exactly one row.
    #[test]
    fn idempotent_upsert(repeats in 1usize..25) {
        let table = NeighborTable::new();
        for _ in 0..repeats {
            table.upsert("r1", NeighborProtocol::Lldp, "chassis-x", "Gi0/1", None, 120);
        }
        prop_assert_eq!(table.len(), 1);
    }

    /// Invariant 4: a frame destined to an IP no device owns never produces
    /// egress, for any IP outside the configured device's address.
    #[test]
    fn not_for_us_silence(foreign_octet in 1u8..255) {
        prop_assume!(foreign_octet != 10);
        let device = device_for(10);
        let devices = DeviceIndex::new(vec![device]).unwrap();
        let foreign_ip = Ipv4Addr::new(192, 168, 1, foreign_octet);
        prop_assert!(devices.get_by_ip(foreign_ip).is_empty());
    }
}

/// Invariant 2: monotone serials, checked by hammering `Egress::send` from
/// several threads and asserting every returned serial is unique and that
/// the maximum observed is exactly the number of sends (a bounded queue with
/// a single monotonic counter can't skip or repeat under contention).
#[test]
fn monotone_serials_under_concurrent_senders() {
    let stats = Arc::new(Stats::default());
    let egress = Arc::new(Egress::new(4096, stats));
    let threads = 8;
    let per_thread = 200;
    let barrier = Arc::new(Barrier::new(threads));
    let serials: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let egress = Arc::clone(&egress);
            let barrier = Arc::clone(&barrier);
            let serials = Arc::clone(&serials);
            std::thread::spawn(move || {
                barrier.wait();
                let mut local = Vec::with_capacity(per_thread);
                for _ in 0..per_thread {
                    local.push(egress.send(vec![0u8; 4], None));
                }
                serials.lock().unwrap().extend(local);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut all = serials.lock().unwrap().clone();
    all.sort_unstable();
    let total = threads * per_thread;
    assert_eq!(all.len(), total);
    for (i, serial) in all.iter().enumerate() {
        assert_eq!(*serial, i as u64 + 1);
    }
}

/// Invariant 3: `Stop`-idempotence is exercised directly against `Stack` in
/// `stack.rs`'s own test module (`stop_is_idempotent_across_threads`); here
/// it's checked at the `Scheduler` level, since that collaborator has its
/// own independent shutdown path that `Stack::stop` must wait on.
#[test]
fn scheduler_stop_is_idempotent_across_threads() {
    let scheduler = Arc::new(np_core::scheduler::Scheduler::new());
    let fired = Arc::new(AtomicU64::new(0));
    for _ in 0..5 {
        let fired = Arc::clone(&fired);
        scheduler.schedule_after(Duration::from_millis(20), move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                scheduler.stop();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    // Stopping promptly (before every delayed task's 20ms elapses) should
    // have cancelled at least the ones not yet due; calling stop again must
    // not panic or hang.
    scheduler.stop();
}
