//! The lifecycle state machine (`New -> Running -> Stopping -> Stopped`)
//! plus the worker pool it owns: ingest workers, a send-drain worker, a
//! neighbor/lease cleanup ticker, and one advertiser ticker per
//! (device, discovery-protocol) pair. Handlers themselves live in
//! `handlers`; this module is only wiring and scheduling.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use np_packet::MacAddr;

use crate::capture::Capture;
use crate::device::{Config, DebugConfig, Device};
use crate::device_index::DeviceIndex;
use crate::dhcp::DhcpLeaseTable;
use crate::egress::Egress;
use crate::error::{ConfigError, LifecycleError};
use crate::handlers::{self, arp, neighbor as neighbor_handlers, HandlerContext};
use crate::neighbor::{NeighborProtocol, NeighborTable};
use crate::queue::DEFAULT_CAPACITY;
use crate::scheduler::Scheduler;
use crate::stats::{Stats, StatsSnapshot};

const NEIGHBOR_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);
const INGEST_RECV_TIMEOUT: Duration = Duration::from_millis(200);
const DRAIN_IDLE_SLEEP: Duration = Duration::from_millis(5);
const TICKER_STEP: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    New,
    Running,
    Stopping,
    Stopped,
}

/// Sleeps in short steps for up to `duration`, checking `stop` between each
/// one. Returns `true` if a stop was observed before the full duration
/// elapsed, so a ticker loop can `continue` straight to its exit check
/// instead of firing one more time after `Stop` was requested.
fn wait_or_stop(stop: &AtomicBool, duration: Duration) -> bool {
    let mut waited = Duration::ZERO;
    while waited < duration {
        if stop.load(Ordering::Acquire) {
            return true;
        }
        let step = TICKER_STEP.min(duration - waited);
        thread::sleep(step);
        waited += step;
    }
    stop.load(Ordering::Acquire)
}

/// A configured (MAC, IP set, personality set) device the stack impersonates
/// on the wire, plus everything needed to answer on its behalf. `Stack`
/// itself holds no protocol logic -- that lives in `handlers` -- only the
/// lifecycle and the collaborators a [`HandlerContext`] is built from.
pub struct Stack {
    capture: Option<Arc<dyn Capture>>,
    devices: Arc<DeviceIndex>,
    neighbors: Arc<NeighborTable>,
    leases: Arc<DhcpLeaseTable>,
    stats: Arc<Stats>,
    egress: Arc<Egress>,
    scheduler: Arc<Scheduler>,
    debug: Arc<AtomicU8>,
    state: Mutex<LifecycleState>,
    stop: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes `Stop` calls so that by the time any one of them returns,
    /// the full worker join has already happened -- not just the one the
    /// calling thread happened to run.
    stop_lock: Mutex<()>,
}

impl Stack {
    /// Builds the device index from `config.devices` and every other
    /// collaborator, but spawns no workers. A gratuitous ARP is queued for
    /// every device's primary IP, mirroring what `Start` plus a reload would
    /// otherwise take a tick to produce.
    pub fn new(
        capture: Option<Arc<dyn Capture>>,
        config: Config,
        debug_config: DebugConfig,
    ) -> Result<Self, ConfigError> {
        let devices = Arc::new(DeviceIndex::new(config.devices)?);
        let stats = Arc::new(Stats::default());
        let egress = Arc::new(Egress::new(DEFAULT_CAPACITY, Arc::clone(&stats)));

        for device in devices.get_all() {
            announce_gratuitous(&egress, &stats, &device);
        }

        Ok(Stack {
            capture,
            devices,
            neighbors: Arc::new(NeighborTable::new()),
            leases: Arc::new(DhcpLeaseTable::new()),
            egress,
            scheduler: Arc::new(Scheduler::new()),
            stats,
            debug: Arc::new(AtomicU8::new(debug_config.0)),
            state: Mutex::new(LifecycleState::New),
            stop: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            stop_lock: Mutex::new(()),
        })
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().expect("stack state mutex poisoned")
    }

    /// Transitions `New -> Running`, spawning the ingest worker, the
    /// send-drain worker, the cleanup ticker, and one advertiser ticker per
    /// enabled (device, protocol) pair. Returns `Ok(())` without spawning
    /// anything if already `Running`; fails on a `Stack` that has already
    /// been stopped, or that has no capture configured.
    pub fn start(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().expect("stack state mutex poisoned");
        match *state {
            LifecycleState::Running => return Ok(()),
            LifecycleState::Stopping | LifecycleState::Stopped => {
                return Err(LifecycleError::AlreadyStopped)
            }
            LifecycleState::New => {}
        }
        let capture = self.capture.clone().ok_or(LifecycleError::NoCapture)?;

        self.stop.store(false, Ordering::Release);
        let mut workers = self.workers.lock().expect("workers mutex poisoned");
        workers.push(self.spawn_ingest_worker(Arc::clone(&capture)));
        workers.push(self.spawn_send_drain_worker(capture));
        workers.push(self.spawn_cleanup_ticker());
        for device in self.devices.get_all() {
            if let Some(cfg) = &device.neighbor {
                let interval = Duration::from_secs(cfg.interval_secs.max(1));
                for protocol in cfg.enabled_protocols() {
                    workers.push(self.spawn_advertiser(device.name.clone(), protocol, interval));
                }
            }
        }
        drop(workers);

        *state = LifecycleState::Running;
        Ok(())
    }

    /// Transitions to `Stopping`, signals every worker to exit, joins them
    /// all, stops the FTP welcome-banner scheduler, then transitions to
    /// `Stopped`. Idempotent from any state and safe to call before `Start`;
    /// concurrent callers serialize on an internal lock so none of them
    /// returns before every worker has actually exited.
    pub fn stop(&self) {
        let _guard = self.stop_lock.lock().expect("stop lock poisoned");
        if self.state() == LifecycleState::Stopped {
            return;
        }
        {
            let mut state = self.state.lock().expect("stack state mutex poisoned");
            if *state == LifecycleState::New {
                *state = LifecycleState::Stopped;
                return;
            }
            *state = LifecycleState::Stopping;
        }

        self.stop.store(true, Ordering::Release);
        if let Some(capture) = &self.capture {
            capture.close();
        }
        let handles = std::mem::take(&mut *self.workers.lock().expect("workers mutex poisoned"));
        for handle in handles {
            let _ = handle.join();
        }
        self.scheduler.stop();

        *self.state.lock().expect("stack state mutex poisoned") = LifecycleState::Stopped;
    }

    /// Atomically swaps the device set. Devices present in `new_config` but
    /// absent from the prior set get a gratuitous ARP, matching what a fresh
    /// registration would produce. Lifecycle state is untouched; in-flight
    /// dispatches keep running against whichever snapshot they already read.
    pub fn reload_config(&self, new_config: Config) -> Result<(), ConfigError> {
        let previous_macs: std::collections::HashSet<MacAddr> =
            self.devices.get_all().iter().map(|d| d.mac).collect();
        self.devices.reload(new_config.devices)?;
        for device in self.devices.get_all() {
            if !previous_macs.contains(&device.mac) {
                announce_gratuitous(&self.egress, &self.stats, &device);
            }
        }
        Ok(())
    }

    /// Non-blocking enqueue onto the send queue, usable even before `Start`
    /// (e.g. in tests introspecting what a handler would have sent).
    pub fn send(&self, buffer: Vec<u8>, origin: Option<Arc<Device>>) -> u64 {
        self.egress.send(buffer, origin)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.get_all()
    }

    pub fn debug_level(&self) -> DebugConfig {
        DebugConfig(self.debug.load(Ordering::Relaxed))
    }

    pub fn set_debug_level(&self, level: u8) {
        self.debug.store(level, Ordering::Relaxed);
    }

    fn spawn_ingest_worker(&self, capture: Arc<dyn Capture>) -> JoinHandle<()> {
        let devices = Arc::clone(&self.devices);
        let neighbors = Arc::clone(&self.neighbors);
        let leases = Arc::clone(&self.leases);
        let stats = Arc::clone(&self.stats);
        let egress = Arc::clone(&self.egress);
        let scheduler = Arc::clone(&self.scheduler);
        let debug = Arc::clone(&self.debug);
        let stop = Arc::clone(&self.stop);

        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                let frame = match capture.recv_timeout(INGEST_RECV_TIMEOUT) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => continue,
                    Err(_) => break,
                };
                let ctx = HandlerContext {
                    devices: &devices,
                    neighbors: &neighbors,
                    leases: &leases,
                    stats: &stats,
                    egress: &egress,
                    scheduler: &scheduler,
                    debug: DebugConfig(debug.load(Ordering::Relaxed)),
                };
                let dispatched = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    handlers::dispatch(&ctx, &frame);
                }));
                if dispatched.is_err() {
                    stats.incr_handler_panics();
                    tracing::warn!(target: "np_core::stack", "handler panicked, dropping frame and continuing");
                }
            }
        })
    }

    fn spawn_send_drain_worker(&self, capture: Arc<dyn Capture>) -> JoinHandle<()> {
        let egress = Arc::clone(&self.egress);
        let stop = Arc::clone(&self.stop);

        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                match egress.drain_one() {
                    Some(packet) => {
                        if let Err(error) = capture.inject(&packet.buffer) {
                            tracing::warn!(target: "np_core::stack", %error, "inject failed");
                        }
                    }
                    None => thread::sleep(DRAIN_IDLE_SLEEP),
                }
            }
            // Best-effort final drain so a packet enqueued just before Stop
            // isn't silently lost.
            while let Some(packet) = egress.drain_one() {
                let _ = capture.inject(&packet.buffer);
            }
        })
    }

    fn spawn_cleanup_ticker(&self) -> JoinHandle<()> {
        let neighbors = Arc::clone(&self.neighbors);
        let leases = Arc::clone(&self.leases);
        let stop = Arc::clone(&self.stop);

        thread::spawn(move || {
            while !wait_or_stop(&stop, NEIGHBOR_CLEANUP_INTERVAL) {
                neighbors.cleanup_expired();
                leases.cleanup_expired();
            }
        })
    }

    /// Re-reads the device by name from the live `DeviceIndex` every tick
    /// (rather than closing over the `Device` snapshot taken at `Start`) so
    /// a rename, removal, or protocol toggle via `ReloadConfig` takes effect
    /// within one tick, per the advertiser-ticker contract.
    fn spawn_advertiser(
        &self,
        device_name: String,
        protocol: NeighborProtocol,
        interval: Duration,
    ) -> JoinHandle<()> {
        let devices = Arc::clone(&self.devices);
        let egress = Arc::clone(&self.egress);
        let stats = Arc::clone(&self.stats);
        let stop = Arc::clone(&self.stop);

        thread::spawn(move || {
            while !wait_or_stop(&stop, interval) {
                let Some(device) = devices.get_all().into_iter().find(|d| d.name == device_name) else {
                    continue;
                };
                let Some(cfg) = device.neighbor.as_ref() else {
                    continue;
                };
                if !cfg.enabled_protocols().contains(&protocol) {
                    continue;
                }
                match neighbor_handlers::build_advertisement(&device, protocol, cfg.ttl_secs) {
                    Ok(frame) => {
                        egress.send(frame, Some(device));
                        stats.incr_neighbor_advertisements_sent();
                    }
                    Err(_) => stats.incr_ser_errors(),
                }
            }
        })
    }
}

fn announce_gratuitous(egress: &Egress, stats: &Stats, device: &Arc<Device>) {
    let Some(ip) = device.primary_ip() else {
        return;
    };
    match arp::build_gratuitous_announcement(device.mac, ip) {
        Ok(frame) => {
            egress.send(frame, Some(Arc::clone(device)));
        }
        Err(_) => stats.incr_ser_errors(),
    }
}
