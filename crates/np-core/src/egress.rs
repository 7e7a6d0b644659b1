//! The send queue plus the monotonic serial-number counter that assigns an
//! identity to every egress packet. `Egress::send` is the one place the
//! serial counter is touched, so "increments exactly once per `Send` call,
//! never rewinds" falls out of the mutex span rather than being a separate
//! invariant to maintain by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::device::Device;
use crate::packet::Packet;
use crate::queue::BoundedQueue;
use crate::stats::Stats;

#[derive(Debug)]
pub struct Egress {
    queue: BoundedQueue<Packet>,
    serial: Mutex<u64>,
    next_serial_hint: AtomicU64,
    stats: Arc<Stats>,
}

impl Egress {
    pub fn new(capacity: usize, stats: Arc<Stats>) -> Self {
        Egress {
            queue: BoundedQueue::new(capacity),
            serial: Mutex::new(0),
            next_serial_hint: AtomicU64::new(0),
            stats,
        }
    }

    /// Enqueues `buffer` for the send-drain worker, assigning it the next
    /// serial number. On send-queue overflow the oldest queued packet is
    /// dropped and `SendDrops` is incremented; the new packet is still
    /// enqueued (liveness of the newest response is preferred).
    pub fn send(&self, buffer: Vec<u8>, origin: Option<Arc<Device>>) -> u64 {
        let serial = {
            let mut guard = self.serial.lock().expect("serial counter mutex poisoned");
            *guard += 1;
            *guard
        };
        self.next_serial_hint.store(serial, Ordering::Relaxed);
        let packet = Packet::new(buffer, serial, origin);
        let outcome = self.queue.push(packet);
        if outcome.dropped_oldest {
            self.stats.incr_send_drops();
        }
        serial
    }

    pub fn drain_one(&self) -> Option<Packet> {
        self.queue.pop()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// The most recently assigned serial number, or 0 if nothing has been
    /// sent yet. Read-only convenience for tests asserting monotonicity.
    pub fn last_serial(&self) -> u64 {
        self.next_serial_hint.load(Ordering::Relaxed)
    }
}
