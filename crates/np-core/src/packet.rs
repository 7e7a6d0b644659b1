use std::sync::Arc;

use crate::device::Device;

/// A frame queued for egress. `serial_number` is assigned once, in `Send`,
/// from the stack's monotonic counter, and survives a config reload.
#[derive(Debug, Clone)]
pub struct Packet {
    pub buffer: Vec<u8>,
    pub serial_number: u64,
    /// The virtual device that originated this frame, if any. Carried so
    /// the capture sink and stats can attribute the send without a second
    /// lookup.
    pub origin: Option<Arc<Device>>,
}

impl Packet {
    pub fn new(buffer: Vec<u8>, serial_number: u64, origin: Option<Arc<Device>>) -> Self {
        Packet {
            buffer,
            serial_number,
            origin,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
