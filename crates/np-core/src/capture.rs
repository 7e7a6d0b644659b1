//! The pluggable L2 capture seam. A real pcap/BPF binding lives outside this
//! crate; what's here is the trait and the channel-backed test doubles used
//! by the stack's own integration tests.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture source closed")]
    Closed,
    #[error("inject failed: {0}")]
    InjectFailed(String),
}

/// An L2 capture source: a stream of raw inbound frames plus an injection
/// sink for outbound ones. The core never opens a socket or a BPF handle
/// itself. That lives behind this trait.
pub trait Capture: Send + Sync {
    /// Blocks up to `timeout` for the next inbound frame. `Ok(None)` means
    /// the timeout elapsed with nothing received, not an error.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<u8>>, CaptureError>;

    fn inject(&self, frame: &[u8]) -> Result<(), CaptureError>;

    fn close(&self);
}

/// An in-memory capture double backed by a pair of channels: one to feed
/// synthetic ingress frames into the stack, one to observe what the stack
/// injects back out. This is the collaborator used by every deterministic
/// end-to-end test; no real frames ever touch a NIC.
pub struct ChannelCapture {
    inbound: Mutex<Receiver<Vec<u8>>>,
    injected: Sender<Vec<u8>>,
    closed: std::sync::atomic::AtomicBool,
}

impl ChannelCapture {
    /// Returns the capture plus the two channel ends a test uses to drive it:
    /// `inbound_tx` feeds frames in, `injected_rx` observes frames sent back.
    pub fn new_pair() -> (Self, Sender<Vec<u8>>, Receiver<Vec<u8>>) {
        let (inbound_tx, inbound_rx) = std::sync::mpsc::channel();
        let (injected_tx, injected_rx) = std::sync::mpsc::channel();
        let capture = ChannelCapture {
            inbound: Mutex::new(inbound_rx),
            injected: injected_tx,
            closed: std::sync::atomic::AtomicBool::new(false),
        };
        (capture, inbound_tx, injected_rx)
    }
}

impl Capture for ChannelCapture {
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<u8>>, CaptureError> {
        if self.closed.load(std::sync::atomic::Ordering::Acquire) {
            return Err(CaptureError::Closed);
        }
        let rx = self.inbound.lock().expect("channel capture mutex poisoned");
        match rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::Closed),
        }
    }

    fn inject(&self, frame: &[u8]) -> Result<(), CaptureError> {
        self.injected
            .send(frame.to_vec())
            .map_err(|e| CaptureError::InjectFailed(e.to_string()))
    }

    fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::Release);
    }
}

/// A capture that never produces inbound frames and silently discards
/// injections. Used where a test only cares about `Send`-path introspection
/// and doesn't want to wire up channels.
#[derive(Debug, Default)]
pub struct NullCapture;

impl Capture for NullCapture {
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<u8>>, CaptureError> {
        std::thread::sleep(timeout.min(Duration::from_millis(5)));
        Ok(None)
    }

    fn inject(&self, _frame: &[u8]) -> Result<(), CaptureError> {
        Ok(())
    }

    fn close(&self) {}
}
