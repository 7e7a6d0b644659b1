//! Protocol dispatch engine for the multi-device network-personality
//! simulator: given a set of configured virtual devices and a raw-frame
//! capture source, answers ARP/ICMP/DHCP/SNMP/FTP/LLDP/CDP/EDP/FDP traffic
//! on their behalf. [`stack::Stack`] is the entry point; everything else in
//! this crate is a collaborator it wires together.

pub mod capture;
pub mod device;
pub mod device_index;
pub mod dhcp;
pub mod egress;
pub mod error;
pub mod handlers;
pub mod neighbor;
pub mod packet;
pub mod queue;
pub mod scheduler;
pub mod serializer;
pub mod stack;
pub mod stats;

pub use capture::{Capture, CaptureError, ChannelCapture, NullCapture};
pub use device::{Config, DebugConfig, Device, DeviceType};
pub use device_index::DeviceIndex;
pub use error::{ConfigError, LifecycleError};
pub use packet::Packet;
pub use stack::{LifecycleState, Stack};
pub use stats::{Stats, StatsSnapshot};
