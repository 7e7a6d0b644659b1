//! Dependency-free wire-format library: Ethernet/ARP/IPv4/ICMP/UDP/TCP parsing
//! and building, plus the BER and TLV framing the SNMP and neighbor-discovery
//! protocols need. Nothing here touches a socket, a thread, or a clock; every
//! parser returns `Result` instead of panicking on attacker-controlled input.

pub mod arp;
pub mod ber;
pub mod checksum;
pub mod error;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod mac;
pub mod tcp;
pub mod tlv;
pub mod udp;

pub use arp::{ArpOperation, ArpPacket, ArpPacketBuilder, ARP_OP_REPLY, ARP_OP_REQUEST};
pub use checksum::internet_checksum;
pub use error::{BuildError, ParseError};
pub use ethernet::{EtherType, EthernetFrame, EthernetFrameBuilder, ETHERNET_HEADER_LEN};
pub use icmp::{IcmpEchoBuilder, IcmpPacket, IcmpType};
pub use ipv4::{Ipv4Packet, Ipv4PacketBuilder, Ipv4Protocol};
pub use mac::MacAddr;
pub use tcp::{TcpFlags, TcpSegment, TcpSegmentBuilder};
pub use udp::{UdpDatagram, UdpPacketBuilder};
