//! Per-protocol handlers and the demux that routes an ingested frame to one
//! of them. Every handler receives a [`HandlerContext`] built fresh for that
//! dispatch rather than holding a back-reference to the `Stack`. See the
//! shared-mutable-stack-reference design note.

pub mod arp;
pub mod dhcp;
pub mod ftp;
pub mod generic;
pub mod icmp;
pub mod neighbor;
pub mod snmp;

use std::net::Ipv4Addr;
use std::sync::Arc;

use np_packet::{EtherType, EthernetFrame, Ipv4Packet, Ipv4Protocol, MacAddr, TcpSegment, UdpDatagram};

use crate::device::{DebugConfig, Device};
use crate::device_index::DeviceIndex;
use crate::dhcp::DhcpLeaseTable;
use crate::egress::Egress;
use crate::neighbor::NeighborTable;
use crate::stats::Stats;

pub const DHCP_SERVER_PORT: u16 = 67;
pub const DHCP_CLIENT_PORT: u16 = 68;
pub const SNMP_PORT: u16 = 161;
pub const FTP_PORT: u16 = 21;
pub const MDNS_PORT: u16 = 5353;
pub const MDNS_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// The per-dispatch borrow every handler works through: a device snapshot,
/// the shared stat counters, the neighbor/DHCP tables, and a handle to
/// enqueue responses. Built once per ingested frame and handed to whichever
/// handler the demux selects. `egress` is a reference to an `Arc` (rather
/// than a plain reference) so a handler that needs to act after dispatch
/// returns -- the FTP welcome banner's 100ms delay -- can clone it into a
/// scheduled task.
pub struct HandlerContext<'a> {
    pub devices: &'a DeviceIndex,
    pub neighbors: &'a NeighborTable,
    pub leases: &'a DhcpLeaseTable,
    pub stats: &'a Stats,
    pub egress: &'a Arc<Egress>,
    pub scheduler: &'a crate::scheduler::Scheduler,
    pub debug: DebugConfig,
}

impl<'a> HandlerContext<'a> {
    pub fn send(&self, buffer: Vec<u8>, origin: Option<Arc<Device>>) -> u64 {
        self.egress.send(buffer, origin)
    }
}

/// Demultiplexes one raw ingested Ethernet frame. Parse failures at any
/// layer are counted as malformed ingress and dropped; a destination that
/// doesn't belong to any configured device is a silent, uncounted drop.
pub fn dispatch(ctx: &HandlerContext<'_>, frame: &[u8]) {
    let eth = match EthernetFrame::parse(frame) {
        Ok(eth) => eth,
        Err(_) => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };

    match eth.ethertype() {
        EtherType::ARP => arp::handle(ctx, &eth),
        EtherType::IPV4 => dispatch_ipv4(ctx, &eth),
        EtherType::LLDP => neighbor::handle_lldp_ingress(ctx, &eth),
        EtherType::SNAP => neighbor::handle_cisco_ingress(ctx, &eth),
        EtherType::IPV6 => {
            // IPv6 is a declared extension surface: accept and drop cleanly.
        }
        _ => {
            if ctx.debug.at_least(2) {
                tracing::debug!(target: "np_core::handlers", ethertype = eth.ethertype().0, "unknown ethertype, dropping");
            }
        }
    }
}

fn dispatch_ipv4(ctx: &HandlerContext<'_>, eth: &EthernetFrame<'_>) {
    let ip = match Ipv4Packet::parse(eth.payload()) {
        Ok(ip) => ip,
        Err(_) => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };

    // mDNS queries are addressed to the multicast group, not to any device's
    // own IP, so they're let through here and resolved by name further down
    // the UDP dispatch instead of by `DeviceIndex::get_by_ip`.
    if ip.dst != MDNS_MULTICAST && ctx.devices.get_by_ip(ip.dst).is_empty() {
        // Not for us: normal, uncounted.
        return;
    }

    match ip.protocol {
        Ipv4Protocol::ICMP => icmp::handle(ctx, eth, &ip),
        Ipv4Protocol::UDP => dispatch_udp(ctx, eth, &ip),
        Ipv4Protocol::TCP => dispatch_tcp(ctx, eth, &ip),
        _ => {
            if ctx.debug.at_least(2) {
                tracing::debug!(target: "np_core::handlers", protocol = ip.protocol.0, "unknown l4 protocol, dropping");
            }
        }
    }
}

fn dispatch_udp(ctx: &HandlerContext<'_>, eth: &EthernetFrame<'_>, ip: &Ipv4Packet<'_>) {
    let udp = match UdpDatagram::parse(ip.payload) {
        Ok(udp) => udp,
        Err(_) => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };

    match udp.dst_port {
        DHCP_SERVER_PORT => dhcp::handle(ctx, eth, ip, &udp),
        SNMP_PORT => snmp::handle(ctx, eth, ip, &udp),
        MDNS_PORT if ip.dst == MDNS_MULTICAST => generic::handle_mdns(ctx, eth, ip, &udp),
        _ => {
            ctx.stats.incr_generic_udp_hits();
        }
    }
}

fn dispatch_tcp(ctx: &HandlerContext<'_>, eth: &EthernetFrame<'_>, ip: &Ipv4Packet<'_>) {
    let tcp = match TcpSegment::parse(ip.payload) {
        Ok(tcp) => tcp,
        Err(_) => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };

    match tcp.dst_port {
        FTP_PORT => ftp::handle(ctx, eth, ip, &tcp),
        _ => {
            ctx.stats.incr_generic_tcp_hits();
        }
    }
}

/// Resolves the virtual device owning `mac`, used by handlers that respond
/// based on an L2 lookup (ARP) rather than an IP-layer one.
pub fn device_by_mac(ctx: &HandlerContext<'_>, mac: MacAddr) -> Option<Arc<Device>> {
    ctx.devices.get_by_mac(mac)
}
