//! The shared egress path: every handler builds its response through these
//! functions instead of hand-rolling a frame, so length and checksum fixup
//! happen in exactly one place.

use std::net::Ipv4Addr;

use np_packet::{
    BuildError, EtherType, EthernetFrameBuilder, Ipv4PacketBuilder, Ipv4Protocol, MacAddr,
    TcpFlags, TcpSegmentBuilder, UdpPacketBuilder,
};

pub const DEFAULT_IP_TTL: u8 = 64;

/// The response destination MAC is always the inbound frame's source MAC,
/// including the loopback-like case where that source happens to be one of
/// our own virtual devices (two simulated devices talking to each other).
pub fn resolve_response_mac(inbound_src_mac: MacAddr) -> MacAddr {
    inbound_src_mac
}

/// Builds an Ethernet + IPv4 + ICMP frame. `icmp_bytes` must already carry a
/// correct ICMP checksum (the ICMP builders in `np-packet` do this).
pub fn build_icmp_frame(
    eth_src: MacAddr,
    eth_dst: MacAddr,
    ip_src: Ipv4Addr,
    ip_dst: Ipv4Addr,
    identification: u16,
    icmp_bytes: &[u8],
) -> Result<Vec<u8>, BuildError> {
    let ip_packet = Ipv4PacketBuilder::serialize(
        ip_src,
        ip_dst,
        Ipv4Protocol::ICMP,
        identification,
        DEFAULT_IP_TTL,
        icmp_bytes,
    );
    EthernetFrameBuilder {
        dest_mac: eth_dst,
        src_mac: eth_src,
        ethertype: EtherType::IPV4,
        payload: &ip_packet,
    }
    .build_vec()
}

pub fn build_arp_frame(
    eth_src: MacAddr,
    eth_dst: MacAddr,
    arp_bytes: &[u8],
) -> Result<Vec<u8>, BuildError> {
    EthernetFrameBuilder {
        dest_mac: eth_dst,
        src_mac: eth_src,
        ethertype: EtherType::ARP,
        payload: arp_bytes,
    }
    .build_vec()
}

#[allow(clippy::too_many_arguments)]
pub fn build_udp_frame(
    eth_src: MacAddr,
    eth_dst: MacAddr,
    ip_src: Ipv4Addr,
    ip_dst: Ipv4Addr,
    identification: u16,
    udp_src_port: u16,
    udp_dst_port: u16,
    payload: &[u8],
) -> Result<Vec<u8>, BuildError> {
    let udp_datagram = UdpPacketBuilder {
        src_port: udp_src_port,
        dst_port: udp_dst_port,
        payload,
    }
    .build_vec(ip_src, ip_dst)?;
    let ip_packet = Ipv4PacketBuilder::serialize(
        ip_src,
        ip_dst,
        Ipv4Protocol::UDP,
        identification,
        DEFAULT_IP_TTL,
        &udp_datagram,
    );
    EthernetFrameBuilder {
        dest_mac: eth_dst,
        src_mac: eth_src,
        ethertype: EtherType::IPV4,
        payload: &ip_packet,
    }
    .build_vec()
}

#[allow(clippy::too_many_arguments)]
pub fn build_tcp_frame(
    eth_src: MacAddr,
    eth_dst: MacAddr,
    ip_src: Ipv4Addr,
    ip_dst: Ipv4Addr,
    identification: u16,
    tcp_src_port: u16,
    tcp_dst_port: u16,
    seq: u32,
    ack: u32,
    flags: TcpFlags,
    window: u16,
    payload: &[u8],
) -> Result<Vec<u8>, BuildError> {
    let tcp_segment = TcpSegmentBuilder {
        src_port: tcp_src_port,
        dst_port: tcp_dst_port,
        seq_number: seq,
        ack_number: ack,
        flags,
        window_size: window,
        urgent_pointer: 0,
        options: &[],
        payload,
    }
    .build_vec(ip_src, ip_dst)?;
    let ip_packet = Ipv4PacketBuilder::serialize(
        ip_src,
        ip_dst,
        Ipv4Protocol::TCP,
        identification,
        DEFAULT_IP_TTL,
        &tcp_segment,
    );
    EthernetFrameBuilder {
        dest_mac: eth_dst,
        src_mac: eth_src,
        ethertype: EtherType::IPV4,
        payload: &ip_packet,
    }
    .build_vec()
}

/// Builds a non-IP frame (LLDP, or an 802.3-length-field SNAP frame for
/// CDP/EDP/FDP). `ethertype` should be `EtherType::LLDP` for LLDP and
/// `EtherType::SNAP` for the Cisco family, which encodes the payload length
/// in the 802.3 length field instead of carrying a true EtherType.
pub fn build_layer2_frame(
    eth_src: MacAddr,
    eth_dst: MacAddr,
    ethertype: EtherType,
    payload: &[u8],
) -> Result<Vec<u8>, BuildError> {
    EthernetFrameBuilder {
        dest_mac: eth_dst,
        src_mac: eth_src,
        ethertype,
        payload,
    }
    .build_vec()
}
