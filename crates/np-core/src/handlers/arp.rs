use np_packet::{ArpOperation, ArpPacket, ArpPacketBuilder, EthernetFrame, ARP_OP_REPLY};

use crate::handlers::HandlerContext;
use crate::serializer;

/// On an ARP Request targeting a configured device's IP, replies with that
/// device's MAC. Anything else (replies, requests for an IP we don't own)
/// is a silent, uncounted drop.
pub fn handle(ctx: &HandlerContext<'_>, eth: &EthernetFrame<'_>) {
    let arp = match ArpPacket::parse(eth.payload()) {
        Ok(arp) => arp,
        Err(_) => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };

    if arp.opcode() != ArpOperation::Request {
        return;
    }

    let device = match ctx.devices.get_by_ip(arp.target_ip).into_iter().next() {
        Some(device) => device,
        None => return,
    };

    let reply = ArpPacketBuilder {
        opcode: ARP_OP_REPLY,
        sender_mac: device.mac,
        sender_ip: arp.target_ip,
        target_mac: arp.sender_hw,
        target_ip: arp.sender_ip,
    }
    .build_vec();

    let reply = match reply {
        Ok(bytes) => bytes,
        Err(_) => {
            ctx.stats.incr_ser_errors();
            return;
        }
    };

    let response_mac = serializer::resolve_response_mac(eth.src_mac());
    match serializer::build_arp_frame(device.mac, response_mac, &reply) {
        Ok(frame) => {
            ctx.send(frame, Some(device));
            ctx.stats.incr_arp_replies();
        }
        Err(_) => ctx.stats.incr_ser_errors(),
    }
}

/// Builds a gratuitous ARP announcement for a newly registered (or reloaded)
/// device: source and target IP are both the device's primary address,
/// target MAC is broadcast.
pub fn build_gratuitous_announcement(
    device_mac: np_packet::MacAddr,
    device_ip: std::net::Ipv4Addr,
) -> Result<Vec<u8>, np_packet::BuildError> {
    let arp = ArpPacketBuilder {
        opcode: np_packet::ARP_OP_REQUEST,
        sender_mac: device_mac,
        sender_ip: device_ip,
        target_mac: np_packet::MacAddr::ZERO,
        target_ip: device_ip,
    }
    .build_vec()?;
    serializer::build_arp_frame(device_mac, np_packet::MacAddr::BROADCAST, &arp)
}
