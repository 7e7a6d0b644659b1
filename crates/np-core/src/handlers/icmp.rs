use np_packet::{EthernetFrame, IcmpEchoBuilder, IcmpPacket, IcmpType, Ipv4Packet};

use crate::handlers::HandlerContext;
use crate::serializer;

/// Responds to Echo Request with Echo Reply, mirroring identifier, sequence
/// and payload. Other ICMP types are well-formed but not actionable, so
/// they're ignored without being counted as malformed.
pub fn handle(ctx: &HandlerContext<'_>, eth: &EthernetFrame<'_>, ip: &Ipv4Packet<'_>) {
    let icmp = match IcmpPacket::parse(ip.payload) {
        Ok(icmp) => icmp,
        Err(_) => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };

    if !icmp.is_echo_request() {
        if ctx.debug.at_least(2) {
            tracing::debug!(target: "np_core::handlers::icmp", icmp_type = ?icmp.icmp_type, "non-echo icmp, ignoring");
        }
        return;
    }

    let device = match ctx.devices.get_by_ip(ip.dst).into_iter().next() {
        Some(device) => device,
        None => return,
    };

    let echo_reply = IcmpEchoBuilder {
        reply: true,
        identifier: icmp.identifier,
        sequence: icmp.sequence,
        payload: icmp.rest,
    }
    .build_vec();

    let response_mac = serializer::resolve_response_mac(eth.src_mac());
    match serializer::build_icmp_frame(device.mac, response_mac, ip.dst, ip.src, 0, &echo_reply) {
        Ok(frame) => {
            ctx.send(frame, Some(device));
            ctx.stats.incr_icmp_replies();
        }
        Err(_) => ctx.stats.incr_ser_errors(),
    }
}
