//! DHCPv4 (RFC 2131) message handling: DISCOVER/OFFER, REQUEST/ACK/NAK, and
//! RELEASE/DECLINE. The wire format here is small enough that it's encoded
//! and decoded directly rather than through a shared `np-packet` module.

use std::net::Ipv4Addr;
use std::time::Duration;

use np_packet::{EthernetFrame, Ipv4Packet, MacAddr, UdpDatagram};

use crate::handlers::{HandlerContext, DHCP_CLIENT_PORT, DHCP_SERVER_PORT};
use crate::serializer;

const BOOTREQUEST: u8 = 1;
const BOOTREPLY: u8 = 2;
const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
const FIXED_FIELDS_LEN: usize = 236; // op..file, before the magic cookie

const OPT_PAD: u8 = 0;
const OPT_REQUESTED_IP: u8 = 50;
const OPT_LEASE_TIME: u8 = 51;
const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_SERVER_ID: u8 = 54;
const OPT_END: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageType {
    Discover,
    Offer,
    Request,
    Ack,
    Nak,
    Release,
    Decline,
    Other(u8),
}

impl MessageType {
    fn from_wire(v: u8) -> Self {
        match v {
            1 => MessageType::Discover,
            2 => MessageType::Offer,
            3 => MessageType::Request,
            4 => MessageType::Decline,
            5 => MessageType::Ack,
            6 => MessageType::Nak,
            7 => MessageType::Release,
            other => MessageType::Other(other),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            MessageType::Discover => 1,
            MessageType::Offer => 2,
            MessageType::Request => 3,
            MessageType::Decline => 4,
            MessageType::Ack => 5,
            MessageType::Nak => 6,
            MessageType::Release => 7,
            MessageType::Other(v) => v,
        }
    }
}

struct ParsedMessage {
    xid: u32,
    chaddr: MacAddr,
    message_type: MessageType,
    requested_ip: Option<Ipv4Addr>,
    server_id: Option<Ipv4Addr>,
}

fn parse(payload: &[u8]) -> Option<ParsedMessage> {
    if payload.len() < FIXED_FIELDS_LEN + 4 {
        return None;
    }
    if payload[0] != BOOTREQUEST {
        return None;
    }
    let xid = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let chaddr = MacAddr([
        payload[28], payload[29], payload[30], payload[31], payload[32], payload[33],
    ]);
    if payload[FIXED_FIELDS_LEN..FIXED_FIELDS_LEN + 4] != MAGIC_COOKIE {
        return None;
    }

    let mut message_type = None;
    let mut requested_ip = None;
    let mut server_id = None;
    let mut rest = &payload[FIXED_FIELDS_LEN + 4..];
    while let Some(&tag) = rest.first() {
        if tag == OPT_END || tag == OPT_PAD {
            rest = &rest[1..];
            continue;
        }
        if rest.len() < 2 {
            break;
        }
        let len = rest[1] as usize;
        if rest.len() < 2 + len {
            break;
        }
        let value = &rest[2..2 + len];
        match tag {
            OPT_MESSAGE_TYPE if len == 1 => message_type = Some(MessageType::from_wire(value[0])),
            OPT_REQUESTED_IP if len == 4 => {
                requested_ip = Some(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            }
            OPT_SERVER_ID if len == 4 => {
                server_id = Some(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            }
            _ => {}
        }
        rest = &rest[2 + len..];
    }

    Some(ParsedMessage {
        xid,
        chaddr,
        message_type: message_type?,
        requested_ip,
        server_id,
    })
}

#[allow(clippy::too_many_arguments)]
fn build_reply(
    xid: u32,
    chaddr: MacAddr,
    yiaddr: Ipv4Addr,
    server_ip: Ipv4Addr,
    message_type: MessageType,
    lease_secs: u32,
) -> Vec<u8> {
    let mut out = vec![0u8; FIXED_FIELDS_LEN];
    out[0] = BOOTREPLY;
    out[1] = 1; // htype ethernet
    out[2] = 6; // hlen
    out[4..8].copy_from_slice(&xid.to_be_bytes());
    out[16..20].copy_from_slice(&yiaddr.octets());
    out[20..24].copy_from_slice(&server_ip.octets());
    out[28..34].copy_from_slice(&chaddr.0);
    out.extend_from_slice(&MAGIC_COOKIE);
    out.push(OPT_MESSAGE_TYPE);
    out.push(1);
    out.push(message_type.to_wire());
    if message_type != MessageType::Nak {
        out.push(OPT_LEASE_TIME);
        out.push(4);
        out.extend_from_slice(&lease_secs.to_be_bytes());
    }
    out.push(OPT_SERVER_ID);
    out.push(4);
    out.extend_from_slice(&server_ip.octets());
    out.push(OPT_END);
    out
}

pub fn handle(
    ctx: &HandlerContext<'_>,
    eth: &EthernetFrame<'_>,
    ip: &Ipv4Packet<'_>,
    udp: &UdpDatagram<'_>,
) {
    let message = match parse(udp.payload) {
        Some(message) => message,
        None => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };

    let device = match ctx.devices.get_by_ip(ip.dst).into_iter().next() {
        Some(device) => device,
        None => return,
    };
    let pool = match &device.dhcp {
        Some(pool) => *pool,
        None => return,
    };
    let server_ip = match device.primary_ip() {
        Some(ip) => ip,
        None => return,
    };
    let ttl = Duration::from_secs(pool.lease_ttl_secs);
    let response_mac = serializer::resolve_response_mac(eth.src_mac());

    let reply_bytes = match message.message_type {
        MessageType::Discover => {
            ctx.stats.incr_dhcp_discovers();
            match ctx.leases.allocate(&device.name, message.chaddr, pool.iter(), ttl) {
                Some(offered) => {
                    ctx.stats.incr_dhcp_offers();
                    Some(build_reply(
                        message.xid,
                        message.chaddr,
                        offered,
                        server_ip,
                        MessageType::Offer,
                        pool.lease_ttl_secs as u32,
                    ))
                }
                None => None, // pool exhausted, no offer to make
            }
        }
        MessageType::Request => {
            ctx.stats.incr_dhcp_requests();
            let server_matches = message.server_id.map_or(true, |s| s == server_ip);
            let requested = message.requested_ip;
            match requested {
                Some(requested_ip)
                    if server_matches
                        && ctx.leases.bind(&device.name, message.chaddr, requested_ip, ttl) =>
                {
                    ctx.stats.incr_dhcp_acks();
                    Some(build_reply(
                        message.xid,
                        message.chaddr,
                        requested_ip,
                        server_ip,
                        MessageType::Ack,
                        pool.lease_ttl_secs as u32,
                    ))
                }
                _ => {
                    ctx.stats.incr_dhcp_naks();
                    Some(build_reply(
                        message.xid,
                        message.chaddr,
                        Ipv4Addr::UNSPECIFIED,
                        server_ip,
                        MessageType::Nak,
                        0,
                    ))
                }
            }
        }
        MessageType::Release | MessageType::Decline => {
            ctx.leases.release(&device.name, message.chaddr);
            None
        }
        MessageType::Offer | MessageType::Ack | MessageType::Nak | MessageType::Other(_) => None,
    };

    let Some(reply) = reply_bytes else {
        return;
    };

    match serializer::build_udp_frame(
        device.mac,
        response_mac,
        server_ip,
        Ipv4Addr::BROADCAST,
        0,
        DHCP_SERVER_PORT,
        DHCP_CLIENT_PORT,
        &reply,
    ) {
        Ok(frame) => {
            ctx.send(frame, Some(device));
        }
        Err(_) => ctx.stats.incr_ser_errors(),
    }
}
