//! Generic UDP/TCP fallthrough plus the minimal mDNS stub. `GenericUdpHits`
//! and `GenericTcpHits` for ports claimed by no named protocol are
//! incremented directly in the dispatch demux; this module only holds the
//! mDNS decoder, since that wire format needs its own small parser that
//! doesn't belong in `np-packet` (the distilled scope only asked for one
//! query type, not a DNS library).

use np_packet::{EthernetFrame, Ipv4Packet, UdpDatagram};

use crate::handlers::{HandlerContext, MDNS_PORT};
use crate::serializer;

const DNS_HEADER_LEN: usize = 12;
const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;
const MDNS_ANSWER_TTL: u32 = 120;

struct Question {
    name: String,
    qtype: u16,
    qclass: u16,
    /// Byte length of the encoded QNAME (labels + terminating zero byte),
    /// not counting QTYPE/QCLASS -- needed to slice the raw name back out
    /// for echoing into the answer record without re-encoding it.
    encoded_name_len: usize,
}

fn parse_question(buf: &[u8]) -> Option<Question> {
    let mut pos = 0;
    let mut labels = Vec::new();
    loop {
        let len = *buf.get(pos)? as usize;
        if len == 0 {
            pos += 1;
            break;
        }
        if len > 63 || pos + 1 + len > buf.len() {
            return None;
        }
        labels.push(String::from_utf8_lossy(&buf[pos + 1..pos + 1 + len]).into_owned());
        pos += 1 + len;
    }
    if pos + 4 > buf.len() {
        return None;
    }
    let qtype = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
    let qclass = u16::from_be_bytes([buf[pos + 2], buf[pos + 3]]);
    Some(Question {
        name: labels.join("."),
        qtype,
        qclass,
        encoded_name_len: pos,
    })
}

/// Answers an A-record query for `<device name>.local` with that device's
/// primary IP. Anything else on the mDNS multicast group -- other record
/// types, other names, multi-question messages -- is counted as a generic
/// UDP hit and dropped, matching the "not every port gets a personality"
/// posture the rest of the generic bucket has.
pub fn handle_mdns(
    ctx: &HandlerContext<'_>,
    eth: &EthernetFrame<'_>,
    ip: &Ipv4Packet<'_>,
    udp: &UdpDatagram<'_>,
) {
    if udp.payload.len() < DNS_HEADER_LEN {
        ctx.stats.incr_malformed_drops();
        return;
    }
    let id = u16::from_be_bytes([udp.payload[0], udp.payload[1]]);
    let qdcount = u16::from_be_bytes([udp.payload[4], udp.payload[5]]);
    if qdcount != 1 {
        ctx.stats.incr_generic_udp_hits();
        return;
    }

    let question_bytes = &udp.payload[DNS_HEADER_LEN..];
    let question = match parse_question(question_bytes) {
        Some(question) => question,
        None => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };

    if question.qtype != TYPE_A || question.qclass != CLASS_IN {
        ctx.stats.incr_generic_udp_hits();
        return;
    }
    // The query is addressed to the multicast group, not any device's own
    // IP, so the responding device is found by matching its `.local` name
    // against the question instead of by `DeviceIndex::get_by_ip`.
    let queried_name = question.name.to_ascii_lowercase();
    let device = ctx
        .devices
        .get_all()
        .into_iter()
        .find(|d| format!("{}.local", d.name).to_ascii_lowercase() == queried_name);
    let Some(device) = device else {
        ctx.stats.incr_generic_udp_hits();
        return;
    };
    let Some(device_ip) = device.primary_ip() else {
        ctx.stats.incr_generic_udp_hits();
        return;
    };

    let raw_name = &question_bytes[..question.encoded_name_len];
    let question_total_len = question.encoded_name_len + 4;

    let mut response = Vec::with_capacity(udp.payload.len() + raw_name.len() + 14);
    response.extend_from_slice(&id.to_be_bytes());
    response.extend_from_slice(&[0x84, 0x00]); // QR=1, AA=1, RCODE=0
    response.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    response.extend_from_slice(&1u16.to_be_bytes()); // ANCOUNT
    response.extend_from_slice(&0u16.to_be_bytes()); // NSCOUNT
    response.extend_from_slice(&0u16.to_be_bytes()); // ARCOUNT
    response.extend_from_slice(&question_bytes[..question_total_len]); // echoed question
    response.extend_from_slice(raw_name);
    response.extend_from_slice(&TYPE_A.to_be_bytes());
    response.extend_from_slice(&CLASS_IN.to_be_bytes());
    response.extend_from_slice(&MDNS_ANSWER_TTL.to_be_bytes());
    response.extend_from_slice(&4u16.to_be_bytes()); // RDLENGTH
    response.extend_from_slice(&device_ip.octets());

    let response_mac = serializer::resolve_response_mac(eth.src_mac());
    match serializer::build_udp_frame(
        device.mac,
        response_mac,
        device_ip,
        ip.src,
        0,
        MDNS_PORT,
        udp.src_port,
        &response,
    ) {
        Ok(frame) => {
            ctx.send(frame, Some(device));
        }
        Err(_) => ctx.stats.incr_ser_errors(),
    }
}
