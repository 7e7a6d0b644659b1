//! SNMPv1/v2c GetRequest/GetNextRequest handling (RFC 1157, RFC 3416). Only
//! the per-device MIB surface SPEC_FULL.md names is implemented: sysName,
//! sysDescr, sysUpTime, a couple of `ifTable` stubs, and configured extras.

use np_packet::ber::{self, BerValue};
use np_packet::{EthernetFrame, Ipv4Packet, UdpDatagram};

use crate::device::Device;
use crate::handlers::{HandlerContext, SNMP_PORT};
use crate::serializer;

const SYS_NAME_OID: &str = "1.3.6.1.2.1.1.5.0";
const SYS_DESCR_OID: &str = "1.3.6.1.2.1.1.1.0";
const SYS_UPTIME_OID: &str = "1.3.6.1.2.1.1.3.0";
const IF_NUMBER_OID: &str = "1.3.6.1.2.1.2.1.0";
const IF_DESCR_1_OID: &str = "1.3.6.1.2.1.2.2.1.2.1";

/// Resolves a numeric OID against a device's (small, fixed) MIB surface.
/// Returns `None` for anything outside of it. `handle` maps that to
/// `NoSuchObject`/`noSuchName` depending on PDU version.
fn resolve_oid(device: &Device, oid: &str) -> Option<BerValue> {
    let snmp = device.snmp.as_ref()?;
    match oid {
        SYS_NAME_OID => Some(BerValue::OctetString(
            snmp.sys_name.clone().unwrap_or_else(|| device.name.clone()).into_bytes(),
        )),
        SYS_DESCR_OID => Some(BerValue::OctetString(
            snmp.sys_descr
                .clone()
                .unwrap_or_else(|| format!("{:?} virtual device", device.device_type))
                .into_bytes(),
        )),
        SYS_UPTIME_OID => Some(BerValue::Integer(0)),
        IF_NUMBER_OID => Some(BerValue::Integer(1)),
        IF_DESCR_1_OID => Some(BerValue::OctetString(b"eth0".to_vec())),
        other => snmp
            .extra_oids
            .get(other)
            .map(|v| BerValue::OctetString(v.clone().into_bytes())),
    }
}

/// All MIB OIDs this device answers, in lexicographic (dotted-decimal
/// component) order, used to resolve `GetNextRequest`.
fn ordered_oids(device: &Device) -> Vec<String> {
    let mut oids = vec![
        SYS_DESCR_OID.to_string(),
        IF_NUMBER_OID.to_string(),
        IF_DESCR_1_OID.to_string(),
        SYS_NAME_OID.to_string(),
        SYS_UPTIME_OID.to_string(),
    ];
    if let Some(snmp) = &device.snmp {
        oids.extend(snmp.extra_oids.keys().cloned());
    }
    oids.sort_by_key(|oid| ber::parse_oid(oid).unwrap_or_default());
    oids
}

pub fn handle(
    ctx: &HandlerContext<'_>,
    eth: &EthernetFrame<'_>,
    ip: &Ipv4Packet<'_>,
    udp: &UdpDatagram<'_>,
) {
    let device = match ctx.devices.get_by_ip(ip.dst).into_iter().next() {
        Some(device) => device,
        None => return,
    };
    let snmp_config = match &device.snmp {
        Some(config) => config,
        None => return,
    };

    let (message, _) = match BerValue::parse(udp.payload) {
        Ok(parsed) => parsed,
        Err(_) => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };
    let fields = match message.as_sequence() {
        Some(fields) if fields.len() >= 3 => fields,
        _ => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };
    let community = match fields[1].as_octet_string() {
        Some(bytes) => bytes,
        None => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };

    if !constant_time_eq(community, snmp_config.community.as_bytes()) {
        ctx.stats.incr_auth_failures();
        return;
    }

    let (pdu_tag, pdu_fields) = match fields[2].as_tagged() {
        Some(tagged) => tagged,
        None => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };
    let request_id = pdu_fields.first().and_then(BerValue::as_integer).unwrap_or(0);
    let varbinds = pdu_fields.get(3).and_then(BerValue::as_sequence).unwrap_or(&[]);

    const NO_ACCESS: i64 = 6;
    const NO_SUCH_NAME: i64 = 2;
    // version 0 is SNMPv1, everything else (1 = v2c) gets v2c exception
    // semantics instead of a whole-PDU error.
    let is_v1 = fields[0].as_integer() == Some(0);

    let mut error_status = if pdu_tag == ber::TAG_SET_REQUEST { NO_ACCESS } else { 0 };
    let mut error_index = 0i64;

    let response_varbinds: Vec<BerValue> = match pdu_tag {
        ber::TAG_GET_REQUEST if is_v1 => {
            let missing_index = varbinds.iter().filter_map(BerValue::as_sequence).enumerate().find_map(
                |(i, vb)| {
                    let oid = vb.first().and_then(BerValue::as_oid).unwrap_or(&[]);
                    let oid_str = ber::format_oid(oid);
                    (resolve_oid(&device, &oid_str).is_none()).then_some(i as i64 + 1)
                },
            );
            match missing_index {
                Some(index) => {
                    error_status = NO_SUCH_NAME;
                    error_index = index;
                    varbinds.to_vec()
                }
                None => varbinds
                    .iter()
                    .filter_map(BerValue::as_sequence)
                    .map(|vb| {
                        let oid = vb.first().and_then(BerValue::as_oid).unwrap_or(&[]);
                        let oid_str = ber::format_oid(oid);
                        let value = resolve_oid(&device, &oid_str).unwrap_or(BerValue::Null);
                        BerValue::Sequence(vec![BerValue::ObjectIdentifier(oid.to_vec()), value])
                    })
                    .collect(),
            }
        }
        ber::TAG_GET_REQUEST => varbinds
            .iter()
            .filter_map(BerValue::as_sequence)
            .map(|vb| {
                let oid = vb.first().and_then(BerValue::as_oid).unwrap_or(&[]);
                let oid_str = ber::format_oid(oid);
                let value = resolve_oid(&device, &oid_str)
                    .unwrap_or(BerValue::ExceptionValue(ber::TAG_NO_SUCH_OBJECT));
                BerValue::Sequence(vec![BerValue::ObjectIdentifier(oid.to_vec()), value])
            })
            .collect(),
        ber::TAG_GET_NEXT_REQUEST => {
            let all = ordered_oids(&device);
            varbinds
                .iter()
                .filter_map(BerValue::as_sequence)
                .map(|vb| {
                    let oid = vb.first().and_then(BerValue::as_oid).unwrap_or(&[]);
                    let next = all.iter().find(|candidate| {
                        ber::parse_oid(candidate).map(|v| v.as_slice() > oid).unwrap_or(false)
                    });
                    match next {
                        Some(next_oid) => {
                            let value = resolve_oid(&device, next_oid).unwrap_or(BerValue::Null);
                            let parsed = ber::parse_oid(next_oid).unwrap_or_default();
                            BerValue::Sequence(vec![BerValue::ObjectIdentifier(parsed), value])
                        }
                        None => BerValue::Sequence(vec![
                            BerValue::ObjectIdentifier(oid.to_vec()),
                            BerValue::Null,
                        ]),
                    }
                })
                .collect()
        }
        ber::TAG_SET_REQUEST => varbinds.to_vec(),
        _ => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };

    ctx.stats.incr_snmp_queries();

    let response_pdu = BerValue::Tagged(
        ber::TAG_GET_RESPONSE,
        vec![
            BerValue::Integer(request_id),
            BerValue::Integer(error_status),
            BerValue::Integer(error_index),
            BerValue::Sequence(response_varbinds),
        ],
    );
    let response_message = BerValue::Sequence(vec![
        fields[0].clone(),
        BerValue::OctetString(snmp_config.community.as_bytes().to_vec()),
        response_pdu,
    ]);
    let response_bytes = response_message.encode();

    let response_mac = serializer::resolve_response_mac(eth.src_mac());
    match serializer::build_udp_frame(
        device.mac,
        response_mac,
        ip.dst,
        ip.src,
        0,
        SNMP_PORT,
        udp.src_port,
        &response_bytes,
    ) {
        Ok(frame) => {
            ctx.send(frame, Some(device));
        }
        Err(_) => ctx.stats.incr_ser_errors(),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
