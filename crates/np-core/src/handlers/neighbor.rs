//! LLDP/CDP/EDP/FDP ingress parsing and advertisement building. CDP/EDP/FDP
//! share the Cisco-family SNAP/TLV framing over the same multicast address;
//! only the SNAP protocol id and a couple of TLV meanings differ between
//! them, so one pair of functions handles all three.

use np_packet::tlv::{self, CiscoTlvHeader, LldpTlvHeader};
use np_packet::{BuildError, EtherType, EthernetFrame, MacAddr};

use crate::device::Device;
use crate::handlers::HandlerContext;
use crate::neighbor::NeighborProtocol;
use crate::serializer;

/// LLC/SNAP header: 3-byte DSAP/SSAP/Control + 3-byte OUI + 2-byte PID.
const SNAP_HEADER_LEN: usize = 8;
const SNAP_CISCO_PREFIX: [u8; 6] = [0xaa, 0xaa, 0x03, 0x00, 0x00, 0x0c];

const CDP_SNAP_PID: u16 = 0x2000;
const EDP_SNAP_PID: u16 = 0x00e5;
const FDP_SNAP_PID: u16 = 0x2001;

/// Ingests an LLDP frame (EtherType 0x88CC). All configured devices share
/// the one simulated broadcast domain, so a sighting is recorded under each
/// of them rather than trying to guess a single "receiving" device from an
/// inherently multicast-addressed frame.
pub fn handle_lldp_ingress(ctx: &HandlerContext<'_>, eth: &EthernetFrame<'_>) {
    let tlvs = match tlv::parse_lldp_tlvs(eth.payload()) {
        Ok(tlvs) => tlvs,
        Err(_) => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };
    upsert_from_lldp_tlvs(ctx, &tlvs);
}

fn upsert_from_lldp_tlvs(ctx: &HandlerContext<'_>, tlvs: &[(LldpTlvHeader, &[u8])]) {
    let mut chassis_id = String::new();
    let mut port_id = String::new();
    let mut ttl_secs: i64 = 0;
    let mut sys_descr: Option<String> = None;

    for (header, value) in tlvs {
        match header.tlv_type {
            tlv::LLDP_TLV_CHASSIS_ID => chassis_id = subtype_string(value),
            tlv::LLDP_TLV_PORT_ID => port_id = subtype_string(value),
            tlv::LLDP_TLV_TTL if value.len() >= 2 => {
                ttl_secs = u16::from_be_bytes([value[0], value[1]]) as i64;
            }
            tlv::LLDP_TLV_SYSTEM_DESCRIPTION => {
                sys_descr = Some(String::from_utf8_lossy(value).into_owned());
            }
            _ => {}
        }
    }

    if chassis_id.is_empty() {
        return;
    }
    for device in ctx.devices.get_all() {
        ctx.neighbors.upsert(
            &device.name,
            NeighborProtocol::Lldp,
            &chassis_id,
            &port_id,
            sys_descr.clone(),
            ttl_secs,
        );
    }
    ctx.stats.incr_neighbor_advertisements_received();
}

/// LLDP chassis-id/port-id TLVs carry a one-byte subtype before the value;
/// this simulator only ever emits and expects text-ish subtypes, so the
/// subtype byte is dropped and the remainder rendered as text.
fn subtype_string(value: &[u8]) -> String {
    if value.len() <= 1 {
        return String::new();
    }
    String::from_utf8_lossy(&value[1..]).into_owned()
}

/// Ingests a SNAP-encapsulated CDP/EDP/FDP frame. `EthernetFrame::parse`
/// already stripped the 802.3 length field, so `eth.payload()` starts at the
/// LLC/SNAP header; the SNAP protocol id picks which of the three this is.
pub fn handle_cisco_ingress(ctx: &HandlerContext<'_>, eth: &EthernetFrame<'_>) {
    let payload = eth.payload();
    if payload.len() < SNAP_HEADER_LEN {
        ctx.stats.incr_malformed_drops();
        return;
    }
    let pid = u16::from_be_bytes([payload[6], payload[7]]);
    let protocol = match pid {
        CDP_SNAP_PID => NeighborProtocol::Cdp,
        EDP_SNAP_PID => NeighborProtocol::Edp,
        FDP_SNAP_PID => NeighborProtocol::Fdp,
        _ => {
            if ctx.debug.at_least(2) {
                tracing::debug!(target: "np_core::handlers::neighbor", pid, "unrecognized snap pid, dropping");
            }
            return;
        }
    };

    let tlvs = match tlv::parse_cisco_tlvs(&payload[SNAP_HEADER_LEN..]) {
        Ok(tlvs) => tlvs,
        Err(_) => {
            ctx.stats.incr_malformed_drops();
            return;
        }
    };
    upsert_from_cisco_tlvs(ctx, protocol, &tlvs);
}

fn upsert_from_cisco_tlvs(
    ctx: &HandlerContext<'_>,
    protocol: NeighborProtocol,
    tlvs: &[(CiscoTlvHeader, &[u8])],
) {
    let mut chassis_id = String::new();
    let mut port_id = String::new();
    let mut sys_descr: Option<String> = None;

    for (header, value) in tlvs {
        match header.tlv_type {
            tlv::CDP_TLV_DEVICE_ID => chassis_id = String::from_utf8_lossy(value).into_owned(),
            tlv::CDP_TLV_PORT_ID => port_id = String::from_utf8_lossy(value).into_owned(),
            tlv::CDP_TLV_PLATFORM => sys_descr = Some(String::from_utf8_lossy(value).into_owned()),
            _ => {}
        }
    }

    if chassis_id.is_empty() {
        return;
    }
    for device in ctx.devices.get_all() {
        ctx.neighbors
            .upsert(&device.name, protocol, &chassis_id, &port_id, sys_descr.clone(), 0);
    }
    ctx.stats.incr_neighbor_advertisements_received();
}

/// Builds one advertisement frame for `device` under `protocol`, for the
/// Stack's per-(device, protocol) advertiser ticker.
pub fn build_advertisement(
    device: &Device,
    protocol: NeighborProtocol,
    ttl_secs: u32,
) -> Result<Vec<u8>, BuildError> {
    let sys_descr = device
        .neighbor
        .as_ref()
        .and_then(|n| n.sys_descr.clone())
        .unwrap_or_else(|| format!("{:?} virtual device", device.device_type));

    match protocol {
        NeighborProtocol::Lldp => build_lldp_advertisement(device, &sys_descr, ttl_secs),
        NeighborProtocol::Cdp | NeighborProtocol::Edp | NeighborProtocol::Fdp => {
            build_cisco_advertisement(device, protocol, &sys_descr)
        }
    }
}

fn build_lldp_advertisement(
    device: &Device,
    sys_descr: &str,
    ttl_secs: u32,
) -> Result<Vec<u8>, BuildError> {
    let mut body = Vec::new();

    let mut chassis_value = vec![4u8]; // subtype 4: MAC address
    chassis_value.extend_from_slice(device.mac.to_string().as_bytes());
    tlv::build_lldp_tlv(tlv::LLDP_TLV_CHASSIS_ID, &chassis_value, &mut body)?;

    let mut port_value = vec![7u8]; // subtype 7: locally assigned
    port_value.extend_from_slice(device.name.as_bytes());
    tlv::build_lldp_tlv(tlv::LLDP_TLV_PORT_ID, &port_value, &mut body)?;

    let ttl = (ttl_secs.min(u16::MAX as u32) as u16).to_be_bytes();
    tlv::build_lldp_tlv(tlv::LLDP_TLV_TTL, &ttl, &mut body)?;
    tlv::build_lldp_tlv(tlv::LLDP_TLV_SYSTEM_NAME, device.name.as_bytes(), &mut body)?;
    tlv::build_lldp_tlv(tlv::LLDP_TLV_SYSTEM_DESCRIPTION, sys_descr.as_bytes(), &mut body)?;
    tlv::build_lldp_end_tlv(&mut body);

    serializer::build_layer2_frame(device.mac, MacAddr::LLDP_MULTICAST, EtherType::LLDP, &body)
}

fn build_cisco_advertisement(
    device: &Device,
    protocol: NeighborProtocol,
    sys_descr: &str,
) -> Result<Vec<u8>, BuildError> {
    let pid = match protocol {
        NeighborProtocol::Cdp => CDP_SNAP_PID,
        NeighborProtocol::Edp => EDP_SNAP_PID,
        NeighborProtocol::Fdp => FDP_SNAP_PID,
        NeighborProtocol::Lldp => unreachable!("lldp has its own builder"),
    };

    let mut tlvs = Vec::new();
    tlv::build_cisco_tlv(tlv::CDP_TLV_DEVICE_ID, device.name.as_bytes(), &mut tlvs)?;
    tlv::build_cisco_tlv(tlv::CDP_TLV_PORT_ID, b"eth0", &mut tlvs)?;
    tlv::build_cisco_tlv(tlv::CDP_TLV_PLATFORM, sys_descr.as_bytes(), &mut tlvs)?;

    let mut snap = Vec::with_capacity(SNAP_HEADER_LEN + tlvs.len());
    snap.extend_from_slice(&SNAP_CISCO_PREFIX);
    snap.extend_from_slice(&pid.to_be_bytes());
    snap.extend_from_slice(&tlvs);

    serializer::build_layer2_frame(device.mac, MacAddr::CDP_MULTICAST, EtherType::SNAP, &snap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, DeviceType, NeighborAdvertConfig};
    use crate::device_index::DeviceIndex;
    use crate::dhcp::DhcpLeaseTable;
    use crate::egress::Egress;
    use crate::neighbor::NeighborTable;
    use crate::stats::Stats;
    use np_packet::{EthernetFrameBuilder, MacAddr};
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    fn make_device() -> Device {
        Device {
            name: "r1".into(),
            device_type: DeviceType::Switch,
            mac: MacAddr([0, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]),
            ip_addresses: vec![Ipv4Addr::new(10, 0, 0, 10)],
            ftp: None,
            snmp: None,
            dhcp: None,
            neighbor: Some(NeighborAdvertConfig {
                lldp: true,
                cdp: true,
                edp: false,
                fdp: false,
                sys_descr: Some("lab switch".into()),
                interval_secs: 30,
                ttl_secs: 120,
            }),
        }
    }

    struct Harness {
        devices: DeviceIndex,
        neighbors: NeighborTable,
        leases: DhcpLeaseTable,
        stats: Stats,
        egress: Arc<Egress>,
        scheduler: crate::scheduler::Scheduler,
    }

    impl Harness {
        fn new() -> Self {
            Harness {
                devices: DeviceIndex::new(vec![make_device()]).unwrap(),
                neighbors: NeighborTable::new(),
                leases: DhcpLeaseTable::new(),
                stats: Stats::default(),
                egress: Arc::new(Egress::new(16, Arc::new(Stats::default()))),
                scheduler: crate::scheduler::Scheduler::new(),
            }
        }

        fn ctx(&self) -> HandlerContext<'_> {
            HandlerContext {
                devices: &self.devices,
                neighbors: &self.neighbors,
                leases: &self.leases,
                stats: &self.stats,
                egress: &self.egress,
                scheduler: &self.scheduler,
                debug: crate::device::DebugConfig(0),
            }
        }
    }

    #[test]
    fn lldp_advertisement_roundtrips_into_an_ingest_upsert() {
        let harness = Harness::new();
        let device = harness.devices.get_all().remove(0);
        let frame_bytes = build_advertisement(&device, NeighborProtocol::Lldp, 120).unwrap();

        let eth = EthernetFrame::parse(&frame_bytes).unwrap();
        handle_lldp_ingress(&harness.ctx(), &eth);

        let rows = harness.neighbors.list_for_device("r1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].protocol, NeighborProtocol::Lldp);
        assert_eq!(rows[0].remote_chassis_id, device.mac.to_string());
        assert_eq!(rows[0].remote_sys_descr.as_deref(), Some("lab switch"));
    }

    #[test]
    fn cdp_advertisement_roundtrips_into_an_ingest_upsert() {
        let harness = Harness::new();
        let device = harness.devices.get_all().remove(0);
        let frame_bytes = build_advertisement(&device, NeighborProtocol::Cdp, 120).unwrap();

        let eth = EthernetFrame::parse(&frame_bytes).unwrap();
        handle_cisco_ingress(&harness.ctx(), &eth);

        let rows = harness.neighbors.list_for_device("r1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].protocol, NeighborProtocol::Cdp);
        assert_eq!(rows[0].remote_chassis_id, "r1");
    }

    #[test]
    fn unrecognized_snap_pid_is_silently_dropped() {
        let harness = Harness::new();
        let mut snap = SNAP_CISCO_PREFIX.to_vec();
        snap.extend_from_slice(&0x9999u16.to_be_bytes());
        snap.extend_from_slice(b"garbage");
        let frame = EthernetFrameBuilder {
            dest_mac: MacAddr::CDP_MULTICAST,
            src_mac: MacAddr([1; 6]),
            ethertype: EtherType::SNAP,
            payload: &snap,
        }
        .build_vec()
        .unwrap();

        let eth = EthernetFrame::parse(&frame).unwrap();
        handle_cisco_ingress(&harness.ctx(), &eth);
        assert!(harness.neighbors.is_empty());
        assert_eq!(harness.stats.snapshot().malformed_drops, 0);
    }
}
