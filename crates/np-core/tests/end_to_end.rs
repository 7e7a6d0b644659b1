//! Concrete end-to-end scenarios exercised through the full dispatch demux
//! (`np_core::handlers::dispatch`), one device configuration at a time,
//! matching the device/value choices used to describe each scenario.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use np_core::dhcp::DhcpLeaseTable;
use np_core::device::{
    Config, Device, DeviceType, DhcpPoolConfig, FtpConfig, SnmpConfig,
};
use np_core::device_index::DeviceIndex;
use np_core::egress::Egress;
use np_core::handlers::{self, HandlerContext};
use np_core::neighbor::NeighborTable;
use np_core::packet::Packet;
use np_core::stats::Stats;
use np_packet::ber::{self, BerValue};
use np_packet::{
    EtherType, EthernetFrame, EthernetFrameBuilder, IcmpEchoBuilder, Ipv4Packet,
    Ipv4PacketBuilder, Ipv4Protocol, MacAddr, TcpFlags, TcpSegment, TcpSegmentBuilder,
    UdpDatagram, UdpPacketBuilder,
};

struct Harness {
    devices: DeviceIndex,
    neighbors: NeighborTable,
    leases: DhcpLeaseTable,
    stats: Stats,
    egress: Arc<Egress>,
    scheduler: np_core::scheduler::Scheduler,
}

impl Harness {
    fn new(devices: Vec<Device>) -> Self {
        Harness {
            devices: DeviceIndex::new(devices).unwrap(),
            neighbors: NeighborTable::new(),
            leases: DhcpLeaseTable::new(),
            stats: Stats::default(),
            egress: Arc::new(Egress::new(64, Arc::new(Stats::default()))),
            scheduler: np_core::scheduler::Scheduler::new(),
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
            debug: np_core::device::DebugConfig(0),
        }
    }

    fn dispatch(&self, frame: &[u8]) {
        handlers::dispatch(&self.ctx(), frame);
    }

    fn drain(&self, timeout: Duration) -> Option<Packet> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(packet) = self.egress.drain_one() {
                return Some(packet);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

fn wrap_udp(
    src_mac: MacAddr,
    dst_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let udp = UdpPacketBuilder { src_port, dst_port, payload }
        .build_vec(src_ip, dst_ip)
        .unwrap();
    let ip_bytes = Ipv4PacketBuilder::serialize(src_ip, dst_ip, Ipv4Protocol::UDP, 0, 64, &udp);
    EthernetFrameBuilder { dest_mac: dst_mac, src_mac, ethertype: EtherType::IPV4, payload: &ip_bytes }
        .build_vec()
        .unwrap()
}

fn wrap_tcp(
    src_mac: MacAddr,
    dst_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    seq: u32,
    ack: u32,
    flags: TcpFlags,
    payload: &[u8],
) -> Vec<u8> {
    let tcp = TcpSegmentBuilder {
        src_port,
        dst_port,
        seq_number: seq,
        ack_number: ack,
        flags,
        window_size: 65535,
        urgent_pointer: 0,
        options: &[],
        payload,
    }
    .build_vec(src_ip, dst_ip)
    .unwrap();
    let ip_bytes = Ipv4PacketBuilder::serialize(src_ip, dst_ip, Ipv4Protocol::TCP, 0, 64, &tcp);
    EthernetFrameBuilder { dest_mac: dst_mac, src_mac, ethertype: EtherType::IPV4, payload: &ip_bytes }
        .build_vec()
        .unwrap()
}

fn payload_of(packet: &Packet) -> Vec<u8> {
    let eth = EthernetFrame::parse(&packet.buffer).unwrap();
    let ip = Ipv4Packet::parse(eth.payload()).unwrap();
    match ip.protocol {
        Ipv4Protocol::TCP => TcpSegment::parse(ip.payload).unwrap().payload.to_vec(),
        Ipv4Protocol::UDP => UdpDatagram::parse(ip.payload).unwrap().payload.to_vec(),
        _ => ip.payload.to_vec(),
    }
}

fn router_device() -> Device {
    Device {
        name: "r1".into(),
        device_type: DeviceType::Router,
        mac: MacAddr([0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]),
        ip_addresses: vec![Ipv4Addr::new(10, 0, 0, 10)],
        ftp: None,
        snmp: None,
        dhcp: None,
        neighbor: None,
    }
}

/// E1 -- ICMP echo.
#[test]
fn e1_icmp_echo_reply_mirrors_identifier_sequence_and_payload() {
    let harness = Harness::new(vec![router_device()]);
    let client_mac = MacAddr([1; 6]);
    let echo = IcmpEchoBuilder { reply: false, identifier: 1, sequence: 7, payload: b"abcd" }.build_vec();
    let ip_bytes =
        Ipv4PacketBuilder::serialize(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 10), Ipv4Protocol::ICMP, 0, 64, &echo);
    let frame = EthernetFrameBuilder {
        dest_mac: MacAddr([0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]),
        src_mac: client_mac,
        ethertype: EtherType::IPV4,
        payload: &ip_bytes,
    }
    .build_vec()
    .unwrap();

    harness.dispatch(&frame);

    let reply = harness.egress.drain_one().expect("echo reply");
    let eth = EthernetFrame::parse(&reply.buffer).unwrap();
    assert_eq!(eth.src_mac(), MacAddr([0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]));
    let ip = Ipv4Packet::parse(eth.payload()).unwrap();
    assert_eq!(ip.src, Ipv4Addr::new(10, 0, 0, 10));
    assert_eq!(ip.dst, Ipv4Addr::new(10, 0, 0, 5));
    let icmp = np_packet::IcmpPacket::parse(ip.payload).unwrap();
    assert_eq!(icmp.identifier, 1);
    assert_eq!(icmp.sequence, 7);
    assert_eq!(icmp.rest, b"abcd");
    assert_eq!(harness.stats.snapshot().icmp_replies, 1);
}

/// E2 -- SNMP GET sysName.
#[test]
fn e2_snmp_get_returns_configured_sys_name() {
    let device = Device {
        snmp: Some(SnmpConfig {
            community: "public".into(),
            sys_name: Some("snmp-device".into()),
            sys_descr: None,
            extra_oids: Default::default(),
        }),
        ..router_device()
    };
    let harness = Harness::new(vec![device]);

    let varbind = BerValue::Sequence(vec![
        BerValue::ObjectIdentifier(ber::parse_oid("1.3.6.1.2.1.1.5.0").unwrap()),
        BerValue::Null,
    ]);
    let pdu = BerValue::Tagged(
        ber::TAG_GET_REQUEST,
        vec![BerValue::Integer(99), BerValue::Integer(0), BerValue::Integer(0), BerValue::Sequence(vec![varbind])],
    );
    let message = BerValue::Sequence(vec![BerValue::Integer(1), BerValue::OctetString(b"public".to_vec()), pdu]).encode();
    let frame = wrap_udp(MacAddr([1; 6]), MacAddr([0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]), Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 10), 40000, 161, &message);

    harness.dispatch(&frame);

    assert_eq!(harness.stats.snapshot().snmp_queries, 1);
    let reply = harness.egress.drain_one().expect("snmp reply");
    let eth = EthernetFrame::parse(&reply.buffer).unwrap();
    let ip = Ipv4Packet::parse(eth.payload()).unwrap();
    let udp = UdpDatagram::parse(ip.payload).unwrap();
    assert_eq!(udp.src_port, 161);
    assert_eq!(udp.dst_port, 40000);
    let (parsed, _) = BerValue::parse(udp.payload).unwrap();
    let fields = parsed.as_sequence().unwrap();
    let (_, pdu_fields) = fields[2].as_tagged().unwrap();
    let varbinds = pdu_fields[3].as_sequence().unwrap();
    let value = varbinds[0].as_sequence().unwrap()[1].as_octet_string().unwrap();
    assert_eq!(value, b"snmp-device");
}

/// E3 -- SNMP wrong community.
#[test]
fn e3_snmp_wrong_community_is_silent_auth_failure() {
    let device = Device {
        snmp: Some(SnmpConfig {
            community: "public".into(),
            sys_name: Some("snmp-device".into()),
            sys_descr: None,
            extra_oids: Default::default(),
        }),
        ..router_device()
    };
    let harness = Harness::new(vec![device]);

    let varbind = BerValue::Sequence(vec![
        BerValue::ObjectIdentifier(ber::parse_oid("1.3.6.1.2.1.1.5.0").unwrap()),
        BerValue::Null,
    ]);
    let pdu = BerValue::Tagged(
        ber::TAG_GET_REQUEST,
        vec![BerValue::Integer(1), BerValue::Integer(0), BerValue::Integer(0), BerValue::Sequence(vec![varbind])],
    );
    let message = BerValue::Sequence(vec![BerValue::Integer(1), BerValue::OctetString(b"private".to_vec()), pdu]).encode();
    let frame = wrap_udp(MacAddr([1; 6]), MacAddr([0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]), Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 10), 40000, 161, &message);

    harness.dispatch(&frame);

    assert!(harness.egress.drain_one().is_none());
    assert_eq!(harness.stats.snapshot().auth_failures, 1);
    assert_eq!(harness.stats.snapshot().snmp_queries, 0);
}

/// E4 -- FTP welcome banner then SYST.
#[test]
fn e4_ftp_welcome_banner_then_syst_reply() {
    let device = Device {
        name: "ftp1".into(),
        ip_addresses: vec![Ipv4Addr::new(10, 0, 0, 11)],
        ftp: Some(FtpConfig { system_type: None, welcome_banner: Some("220 hi\r\n".into()) }),
        ..router_device()
    };
    let harness = Harness::new(vec![device]);
    let client_mac = MacAddr([2; 6]);

    let syn = wrap_tcp(client_mac, MacAddr([0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]), Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 11), 50000, 21, 1000, 0, TcpFlags::SYN, &[]);
    harness.dispatch(&syn);

    let synack = harness.drain(Duration::from_millis(50)).expect("syn-ack");
    let eth = EthernetFrame::parse(&synack.buffer).unwrap();
    let ip = Ipv4Packet::parse(eth.payload()).unwrap();
    let tcp = TcpSegment::parse(ip.payload).unwrap();
    assert!(tcp.flags.contains(TcpFlags::SYN | TcpFlags::ACK));

    let banner = harness.drain(Duration::from_millis(500)).expect("welcome banner");
    assert_eq!(payload_of(&banner), b"220 hi\r\n");

    let syst = wrap_tcp(client_mac, MacAddr([0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]), Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 11), 50000, 21, 1001, 1, TcpFlags::PSH | TcpFlags::ACK, b"SYST\r\n");
    harness.dispatch(&syst);
    let reply = harness.egress.drain_one().expect("syst reply");
    assert!(payload_of(&reply).starts_with(b"215 UNIX Type: L8\r\n"));

    harness.scheduler.stop();
}

/// E5 -- Reload: device set swaps atomically and lookups track the new set.
#[test]
fn e5_reload_swaps_device_set_and_routes_to_new_devices_only() {
    let alpha = Device { name: "alpha".into(), ip_addresses: vec![Ipv4Addr::new(10, 0, 0, 1)], mac: MacAddr([10; 6]), ..router_device() };
    let devices = DeviceIndex::new(vec![alpha]).unwrap();
    assert_eq!(devices.count(), 1);

    let beta = Device { name: "beta".into(), ip_addresses: vec![Ipv4Addr::new(10, 0, 1, 1)], mac: MacAddr([11; 6]), ..router_device() };
    let gamma = Device { name: "gamma".into(), ip_addresses: vec![Ipv4Addr::new(10, 0, 2, 1)], mac: MacAddr([12; 6]), ..router_device() };
    devices.reload(vec![beta, gamma]).unwrap();
    assert_eq!(devices.count(), 2);

    assert!(devices.get_by_ip(Ipv4Addr::new(10, 0, 0, 1)).is_empty());
    let found = devices.get_by_ip(Ipv4Addr::new(10, 0, 1, 1));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "beta");
}

/// E6 -- neighbor expiry.
#[test]
fn e6_neighbor_entry_expires_after_one_cleanup_cycle_past_ttl() {
    use np_core::neighbor::NeighborProtocol;

    let neighbors = NeighborTable::new();
    neighbors.upsert("r1", NeighborProtocol::Lldp, "chassis-1", "Gi0/1", None, 1);
    assert_eq!(neighbors.list().len(), 1);

    std::thread::sleep(Duration::from_secs(2));
    let removed = neighbors.cleanup_expired();
    assert_eq!(removed, 1);
    assert!(neighbors.list().is_empty());
}

/// E7 -- DHCP full cycle through the demux, including the wrong-server-id NAK.
#[test]
fn e7_dhcp_discover_offer_request_ack_then_nak_on_wrong_server() {
    let device = Device {
        name: "dhcp1".into(),
        ip_addresses: vec![Ipv4Addr::new(10, 0, 5, 1)],
        dhcp: Some(DhcpPoolConfig { start: Ipv4Addr::new(10, 0, 5, 100), end: Ipv4Addr::new(10, 0, 5, 110), lease_ttl_secs: 3600 }),
        ..router_device()
    };
    let harness = Harness::new(vec![device]);
    let client_mac = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

    let discover = dhcp_message(1, client_mac, 1, None, None);
    harness.dispatch(&wrap_udp(client_mac, MacAddr::BROADCAST, Ipv4Addr::UNSPECIFIED, Ipv4Addr::BROADCAST, 68, 67, &discover));
    let offer = harness.egress.drain_one().expect("offer");
    let offered_ip = offered_ip_from(&offer);
    assert!(offered_ip >= Ipv4Addr::new(10, 0, 5, 100) && offered_ip <= Ipv4Addr::new(10, 0, 5, 110));

    let request = dhcp_message(3, client_mac, 3, Some(offered_ip), Some(Ipv4Addr::new(10, 0, 5, 1)));
    harness.dispatch(&wrap_udp(client_mac, MacAddr::BROADCAST, Ipv4Addr::UNSPECIFIED, Ipv4Addr::BROADCAST, 68, 67, &request));
    assert_eq!(harness.stats.snapshot().dhcp_acks, 1);
    assert!(harness.egress.drain_one().is_some());

    let wrong_server = dhcp_message(5, client_mac, 3, Some(Ipv4Addr::new(10, 0, 5, 101)), Some(Ipv4Addr::new(10, 0, 5, 254)));
    harness.dispatch(&wrap_udp(client_mac, MacAddr::BROADCAST, Ipv4Addr::UNSPECIFIED, Ipv4Addr::BROADCAST, 68, 67, &wrong_server));
    assert_eq!(harness.stats.snapshot().dhcp_naks, 1);
}

const DHCP_FIXED_FIELDS_LEN: usize = 236;

fn dhcp_message(msg_type: u8, chaddr: MacAddr, xid: u32, requested_ip: Option<Ipv4Addr>, server_id: Option<Ipv4Addr>) -> Vec<u8> {
    let mut out = vec![0u8; DHCP_FIXED_FIELDS_LEN];
    out[0] = 1; // BOOTREQUEST
    out[1] = 1;
    out[2] = 6;
    out[4..8].copy_from_slice(&xid.to_be_bytes());
    out[28..34].copy_from_slice(&chaddr.0);
    out.extend_from_slice(&[99, 130, 83, 99]);
    out.push(53);
    out.push(1);
    out.push(msg_type);
    if let Some(ip) = requested_ip {
        out.push(50);
        out.push(4);
        out.extend_from_slice(&ip.octets());
    }
    if let Some(ip) = server_id {
        out.push(54);
        out.push(4);
        out.extend_from_slice(&ip.octets());
    }
    out.push(255);
    out
}

fn offered_ip_from(packet: &Packet) -> Ipv4Addr {
    let eth = EthernetFrame::parse(&packet.buffer).unwrap();
    let ip = Ipv4Packet::parse(eth.payload()).unwrap();
    let udp = UdpDatagram::parse(ip.payload).unwrap();
    Ipv4Addr::new(udp.payload[16], udp.payload[17], udp.payload[18], udp.payload[19])
}

/// Sanity check that the top-level `Config` deserializes a whole device list
/// the way a loaded config file would, since the scenarios above build
/// `Device` values directly rather than round-tripping through `serde`.
#[test]
fn config_json_round_trip_preserves_a_full_device_list() {
    let config = Config { devices: vec![router_device()] };
    let json = serde_json::to_string(&config).unwrap();
    let parsed: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.devices.len(), 1);
    assert_eq!(parsed.devices[0].name, "r1");
}
