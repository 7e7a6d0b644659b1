use std::net::Ipv4Addr;

use crate::error::{BuildError, ParseError};
use crate::mac::MacAddr;

pub const ARP_HW_ETHERNET: u16 = 1;
pub const ARP_PROTO_IPV4: u16 = 0x0800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
    Other(u16),
}

impl ArpOperation {
    fn to_wire(self) -> u16 {
        match self {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
            ArpOperation::Other(v) => v,
        }
    }

    fn from_wire(v: u16) -> Self {
        match v {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            other => ArpOperation::Other(other),
        }
    }
}

/// A parsed Ethernet/IPv4 ARP packet (RFC 826).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub op: ArpOperation,
    pub sender_hw: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_hw: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub const WIRE_LEN: usize = 28;

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < Self::WIRE_LEN {
            return Err(ParseError::TooShort {
                needed: Self::WIRE_LEN,
                got: buf.len(),
            });
        }
        let htype = u16::from_be_bytes([buf[0], buf[1]]);
        let ptype = u16::from_be_bytes([buf[2], buf[3]]);
        let hlen = buf[4];
        let plen = buf[5];
        if htype != ARP_HW_ETHERNET || ptype != ARP_PROTO_IPV4 || hlen != 6 || plen != 4 {
            return Err(ParseError::Unsupported {
                field: "arp hardware/protocol type",
                value: (u32::from(htype) << 16) | u32::from(ptype),
            });
        }
        let op = ArpOperation::from_wire(u16::from_be_bytes([buf[6], buf[7]]));
        let sender_hw = MacAddr([buf[8], buf[9], buf[10], buf[11], buf[12], buf[13]]);
        let sender_ip = Ipv4Addr::new(buf[14], buf[15], buf[16], buf[17]);
        let target_hw = MacAddr([buf[18], buf[19], buf[20], buf[21], buf[22], buf[23]]);
        let target_ip = Ipv4Addr::new(buf[24], buf[25], buf[26], buf[27]);
        Ok(ArpPacket {
            op,
            sender_hw,
            sender_ip,
            target_hw,
            target_ip,
        })
    }

    pub fn opcode(&self) -> ArpOperation {
        self.op
    }

    pub fn sender_mac(&self) -> Option<MacAddr> {
        Some(self.sender_hw)
    }

    pub fn sender_ip(&self) -> Option<Ipv4Addr> {
        Some(self.sender_ip)
    }

    pub fn target_mac(&self) -> Option<MacAddr> {
        Some(self.target_hw)
    }

    pub fn target_ip(&self) -> Option<Ipv4Addr> {
        Some(self.target_ip)
    }

    pub fn serialize(&self) -> [u8; Self::WIRE_LEN] {
        let mut out = [0u8; Self::WIRE_LEN];
        out[0..2].copy_from_slice(&ARP_HW_ETHERNET.to_be_bytes());
        out[2..4].copy_from_slice(&ARP_PROTO_IPV4.to_be_bytes());
        out[4] = 6;
        out[5] = 4;
        out[6..8].copy_from_slice(&self.op.to_wire().to_be_bytes());
        out[8..14].copy_from_slice(&self.sender_hw.0);
        out[14..18].copy_from_slice(&self.sender_ip.octets());
        out[18..24].copy_from_slice(&self.target_hw.0);
        out[24..28].copy_from_slice(&self.target_ip.octets());
        out
    }
}

/// Ergonomic named-field constructor mirroring `ArpPacket`, kept distinct so
/// callers that think in terms of "opcode" (matching ARP_OP_* constants) read
/// naturally next to parsed responses.
pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

pub struct ArpPacketBuilder {
    pub opcode: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacketBuilder {
    pub fn build_vec(&self) -> Result<Vec<u8>, BuildError> {
        let pkt = ArpPacket {
            op: ArpOperation::from_wire(self.opcode),
            sender_hw: self.sender_mac,
            sender_ip: self.sender_ip,
            target_hw: self.target_mac,
            target_ip: self.target_ip,
        };
        Ok(pkt.serialize().to_vec())
    }
}
