use crate::error::{BuildError, ParseError};
use crate::mac::MacAddr;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const MAX_ETHERNET_FRAME_LEN: usize = 1514;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EtherType(pub u16);

impl EtherType {
    pub const IPV4: EtherType = EtherType(0x0800);
    pub const ARP: EtherType = EtherType(0x0806);
    pub const IPV6: EtherType = EtherType(0x86dd);
    pub const LLDP: EtherType = EtherType(0x88cc);
    /// CDP/EDP/FDP are not carried in the EtherType; they ride inside an 802.3
    /// length field + LLC/SNAP header. This value is never on the wire, it's a
    /// marker `EthernetFrame::ethertype()` returns for a parsed SNAP frame.
    pub const SNAP: EtherType = EtherType(0x0000);
}

/// A parsed, borrowed view of an Ethernet II frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame<'a> {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: EtherType,
    pub payload: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, ParseError> {
        if buf.len() < ETHERNET_HEADER_LEN {
            return Err(ParseError::TooShort {
                needed: ETHERNET_HEADER_LEN,
                got: buf.len(),
            });
        }
        let dst = MacAddr([buf[0], buf[1], buf[2], buf[3], buf[4], buf[5]]);
        let src = MacAddr([buf[6], buf[7], buf[8], buf[9], buf[10], buf[11]]);
        let ethertype_or_len = u16::from_be_bytes([buf[12], buf[13]]);
        // Values <= 1500 are an 802.3 length field (LLC/SNAP payload, used by CDP/EDP/FDP).
        let ethertype = if ethertype_or_len > 1500 {
            EtherType(ethertype_or_len)
        } else {
            EtherType::SNAP
        };
        Ok(EthernetFrame {
            dst,
            src,
            ethertype,
            payload: &buf[ETHERNET_HEADER_LEN..],
        })
    }

    pub fn dest_mac(&self) -> MacAddr {
        self.dst
    }

    pub fn src_mac(&self) -> MacAddr {
        self.src
    }

    pub fn ethertype(&self) -> EtherType {
        self.ethertype
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Builds an Ethernet II frame. `ethertype` is also used as the 802.3 length
/// field when it is `EtherType::SNAP` (payload length must fit in a u16 <= 1500).
pub struct EthernetFrameBuilder<'a> {
    pub dest_mac: MacAddr,
    pub src_mac: MacAddr,
    pub ethertype: EtherType,
    pub payload: &'a [u8],
}

impl<'a> EthernetFrameBuilder<'a> {
    pub fn build_vec(&self) -> Result<Vec<u8>, BuildError> {
        if self.payload.len() > MAX_ETHERNET_FRAME_LEN - ETHERNET_HEADER_LEN {
            return Err(BuildError::TooLarge {
                field: "ethernet payload",
                len: self.payload.len(),
                max: MAX_ETHERNET_FRAME_LEN - ETHERNET_HEADER_LEN,
            });
        }
        let mut out = Vec::with_capacity(ETHERNET_HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.dest_mac.0);
        out.extend_from_slice(&self.src_mac.0);
        let field = if self.ethertype.0 == 0 {
            self.payload.len() as u16
        } else {
            self.ethertype.0
        };
        out.extend_from_slice(&field.to_be_bytes());
        out.extend_from_slice(self.payload);
        Ok(out)
    }
}
