use crate::checksum::internet_checksum;
use crate::error::ParseError;

pub const ICMP_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpType {
    EchoReply,
    DestinationUnreachable,
    EchoRequest,
    TimeExceeded,
    Other(u8),
}

impl IcmpType {
    fn to_wire(self) -> u8 {
        match self {
            IcmpType::EchoReply => 0,
            IcmpType::DestinationUnreachable => 3,
            IcmpType::EchoRequest => 8,
            IcmpType::TimeExceeded => 11,
            IcmpType::Other(v) => v,
        }
    }

    fn from_wire(v: u8) -> Self {
        match v {
            0 => IcmpType::EchoReply,
            3 => IcmpType::DestinationUnreachable,
            8 => IcmpType::EchoRequest,
            11 => IcmpType::TimeExceeded,
            other => IcmpType::Other(other),
        }
    }
}

/// A parsed ICMP echo request/reply. Other ICMP types parse far enough to be
/// classified (see `IcmpType::Other`/`DestinationUnreachable`/`TimeExceeded`)
/// but their body is exposed only as an opaque `rest` slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpPacket<'a> {
    pub icmp_type: IcmpType,
    pub code: u8,
    pub identifier: u16,
    pub sequence: u16,
    pub rest: &'a [u8],
}

impl<'a> IcmpPacket<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, ParseError> {
        if buf.len() < ICMP_HEADER_LEN {
            return Err(ParseError::TooShort {
                needed: ICMP_HEADER_LEN,
                got: buf.len(),
            });
        }
        let icmp_type = IcmpType::from_wire(buf[0]);
        let code = buf[1];
        let identifier = u16::from_be_bytes([buf[4], buf[5]]);
        let sequence = u16::from_be_bytes([buf[6], buf[7]]);
        Ok(IcmpPacket {
            icmp_type,
            code,
            identifier,
            sequence,
            rest: &buf[ICMP_HEADER_LEN..],
        })
    }

    pub fn is_echo_request(&self) -> bool {
        matches!(self.icmp_type, IcmpType::EchoRequest)
    }
}

/// Builds an ICMP echo request or reply with a freshly computed checksum.
pub struct IcmpEchoBuilder<'a> {
    pub reply: bool,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: &'a [u8],
}

impl<'a> IcmpEchoBuilder<'a> {
    pub fn build_vec(&self) -> Vec<u8> {
        let icmp_type = if self.reply {
            IcmpType::EchoReply
        } else {
            IcmpType::EchoRequest
        };
        let mut out = vec![0u8; ICMP_HEADER_LEN + self.payload.len()];
        out[0] = icmp_type.to_wire();
        out[1] = 0;
        out[4..6].copy_from_slice(&self.identifier.to_be_bytes());
        out[6..8].copy_from_slice(&self.sequence.to_be_bytes());
        out[ICMP_HEADER_LEN..].copy_from_slice(self.payload);
        let checksum = internet_checksum(&[&out]);
        out[2..4].copy_from_slice(&checksum.to_be_bytes());
        out
    }
}
