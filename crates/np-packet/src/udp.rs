use std::net::Ipv4Addr;

use crate::checksum::{internet_checksum, ipv4_pseudo_header};
use crate::error::{BuildError, ParseError};
use crate::ipv4::Ipv4Protocol;

pub const UDP_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpDatagram<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

impl<'a> UdpDatagram<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, ParseError> {
        if buf.len() < UDP_HEADER_LEN {
            return Err(ParseError::TooShort {
                needed: UDP_HEADER_LEN,
                got: buf.len(),
            });
        }
        let src_port = u16::from_be_bytes([buf[0], buf[1]]);
        let dst_port = u16::from_be_bytes([buf[2], buf[3]]);
        let len = u16::from_be_bytes([buf[4], buf[5]]) as usize;
        if len < UDP_HEADER_LEN || len > buf.len() {
            return Err(ParseError::Malformed("udp length"));
        }
        Ok(UdpDatagram {
            src_port,
            dst_port,
            payload: &buf[UDP_HEADER_LEN..len],
        })
    }

    /// Positional constructor used by handlers that don't need the pseudo-header
    /// checksum (the serializer fixes up checksums as part of the IP layer call).
    pub fn serialize(
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        payload: &'a [u8],
    ) -> Vec<u8> {
        UdpPacketBuilder {
            src_port,
            dst_port,
            payload,
        }
        .build_vec(src_ip, dst_ip)
        .expect("udp payload never exceeds the u16 length limit in practice")
    }
}

pub struct UdpPacketBuilder<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

impl<'a> UdpPacketBuilder<'a> {
    pub fn build_vec(&self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Result<Vec<u8>, BuildError> {
        let total_len = UDP_HEADER_LEN + self.payload.len();
        if total_len > u16::MAX as usize {
            return Err(BuildError::TooLarge {
                field: "udp length",
                len: total_len,
                max: u16::MAX as usize,
            });
        }
        let mut out = vec![0u8; total_len];
        out[0..2].copy_from_slice(&self.src_port.to_be_bytes());
        out[2..4].copy_from_slice(&self.dst_port.to_be_bytes());
        out[4..6].copy_from_slice(&(total_len as u16).to_be_bytes());
        out[UDP_HEADER_LEN..].copy_from_slice(self.payload);

        let pseudo = ipv4_pseudo_header(src_ip, dst_ip, Ipv4Protocol::UDP.0, total_len as u16);
        let checksum = internet_checksum(&[&pseudo, &out]);
        // UDP checksum of exactly zero is transmitted as all-ones (RFC 768).
        let checksum = if checksum == 0 { 0xffff } else { checksum };
        out[6..8].copy_from_slice(&checksum.to_be_bytes());
        Ok(out)
    }
}
