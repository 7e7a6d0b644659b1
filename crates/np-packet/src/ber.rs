//! Minimal BER encode/decode for the ASN.1 subset SNMPv1/v2c actually uses:
//! INTEGER, OCTET STRING, NULL, OBJECT IDENTIFIER, and the constructed
//! SEQUENCE/application tags PDUs are built from. Not a general ASN.1 library.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BerValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(Vec<u32>),
    Sequence(Vec<BerValue>),
    /// A constructed value under an application/context tag, e.g. an SNMP PDU
    /// (`GetRequest` = context tag 0) or a varbind list.
    Tagged(u8, Vec<BerValue>),
    /// A zero-length context-specific primitive. SNMPv2c uses these in place
    /// of a varbind's value to signal `noSuchObject`/`noSuchInstance`/
    /// `endOfMibView` instead of a whole-PDU error.
    ExceptionValue(u8),
}

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_SEQUENCE: u8 = 0x30;

pub const TAG_GET_REQUEST: u8 = 0xa0;
pub const TAG_GET_NEXT_REQUEST: u8 = 0xa1;
pub const TAG_GET_RESPONSE: u8 = 0xa2;
pub const TAG_SET_REQUEST: u8 = 0xa3;

pub const TAG_NO_SUCH_OBJECT: u8 = 0x80;
pub const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
pub const TAG_END_OF_MIB_VIEW: u8 = 0x82;

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
        let significant = &bytes[first_nonzero..];
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(significant);
    }
}

fn read_length(buf: &[u8]) -> Result<(usize, &[u8]), ParseError> {
    let (&first, rest) = buf.split_first().ok_or(ParseError::TooShort { needed: 1, got: 0 })?;
    if first & 0x80 == 0 {
        return Ok((first as usize, rest));
    }
    let n = (first & 0x7f) as usize;
    if rest.len() < n || n > 8 {
        return Err(ParseError::Malformed("ber length"));
    }
    let mut len: usize = 0;
    for &b in &rest[..n] {
        len = (len << 8) | b as usize;
    }
    Ok((len, &rest[n..]))
}

impl BerValue {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            BerValue::Integer(v) => {
                out.push(TAG_INTEGER);
                let body = encode_integer_body(*v);
                encode_length(body.len(), out);
                out.extend_from_slice(&body);
            }
            BerValue::OctetString(bytes) => {
                out.push(TAG_OCTET_STRING);
                encode_length(bytes.len(), out);
                out.extend_from_slice(bytes);
            }
            BerValue::Null => {
                out.push(TAG_NULL);
                out.push(0);
            }
            BerValue::ObjectIdentifier(oid) => {
                out.push(TAG_OID);
                let body = encode_oid_body(oid);
                encode_length(body.len(), out);
                out.extend_from_slice(&body);
            }
            BerValue::Sequence(items) => encode_constructed(TAG_SEQUENCE, items, out),
            BerValue::Tagged(tag, items) => encode_constructed(*tag, items, out),
            BerValue::ExceptionValue(tag) => {
                out.push(*tag);
                out.push(0);
            }
        }
    }

    pub fn parse(buf: &[u8]) -> Result<(Self, &[u8]), ParseError> {
        let (&tag, rest) = buf.split_first().ok_or(ParseError::TooShort { needed: 1, got: 0 })?;
        let (len, rest) = read_length(rest)?;
        if rest.len() < len {
            return Err(ParseError::TooShort {
                needed: len,
                got: rest.len(),
            });
        }
        let (body, tail) = rest.split_at(len);
        let value = match tag {
            TAG_INTEGER => BerValue::Integer(decode_integer_body(body)?),
            TAG_OCTET_STRING => BerValue::OctetString(body.to_vec()),
            TAG_NULL => BerValue::Null,
            TAG_OID => BerValue::ObjectIdentifier(decode_oid_body(body)?),
            TAG_SEQUENCE => BerValue::Sequence(parse_all(body)?),
            TAG_NO_SUCH_OBJECT | TAG_NO_SUCH_INSTANCE | TAG_END_OF_MIB_VIEW => {
                BerValue::ExceptionValue(tag)
            }
            other if other & 0x20 != 0 => BerValue::Tagged(other, parse_all(body)?),
            other => {
                return Err(ParseError::Unsupported {
                    field: "ber tag",
                    value: other as u32,
                })
            }
        };
        Ok((value, tail))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            BerValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_octet_string(&self) -> Option<&[u8]> {
        match self {
            BerValue::OctetString(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_oid(&self) -> Option<&[u32]> {
        match self {
            BerValue::ObjectIdentifier(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[BerValue]> {
        match self {
            BerValue::Sequence(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the inner items and tag when this value is a PDU/constructed
    /// value wrapped under a non-universal tag (e.g. `0xa0` = GetRequest).
    pub fn as_tagged(&self) -> Option<(u8, &[BerValue])> {
        match self {
            BerValue::Tagged(tag, v) => Some((*tag, v)),
            _ => None,
        }
    }

    pub fn as_exception(&self) -> Option<u8> {
        match self {
            BerValue::ExceptionValue(tag) => Some(*tag),
            _ => None,
        }
    }
}

fn encode_constructed(tag: u8, items: &[BerValue], out: &mut Vec<u8>) {
    let mut body = Vec::new();
    for item in items {
        item.encode_into(&mut body);
    }
    out.push(tag);
    encode_length(body.len(), out);
    out.extend_from_slice(&body);
}

fn parse_all(mut buf: &[u8]) -> Result<Vec<BerValue>, ParseError> {
    let mut items = Vec::new();
    while !buf.is_empty() {
        let (value, rest) = BerValue::parse(buf)?;
        items.push(value);
        buf = rest;
    }
    Ok(items)
}

fn encode_integer_body(v: i64) -> Vec<u8> {
    if v == 0 {
        return vec![0];
    }
    let bytes = v.to_be_bytes();
    let is_negative = v < 0;
    let mut start = 0;
    while start < bytes.len() - 1 {
        let b = bytes[start];
        let next_sign_bit = bytes[start + 1] & 0x80 != 0;
        if is_negative && b == 0xff && next_sign_bit {
            start += 1;
        } else if !is_negative && b == 0x00 && !next_sign_bit {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

fn decode_integer_body(body: &[u8]) -> Result<i64, ParseError> {
    if body.is_empty() || body.len() > 8 {
        return Err(ParseError::Malformed("ber integer"));
    }
    let negative = body[0] & 0x80 != 0;
    let mut buf = [if negative { 0xffu8 } else { 0 }; 8];
    buf[8 - body.len()..].copy_from_slice(body);
    Ok(i64::from_be_bytes(buf))
}

fn encode_oid_body(oid: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    if oid.len() >= 2 {
        out.push((oid[0] * 40 + oid[1]) as u8);
        for &component in &oid[2..] {
            encode_base128(component, &mut out);
        }
    } else if oid.len() == 1 {
        out.push((oid[0] * 40) as u8);
    }
    out
}

fn encode_base128(mut value: u32, out: &mut Vec<u8>) {
    let mut stack = Vec::new();
    stack.push((value & 0x7f) as u8);
    value >>= 7;
    while value > 0 {
        stack.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    out.extend(stack.into_iter().rev());
}

fn decode_oid_body(body: &[u8]) -> Result<Vec<u32>, ParseError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let mut oid = vec![(body[0] / 40) as u32, (body[0] % 40) as u32];
    let mut value: u32 = 0;
    for &b in &body[1..] {
        value = (value << 7) | (b & 0x7f) as u32;
        if b & 0x80 == 0 {
            oid.push(value);
            value = 0;
        }
    }
    Ok(oid)
}

/// Parses a dotted OID string like `.1.3.6.1.2.1.1.5.0` (a leading dot is
/// optional and stripped) into its integer components.
pub fn parse_oid(s: &str) -> Result<Vec<u32>, ParseError> {
    let s = s.strip_prefix('.').unwrap_or(s);
    if s.is_empty() {
        return Err(ParseError::Malformed("oid string"));
    }
    s.split('.')
        .map(|part| part.parse::<u32>().map_err(|_| ParseError::Malformed("oid string")))
        .collect()
}

/// Formats an OID back into dotted-decimal form, e.g. `1.3.6.1.2.1.1.5.0`.
pub fn format_oid(oid: &[u32]) -> String {
    oid.iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
