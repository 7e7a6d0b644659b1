use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A 6-byte IEEE 802 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    /// LLDP's "nearest bridge" multicast destination, 01:80:C2:00:00:0E.
    pub const LLDP_MULTICAST: MacAddr = MacAddr([0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);

    /// CDP/EDP/FDP all use the Cisco-family PVST/CDP multicast, 01:00:0C:CC:CC:CC.
    pub const CDP_MULTICAST: MacAddr = MacAddr([0x01, 0x00, 0x0c, 0xcc, 0xcc, 0xcc]);

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.split(|c| c == ':' || c == '-');
        for slot in &mut out {
            let part = parts.next().ok_or(ParseError::Malformed("mac address"))?;
            *slot = u8::from_str_radix(part, 16).map_err(|_| ParseError::Malformed("mac address"))?;
        }
        if parts.next().is_some() {
            return Err(ParseError::Malformed("mac address"));
        }
        Ok(MacAddr(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_roundtrip() {
        let mac = MacAddr([0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]);
        assert_eq!(mac.to_string(), "00:aa:bb:cc:dd:ee");
        assert_eq!("00:aa:bb:cc:dd:ee".parse::<MacAddr>().unwrap(), mac);
        assert_eq!("00-aa-bb-cc-dd-ee".parse::<MacAddr>().unwrap(), mac);
    }

    #[test]
    fn rejects_wrong_group_count() {
        assert!("00:aa:bb:cc:dd".parse::<MacAddr>().is_err());
        assert!("00:aa:bb:cc:dd:ee:ff".parse::<MacAddr>().is_err());
        assert!("zz:aa:bb:cc:dd:ee".parse::<MacAddr>().is_err());
    }

    #[test]
    fn classifies_broadcast_and_multicast() {
        assert!(MacAddr::BROADCAST.is_broadcast());
        assert!(MacAddr::BROADCAST.is_multicast());
        assert!(MacAddr::LLDP_MULTICAST.is_multicast());
        assert!(!MacAddr([0x02, 0, 0, 0, 0, 1]).is_multicast());
    }
}
