//! Host addresses and route prefixes.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IPv4 or IPv6 address, serialized in its textual form.
///
/// IPv4 orders before IPv6, so index tables list v4 hosts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IpAddress {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl IpAddress {
    /// fe80::/10. Such neighbors are only unique per interface.
    pub fn is_v6_link_local(&self) -> bool {
        match self {
            IpAddress::V4(_) => false,
            IpAddress::V6(addr) => (addr.segments()[0] & 0xffc0) == 0xfe80,
        }
    }

    const fn bit_len(&self) -> u8 {
        match self {
            IpAddress::V4(_) => 32,
            IpAddress::V6(_) => 128,
        }
    }

    fn mask(&self, len: u8) -> IpAddress {
        match self {
            IpAddress::V4(addr) => {
                let bits = u32::from(*addr);
                let mask = u32::MAX.checked_shl(32 - u32::from(len)).unwrap_or(0);
                IpAddress::V4(Ipv4Addr::from(bits & mask))
            }
            IpAddress::V6(addr) => {
                let bits = u128::from(*addr);
                let mask = u128::MAX.checked_shl(128 - u32::from(len)).unwrap_or(0);
                IpAddress::V6(Ipv6Addr::from(bits & mask))
            }
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(addr) => addr.fmt(f),
            IpAddress::V6(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = if s.contains(':') {
            s.parse::<Ipv6Addr>().map(IpAddress::V6)
        } else {
            s.parse::<Ipv4Addr>().map(IpAddress::V4)
        };
        parsed.map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl TryFrom<String> for IpAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpAddress> for String {
    fn from(addr: IpAddress) -> String {
        addr.to_string()
    }
}

/// A route prefix in CIDR form.
///
/// Host bits are cleared on construction: `10.1.2.3/24` and `10.1.2.0/24`
/// key the same route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > address.bit_len() {
            return Err(ParseError::InvalidIpPrefix(format!("{}/{}", address, prefix_len)));
        }
        Ok(IpPrefix {
            address: address.mask(prefix_len),
            prefix_len,
        })
    }

    /// /32 or /128. Such routes may live in the host table instead of the
    /// route table.
    pub const fn is_full_mask(&self) -> bool {
        self.prefix_len == self.address.bit_len()
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidIpPrefix(s.to_string());
        let (addr, len) = s.split_once('/').ok_or_else(invalid)?;
        let address: IpAddress = addr.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = len.parse().map_err(|_| invalid())?;
        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> String {
        prefix.to_string()
    }
}
