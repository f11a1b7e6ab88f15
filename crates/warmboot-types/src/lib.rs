//! Network primitives used by the warm-boot reconciliation engine.
//!
//! Every type here is totally ordered so it can key the ordered tables of
//! the reconciled index, and serializes to the same textual form the
//! warm-boot snapshot uses:
//!
//! - [`IpAddress`]: IPv4 or IPv6 host address
//! - [`IpPrefix`]: network prefix in CIDR notation
//! - [`MacAddress`]: 48-bit Ethernet MAC address
//! - [`VlanId`]: IEEE 802.1Q VLAN identifier
//! - [`PortId`]: logical front-panel or CPU port number

mod ip;
mod mac;
mod port;
mod vlan;

pub use ip::{IpAddress, IpPrefix};
pub use mac::MacAddress;
pub use port::PortId;
pub use vlan::VlanId;

/// A value that is not a valid textual or numeric form of one of these types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),
}
