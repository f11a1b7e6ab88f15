//! 802.1Q VLAN ids as the ASIC's VLAN table reports them.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A VLAN id in 1..=4094.
///
/// The snapshot stores VLANs as bare integers, so this deserializes from a
/// `u16` and rejects anything out of range.
///
/// ```
/// use warmboot_types::VlanId;
///
/// assert_eq!(u16::from(VlanId::new(2001).unwrap()), 2001);
/// assert!(VlanId::new(4095).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// VLAN 1. Every port sits in it after an SDK init, and reconciliation
    /// never deletes it.
    pub const DEFAULT: VlanId = VlanId(1);

    pub const fn new(id: u16) -> Result<Self, ParseError> {
        match id {
            1..=4094 => Ok(VlanId(id)),
            _ => Err(ParseError::InvalidVlanId(id)),
        }
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        VlanId::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}
