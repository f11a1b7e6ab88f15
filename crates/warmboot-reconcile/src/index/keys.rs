//! Lookup keys for the reconciled index tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use warmboot_hw::{
    AclEntryHandle, IntfId, LabelStack, MirrorDirection, MirrorTunnel, MplsLabel, QosMapType,
    VrfId,
};
use warmboot_types::{IpAddress, IpPrefix, MacAddress, PortId, VlanId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub vrf: VrfId,
    pub prefix: IpPrefix,
}

impl RouteKey {
    pub fn new(vrf: VrfId, prefix: IpPrefix) -> Self {
        Self { vrf, prefix }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vrf {} {}", self.vrf, self.prefix)
    }
}

/// Host entry key.
///
/// The interface only takes part in the key for IPv6 link-local addresses;
/// [`HostKey::new`] drops it for everything else so callers can pass it
/// unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostKey {
    pub vrf: VrfId,
    pub ip: IpAddress,
    pub intf: Option<IntfId>,
}

impl HostKey {
    pub fn new(vrf: VrfId, ip: IpAddress, intf: Option<IntfId>) -> Self {
        let intf = if ip.is_v6_link_local() { intf } else { None };
        Self { vrf, ip, intf }
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.intf {
            Some(intf) => write!(f, "vrf {} {}@{}", self.vrf, self.ip, intf),
            None => write!(f, "vrf {} {}", self.vrf, self.ip),
        }
    }
}

/// Labels an MPLS next hop pushes: one label, or a tunnel's whole stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MplsNextHopLabels {
    Label(MplsLabel),
    Stack(LabelStack),
}

/// Key of a labeled (MPLS) next hop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabeledHostKey {
    pub vrf: VrfId,
    pub labels: MplsNextHopLabels,
    pub ip: IpAddress,
    /// Logical interface the next hop resolves through.
    pub intf: u32,
}

impl fmt::Display for LabeledHostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vrf {} {} intf {} ", self.vrf, self.ip, self.intf)?;
        match &self.labels {
            MplsNextHopLabels::Label(label) => write!(f, "label {}", label),
            MplsNextHopLabels::Stack(stack) => write!(f, "stack {:?}", stack),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelStackKey {
    pub vlan: VlanId,
    pub stack: LabelStack,
}

impl fmt::Display for LabelStackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vlan {} stack {:?}", self.vlan, self.stack)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct L3IntfKey {
    pub vlan: VlanId,
    pub mac: MacAddress,
}

impl fmt::Display for L3IntfKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vlan {} mac {}", self.vlan, self.mac)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeFlowKey {
    pub src_port: PortId,
    pub dst_ip: IpPrefix,
}

impl fmt::Display for TeFlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src_port, self.dst_ip)
    }
}

/// A mirror's egress path: SPAN when `tunnel` is None, ERSPAN/sflow otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MirrorKey {
    pub egress_port: PortId,
    pub tunnel: Option<MirrorTunnel>,
}

impl fmt::Display for MirrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tunnel {
            Some(t) => write!(f, "{} tunnel {} -> {}", self.egress_port, t.src_ip, t.dst_ip),
            None => write!(f, "{}", self.egress_port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MirroredPortKey {
    pub port: PortId,
    pub flags: u32,
}

impl fmt::Display for MirroredPortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} flags 0x{:x}", self.port, self.flags)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MirroredAclKey {
    pub entry: AclEntryHandle,
    pub direction: MirrorDirection,
}

impl fmt::Display for MirroredAclKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acl {} {}", self.entry, self.direction)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QosMapKey {
    pub policy: String,
    pub map_type: QosMapType,
}

impl QosMapKey {
    pub fn new(policy: impl Into<String>, map_type: QosMapType) -> Self {
        Self {
            policy: policy.into(),
            map_type,
        }
    }
}

impl fmt::Display for QosMapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.policy, self.map_type)
    }
}
