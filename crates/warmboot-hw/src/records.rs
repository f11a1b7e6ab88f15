//! Raw per-class records as the ASIC reports them.
//!
//! These mirror what a table traversal hands back for one live object.
//! They carry only what reconciliation needs to key, cross-check and later
//! delete the object.

use crate::handle::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::BitOr;
use thiserror::Error;
use warmboot_types::{IpAddress, IpPrefix, MacAddress, PortId, VlanId};

pub type VrfId = u32;
pub type MplsLabel = u32;
pub type LabelStack = Vec<MplsLabel>;
pub type AggregatePortId = u32;

/// Egress object flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EgressFlags(u32);

impl EgressFlags {
    pub const NONE: EgressFlags = EgressFlags(0);
    /// Packets resolved to this egress are dropped.
    pub const DST_DISCARD: EgressFlags = EgressFlags(1 << 0);
    /// Packets are punted to the CPU at L2.
    pub const L2_TO_CPU: EgressFlags = EgressFlags(1 << 1);
    /// A copy of each packet is sent to the CPU.
    pub const COPY_TO_CPU: EgressFlags = EgressFlags(1 << 2);
    pub const MPLS_LABEL: EgressFlags = EgressFlags(1 << 3);
    pub const IP6: EgressFlags = EgressFlags(1 << 4);

    pub const fn from_bits(bits: u32) -> Self {
        EgressFlags(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if any bit of `other` is set.
    pub const fn intersects(&self, other: EgressFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_drop(&self) -> bool {
        self.intersects(Self::DST_DISCARD)
    }

    pub const fn is_to_cpu(&self) -> bool {
        self.intersects(EgressFlags(Self::L2_TO_CPU.0 | Self::COPY_TO_CPU.0))
    }
}

impl BitOr for EgressFlags {
    type Output = EgressFlags;

    fn bitor(self, rhs: EgressFlags) -> EgressFlags {
        EgressFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for EgressFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressRecord {
    pub id: EgressId,
    pub intf: IntfId,
    pub vlan: Option<VlanId>,
    pub mac: MacAddress,
    pub port: Option<PortId>,
    pub flags: EgressFlags,
    pub label: Option<MplsLabel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub vrf: VrfId,
    pub ip: IpAddress,
    /// Egress interface; reported only for IPv6 link-local neighbors.
    pub intf: Option<IntfId>,
    pub egress: EgressId,
    pub class_id: Option<u32>,
}

/// What a route or label-switch action forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextHopRef {
    Egress(EgressId),
    Ecmp(EcmpId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub vrf: VrfId,
    pub prefix: IpPrefix,
    pub next_hop: NextHopRef,
    pub class_id: Option<u32>,
    pub counter: Option<RouteCounterId>,
}

/// An ECMP group as the live member array reports it.
///
/// Members on down links are missing from `members`, which is why the
/// recovered weight set from the snapshot is authoritative instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcmpRecord {
    pub id: EcmpId,
    pub members: Vec<EgressId>,
}

/// A weighted set of egress ids; repeated members add up their weights.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EgressWeights(BTreeMap<EgressId, u64>);

impl EgressWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the set from a path list where each occurrence counts once.
    pub fn from_paths<I: IntoIterator<Item = EgressId>>(paths: I) -> Self {
        let mut weights = Self::new();
        for path in paths {
            let count = weights.0.entry(path).or_insert(0);
            *count = count.saturating_add(1);
        }
        weights
    }

    /// Adds `weight` to `egress`; zero weights are ignored.
    ///
    /// Leaves the set untouched if the member's weight would overflow.
    pub fn add(&mut self, egress: EgressId, weight: u64) -> Result<(), WeightOverflow> {
        if weight == 0 {
            return Ok(());
        }
        let current = self.weight(&egress);
        let total = current
            .checked_add(weight)
            .ok_or(WeightOverflow { egress, current, weight })?;
        self.0.insert(egress, total);
        Ok(())
    }

    /// Raises each member to the larger of its weight here and in `other`.
    pub fn merge_max(&mut self, other: &EgressWeights) {
        for (egress, weight) in other.iter() {
            let current = self.0.entry(egress).or_insert(0);
            *current = (*current).max(weight);
        }
    }

    pub fn weight(&self, egress: &EgressId) -> u64 {
        self.0.get(egress).copied().unwrap_or(0)
    }

    pub fn contains(&self, egress: &EgressId) -> bool {
        self.0.contains_key(egress)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct members.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sum of all member weights, `None` if it does not fit in a `u64`.
    pub fn total_weight(&self) -> Option<u64> {
        self.0.values().try_fold(0u64, |sum, weight| sum.checked_add(*weight))
    }

    pub fn iter(&self) -> impl Iterator<Item = (EgressId, u64)> + '_ {
        self.0.iter().map(|(id, w)| (*id, *w))
    }

    pub fn members(&self) -> impl Iterator<Item = EgressId> + '_ {
        self.0.keys().copied()
    }
}

/// A member weight that no longer fits in a `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("weight of egress {egress} overflows: {current} + {weight}")]
pub struct WeightOverflow {
    pub egress: EgressId,
    pub current: u64,
    pub weight: u64,
}

impl fmt::Display for EgressWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (id, weight) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            if weight == 1 {
                write!(f, "{}", id)?;
            } else {
                write!(f, "{}x{}", id, weight)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntryRecord {
    pub handle: AclEntryHandle,
    pub priority: i32,
    pub stat: Option<AclStatHandle>,
}

/// Counter attached to a TE-flow entry and the action slot it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeFlowStatBinding {
    pub stat: TeFlowStatHandle,
    pub action_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeFlowRecord {
    pub handle: TeFlowEntryHandle,
    pub src_port: PortId,
    pub dst_ip: IpPrefix,
    pub next_hop: Option<NextHopRef>,
    pub stat: Option<TeFlowStatBinding>,
}

/// Encapsulation of an ERSPAN or sflow mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MirrorTunnel {
    pub src_ip: IpAddress,
    pub dst_ip: IpAddress,
    pub src_mac: MacAddress,
    pub dst_mac: MacAddress,
    /// Source and destination UDP ports; present for sflow tunnels.
    pub udp_ports: Option<(u16, u16)>,
    pub gre_protocol: u16,
    pub ttl: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub handle: MirrorHandle,
    pub egress_port: PortId,
    pub tunnel: Option<MirrorTunnel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirroredPortRecord {
    pub port: PortId,
    pub flags: u32,
    pub mirror: MirrorHandle,
    /// The mirror is an sflow collector shared by every sampled port.
    pub sflow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorDirection {
    Ingress,
    Egress,
}

impl fmt::Display for MirrorDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorDirection::Ingress => write!(f, "ingress"),
            MirrorDirection::Egress => write!(f, "egress"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirroredAclRecord {
    pub entry: AclEntryHandle,
    pub direction: MirrorDirection,
    pub mirror: MirrorHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QosMapType {
    IpIngress,
    MplsIngress,
    MplsEgress,
}

impl fmt::Display for QosMapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QosMapType::IpIngress => write!(f, "IP_INGRESS"),
            QosMapType::MplsIngress => write!(f, "MPLS_INGRESS"),
            QosMapType::MplsEgress => write!(f, "MPLS_EGRESS"),
        }
    }
}

/// One traffic-class/attribute pair of a QoS map (DSCP or EXP value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QosRule {
    pub traffic_class: u16,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosMapRecord {
    pub id: QosMapId,
    pub map_type: QosMapType,
    pub rules: BTreeSet<QosRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelAction {
    Swap(MplsLabel),
    Php,
    PopAndLookup,
    Push,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSwitchRecord {
    pub label: MplsLabel,
    pub action: LabelAction,
    pub next_hop: Option<NextHopRef>,
}

/// An MPLS tunnel interface pushing a label stack on a VLAN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelInitiatorRecord {
    pub intf: TunnelIntfId,
    pub vlan: VlanId,
    pub stack: LabelStack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanRecord {
    pub vlan: VlanId,
    pub ports: BTreeSet<PortId>,
    pub untagged: BTreeSet<PortId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L3IntfRecord {
    pub id: IntfId,
    pub vlan: VlanId,
    pub mac: MacAddress,
    pub mtu: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2StationRecord {
    pub vlan: VlanId,
    pub mac: MacAddress,
}

/// Reason a packet was punted to the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RxReason {
    ArpRequest,
    ArpResponse,
    Ndp,
    Bgp,
    Bgpv6,
    LacpPdu,
    Lldp,
    Dhcp,
    Dhcpv6,
    L3MtuError,
    Ttl1,
    L3DestMiss,
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RxReasonToQueueRecord {
    pub index: u32,
    pub reason: RxReason,
    pub queue: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum L2LearningMode {
    #[default]
    Hardware,
    Software,
}

/// Which load-balancer hash block a control belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashUnit {
    ModuleA,
    ModuleB,
    EcmpOutput,
    TrunkOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HashControlKey {
    pub unit: HashUnit,
    pub control: u32,
}

impl fmt::Display for HashControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}", self.unit, self.control)
    }
}

/// Switch-wide settings read back once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SwitchSettingsRecord {
    pub l2_learning: L2LearningMode,
    pub ptp_tc_enabled: bool,
    pub hash_controls: BTreeMap<HashControlKey, i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrunkRecord {
    pub agg_port: AggregatePortId,
    pub trunk: TrunkId,
}

/// Route counter allocation state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteCounterState {
    pub mode_id: Option<i32>,
    pub v6_flex_action_id: Option<i32>,
    /// Counter name to hardware counter id.
    pub counters: BTreeMap<String, RouteCounterId>,
}
