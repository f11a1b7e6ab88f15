//! Entry shapes of the auxiliary `hwSwitch` sections.
//!
//! Each entry is deserialized on its own so one malformed entry does not
//! take its siblings down with it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use warmboot_hw::{RawHandle, VrfId};
use warmboot_types::{IpAddress, VlanId};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HostEntry {
    pub vrf: VrfId,
    pub ip: IpAddress,
    pub egress_id: RawHandle,
    #[serde(default)]
    pub egress: Option<HostEgress>,
    #[serde(rename = "classID", default)]
    pub class_id: Option<u32>,
}

/// Present with an interface for plain next hops, without one for ECMP.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HostEgress {
    #[serde(default)]
    pub intf_id: Option<RawHandle>,
}

/// One ECMP path: a bare egress id counts once, an object carries a weight.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum PathEntry {
    Id(RawHandle),
    Weighted {
        #[serde(rename = "egressId")]
        egress_id: RawHandle,
        weight: u64,
    },
}

impl PathEntry {
    pub fn egress_and_weight(&self) -> (RawHandle, u64) {
        match self {
            PathEntry::Id(id) => (*id, 1),
            PathEntry::Weighted { egress_id, weight } => (*egress_id, *weight),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EcmpPaths {
    #[serde(default)]
    pub paths: Vec<PathEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EcmpHostEntry {
    pub ecmp_egress_id: RawHandle,
    #[serde(default)]
    pub ecmp_egress: Option<EcmpPaths>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EcmpObjectEntry {
    pub ecmp_egress_id: RawHandle,
    #[serde(default)]
    pub paths: Vec<PathEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MplsNextHopEntry {
    pub vrf: VrfId,
    pub ip: IpAddress,
    pub intf: u32,
    pub egress_id: RawHandle,
    #[serde(default)]
    pub label: Option<u32>,
    #[serde(default)]
    pub stack: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IntfTableEntry {
    pub vlan: VlanId,
    pub intf_id: RawHandle,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QosPolicyEntry {
    #[serde(default)]
    pub in_dscp: Option<RawHandle>,
    #[serde(default)]
    pub in_exp: Option<RawHandle>,
    #[serde(default)]
    pub out_exp: Option<RawHandle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RouteCounterSection {
    #[serde(default)]
    pub mode_id: Option<i32>,
    #[serde(default)]
    pub v6_flex_action_id: Option<i32>,
    #[serde(default)]
    pub counters: BTreeMap<String, RawHandle>,
}

/// TE-flow table parameters recorded by the previous agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeFlowTableSettings {
    pub dst_ip_prefix_length: u8,
    #[serde(default)]
    pub hint_id: i32,
    pub group_id: i32,
    #[serde(default)]
    pub flex_counter_id: Option<i32>,
}
