//! The reconciled index: one claim-tracking table per object class.
//!
//! A [`ReconciledIndex`] is built once per warm boot from the recovered
//! snapshot and a live hardware enumeration, mutated by claims during
//! replay, then drained by the reclaimer. It is never persisted or reused.

pub mod keys;
pub(crate) mod populate;
mod table;

pub use keys::{
    HostKey, L3IntfKey, LabelStackKey, LabeledHostKey, MirrorKey, MirroredAclKey,
    MirroredPortKey, MplsNextHopLabels, QosMapKey, RouteKey, TeFlowKey,
};
pub use table::{ClaimState, ClaimTable, EntryRef};

use crate::error::TableKind;
use crate::snapshot::TeFlowTableSettings;
use std::collections::BTreeMap;
use warmboot_hw::{
    AclEntryHandle, AclEntryRecord, AclStatHandle, AggregatePortId, EcmpId, EgressId,
    EgressRecord, EgressWeights, HashControlKey, HostRecord, L2LearningMode, L2StationRecord,
    L3IntfRecord, LabelSwitchRecord, MirrorHandle, MirrorRecord, MirroredPortRecord, MplsLabel,
    QosMapId, QosMapRecord, RouteCounterId, RouteRecord, RxReasonToQueueRecord,
    TeFlowEntryHandle, TeFlowRecord, TeFlowStatBinding, TrunkId, TunnelInitiatorRecord,
    UdfGroupId, UdfPacketMatcherId, VlanRecord,
};
use warmboot_types::VlanId;

/// Where the index is in its warm-boot cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Built; replay may claim entries.
    Replaying,
    /// Cleanup ran; no further claims or cleanups are accepted.
    Cleaned,
}

/// A recovered UDF group and the packet matchers attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdfGroupEntry {
    pub id: UdfGroupId,
    pub matchers: Vec<UdfPacketMatcherId>,
}

/// Switch-wide settings read back at startup, consumed as replay
/// reprograms them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RecoveredSwitchSettings {
    pub l2_learning: L2LearningMode,
    /// `None` once replay has programmed the setting.
    pub ptp_tc_enabled: Option<bool>,
    pub hash_controls: BTreeMap<HashControlKey, i32>,
}

/// Recovered hardware state for one warm-boot cycle.
#[derive(Debug, Clone)]
pub struct ReconciledIndex {
    pub(crate) phase: Phase,

    pub(crate) prefix_routes: ClaimTable<RouteKey, RouteRecord>,
    pub(crate) host_routes: ClaimTable<RouteKey, RouteRecord>,
    pub(crate) label_switch_actions: ClaimTable<MplsLabel, LabelSwitchRecord>,
    pub(crate) hosts: ClaimTable<HostKey, HostRecord>,
    pub(crate) ecmps: ClaimTable<EcmpId, EgressWeights>,
    /// ECMP weights as the snapshot recorded them; retired on claim.
    pub(crate) recovered_ecmp: BTreeMap<EcmpId, EgressWeights>,
    pub(crate) egresses: ClaimTable<EgressId, EgressRecord>,
    pub(crate) drop_egress: Option<EgressId>,
    pub(crate) to_cpu_egress: Option<EgressId>,
    pub(crate) label_stacks: ClaimTable<LabelStackKey, TunnelInitiatorRecord>,
    pub(crate) l3_intfs: ClaimTable<L3IntfKey, L3IntfRecord>,
    pub(crate) l2_stations: ClaimTable<VlanId, L2StationRecord>,
    pub(crate) vlans: ClaimTable<VlanId, VlanRecord>,
    pub(crate) default_vlan: VlanId,

    pub(crate) acl_entries: ClaimTable<i32, AclEntryRecord>,
    pub(crate) acl_stats: ClaimTable<AclEntryHandle, AclStatHandle>,
    pub(crate) te_flows: ClaimTable<TeFlowKey, TeFlowRecord>,
    pub(crate) te_flow_stats: ClaimTable<TeFlowEntryHandle, TeFlowStatBinding>,
    pub(crate) rx_reasons: ClaimTable<u32, RxReasonToQueueRecord>,
    pub(crate) udf_groups: ClaimTable<String, UdfGroupEntry>,
    pub(crate) udf_packet_matchers: ClaimTable<String, UdfPacketMatcherId>,

    pub(crate) mirrors: ClaimTable<MirrorKey, MirrorRecord>,
    pub(crate) mirrored_ports: ClaimTable<MirroredPortKey, MirroredPortRecord>,
    pub(crate) mirrored_acls: ClaimTable<MirroredAclKey, MirrorHandle>,
    pub(crate) qos_map_keys: ClaimTable<QosMapKey, QosMapId>,
    pub(crate) qos_maps: ClaimTable<QosMapId, QosMapRecord>,

    pub(crate) trunks: ClaimTable<AggregatePortId, TrunkId>,
    pub(crate) route_counters: ClaimTable<String, RouteCounterId>,
    pub(crate) route_counter_mode_id: Option<i32>,
    pub(crate) route_counter_v6_flex_action_id: Option<i32>,

    pub(crate) host_egress: BTreeMap<HostKey, EgressId>,
    pub(crate) labeled_host_egress: BTreeMap<LabeledHostKey, EgressId>,
    pub(crate) switch_settings: RecoveredSwitchSettings,
    pub(crate) te_flow_table: Option<TeFlowTableSettings>,
}

impl ReconciledIndex {
    /// An index with nothing recovered, as on a cold boot.
    pub fn empty() -> Self {
        Self {
            phase: Phase::Replaying,
            prefix_routes: ClaimTable::new(TableKind::PrefixRoute),
            host_routes: ClaimTable::new(TableKind::HostRoute),
            label_switch_actions: ClaimTable::new(TableKind::LabelSwitchAction),
            hosts: ClaimTable::new(TableKind::Host),
            ecmps: ClaimTable::new(TableKind::Ecmp),
            recovered_ecmp: BTreeMap::new(),
            egresses: ClaimTable::new(TableKind::Egress),
            drop_egress: None,
            to_cpu_egress: None,
            label_stacks: ClaimTable::new(TableKind::LabelStack),
            l3_intfs: ClaimTable::new(TableKind::L3Intf),
            l2_stations: ClaimTable::new(TableKind::L2Station),
            vlans: ClaimTable::new(TableKind::Vlan),
            default_vlan: VlanId::DEFAULT,
            acl_entries: ClaimTable::new(TableKind::AclEntry),
            acl_stats: ClaimTable::new(TableKind::AclStat),
            te_flows: ClaimTable::new(TableKind::TeFlowEntry),
            te_flow_stats: ClaimTable::new(TableKind::TeFlowStat),
            rx_reasons: ClaimTable::new(TableKind::RxReasonToQueue),
            udf_groups: ClaimTable::new(TableKind::UdfGroup),
            udf_packet_matchers: ClaimTable::new(TableKind::UdfPacketMatcher),
            mirrors: ClaimTable::new(TableKind::Mirror),
            mirrored_ports: ClaimTable::new(TableKind::MirroredPort),
            mirrored_acls: ClaimTable::new(TableKind::MirroredAcl),
            qos_map_keys: ClaimTable::new(TableKind::QosMapKey),
            qos_maps: ClaimTable::new(TableKind::QosMap),
            trunks: ClaimTable::new(TableKind::Trunk),
            route_counters: ClaimTable::new(TableKind::RouteCounter),
            route_counter_mode_id: None,
            route_counter_v6_flex_action_id: None,
            host_egress: BTreeMap::new(),
            labeled_host_egress: BTreeMap::new(),
            switch_settings: RecoveredSwitchSettings::default(),
            te_flow_table: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn drop_egress(&self) -> Option<EgressId> {
        self.drop_egress
    }

    pub fn to_cpu_egress(&self) -> Option<EgressId> {
        self.to_cpu_egress
    }

    /// The platform default VLAN; cleanup never deletes it.
    pub fn default_vlan(&self) -> VlanId {
        self.default_vlan
    }

    /// Read-only view of the ECMP table. Claims go through
    /// [`ReconciledIndex::claim_ecmp`] so the recovered weights are retired
    /// together with the entry.
    pub fn ecmps(&self) -> &ClaimTable<EcmpId, EgressWeights> {
        &self.ecmps
    }

    /// Total number of unclaimed entries across every table.
    pub fn unclaimed_total(&self) -> usize {
        self.prefix_routes.unclaimed_len()
            + self.host_routes.unclaimed_len()
            + self.label_switch_actions.unclaimed_len()
            + self.hosts.unclaimed_len()
            + self.ecmps.unclaimed_len()
            + self.egresses.unclaimed_len()
            + self.label_stacks.unclaimed_len()
            + self.l3_intfs.unclaimed_len()
            + self.l2_stations.unclaimed_len()
            + self.vlans.unclaimed_len()
            + self.acl_entries.unclaimed_len()
            + self.acl_stats.unclaimed_len()
            + self.te_flows.unclaimed_len()
            + self.te_flow_stats.unclaimed_len()
            + self.rx_reasons.unclaimed_len()
            + self.udf_groups.unclaimed_len()
            + self.udf_packet_matchers.unclaimed_len()
            + self.mirrors.unclaimed_len()
            + self.mirrored_ports.unclaimed_len()
            + self.mirrored_acls.unclaimed_len()
            + self.qos_map_keys.unclaimed_len()
            + self.qos_maps.unclaimed_len()
            + self.trunks.unclaimed_len()
            + self.route_counters.unclaimed_len()
    }
}

impl Default for ReconciledIndex {
    fn default() -> Self {
        Self::empty()
    }
}

macro_rules! table_accessors {
    ($($name:ident, $name_mut:ident: $key:ty => $value:ty;)*) => {
        impl ReconciledIndex {
            $(
                pub fn $name(&self) -> &ClaimTable<$key, $value> {
                    &self.$name
                }

                pub fn $name_mut(&mut self) -> &mut ClaimTable<$key, $value> {
                    &mut self.$name
                }
            )*
        }
    };
}

table_accessors! {
    prefix_routes, prefix_routes_mut: RouteKey => RouteRecord;
    host_routes, host_routes_mut: RouteKey => RouteRecord;
    label_switch_actions, label_switch_actions_mut: MplsLabel => LabelSwitchRecord;
    hosts, hosts_mut: HostKey => HostRecord;
    egresses, egresses_mut: EgressId => EgressRecord;
    label_stacks, label_stacks_mut: LabelStackKey => TunnelInitiatorRecord;
    l3_intfs, l3_intfs_mut: L3IntfKey => L3IntfRecord;
    l2_stations, l2_stations_mut: VlanId => L2StationRecord;
    vlans, vlans_mut: VlanId => VlanRecord;
    acl_entries, acl_entries_mut: i32 => AclEntryRecord;
    acl_stats, acl_stats_mut: AclEntryHandle => AclStatHandle;
    te_flows, te_flows_mut: TeFlowKey => TeFlowRecord;
    te_flow_stats, te_flow_stats_mut: TeFlowEntryHandle => TeFlowStatBinding;
    rx_reasons, rx_reasons_mut: u32 => RxReasonToQueueRecord;
    udf_groups, udf_groups_mut: String => UdfGroupEntry;
    udf_packet_matchers, udf_packet_matchers_mut: String => UdfPacketMatcherId;
    mirrors, mirrors_mut: MirrorKey => MirrorRecord;
    mirrored_ports, mirrored_ports_mut: MirroredPortKey => MirroredPortRecord;
    mirrored_acls, mirrored_acls_mut: MirroredAclKey => MirrorHandle;
    qos_map_keys, qos_map_keys_mut: QosMapKey => QosMapId;
    qos_maps, qos_maps_mut: QosMapId => QosMapRecord;
    trunks, trunks_mut: AggregatePortId => TrunkId;
    route_counters, route_counters_mut: String => RouteCounterId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index() {
        let index = ReconciledIndex::empty();
        assert_eq!(index.phase(), Phase::Replaying);
        assert_eq!(index.unclaimed_total(), 0);
        assert_eq!(index.default_vlan(), VlanId::DEFAULT);
        assert!(index.drop_egress().is_none());
        assert_eq!(index.hosts().kind(), TableKind::Host);
        assert_eq!(index.te_flow_stats().kind(), TableKind::TeFlowStat);
    }
}
