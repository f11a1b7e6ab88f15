//! In-memory ASIC for tests and bring-up.
//!
//! [`FakeAsic`] implements both [`HwEnumerator`] and [`HwDeleter`] over a
//! plain in-memory table set. Every delete/detach is appended to a call
//! trace so tests can assert on ordering, and any call can be scripted to
//! fail once.

use crate::delete::HwDeleter;
use crate::enumerate::{HwEnumerator, HwIter};
use crate::error::{HwError, HwResult};
use crate::handle::*;
use crate::records::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use warmboot_types::{IpAddress, IpPrefix, PortId, VlanId};

/// One hardware mutation, as recorded in the trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwCall {
    DeletePrefixRoute { vrf: VrfId, prefix: IpPrefix },
    DeleteHostRoute { vrf: VrfId, prefix: IpPrefix },
    DeleteLabelSwitchAction(MplsLabel),
    DeleteHost { vrf: VrfId, ip: IpAddress },
    DestroyEcmp(EcmpId),
    DestroyEgress(EgressId),
    DeleteTunnelInitiator(TunnelIntfId),
    DeleteL3Intf(IntfId),
    DeleteL2Station(VlanId),
    DestroyVlan(VlanId),
    DetachAclStat(AclEntryHandle, AclStatHandle),
    RemoveAclStat(AclStatHandle),
    RemoveAclEntry(AclEntryHandle),
    DetachTeFlowStat(TeFlowEntryHandle, TeFlowStatHandle),
    RemoveTeFlowStat(TeFlowStatHandle),
    RemoveTeFlowEntry(TeFlowEntryHandle),
    DeleteRxReasonMapping(u32),
    DetachUdfPacketMatcher(UdfGroupId, UdfPacketMatcherId),
    DeleteUdfGroup(UdfGroupId),
    DeleteUdfPacketMatcher(UdfPacketMatcherId),
}

#[derive(Default)]
struct FakeState {
    vlans: Vec<VlanRecord>,
    l3_intfs: Vec<L3IntfRecord>,
    l2_stations: Vec<L2StationRecord>,
    default_vlan: Option<VlanId>,
    hosts: Vec<HostRecord>,
    routes: Vec<RouteRecord>,
    egresses: Vec<EgressRecord>,
    ecmps: Vec<EcmpRecord>,
    down_egresses: BTreeSet<EgressId>,
    acl_groups: BTreeMap<FieldGroupId, Vec<AclEntryRecord>>,
    acl_stats: BTreeSet<AclStatHandle>,
    te_flow_groups: BTreeMap<FieldGroupId, Vec<TeFlowRecord>>,
    te_flow_stats: BTreeSet<TeFlowStatHandle>,
    mirrors: Vec<MirrorRecord>,
    mirrored_ports: Vec<MirroredPortRecord>,
    mirrored_acls: Vec<MirroredAclRecord>,
    qos_maps: Vec<QosMapRecord>,
    label_switch_actions: Vec<LabelSwitchRecord>,
    tunnel_initiators: Vec<TunnelInitiatorRecord>,
    rx_reasons: Vec<RxReasonToQueueRecord>,
    switch_settings: SwitchSettingsRecord,
    udf_groups: BTreeMap<UdfGroupId, Vec<UdfPacketMatcherId>>,
    udf_packet_matchers: BTreeSet<UdfPacketMatcherId>,
    trunks: Vec<TrunkRecord>,
    route_counters: RouteCounterState,
    trace: Vec<HwCall>,
    scripted_failures: Vec<(HwCall, HwError)>,
    traversal_faults: BTreeMap<&'static str, HwError>,
}

/// Removes the first element matching `pred`; returns whether one was found.
fn remove_first<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> bool {
    match items.iter().position(pred) {
        Some(pos) => {
            items.remove(pos);
            true
        }
        None => false,
    }
}

/// In-memory ASIC implementing both hardware capabilities.
#[derive(Default)]
pub struct FakeAsic {
    state: Mutex<FakeState>,
}

impl FakeAsic {
    pub fn new() -> Self {
        let asic = Self::default();
        asic.set_default_vlan(VlanId::DEFAULT);
        asic
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Fixture setup
    // ------------------------------------------------------------------

    pub fn add_vlan(&self, vlan: VlanId, ports: impl IntoIterator<Item = PortId>) {
        let ports: BTreeSet<PortId> = ports.into_iter().collect();
        self.state().vlans.push(VlanRecord {
            vlan,
            untagged: ports.clone(),
            ports,
        });
    }

    pub fn set_default_vlan(&self, vlan: VlanId) {
        self.state().default_vlan = Some(vlan);
    }

    pub fn add_l3_intf(&self, intf: L3IntfRecord) {
        self.state().l3_intfs.push(intf);
    }

    pub fn add_l2_station(&self, station: L2StationRecord) {
        self.state().l2_stations.push(station);
    }

    pub fn add_host(&self, host: HostRecord) {
        self.state().hosts.push(host);
    }

    pub fn add_route(&self, route: RouteRecord) {
        self.state().routes.push(route);
    }

    pub fn add_egress(&self, egress: EgressRecord) {
        self.state().egresses.push(egress);
    }

    pub fn add_ecmp(&self, id: EcmpId, members: impl IntoIterator<Item = EgressId>) {
        self.state().ecmps.push(EcmpRecord {
            id,
            members: members.into_iter().collect(),
        });
    }

    /// Drops `egress` from every live ECMP member array, as a link-down would.
    pub fn set_link_down(&self, egress: EgressId) {
        self.state().down_egresses.insert(egress);
    }

    pub fn create_acl_group(&self, group: FieldGroupId) {
        self.state().acl_groups.entry(group).or_default();
    }

    pub fn add_acl_entry(&self, group: FieldGroupId, entry: AclEntryRecord) {
        let mut state = self.state();
        if let Some(stat) = entry.stat {
            state.acl_stats.insert(stat);
        }
        let entries = state.acl_groups.entry(group).or_default();
        entries.push(entry);
        entries.sort_by_key(|e| e.priority);
    }

    pub fn create_te_flow_group(&self, group: FieldGroupId) {
        self.state().te_flow_groups.entry(group).or_default();
    }

    pub fn add_te_flow(&self, group: FieldGroupId, flow: TeFlowRecord) {
        let mut state = self.state();
        if let Some(binding) = flow.stat {
            state.te_flow_stats.insert(binding.stat);
        }
        state.te_flow_groups.entry(group).or_default().push(flow);
    }

    pub fn add_mirror(&self, mirror: MirrorRecord) {
        self.state().mirrors.push(mirror);
    }

    pub fn add_mirrored_port(&self, port: MirroredPortRecord) {
        self.state().mirrored_ports.push(port);
    }

    pub fn add_mirrored_acl(&self, acl: MirroredAclRecord) {
        self.state().mirrored_acls.push(acl);
    }

    pub fn add_qos_map(&self, map: QosMapRecord) {
        self.state().qos_maps.push(map);
    }

    pub fn add_label_switch_action(&self, action: LabelSwitchRecord) {
        self.state().label_switch_actions.push(action);
    }

    pub fn add_tunnel_initiator(&self, tunnel: TunnelInitiatorRecord) {
        self.state().tunnel_initiators.push(tunnel);
    }

    pub fn add_rx_reason_mapping(&self, mapping: RxReasonToQueueRecord) {
        self.state().rx_reasons.push(mapping);
    }

    pub fn set_switch_settings(&self, settings: SwitchSettingsRecord) {
        self.state().switch_settings = settings;
    }

    pub fn add_udf_packet_matcher(&self, matcher: UdfPacketMatcherId) {
        self.state().udf_packet_matchers.insert(matcher);
    }

    pub fn add_udf_group(&self, group: UdfGroupId, matchers: impl IntoIterator<Item = UdfPacketMatcherId>) {
        self.state().udf_groups.insert(group, matchers.into_iter().collect());
    }

    pub fn add_trunk(&self, agg_port: AggregatePortId, trunk: TrunkId) {
        self.state().trunks.push(TrunkRecord { agg_port, trunk });
    }

    pub fn set_route_counters(&self, counters: RouteCounterState) {
        self.state().route_counters = counters;
    }

    /// Makes the next occurrence of `call` fail with `error`.
    pub fn fail_call(&self, call: HwCall, error: HwError) {
        self.state().scripted_failures.push((call, error));
    }

    /// Appends `error` to the end of the named traversal.
    ///
    /// Names match the [`HwEnumerator`] method, e.g. `"routes"`.
    pub fn fail_traversal(&self, traversal: &'static str, error: HwError) {
        self.state().traversal_faults.insert(traversal, error);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Every mutation issued so far, in order.
    pub fn trace(&self) -> Vec<HwCall> {
        self.state().trace.clone()
    }

    pub fn has_egress(&self, id: EgressId) -> bool {
        self.state().egresses.iter().any(|e| e.id == id)
    }

    pub fn has_ecmp(&self, id: EcmpId) -> bool {
        self.state().ecmps.iter().any(|e| e.id == id)
    }

    pub fn has_vlan(&self, vlan: VlanId) -> bool {
        self.state().vlans.iter().any(|v| v.vlan == vlan)
    }

    pub fn acl_entry(&self, handle: AclEntryHandle) -> Option<AclEntryRecord> {
        self.state()
            .acl_groups
            .values()
            .flatten()
            .find(|e| e.handle == handle)
            .cloned()
    }

    pub fn has_acl_stat(&self, stat: AclStatHandle) -> bool {
        self.state().acl_stats.contains(&stat)
    }

    fn traverse<T: Clone + 'static>(&self, name: &'static str, select: impl FnOnce(&FakeState) -> Vec<T>) -> HwIter<'_, T> {
        let state = self.state();
        let items = select(&state);
        let fault = state.traversal_faults.get(name).cloned();
        Box::new(items.into_iter().map(Ok).chain(fault.map(Err)))
    }

    fn mutate(&self, call: HwCall, apply: impl FnOnce(&mut FakeState) -> bool) -> HwResult<()> {
        let mut state = self.state();
        state.trace.push(call.clone());
        if let Some(pos) = state.scripted_failures.iter().position(|(c, _)| *c == call) {
            let (_, error) = state.scripted_failures.remove(pos);
            return Err(error);
        }
        if apply(&mut state) {
            Ok(())
        } else {
            Err(HwError::not_found(format!("{:?}", call)))
        }
    }
}

impl HwEnumerator for FakeAsic {
    fn vlans(&self) -> HwIter<'_, VlanRecord> {
        self.traverse("vlans", |s| s.vlans.clone())
    }

    fn l3_intf(&self, vlan: VlanId, hint: Option<IntfId>) -> HwResult<Option<L3IntfRecord>> {
        let state = self.state();
        let found = match hint {
            Some(id) => state.l3_intfs.iter().find(|i| i.id == id && i.vlan == vlan),
            None => state.l3_intfs.iter().find(|i| i.vlan == vlan),
        };
        Ok(found.cloned())
    }

    fn l2_station(&self, vlan: VlanId) -> HwResult<Option<L2StationRecord>> {
        Ok(self.state().l2_stations.iter().find(|s| s.vlan == vlan).cloned())
    }

    fn default_vlan(&self) -> HwResult<VlanId> {
        self.state()
            .default_vlan
            .ok_or_else(|| HwError::not_found("default vlan"))
    }

    fn hosts(&self) -> HwIter<'_, HostRecord> {
        self.traverse("hosts", |s| s.hosts.clone())
    }

    fn routes(&self) -> HwIter<'_, RouteRecord> {
        self.traverse("routes", |s| s.routes.clone())
    }

    fn egresses(&self) -> HwIter<'_, EgressRecord> {
        self.traverse("egresses", |s| s.egresses.clone())
    }

    fn ecmp_groups(&self) -> HwIter<'_, EcmpRecord> {
        self.traverse("ecmp_groups", |s| {
            s.ecmps
                .iter()
                .map(|e| EcmpRecord {
                    id: e.id,
                    members: e
                        .members
                        .iter()
                        .filter(|m| !s.down_egresses.contains(m))
                        .copied()
                        .collect(),
                })
                .collect()
        })
    }

    fn acl_entries(&self, group: FieldGroupId) -> HwResult<HwIter<'_, AclEntryRecord>> {
        if !self.state().acl_groups.contains_key(&group) {
            return Err(HwError::not_found(format!("field group {}", group)));
        }
        Ok(self.traverse("acl_entries", |s| {
            s.acl_groups.get(&group).cloned().unwrap_or_default()
        }))
    }

    fn te_flow_entries(&self, group: FieldGroupId) -> HwResult<HwIter<'_, TeFlowRecord>> {
        if !self.state().te_flow_groups.contains_key(&group) {
            return Err(HwError::not_found(format!("te-flow group {}", group)));
        }
        Ok(self.traverse("te_flow_entries", |s| {
            s.te_flow_groups.get(&group).cloned().unwrap_or_default()
        }))
    }

    fn mirrors(&self) -> HwIter<'_, MirrorRecord> {
        self.traverse("mirrors", |s| s.mirrors.clone())
    }

    fn mirrored_ports(&self) -> HwIter<'_, MirroredPortRecord> {
        self.traverse("mirrored_ports", |s| s.mirrored_ports.clone())
    }

    fn mirrored_acls(&self) -> HwIter<'_, MirroredAclRecord> {
        self.traverse("mirrored_acls", |s| s.mirrored_acls.clone())
    }

    fn qos_maps(&self) -> HwIter<'_, QosMapRecord> {
        self.traverse("qos_maps", |s| s.qos_maps.clone())
    }

    fn label_switch_actions(&self) -> HwIter<'_, LabelSwitchRecord> {
        self.traverse("label_switch_actions", |s| s.label_switch_actions.clone())
    }

    fn tunnel_initiators(&self) -> HwIter<'_, TunnelInitiatorRecord> {
        self.traverse("tunnel_initiators", |s| s.tunnel_initiators.clone())
    }

    fn rx_reason_to_queue(&self) -> HwIter<'_, RxReasonToQueueRecord> {
        self.traverse("rx_reason_to_queue", |s| s.rx_reasons.clone())
    }

    fn switch_settings(&self) -> HwResult<SwitchSettingsRecord> {
        Ok(self.state().switch_settings.clone())
    }

    fn udf_group_matchers(&self, group: UdfGroupId) -> HwResult<Vec<UdfPacketMatcherId>> {
        self.state()
            .udf_groups
            .get(&group)
            .cloned()
            .ok_or_else(|| HwError::not_found(format!("udf group {}", group)))
    }

    fn trunks(&self) -> HwIter<'_, TrunkRecord> {
        self.traverse("trunks", |s| s.trunks.clone())
    }

    fn route_counters(&self) -> HwResult<RouteCounterState> {
        Ok(self.state().route_counters.clone())
    }
}

impl HwDeleter for FakeAsic {
    fn delete_prefix_route(&self, route: &RouteRecord) -> HwResult<()> {
        let (vrf, prefix) = (route.vrf, route.prefix);
        self.mutate(HwCall::DeletePrefixRoute { vrf, prefix }, |s| {
            remove_first(&mut s.routes, |r| r.vrf == vrf && r.prefix == prefix)
        })
    }

    fn delete_host_route(&self, route: &RouteRecord) -> HwResult<()> {
        let (vrf, prefix) = (route.vrf, route.prefix);
        self.mutate(HwCall::DeleteHostRoute { vrf, prefix }, |s| {
            remove_first(&mut s.routes, |r| r.vrf == vrf && r.prefix == prefix)
        })
    }

    fn delete_label_switch_action(&self, label: MplsLabel) -> HwResult<()> {
        self.mutate(HwCall::DeleteLabelSwitchAction(label), |s| {
            remove_first(&mut s.label_switch_actions, |a| a.label == label)
        })
    }

    fn delete_host(&self, host: &HostRecord) -> HwResult<()> {
        let (vrf, ip) = (host.vrf, host.ip);
        self.mutate(HwCall::DeleteHost { vrf, ip }, |s| {
            remove_first(&mut s.hosts, |h| h.vrf == vrf && h.ip == ip)
        })
    }

    fn destroy_ecmp(&self, ecmp: EcmpId) -> HwResult<()> {
        self.mutate(HwCall::DestroyEcmp(ecmp), |s| remove_first(&mut s.ecmps, |e| e.id == ecmp))
    }

    fn destroy_egress(&self, egress: EgressId) -> HwResult<()> {
        self.mutate(HwCall::DestroyEgress(egress), |s| {
            remove_first(&mut s.egresses, |e| e.id == egress)
        })
    }

    fn delete_tunnel_initiator(&self, intf: TunnelIntfId) -> HwResult<()> {
        self.mutate(HwCall::DeleteTunnelInitiator(intf), |s| {
            remove_first(&mut s.tunnel_initiators, |t| t.intf == intf)
        })
    }

    fn delete_l3_intf(&self, intf: &L3IntfRecord) -> HwResult<()> {
        let id = intf.id;
        self.mutate(HwCall::DeleteL3Intf(id), |s| remove_first(&mut s.l3_intfs, |i| i.id == id))
    }

    fn delete_l2_station(&self, vlan: VlanId) -> HwResult<()> {
        self.mutate(HwCall::DeleteL2Station(vlan), |s| {
            remove_first(&mut s.l2_stations, |st| st.vlan == vlan)
        })
    }

    fn destroy_vlan(&self, vlan: VlanId) -> HwResult<()> {
        self.mutate(HwCall::DestroyVlan(vlan), |s| remove_first(&mut s.vlans, |v| v.vlan == vlan))
    }

    fn detach_acl_stat(&self, entry: AclEntryHandle, stat: AclStatHandle) -> HwResult<()> {
        self.mutate(HwCall::DetachAclStat(entry, stat), |s| {
            match s
                .acl_groups
                .values_mut()
                .flatten()
                .find(|e| e.handle == entry && e.stat == Some(stat))
            {
                Some(e) => {
                    e.stat = None;
                    true
                }
                None => false,
            }
        })
    }

    fn remove_acl_stat(&self, stat: AclStatHandle) -> HwResult<()> {
        self.mutate(HwCall::RemoveAclStat(stat), |s| s.acl_stats.remove(&stat))
    }

    fn remove_acl_entry(&self, entry: AclEntryHandle) -> HwResult<()> {
        self.mutate(HwCall::RemoveAclEntry(entry), |s| {
            s.acl_groups
                .values_mut()
                .any(|entries| remove_first(entries, |e| e.handle == entry))
        })
    }

    fn detach_te_flow_stat(&self, entry: TeFlowEntryHandle, stat: TeFlowStatHandle) -> HwResult<()> {
        self.mutate(HwCall::DetachTeFlowStat(entry, stat), |s| {
            match s
                .te_flow_groups
                .values_mut()
                .flatten()
                .find(|f| f.handle == entry && f.stat.map(|b| b.stat) == Some(stat))
            {
                Some(f) => {
                    f.stat = None;
                    true
                }
                None => false,
            }
        })
    }

    fn remove_te_flow_stat(&self, stat: TeFlowStatHandle) -> HwResult<()> {
        self.mutate(HwCall::RemoveTeFlowStat(stat), |s| s.te_flow_stats.remove(&stat))
    }

    fn remove_te_flow_entry(&self, entry: TeFlowEntryHandle) -> HwResult<()> {
        self.mutate(HwCall::RemoveTeFlowEntry(entry), |s| {
            s.te_flow_groups
                .values_mut()
                .any(|flows| remove_first(flows, |f| f.handle == entry))
        })
    }

    fn delete_rx_reason_mapping(&self, index: u32) -> HwResult<()> {
        self.mutate(HwCall::DeleteRxReasonMapping(index), |s| {
            remove_first(&mut s.rx_reasons, |r| r.index == index)
        })
    }

    fn detach_udf_packet_matcher(&self, group: UdfGroupId, matcher: UdfPacketMatcherId) -> HwResult<()> {
        self.mutate(HwCall::DetachUdfPacketMatcher(group, matcher), |s| {
            match s.udf_groups.get_mut(&group) {
                Some(matchers) => remove_first(matchers, |m| *m == matcher),
                None => false,
            }
        })
    }

    fn delete_udf_group(&self, group: UdfGroupId) -> HwResult<()> {
        self.mutate(HwCall::DeleteUdfGroup(group), |s| s.udf_groups.remove(&group).is_some())
    }

    fn delete_udf_packet_matcher(&self, matcher: UdfPacketMatcherId) -> HwResult<()> {
        self.mutate(HwCall::DeleteUdfPacketMatcher(matcher), |s| {
            s.udf_packet_matchers.remove(&matcher)
        })
    }
}
