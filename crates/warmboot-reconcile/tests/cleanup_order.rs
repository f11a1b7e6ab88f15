//! Cleanup deletes in dependency order: referrers before referents.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use warmboot_hw::fake::{FakeAsic, HwCall};
use warmboot_hw::{
    AclEntryHandle, AclStatHandle, EcmpId, EgressId, IntfId, LabelAction, LabelSwitchRecord,
    NextHopRef, RxReason, RxReasonToQueueRecord, TeFlowEntryHandle, TeFlowStatHandle,
    TunnelInitiatorRecord, TunnelIntfId, UdfGroupId, UdfPacketMatcherId,
};
use warmboot_reconcile::{CleanupStage, ConsistencyFault, ReconciledIndex, Reclaimer};
use warmboot_types::PortId;

const ECMP: i32 = 200256;

/// One live object of every deletable class, all referencing each other
/// the way a programmed switch would.
fn populated_asic() -> FakeAsic {
    let asic = FakeAsic::new();
    asic.add_vlan(vlan(1), [PortId::new(1)]);
    asic.add_vlan(vlan(2001), [PortId::new(2)]);
    asic.add_l3_intf(l3_intf(10, 2001));
    asic.add_l2_station(l2_station(2001));

    asic.add_egress(egress(100010));
    asic.add_egress(egress(100011));
    asic.add_ecmp(ecmp_id(ECMP), [EgressId::new(100010), EgressId::new(100011)]);
    asic.add_host(host("10.0.0.1", 100010));
    asic.add_route(route("10.1.0.0/16", NextHopRef::Egress(EgressId::new(100011))));
    asic.add_route(route("10.2.0.1/32", NextHopRef::Ecmp(ecmp_id(ECMP))));

    asic.add_label_switch_action(LabelSwitchRecord {
        label: 1001,
        action: LabelAction::Swap(2001),
        next_hop: Some(NextHopRef::Egress(EgressId::new(100011))),
    });
    asic.add_tunnel_initiator(TunnelInitiatorRecord {
        intf: TunnelIntfId::new(5),
        vlan: vlan(2001),
        stack: vec![100, 200],
    });

    asic.create_acl_group(ACL_GROUP);
    asic.add_acl_entry(ACL_GROUP, acl(1, 10, Some(11)));
    asic.create_te_flow_group(TE_FLOW_GROUP);
    asic.add_te_flow(TE_FLOW_GROUP, te_flow(40, 3, "2401:db00::/64", Some(41)));

    asic.add_rx_reason_mapping(RxReasonToQueueRecord {
        index: 0,
        reason: RxReason::Bgp,
        queue: 7,
    });
    asic.add_udf_packet_matcher(UdfPacketMatcherId::new(4));
    asic.add_udf_group(UdfGroupId::new(3), [UdfPacketMatcherId::new(4)]);
    asic
}

fn populated_index(asic: &FakeAsic) -> ReconciledIndex {
    let mut hw_switch = hw_switch_with_ecmps(&[(ECMP, &[100010, 100011])]);
    hw_switch["udf"] = json!({
        "udfGroups": { "dstPort": 3 },
        "udfPacketMatchers": { "l4Udp": 4 },
    });
    build(aux_from(&hw_switch), asic)
}

/// Claims every recovered entry, as a replay that re-derived the whole
/// configuration would.
fn claim_everything(index: &mut ReconciledIndex) {
    let ecmps: Vec<EcmpId> = index.ecmps().iter().map(|e| *e.key()).collect();
    for ecmp in ecmps {
        index.claim_ecmp(ecmp).unwrap();
    }

    macro_rules! claim_all {
        ($($table:ident, $table_mut:ident;)*) => {
            $(
                let keys: Vec<_> = index.$table().iter().map(|e| e.key().clone()).collect();
                for key in &keys {
                    index.$table_mut().claim(key).unwrap();
                }
            )*
        };
    }
    claim_all! {
        prefix_routes, prefix_routes_mut;
        host_routes, host_routes_mut;
        label_switch_actions, label_switch_actions_mut;
        hosts, hosts_mut;
        egresses, egresses_mut;
        label_stacks, label_stacks_mut;
        l3_intfs, l3_intfs_mut;
        l2_stations, l2_stations_mut;
        vlans, vlans_mut;
        acl_entries, acl_entries_mut;
        acl_stats, acl_stats_mut;
        te_flows, te_flows_mut;
        te_flow_stats, te_flow_stats_mut;
        rx_reasons, rx_reasons_mut;
        udf_groups, udf_groups_mut;
        udf_packet_matchers, udf_packet_matchers_mut;
    }
}

#[test]
fn unclaimed_entries_are_deleted_in_dependency_order() {
    let asic = populated_asic();
    let mut index = populated_index(&asic);

    let report = Reclaimer::new(&asic).run_cleanup(&mut index).unwrap();

    assert_eq!(
        asic.trace(),
        vec![
            HwCall::DeletePrefixRoute {
                vrf: 0,
                prefix: "10.1.0.0/16".parse().unwrap(),
            },
            HwCall::DeleteHostRoute {
                vrf: 0,
                prefix: "10.2.0.1/32".parse().unwrap(),
            },
            HwCall::DeleteLabelSwitchAction(1001),
            HwCall::DeleteHost {
                vrf: 0,
                ip: "10.0.0.1".parse().unwrap(),
            },
            HwCall::DestroyEcmp(ecmp_id(ECMP)),
            HwCall::DestroyEgress(EgressId::new(100010)),
            HwCall::DestroyEgress(EgressId::new(100011)),
            HwCall::DeleteTunnelInitiator(TunnelIntfId::new(5)),
            HwCall::DeleteL3Intf(IntfId::new(10)),
            HwCall::DeleteL2Station(vlan(2001)),
            HwCall::DestroyVlan(vlan(2001)),
            HwCall::DetachAclStat(AclEntryHandle::new(1), AclStatHandle::new(11)),
            HwCall::RemoveAclStat(AclStatHandle::new(11)),
            HwCall::RemoveAclEntry(AclEntryHandle::new(1)),
            HwCall::DetachTeFlowStat(TeFlowEntryHandle::new(40), TeFlowStatHandle::new(41)),
            HwCall::RemoveTeFlowStat(TeFlowStatHandle::new(41)),
            HwCall::RemoveTeFlowEntry(TeFlowEntryHandle::new(40)),
            HwCall::DeleteRxReasonMapping(0),
            HwCall::DetachUdfPacketMatcher(UdfGroupId::new(3), UdfPacketMatcherId::new(4)),
            HwCall::DeleteUdfGroup(UdfGroupId::new(3)),
            HwCall::DeleteUdfPacketMatcher(UdfPacketMatcherId::new(4)),
        ]
    );
    assert_eq!(report.total_deleted(), 21);
    assert_eq!(report.total_already_absent(), 0);
}

#[test]
fn default_vlan_is_retained() {
    let asic = populated_asic();
    let mut index = populated_index(&asic);

    let report = Reclaimer::new(&asic).run_cleanup(&mut index).unwrap();

    assert!(asic.has_vlan(vlan(1)));
    assert!(!asic.has_vlan(vlan(2001)));
    let vlans = report.stage(CleanupStage::Vlans).unwrap();
    assert_eq!((vlans.deleted, vlans.retained), (1, 1));
}

#[test]
fn fully_replayed_index_deletes_nothing() {
    let asic = populated_asic();
    let mut index = populated_index(&asic);
    claim_everything(&mut index);
    assert_eq!(index.unclaimed_total(), 0);

    let report = Reclaimer::new(&asic).run_cleanup(&mut index).unwrap();

    assert!(asic.trace().is_empty());
    assert_eq!(report.total_deleted(), 0);
    assert_eq!(report.stage(CleanupStage::Ecmps).unwrap().retained, 1);
    assert_eq!(report.stage(CleanupStage::Egresses).unwrap().retained, 2);
    assert!(asic.has_ecmp(ecmp_id(ECMP)));
}

#[test]
fn partially_replayed_index_keeps_claimed_dependencies() {
    let asic = populated_asic();
    let mut index = populated_index(&asic);

    // Only the host and its egress were re-derived.
    let key = index.hosts().iter().next().unwrap().key().clone();
    index.hosts_mut().claim(&key).unwrap();
    index.egresses_mut().claim(&EgressId::new(100010)).unwrap();

    Reclaimer::new(&asic).run_cleanup(&mut index).unwrap();

    let trace = asic.trace();
    assert!(!trace.iter().any(|c| matches!(c, HwCall::DeleteHost { .. })));
    assert!(!trace.contains(&HwCall::DestroyEgress(EgressId::new(100010))));
    assert!(trace.contains(&HwCall::DestroyEgress(EgressId::new(100011))));
    assert!(asic.has_egress(EgressId::new(100010)));
}

#[test]
fn cleanup_runs_once() {
    let asic = populated_asic();
    let mut index = populated_index(&asic);

    Reclaimer::new(&asic).run_cleanup(&mut index).unwrap();
    let calls = asic.trace().len();

    let err = Reclaimer::new(&asic).run_cleanup(&mut index).unwrap_err();
    assert_eq!(err.consistency(), Some(&ConsistencyFault::CleanupAlreadyRan));
    assert_eq!(asic.trace().len(), calls);
}

#[test]
fn claims_after_cleanup_are_refused() {
    let asic = populated_asic();
    let mut index = populated_index(&asic);
    Reclaimer::new(&asic).run_cleanup(&mut index).unwrap();

    let err = index.vlans_mut().claim(&vlan(1)).unwrap_err();
    assert!(matches!(err, ConsistencyFault::ClaimAfterCleanup { .. }));
}
