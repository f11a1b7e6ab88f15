//! How cleanup treats hardware delete failures.
//!
//! A target already gone is benign and counted; any other failure is fatal
//! and stops cleanup at that entry.

mod common;

use common::*;
use mockall::mock;
use mockall::predicate::eq;
use pretty_assertions::assert_eq;
use warmboot_hw::fake::{FakeAsic, HwCall};
use warmboot_hw::{
    AclEntryHandle, AclStatHandle, EcmpId, EgressId, HostRecord, HwDeleter, HwError, HwResult,
    HwStatus, L3IntfRecord, MplsLabel, RouteRecord, TeFlowEntryHandle, TeFlowStatHandle,
    TunnelIntfId, UdfGroupId, UdfPacketMatcherId,
};
use warmboot_reconcile::{CleanupStage, ConsistencyFault, Phase, ReconcileError, ReconciledIndex, Reclaimer};
use warmboot_types::{PortId, VlanId};

mock! {
    pub Deleter {}

    impl HwDeleter for Deleter {
        fn delete_prefix_route(&self, route: &RouteRecord) -> HwResult<()>;
        fn delete_host_route(&self, route: &RouteRecord) -> HwResult<()>;
        fn delete_label_switch_action(&self, label: MplsLabel) -> HwResult<()>;
        fn delete_host(&self, host: &HostRecord) -> HwResult<()>;
        fn destroy_ecmp(&self, ecmp: EcmpId) -> HwResult<()>;
        fn destroy_egress(&self, egress: EgressId) -> HwResult<()>;
        fn delete_tunnel_initiator(&self, intf: TunnelIntfId) -> HwResult<()>;
        fn delete_l3_intf(&self, intf: &L3IntfRecord) -> HwResult<()>;
        fn delete_l2_station(&self, vlan: VlanId) -> HwResult<()>;
        fn destroy_vlan(&self, vlan: VlanId) -> HwResult<()>;
        fn detach_acl_stat(&self, entry: AclEntryHandle, stat: AclStatHandle) -> HwResult<()>;
        fn remove_acl_stat(&self, stat: AclStatHandle) -> HwResult<()>;
        fn remove_acl_entry(&self, entry: AclEntryHandle) -> HwResult<()>;
        fn detach_te_flow_stat(&self, entry: TeFlowEntryHandle, stat: TeFlowStatHandle) -> HwResult<()>;
        fn remove_te_flow_stat(&self, stat: TeFlowStatHandle) -> HwResult<()>;
        fn remove_te_flow_entry(&self, entry: TeFlowEntryHandle) -> HwResult<()>;
        fn delete_rx_reason_mapping(&self, index: u32) -> HwResult<()>;
        fn detach_udf_packet_matcher(&self, group: UdfGroupId, matcher: UdfPacketMatcherId) -> HwResult<()>;
        fn delete_udf_group(&self, group: UdfGroupId) -> HwResult<()>;
        fn delete_udf_packet_matcher(&self, matcher: UdfPacketMatcherId) -> HwResult<()>;
    }
}

/// A host, its egress and an ECMP over that egress, none of them claimed.
fn unclaimed_index() -> ReconciledIndex {
    let asic = FakeAsic::new();
    asic.add_egress(egress(100010));
    asic.add_host(host("10.0.0.1", 100010));
    asic.add_ecmp(ecmp_id(200256), [EgressId::new(100010)]);
    build(aux_from(&hw_switch_with_ecmps(&[(200256, &[100010])])), &asic)
}

#[test]
fn already_absent_targets_are_counted_and_skipped() {
    let mut index = unclaimed_index();
    let mut hw = MockDeleter::new();
    hw.expect_delete_host().times(1).returning(|_| Ok(()));
    hw.expect_destroy_ecmp()
        .with(eq(ecmp_id(200256)))
        .times(1)
        .returning(|ecmp| Err(HwError::not_found(format!("ecmp {}", ecmp))));
    hw.expect_destroy_egress()
        .with(eq(EgressId::new(100010)))
        .times(1)
        .returning(|_| Err(HwError::from_status(HwStatus::NotFound, "egress 100010")));

    let report = Reclaimer::new(&hw).run_cleanup(&mut index).unwrap();

    assert_eq!(report.total_deleted(), 1);
    assert_eq!(report.total_already_absent(), 2);
    let ecmps = report.stage(CleanupStage::Ecmps).unwrap();
    assert_eq!((ecmps.deleted, ecmps.already_absent), (0, 1));
    let hosts = report.stage(CleanupStage::Hosts).unwrap();
    assert_eq!((hosts.deleted, hosts.already_absent), (1, 0));
}

#[test]
fn other_failures_stop_cleanup() {
    let mut index = unclaimed_index();
    let mut hw = MockDeleter::new();
    hw.expect_delete_host().times(1).returning(|_| Ok(()));
    hw.expect_destroy_ecmp()
        .times(1)
        .returning(|_| Err(HwError::from_status(HwStatus::Busy, "destroy ecmp")));
    hw.expect_destroy_egress().times(0);

    let err = Reclaimer::new(&hw).run_cleanup(&mut index).unwrap_err();

    match &err {
        ReconcileError::Hardware { context, source } => {
            assert!(context.contains("ecmp"));
            assert!(context.contains("200256"));
            assert_eq!(source.status(), Some(HwStatus::Busy));
        }
        other => panic!("expected hardware error, got {:?}", other),
    }
    assert_eq!(index.phase(), Phase::Cleaned);
}

#[test]
fn failed_cleanup_is_not_retried() {
    let mut index = unclaimed_index();
    let mut hw = MockDeleter::new();
    hw.expect_delete_host()
        .times(1)
        .returning(|_| Err(HwError::internal("sdk wedged")));

    assert!(Reclaimer::new(&hw).run_cleanup(&mut index).is_err());
    let err = Reclaimer::new(&hw).run_cleanup(&mut index).unwrap_err();
    assert_eq!(err.consistency(), Some(&ConsistencyFault::CleanupAlreadyRan));
}

#[test]
fn scripted_fake_failure_names_the_entry() {
    let asic = FakeAsic::new();
    asic.add_vlan(vlan(2001), [PortId::new(1)]);
    asic.add_vlan(vlan(2002), [PortId::new(2)]);
    asic.fail_call(HwCall::DestroyVlan(vlan(2001)), HwError::internal("vlan busy"));
    let mut index = build(Default::default(), &asic);

    let err = Reclaimer::new(&asic).run_cleanup(&mut index).unwrap_err();

    assert!(err.to_string().contains("vlans entry 2001"), "{}", err);
    assert!(err.consistency().is_none());
    // Vlan 2002 sorts after the failing entry and was never attempted.
    assert_eq!(asic.trace(), vec![HwCall::DestroyVlan(vlan(2001))]);
    assert!(asic.has_vlan(vlan(2002)));
}

#[test]
fn entry_removed_behind_our_back_is_already_absent() {
    let asic = FakeAsic::new();
    asic.add_vlan(vlan(2001), [PortId::new(1)]);
    let mut index = build(Default::default(), &asic);
    asic.destroy_vlan(vlan(2001)).unwrap();

    let report = Reclaimer::new(&asic).run_cleanup(&mut index).unwrap();

    let vlans = report.stage(CleanupStage::Vlans).unwrap();
    assert_eq!((vlans.deleted, vlans.already_absent), (0, 1));
    assert_eq!(
        asic.trace(),
        vec![HwCall::DestroyVlan(vlan(2001)), HwCall::DestroyVlan(vlan(2001))]
    );
}
