//! Cross-checks between snapshot, hardware and claim bookkeeping.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeSet;
use warmboot_hw::fake::FakeAsic;
use warmboot_hw::{
    EgressId, HwError, MirrorHandle, MirrorRecord, MirroredPortRecord, QosMapId, QosMapRecord,
    QosMapType, QosRule,
};
use warmboot_reconcile::index::MirroredPortKey;
use warmboot_reconcile::{
    ConsistencyFault, ReconcileConfig, ReconcileError, ReconciledIndex, Reclaimer, RecoveredAux,
    TableKind,
};
use warmboot_types::PortId;

fn build_err(aux: RecoveredAux, asic: &FakeAsic) -> ReconcileError {
    ReconciledIndex::build(aux, asic, &ReconcileConfig::default()).unwrap_err()
}

fn fault(err: &ReconcileError) -> &ConsistencyFault {
    err.consistency()
        .unwrap_or_else(|| panic!("expected consistency fault, got {:?}", err))
}

fn dscp_map(id: i32) -> QosMapRecord {
    QosMapRecord {
        id: QosMapId::new(id),
        map_type: QosMapType::IpIngress,
        rules: BTreeSet::from([
            QosRule {
                traffic_class: 0,
                value: 10,
            },
            QosRule {
                traffic_class: 7,
                value: 48,
            },
        ]),
    }
}

#[test]
fn duplicate_host_is_fatal() {
    let asic = FakeAsic::new();
    asic.add_egress(egress(100010));
    asic.add_host(host("10.0.0.1", 100010));
    asic.add_host(host("10.0.0.1", 100010));

    let err = build_err(RecoveredAux::default(), &asic);
    assert!(matches!(
        fault(&err),
        ConsistencyFault::DuplicateEntry {
            table: TableKind::Host,
            ..
        }
    ));
}

#[test]
fn unreferenced_plain_egress_is_fatal() {
    let asic = FakeAsic::new();
    asic.add_egress(egress(100012));

    let err = build_err(RecoveredAux::default(), &asic);
    assert!(matches!(
        fault(&err),
        ConsistencyFault::UnreferencedEgress { egress, .. } if *egress == EgressId::new(100012)
    ));
}

#[test]
fn snapshot_host_references_egress() {
    let asic = FakeAsic::new();
    asic.add_egress(egress(100012));
    let aux = aux_from(&json!({
        "hostTable": { "hosts": [{ "vrf": 0, "ip": "10.0.0.9", "egressId": 100012 }] }
    }));

    let index = build(aux, &asic);
    assert!(index.egresses().find(&EgressId::new(100012)).is_some());
    assert_eq!(
        index.find_egress_from_host(0, "10.0.0.9".parse().unwrap(), None),
        Some(EgressId::new(100012))
    );
}

#[test]
fn live_ecmp_without_snapshot_weights_is_fatal() {
    let asic = FakeAsic::new();
    asic.add_egress(egress(100010));
    asic.add_host(host("10.0.0.1", 100010));
    asic.add_ecmp(ecmp_id(200256), [EgressId::new(100010)]);

    let err = build_err(RecoveredAux::default(), &asic);
    assert_eq!(
        fault(&err),
        &ConsistencyFault::UnrecoveredEcmpMembership {
            ecmp: ecmp_id(200256),
            live_members: 1,
        }
    );
}

#[test]
fn memberless_ecmp_without_snapshot_weights_is_skipped() {
    let asic = FakeAsic::new();
    asic.add_ecmp(ecmp_id(200257), Vec::<EgressId>::new());

    let index = build(RecoveredAux::default(), &asic);
    assert!(index.ecmps().is_empty());
}

#[test]
fn empty_recovered_weights_are_fatal() {
    let asic = FakeAsic::new();
    asic.add_ecmp(ecmp_id(200256), Vec::<EgressId>::new());

    let err = build_err(aux_from(&hw_switch_with_ecmps(&[(200256, &[])])), &asic);
    assert_eq!(
        fault(&err),
        &ConsistencyFault::EmptyRecoveredEcmp {
            ecmp: ecmp_id(200256)
        }
    );
}

#[test]
fn ecmps_with_equal_membership_are_fatal() {
    let asic = FakeAsic::new();
    asic.add_egress(egress(100010));
    asic.add_host(host("10.0.0.1", 100010));
    asic.add_ecmp(ecmp_id(200256), [EgressId::new(100010)]);
    asic.add_ecmp(ecmp_id(200258), [EgressId::new(100010)]);
    let aux = aux_from(&hw_switch_with_ecmps(&[
        (200256, &[100010]),
        (200258, &[100010]),
    ]));

    let err = build_err(aux, &asic);
    assert_eq!(
        fault(&err),
        &ConsistencyFault::DuplicateEcmpMembership {
            ecmp: ecmp_id(200258),
            existing: ecmp_id(200256),
        }
    );
}

#[test]
fn unknown_ecmp_lookup_is_fatal_once_anything_was_recovered() {
    let asic = FakeAsic::new();
    let cold = build(RecoveredAux::default(), &asic);
    assert!(cold.get_weighted_members(ecmp_id(1)).unwrap().is_empty());

    let warm = build(aux_from(&hw_switch_with_ecmps(&[(200256, &[100010])])), &asic);
    let err = warm.get_weighted_members(ecmp_id(200300)).unwrap_err();
    assert_eq!(
        fault(&err),
        &ConsistencyFault::EcmpNotRecovered {
            ecmp: ecmp_id(200300)
        }
    );
}

#[test]
fn double_claim_is_fatal() {
    let asic = FakeAsic::new();
    asic.add_vlan(vlan(2001), [PortId::new(1)]);
    let mut index = build(RecoveredAux::default(), &asic);

    index.vlans_mut().claim(&vlan(2001)).unwrap();
    let err = index.vlans_mut().claim(&vlan(2001)).unwrap_err();
    assert!(matches!(
        err,
        ConsistencyFault::DoubleClaim {
            table: TableKind::Vlan,
            ..
        }
    ));
}

#[test]
fn claiming_unrecovered_entry_is_fatal() {
    let asic = FakeAsic::new();
    let mut index = build(RecoveredAux::default(), &asic);

    let err = index.vlans_mut().claim(&vlan(3000)).unwrap_err();
    assert_eq!(
        err,
        ConsistencyFault::ClaimMissing {
            table: TableKind::Vlan,
            key: "3000".to_string(),
        }
    );
}

#[test]
fn malformed_entry_is_skipped() {
    let asic = FakeAsic::new();
    asic.add_egress(egress(100010));
    asic.add_host(host("10.0.0.1", 100010));
    asic.fail_traversal("hosts", HwError::malformed("host 10.0.0.2"));

    let index = build(RecoveredAux::default(), &asic);
    assert_eq!(index.hosts().len(), 1);
}

#[test]
fn traversal_failure_is_fatal() {
    let asic = FakeAsic::new();
    asic.fail_traversal("routes", HwError::internal("dma timeout"));

    let err = build_err(RecoveredAux::default(), &asic);
    match err {
        ReconcileError::Hardware { context, .. } => assert!(context.contains("route"), "{}", context),
        other => panic!("expected hardware error, got {:?}", other),
    }
}

#[test]
fn unclaimed_mirror_survives_to_cleanup_fault() {
    let asic = FakeAsic::new();
    asic.add_mirror(MirrorRecord {
        handle: MirrorHandle::new(1),
        egress_port: PortId::new(9),
        tunnel: None,
    });
    let mut index = build(RecoveredAux::default(), &asic);

    let err = Reclaimer::new(&asic).run_cleanup(&mut index).unwrap_err();
    assert_eq!(
        fault(&err),
        &ConsistencyFault::UnclaimedSurvivors {
            table: TableKind::Mirror,
            count: 1,
        }
    );
}

#[test]
fn sflow_claim_takes_siblings_along() {
    let asic = FakeAsic::new();
    let mirror = MirrorHandle::new(1);
    asic.add_mirror(MirrorRecord {
        handle: mirror,
        egress_port: PortId::new(9),
        tunnel: None,
    });
    for port in 1..=3 {
        asic.add_mirrored_port(MirroredPortRecord {
            port: PortId::new(port),
            flags: 0x4,
            mirror,
            sflow: true,
        });
    }
    let mut index = build(RecoveredAux::default(), &asic);

    let first = MirroredPortKey {
        port: PortId::new(1),
        flags: 0x4,
    };
    let claimed = index.claim_mirrored_port(&first).unwrap();
    assert_eq!(claimed.len(), 3);
    assert_eq!(index.mirrored_ports().unclaimed_len(), 0);

    let key = index.mirrors().iter().next().unwrap().key().clone();
    index.mirrors_mut().claim(&key).unwrap();
    assert!(Reclaimer::new(&asic).run_cleanup(&mut index).is_ok());
}

#[test]
fn unclaimed_qos_policy_key_is_fatal() {
    let asic = FakeAsic::new();
    asic.add_qos_map(dscp_map(5));
    let aux = aux_from(&json!({ "qosPolicyTable": { "default": { "inDscp": 5 } } }));
    let mut index = build(aux, &asic);

    let (id, _) = index.find_qos_map("default", QosMapType::IpIngress).unwrap();
    assert_eq!(id, QosMapId::new(5));

    let err = Reclaimer::new(&asic).run_cleanup(&mut index).unwrap_err();
    assert_eq!(
        fault(&err),
        &ConsistencyFault::UnclaimedSurvivors {
            table: TableKind::QosMapKey,
            count: 1,
        }
    );
}

#[test]
fn unclaimed_qos_map_is_fatal() {
    let asic = FakeAsic::new();
    asic.add_qos_map(dscp_map(5));
    asic.add_qos_map(dscp_map(6));
    let aux = aux_from(&json!({ "qosPolicyTable": { "default": { "inDscp": 5 } } }));
    let mut index = build(aux, &asic);

    assert_eq!(index.claim_qos_map("default", QosMapType::IpIngress).unwrap(), QosMapId::new(5));
    let spare = index
        .find_qos_map_by_rules(QosMapType::IpIngress, &dscp_map(6).rules)
        .unwrap();
    assert_eq!(*spare.key(), QosMapId::new(6));

    let err = Reclaimer::new(&asic).run_cleanup(&mut index).unwrap_err();
    assert_eq!(
        fault(&err),
        &ConsistencyFault::UnclaimedSurvivors {
            table: TableKind::QosMap,
            count: 1,
        }
    );
}

#[test]
fn qos_policy_naming_a_vanished_map_fails_cleanup() {
    let asic = FakeAsic::new();
    let aux = aux_from(&json!({ "qosPolicyTable": { "default": { "inDscp": 5 } } }));

    let mut index = build(aux, &asic);
    assert_eq!(index.qos_map_keys().len(), 1);
    assert!(index.find_qos_map("default", QosMapType::IpIngress).is_none());
    assert!(matches!(
        index.claim_qos_map("default", QosMapType::IpIngress),
        Err(ReconcileError::Consistency(ConsistencyFault::ClaimMissing {
            table: TableKind::QosMap,
            ..
        }))
    ));

    let err = Reclaimer::new(&asic).run_cleanup(&mut index).unwrap_err();
    assert_eq!(
        fault(&err),
        &ConsistencyFault::UnclaimedSurvivors {
            table: TableKind::QosMapKey,
            count: 1,
        }
    );
}
