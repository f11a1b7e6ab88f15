//! Fixture builders shared by the reconciliation integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use warmboot_hw::fake::FakeAsic;
use warmboot_hw::{
    AclEntryHandle, AclEntryRecord, AclStatHandle, EcmpId, EgressFlags, EgressId, EgressRecord,
    FieldGroupId, HostRecord, IntfId, L2StationRecord, L3IntfRecord, NextHopRef, RouteRecord,
    TeFlowEntryHandle, TeFlowRecord, TeFlowStatBinding, TeFlowStatHandle,
};
use warmboot_reconcile::{ReconcileConfig, ReconciledIndex, RecoveredAux, SnapshotLoader};
use warmboot_types::{MacAddress, PortId, VlanId};

pub const ACL_GROUP: FieldGroupId = FieldGroupId::new(128);
pub const TE_FLOW_GROUP: FieldGroupId = FieldGroupId::new(2);

pub fn vlan(id: u16) -> VlanId {
    VlanId::new(id).unwrap()
}

pub fn mac(last: u8) -> MacAddress {
    MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, last])
}

pub fn egress(id: i32) -> EgressRecord {
    EgressRecord {
        id: EgressId::new(id),
        intf: IntfId::new(1),
        vlan: Some(vlan(2001)),
        mac: mac((id % 250) as u8),
        port: Some(PortId::new(1)),
        flags: EgressFlags::NONE,
        label: None,
    }
}

pub fn flagged_egress(id: i32, flags: EgressFlags) -> EgressRecord {
    EgressRecord {
        flags,
        ..egress(id)
    }
}

pub fn host(ip: &str, egress: i32) -> HostRecord {
    HostRecord {
        vrf: 0,
        ip: ip.parse().unwrap(),
        intf: Some(IntfId::new(1)),
        egress: EgressId::new(egress),
        class_id: None,
    }
}

pub fn route(prefix: &str, next_hop: NextHopRef) -> RouteRecord {
    RouteRecord {
        vrf: 0,
        prefix: prefix.parse().unwrap(),
        next_hop,
        class_id: None,
        counter: None,
    }
}

pub fn l3_intf(id: i32, vlan_id: u16) -> L3IntfRecord {
    L3IntfRecord {
        id: IntfId::new(id),
        vlan: vlan(vlan_id),
        mac: mac(1),
        mtu: 9000,
    }
}

pub fn l2_station(vlan_id: u16) -> L2StationRecord {
    L2StationRecord {
        vlan: vlan(vlan_id),
        mac: mac(1),
    }
}

pub fn acl(handle: i32, priority: i32, stat: Option<i32>) -> AclEntryRecord {
    AclEntryRecord {
        handle: AclEntryHandle::new(handle),
        priority,
        stat: stat.map(AclStatHandle::new),
    }
}

pub fn te_flow(handle: i32, port: u32, dst: &str, stat: Option<i32>) -> TeFlowRecord {
    TeFlowRecord {
        handle: TeFlowEntryHandle::new(handle),
        src_port: PortId::new(port),
        dst_ip: dst.parse().unwrap(),
        next_hop: None,
        stat: stat.map(|stat| TeFlowStatBinding {
            stat: TeFlowStatHandle::new(stat),
            action_index: 0,
        }),
    }
}

/// Snapshot `hwSwitch` section recording the given ECMP paths.
pub fn hw_switch_with_ecmps(ecmps: &[(i32, &[i32])]) -> Value {
    let objects: Vec<Value> = ecmps
        .iter()
        .map(|(id, paths)| json!({ "ecmpEgressId": id, "paths": paths }))
        .collect();
    json!({ "warmBootCache": { "ecmpObjects": objects } })
}

pub fn aux_from(hw_switch: &Value) -> RecoveredAux {
    RecoveredAux::parse(hw_switch)
}

pub fn build(aux: RecoveredAux, asic: &FakeAsic) -> ReconciledIndex {
    ReconciledIndex::build(aux, asic, &ReconcileConfig::default()).unwrap()
}

pub fn loader() -> SnapshotLoader {
    SnapshotLoader::new(&ReconcileConfig::default())
}

pub fn ecmp_id(id: i32) -> EcmpId {
    EcmpId::new(id)
}
