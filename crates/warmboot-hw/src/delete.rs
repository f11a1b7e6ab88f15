//! Delete and detach primitives used when reclaiming unclaimed objects.

use crate::error::HwResult;
use crate::handle::*;
use crate::records::{HostRecord, L3IntfRecord, MplsLabel, RouteRecord};
use warmboot_types::VlanId;

/// One delete-by-handle or detach operation per object class.
///
/// A target that is already gone must be reported as a not-found error so
/// the caller can tell it apart from a real failure.
pub trait HwDeleter {
    /// Deletes a route from the LPM table.
    fn delete_prefix_route(&self, route: &RouteRecord) -> HwResult<()>;

    /// Deletes a full-mask route placed in the host-route table.
    fn delete_host_route(&self, route: &RouteRecord) -> HwResult<()>;

    fn delete_label_switch_action(&self, label: MplsLabel) -> HwResult<()>;

    fn delete_host(&self, host: &HostRecord) -> HwResult<()>;

    fn destroy_ecmp(&self, ecmp: EcmpId) -> HwResult<()>;

    fn destroy_egress(&self, egress: EgressId) -> HwResult<()>;

    fn delete_tunnel_initiator(&self, intf: TunnelIntfId) -> HwResult<()>;

    fn delete_l3_intf(&self, intf: &L3IntfRecord) -> HwResult<()>;

    fn delete_l2_station(&self, vlan: VlanId) -> HwResult<()>;

    fn destroy_vlan(&self, vlan: VlanId) -> HwResult<()>;

    /// Detaches a counter from an ACL entry without touching the entry.
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
