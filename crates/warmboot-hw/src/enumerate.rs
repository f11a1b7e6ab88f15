//! Live table traversal capability.

use crate::error::HwResult;
use crate::handle::{FieldGroupId, IntfId, UdfGroupId, UdfPacketMatcherId};
use crate::records::*;
use warmboot_types::VlanId;

/// A lazy, finite, single-pass traversal of one hardware table.
///
/// An `Err` item is a failed read of one record. Whether it aborts the
/// traversal is the caller's decision; see [`crate::HwError::is_entry_scoped`].
pub type HwIter<'a, T> = Box<dyn Iterator<Item = HwResult<T>> + 'a>;

/// Read-only view of what the ASIC currently has programmed.
///
/// One traversal per object class. A correct implementation yields every
/// live object exactly once per call; callers treat a repeated identifier
/// as a consistency fault rather than deduplicating.
pub trait HwEnumerator {
    fn vlans(&self) -> HwIter<'_, VlanRecord>;

    /// Looks up the L3 interface bound to `vlan`.
    ///
    /// With a `hint` the lookup is by interface id; several interfaces can
    /// share a VLAN (an L3 interface plus MPLS tunnels) and only the hint
    /// tells them apart. Returns `Ok(None)` when no interface exists.
    fn l3_intf(&self, vlan: VlanId, hint: Option<IntfId>) -> HwResult<Option<L3IntfRecord>>;

    fn l2_station(&self, vlan: VlanId) -> HwResult<Option<L2StationRecord>>;

    /// The VLAN the platform creates itself and never lets go of.
    fn default_vlan(&self) -> HwResult<VlanId>;

    /// IPv4 and IPv6 host table entries.
    fn hosts(&self) -> HwIter<'_, HostRecord>;

    /// IPv4 and IPv6 LPM route entries, full-mask routes included.
    fn routes(&self) -> HwIter<'_, RouteRecord>;

    fn egresses(&self) -> HwIter<'_, EgressRecord>;

    fn ecmp_groups(&self) -> HwIter<'_, EcmpRecord>;

    /// Entries of one field-processor group in ascending priority order.
    ///
    /// Fails with a not-found error when the group itself does not exist.
    fn acl_entries(&self, group: FieldGroupId) -> HwResult<HwIter<'_, AclEntryRecord>>;

    /// Exact-match TE-flow entries; same group semantics as [`Self::acl_entries`].
    fn te_flow_entries(&self, group: FieldGroupId) -> HwResult<HwIter<'_, TeFlowRecord>>;

    fn mirrors(&self) -> HwIter<'_, MirrorRecord>;

    fn mirrored_ports(&self) -> HwIter<'_, MirroredPortRecord>;

    fn mirrored_acls(&self) -> HwIter<'_, MirroredAclRecord>;

    fn qos_maps(&self) -> HwIter<'_, QosMapRecord>;

    fn label_switch_actions(&self) -> HwIter<'_, LabelSwitchRecord>;

    fn tunnel_initiators(&self) -> HwIter<'_, TunnelInitiatorRecord>;

    fn rx_reason_to_queue(&self) -> HwIter<'_, RxReasonToQueueRecord>;

    fn switch_settings(&self) -> HwResult<SwitchSettingsRecord>;

    /// Packet matchers currently attached to a UDF group.
    fn udf_group_matchers(&self, group: UdfGroupId) -> HwResult<Vec<UdfPacketMatcherId>>;

    fn trunks(&self) -> HwIter<'_, TrunkRecord>;

    fn route_counters(&self) -> HwResult<RouteCounterState>;
}
