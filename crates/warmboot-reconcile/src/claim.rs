//! Find/claim operations used by the desired-state replay.
//!
//! Plain lookups and claims go through the per-class tables
//! ([`ReconciledIndex::hosts_mut`] and friends). The operations here span
//! more than one table or consult recovered snapshot data. None of them
//! touch hardware.

use crate::error::{ConsistencyFault, Result, TableKind};
use crate::index::{
    EntryRef, HostKey, LabeledHostKey, MirroredPortKey, QosMapKey, ReconciledIndex,
};
use crate::snapshot::TeFlowTableSettings;
use log::debug;
use std::collections::BTreeSet;
use warmboot_hw::{
    AclEntryHandle, AclStatHandle, EcmpId, EgressId, EgressWeights, HashControlKey, IntfId,
    L2LearningMode, QosMapId, QosMapRecord, QosMapType, QosRule, TeFlowEntryHandle,
    TeFlowStatBinding, VrfId,
};
use warmboot_types::IpAddress;

impl ReconciledIndex {
    /// The counter still attached to an ACL entry, unless replay already
    /// took it over.
    pub fn find_acl_stat(&self, entry: AclEntryHandle) -> Option<EntryRef<'_, AclEntryHandle, AclStatHandle>> {
        self.acl_stats.find_stat(&entry)
    }

    pub fn find_te_flow_stat(
        &self,
        entry: TeFlowEntryHandle,
    ) -> Option<EntryRef<'_, TeFlowEntryHandle, TeFlowStatBinding>> {
        self.te_flow_stats.find_stat(&entry)
    }

    /// Claims an ECMP group and retires its recovered weight set.
    ///
    /// Read the weights with [`Self::get_weighted_members`] before claiming.
    pub fn claim_ecmp(&mut self, ecmp: EcmpId) -> Result<EgressWeights> {
        let weights = self.ecmps.claim(&ecmp)?.clone();
        self.recovered_ecmp.remove(&ecmp);
        debug!("Claimed ecmp {} -> [{}]", ecmp, weights);
        Ok(weights)
    }

    /// The weighted members the snapshot recorded for `ecmp`.
    ///
    /// With nothing recovered at all (cold boot) this is the empty set. With
    /// a recovered map that lacks `ecmp` it is a consistency fault: every
    /// live group was enumerated against that map.
    ///
    /// Claims retire entries from the recovered map, so once every recovered
    /// group is claimed the map is empty again and any id answers with the
    /// empty set, as on a cold boot.
    pub fn get_weighted_members(&self, ecmp: EcmpId) -> Result<EgressWeights> {
        if self.recovered_ecmp.is_empty() {
            return Ok(EgressWeights::new());
        }
        self.recovered_ecmp
            .get(&ecmp)
            .cloned()
            .ok_or_else(|| ConsistencyFault::EcmpNotRecovered { ecmp }.into())
    }

    /// The ECMP group programmed with exactly these weighted members.
    pub fn find_ecmp_by_members(&self, weights: &EgressWeights) -> Option<EntryRef<'_, EcmpId, EgressWeights>> {
        self.ecmps.find_by(|_, members| members == weights)
    }

    /// Egress the previous agent used for a resolved host.
    pub fn find_egress_from_host(&self, vrf: VrfId, ip: IpAddress, intf: Option<IntfId>) -> Option<EgressId> {
        self.host_egress.get(&HostKey::new(vrf, ip, intf)).copied()
    }

    /// Egress the previous agent used for an MPLS next hop.
    pub fn find_egress_from_labeled_host(&self, key: &LabeledHostKey) -> Option<EgressId> {
        self.labeled_host_egress.get(key).copied()
    }

    /// The recovered map a QoS policy used for `map_type`.
    pub fn find_qos_map(&self, policy: &str, map_type: QosMapType) -> Option<(QosMapId, &QosMapRecord)> {
        let key = QosMapKey::new(policy, map_type);
        let id = *self.qos_map_keys.find(&key)?.value();
        let map = self.qos_maps.find(&id)?;
        Some((id, map.value()))
    }

    /// An unclaimed map of `map_type` with exactly `rules`.
    pub fn find_qos_map_by_rules(
        &self,
        map_type: QosMapType,
        rules: &BTreeSet<QosRule>,
    ) -> Option<EntryRef<'_, QosMapId, QosMapRecord>> {
        self.qos_maps
            .iter()
            .find(|entry| !entry.is_claimed() && entry.value().map_type == map_type && &entry.value().rules == rules)
    }

    /// Claims a policy's map key together with the map it names. Neither is
    /// claimed unless both can be.
    pub fn claim_qos_map(&mut self, policy: &str, map_type: QosMapType) -> Result<QosMapId> {
        let key = QosMapKey::new(policy, map_type);
        self.qos_map_keys.check_claim(&key)?;
        let id = *self.qos_map_keys.find(&key).map(|entry| entry.value()).ok_or(
            ConsistencyFault::ClaimMissing {
                table: TableKind::QosMapKey,
                key: key.to_string(),
            },
        )?;
        self.qos_maps.claim(&id)?;
        self.qos_map_keys.claim(&key)?;
        Ok(id)
    }

    /// Claims a mirrored port.
    ///
    /// An sflow entry drags along every other unclaimed sflow entry with the
    /// same mirror and flags, since one sflow configuration programs them
    /// all. Returns every key claimed.
    pub fn claim_mirrored_port(&mut self, key: &MirroredPortKey) -> Result<Vec<MirroredPortKey>> {
        let record = self.mirrored_ports.claim(key)?.clone();
        let mut claimed = vec![*key];
        if record.sflow {
            let siblings: Vec<MirroredPortKey> = self
                .mirrored_ports
                .unclaimed()
                .filter(|(_, other)| other.sflow && other.mirror == record.mirror && other.flags == record.flags)
                .map(|(key, _)| *key)
                .collect();
            for sibling in siblings {
                self.mirrored_ports.claim(&sibling)?;
                claimed.push(sibling);
            }
        }
        Ok(claimed)
    }

    pub fn l2_learning_mode(&self) -> L2LearningMode {
        self.switch_settings.l2_learning
    }

    /// Whether hardware already runs the PTP transparent clock as wanted.
    /// Always false once the setting has been programmed.
    pub fn ptp_tc_matches(&self, enable: bool) -> bool {
        self.switch_settings.ptp_tc_enabled == Some(enable)
    }

    pub fn ptp_tc_programmed(&mut self) {
        self.switch_settings.ptp_tc_enabled = None;
    }

    pub fn hash_control_matches(&self, key: HashControlKey, value: i32) -> bool {
        self.switch_settings.hash_controls.get(&key) == Some(&value)
    }

    /// Retires a recovered hash control after replay reprogrammed it.
    pub fn hash_control_programmed(&mut self, key: HashControlKey) -> Result<()> {
        match self.switch_settings.hash_controls.remove(&key) {
            Some(_) => Ok(()),
            None => Err(ConsistencyFault::HashControlNotRecovered { key: key.to_string() }.into()),
        }
    }

    pub fn te_flow_table_settings(&self) -> Option<TeFlowTableSettings> {
        self.te_flow_table
    }

    pub fn te_flow_table_programmed(&mut self) {
        self.te_flow_table = None;
    }

    pub fn route_counter_mode_id(&self) -> Option<i32> {
        self.route_counter_mode_id
    }

    pub fn route_counter_v6_flex_action_id(&self) -> Option<i32> {
        self.route_counter_v6_flex_action_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcileConfig;
    use crate::error::ReconcileError;
    use crate::snapshot::RecoveredAux;
    use pretty_assertions::assert_eq;
    use warmboot_hw::fake::FakeAsic;
    use warmboot_hw::{
        HashUnit, MirrorHandle, MirroredPortRecord, QosMapRecord, SwitchSettingsRecord,
    };
    use warmboot_types::PortId;

    fn fault(err: ReconcileError) -> ConsistencyFault {
        err.consistency().cloned().expect("consistency fault")
    }

    #[test]
    fn test_weighted_members_on_cold_boot() {
        let index = ReconciledIndex::empty();
        assert!(index.get_weighted_members(EcmpId::new(200256)).unwrap().is_empty());
    }

    #[test]
    fn test_weighted_members_missing_id() {
        let mut aux = RecoveredAux::default();
        aux.ecmp_paths
            .insert(EcmpId::new(200256), EgressWeights::from_paths([EgressId::new(100002)]));
        let index = ReconciledIndex::build(aux, &FakeAsic::new(), &ReconcileConfig::default()).unwrap();
        assert_eq!(
            fault(index.get_weighted_members(EcmpId::new(200300)).unwrap_err()),
            ConsistencyFault::EcmpNotRecovered { ecmp: EcmpId::new(200300) }
        );
        assert_eq!(index.get_weighted_members(EcmpId::new(200256)).unwrap().len(), 1);
    }

    #[test]
    fn test_weighted_members_empty_once_every_group_claimed() {
        let asic = FakeAsic::new();
        asic.add_ecmp(EcmpId::new(200256), [EgressId::new(100002)]);
        let mut aux = RecoveredAux::default();
        aux.ecmp_paths
            .insert(EcmpId::new(200256), EgressWeights::from_paths([EgressId::new(100002)]));
        let mut index = ReconciledIndex::build(aux, &asic, &ReconcileConfig::default()).unwrap();

        assert!(index.get_weighted_members(EcmpId::new(200300)).is_err());
        index.claim_ecmp(EcmpId::new(200256)).unwrap();
        assert!(index.get_weighted_members(EcmpId::new(200300)).unwrap().is_empty());
        assert!(index.get_weighted_members(EcmpId::new(200256)).unwrap().is_empty());
    }

    #[test]
    fn test_sflow_claim_cascades() {
        let asic = FakeAsic::new();
        let mirror = MirrorHandle::new(1);
        for port in [1, 2, 3] {
            asic.add_mirrored_port(MirroredPortRecord {
                port: PortId::new(port),
                flags: 0x2,
                mirror,
                sflow: port != 3,
            });
        }
        let mut index = ReconciledIndex::build(RecoveredAux::default(), &asic, &ReconcileConfig::default()).unwrap();

        let claimed = index
            .claim_mirrored_port(&MirroredPortKey { port: PortId::new(1), flags: 0x2 })
            .unwrap();
        assert_eq!(
            claimed,
            vec![
                MirroredPortKey { port: PortId::new(1), flags: 0x2 },
                MirroredPortKey { port: PortId::new(2), flags: 0x2 },
            ]
        );
        assert_eq!(index.mirrored_ports().unclaimed_len(), 1);
    }

    #[test]
    fn test_qos_claim_takes_key_and_map() {
        let asic = FakeAsic::new();
        let rules: BTreeSet<QosRule> = [QosRule { traffic_class: 0, value: 46 }].into_iter().collect();
        asic.add_qos_map(QosMapRecord {
            id: QosMapId::new(9),
            map_type: QosMapType::IpIngress,
            rules: rules.clone(),
        });
        let mut aux = RecoveredAux::default();
        aux.qos_policies
            .insert(QosMapKey::new("qp1", QosMapType::IpIngress), QosMapId::new(9));
        let mut index = ReconciledIndex::build(aux, &asic, &ReconcileConfig::default()).unwrap();

        let (id, map) = index.find_qos_map("qp1", QosMapType::IpIngress).unwrap();
        assert_eq!(id, QosMapId::new(9));
        assert_eq!(map.rules, rules);
        assert!(index.find_qos_map_by_rules(QosMapType::IpIngress, &rules).is_some());

        assert_eq!(index.claim_qos_map("qp1", QosMapType::IpIngress).unwrap(), QosMapId::new(9));
        assert_eq!(index.qos_maps().unclaimed_len(), 0);
        assert_eq!(index.qos_map_keys().unclaimed_len(), 0);
        assert!(index.find_qos_map_by_rules(QosMapType::IpIngress, &rules).is_none());
    }

    #[test]
    fn test_qos_claim_is_all_or_nothing() {
        let asic = FakeAsic::new();
        asic.add_qos_map(QosMapRecord {
            id: QosMapId::new(9),
            map_type: QosMapType::IpIngress,
            rules: [QosRule { traffic_class: 0, value: 46 }].into_iter().collect(),
        });
        let mut aux = RecoveredAux::default();
        aux.qos_policies
            .insert(QosMapKey::new("qp1", QosMapType::IpIngress), QosMapId::new(9));
        let mut index = ReconciledIndex::build(aux, &asic, &ReconcileConfig::default()).unwrap();
        index.qos_maps_mut().claim(&QosMapId::new(9)).unwrap();

        assert!(matches!(
            fault(index.claim_qos_map("qp1", QosMapType::IpIngress).unwrap_err()),
            ConsistencyFault::DoubleClaim { table: TableKind::QosMap, .. }
        ));
        assert_eq!(index.qos_map_keys().unclaimed_len(), 1);
    }

    #[test]
    fn test_switch_settings_are_one_shot() {
        let asic = FakeAsic::new();
        let key = HashControlKey { unit: HashUnit::EcmpOutput, control: 3 };
        asic.set_switch_settings(SwitchSettingsRecord {
            l2_learning: L2LearningMode::Software,
            ptp_tc_enabled: true,
            hash_controls: [(key, 7)].into_iter().collect(),
        });
        let mut index = ReconciledIndex::build(RecoveredAux::default(), &asic, &ReconcileConfig::default()).unwrap();

        assert_eq!(index.l2_learning_mode(), L2LearningMode::Software);
        assert!(index.ptp_tc_matches(true));
        assert!(!index.ptp_tc_matches(false));
        index.ptp_tc_programmed();
        assert!(!index.ptp_tc_matches(true));

        assert!(index.hash_control_matches(key, 7));
        assert!(!index.hash_control_matches(key, 8));
        index.hash_control_programmed(key).unwrap();
        assert!(!index.hash_control_matches(key, 7));
        assert!(matches!(
            fault(index.hash_control_programmed(key).unwrap_err()),
            ConsistencyFault::HashControlNotRecovered { .. }
        ));
    }

    #[test]
    fn test_egress_lookup_from_snapshot_hosts() {
        let mut aux = RecoveredAux::default();
        let ll: IpAddress = "fe80::1".parse().unwrap();
        aux.host_egress
            .insert(HostKey::new(0, ll, Some(IntfId::new(4))), EgressId::new(100007));
        let index = ReconciledIndex::build(aux, &FakeAsic::new(), &ReconcileConfig::default()).unwrap();
        assert_eq!(
            index.find_egress_from_host(0, ll, Some(IntfId::new(4))),
            Some(EgressId::new(100007))
        );
        assert_eq!(index.find_egress_from_host(0, ll, Some(IntfId::new(5))), None);
    }
}
