//! Snapshot loading.
//!
//! The desired-state tree must deserialize or the whole warm boot is
//! abandoned. The auxiliary `hwSwitch` sections are read leniently: a
//! missing section is an empty table, a malformed entry is skipped.

use super::document::{self, section};
use super::sections::{
    EcmpHostEntry, EcmpObjectEntry, HostEntry, IntfTableEntry, MplsNextHopEntry, PathEntry,
    QosPolicyEntry, RouteCounterSection, TeFlowTableSettings,
};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::config::ReconcileConfig;
use crate::error::{DumpOutcome, ReconcileError, Result};
use crate::index::keys::{HostKey, LabeledHostKey, MplsNextHopLabels, QosMapKey};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use warmboot_hw::{
    AggregatePortId, EcmpId, EgressId, EgressWeights, HwHandle, HandleKind, IntfId, QosMapId,
    QosMapType, RawHandle, RouteCounterId, RouteCounterState, TrunkId, UdfGroupId,
    UdfPacketMatcherId,
};
use warmboot_types::VlanId;

/// Everything the snapshot says about hardware, keyed for the index build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveredAux {
    /// ECMP id to the weighted egress set it had before shutdown.
    pub ecmp_paths: BTreeMap<EcmpId, EgressWeights>,
    pub trunks: BTreeMap<AggregatePortId, TrunkId>,
    pub route_counters: RouteCounterState,
    pub host_egress: BTreeMap<HostKey, EgressId>,
    pub labeled_host_egress: BTreeMap<LabeledHostKey, EgressId>,
    /// Which L3 interface to pick for a VLAN carrying more than one.
    pub intf_hints: BTreeMap<VlanId, IntfId>,
    pub qos_policies: BTreeMap<QosMapKey, QosMapId>,
    pub te_flow_table: Option<TeFlowTableSettings>,
    pub udf_groups: BTreeMap<String, UdfGroupId>,
    pub udf_packet_matchers: BTreeMap<String, UdfPacketMatcherId>,
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct RecoveredModel<S> {
    pub desired_state: S,
    pub aux: RecoveredAux,
}

/// Reads warm-boot snapshot documents.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    dump_path: PathBuf,
}

impl SnapshotLoader {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            dump_path: config.diagnostic_dump_path.clone(),
        }
    }

    /// Loads a parsed snapshot document. Never touches hardware.
    pub fn load<S: DeserializeOwned>(&self, doc: &Value) -> Result<RecoveredModel<S>> {
        let desired_state = self.load_desired_state(doc)?;
        let aux = match doc.get(document::HW_SWITCH) {
            Some(hw_switch) => RecoveredAux::parse(hw_switch),
            None => {
                info!("Snapshot has no {} section, recovering no hardware state", document::HW_SWITCH);
                RecoveredAux::default()
            }
        };
        info!(
            "Loaded warm boot snapshot: {} ecmp groups, {} hosts, {} labeled hosts, {} trunks",
            aux.ecmp_paths.len(),
            aux.host_egress.len(),
            aux.labeled_host_egress.len(),
            aux.trunks.len()
        );
        Ok(RecoveredModel { desired_state, aux })
    }

    /// Loads a snapshot from its JSON text.
    pub fn load_str<S: DeserializeOwned>(&self, json: &str) -> Result<RecoveredModel<S>> {
        let doc: Value = serde_json::from_str(json).map_err(|e| {
            self.fail(
                format!("snapshot is not valid JSON: {}", e),
                DumpOutcome::NothingToDump,
            )
        })?;
        self.load(&doc)
    }

    /// Loads a snapshot file. An unreadable file is a deserialization fault.
    pub fn load_file<S: DeserializeOwned>(&self, path: &Path) -> Result<RecoveredModel<S>> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            self.fail(
                format!("unable to read snapshot {}: {}", path.display(), e),
                DumpOutcome::NothingToDump,
            )
        })?;
        self.load_str(&json)
    }

    fn load_desired_state<S: DeserializeOwned>(&self, doc: &Value) -> Result<S> {
        let sw_switch = doc.get(document::SW_SWITCH).cloned().unwrap_or(Value::Null);
        serde_json::from_value(sw_switch).map_err(|e| {
            let reason = format!("unable to deserialize {}: {}", document::SW_SWITCH, e);
            let dump = self.dump_switch_state(doc);
            self.fail(reason, dump)
        })
    }

    /// Writes the raw configuration state for post-mortem. Best effort.
    fn dump_switch_state(&self, doc: &Value) -> DumpOutcome {
        let Some(state) = doc
            .get(document::THRIFT_SWITCH_STATE)
            .or_else(|| doc.get(document::SW_SWITCH))
        else {
            return DumpOutcome::NothingToDump;
        };

        let path = self.dump_path.clone();
        let written = serde_json::to_string_pretty(state)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                std::fs::write(&path, json).map_err(|e| e.to_string())
            });

        match written {
            Ok(()) => {
                info!("Dumped recovered switch state to {}", path.display());
                DumpOutcome::Written(path)
            }
            Err(reason) => {
                error!("Failed to dump recovered switch state to {}: {}", path.display(), reason);
                DumpOutcome::Failed { path, reason }
            }
        }
    }

    fn fail(&self, reason: String, dump: DumpOutcome) -> ReconcileError {
        error!("Warm boot snapshot unusable: {} ({})", reason, dump);
        audit_log!(AuditRecord::new(AuditCategory::ErrorCondition, "SnapshotLoader", "load_snapshot")
            .with_outcome(AuditOutcome::Failure)
            .with_details(serde_json::json!({ "dump": dump.to_string() }))
            .with_error(reason.clone()));
        ReconcileError::Deserialization { reason, dump }
    }
}

impl RecoveredAux {
    /// Parses the `hwSwitch` section. Never fails.
    pub fn parse(hw_switch: &Value) -> Self {
        let mut aux = RecoveredAux::default();
        aux.parse_host_table(hw_switch);
        aux.parse_warm_boot_cache(hw_switch);
        aux.parse_mpls_next_hops(hw_switch);
        aux.parse_intf_table(hw_switch);
        aux.parse_qos_policies(hw_switch);
        aux.parse_te_flow_table(hw_switch);
        aux.parse_udf(hw_switch);
        aux
    }

    fn parse_host_table(&mut self, hw_switch: &Value) {
        for host in array_entries::<HostEntry>(
            "hosts",
            section(hw_switch, &[document::HOST_TABLE, document::HOSTS]),
        ) {
            let Some(egress) = EgressId::from_raw(host.egress_id) else {
                debug!("Skipping host {} without egress", host.ip);
                continue;
            };
            let intf = host
                .egress
                .and_then(|e| e.intf_id)
                .and_then(IntfId::from_raw);
            let key = HostKey::new(host.vrf, host.ip, intf);
            if self.host_egress.contains_key(&key) {
                warn!("Duplicate snapshot host {}, keeping the first", key);
                continue;
            }
            self.host_egress.insert(key, egress);
        }

        for ecmp_host in array_entries::<EcmpHostEntry>(
            "ecmpHosts",
            section(hw_switch, &[document::HOST_TABLE, document::ECMP_HOSTS]),
        ) {
            let paths = ecmp_host.ecmp_egress.map(|e| e.paths).unwrap_or_default();
            self.add_ecmp_paths(ecmp_host.ecmp_egress_id, &paths);
        }
    }

    fn parse_warm_boot_cache(&mut self, hw_switch: &Value) {
        for ecmp in array_entries::<EcmpObjectEntry>(
            "ecmpObjects",
            section(hw_switch, &[document::WARM_BOOT_CACHE, document::ECMP_OBJECTS]),
        ) {
            self.add_ecmp_paths(ecmp.ecmp_egress_id, &ecmp.paths);
        }

        for (agg_port, trunk) in object_entries(
            "trunks",
            section(hw_switch, &[document::WARM_BOOT_CACHE, document::TRUNKS]),
        ) {
            let agg_port = match agg_port.parse::<AggregatePortId>() {
                Ok(agg_port) => agg_port,
                Err(e) => {
                    warn!("Skipping trunk with bad aggregate port {:?}: {}", agg_port, e);
                    continue;
                }
            };
            if let Some(trunk) = parse_handle("trunk", trunk) {
                self.trunks.insert(agg_port, trunk);
            }
        }

        if let Some(node) = section(hw_switch, &[document::WARM_BOOT_CACHE, document::ROUTE_COUNTERS]) {
            match serde_json::from_value::<RouteCounterSection>(node.clone()) {
                Ok(counters) => {
                    self.route_counters = RouteCounterState {
                        mode_id: counters.mode_id,
                        v6_flex_action_id: counters.v6_flex_action_id,
                        counters: counters
                            .counters
                            .into_iter()
                            .filter_map(|(name, id)| RouteCounterId::from_raw(id).map(|id| (name, id)))
                            .collect(),
                    };
                }
                Err(e) => warn!("Ignoring malformed routeCounters section: {}", e),
            }
        }
    }

    /// Merges one recovered path list into the ECMP map.
    ///
    /// Both `ecmpHosts` and `ecmpObjects` may name the same group; the
    /// larger weight per member wins.
    fn add_ecmp_paths(&mut self, ecmp: RawHandle, paths: &[PathEntry]) {
        let Some(ecmp) = EcmpId::from_raw(ecmp) else {
            warn!("Skipping snapshot ecmp with invalid id");
            return;
        };
        let mut weights = EgressWeights::new();
        for path in paths {
            let (egress, weight) = path.egress_and_weight();
            let Some(egress) = EgressId::from_raw(egress) else {
                debug!("Skipping invalid path of ecmp {}", ecmp);
                continue;
            };
            if let Err(e) = weights.add(egress, weight) {
                warn!("Skipping snapshot ecmp {}: {}", ecmp, e);
                return;
            }
        }

        match self.ecmp_paths.get_mut(&ecmp) {
            Some(existing) if *existing != weights => {
                warn!("Snapshot ecmp {} recorded as {} and {}, merging", ecmp, existing, weights);
                existing.merge_max(&weights);
            }
            Some(_) => {}
            None => {
                self.ecmp_paths.insert(ecmp, weights);
            }
        }
    }

    fn parse_mpls_next_hops(&mut self, hw_switch: &Value) {
        for nh in array_entries::<MplsNextHopEntry>("mplsNextHops", section(hw_switch, &[document::MPLS_NEXT_HOPS])) {
            let labels = match (nh.label, nh.stack) {
                (Some(label), _) => MplsNextHopLabels::Label(label),
                (None, Some(stack)) => MplsNextHopLabels::Stack(stack),
                (None, None) => {
                    warn!("Skipping mpls next hop {} with neither label nor stack", nh.ip);
                    continue;
                }
            };
            let Some(egress) = EgressId::from_raw(nh.egress_id) else {
                warn!("Skipping mpls next hop {} with invalid egress", nh.ip);
                continue;
            };
            let key = LabeledHostKey {
                vrf: nh.vrf,
                labels,
                ip: nh.ip,
                intf: nh.intf,
            };
            if self.labeled_host_egress.contains_key(&key) {
                warn!("Duplicate snapshot mpls next hop {}, keeping the first", key);
                continue;
            }
            self.labeled_host_egress.insert(key, egress);
        }
    }

    fn parse_intf_table(&mut self, hw_switch: &Value) {
        for entry in array_entries::<IntfTableEntry>("intfTable", section(hw_switch, &[document::INTF_TABLE])) {
            if let Some(intf) = IntfId::from_raw(entry.intf_id) {
                self.intf_hints.insert(entry.vlan, intf);
            }
        }
    }

    fn parse_qos_policies(&mut self, hw_switch: &Value) {
        for (policy, node) in object_entries("qosPolicyTable", section(hw_switch, &[document::QOS_POLICY_TABLE])) {
            let entry: QosPolicyEntry = match serde_json::from_value(node.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping malformed qos policy {}: {}", policy, e);
                    continue;
                }
            };
            let maps = [
                (QosMapType::IpIngress, entry.in_dscp),
                (QosMapType::MplsIngress, entry.in_exp),
                (QosMapType::MplsEgress, entry.out_exp),
            ];
            for (map_type, id) in maps {
                if let Some(id) = id.and_then(QosMapId::from_raw) {
                    self.qos_policies.insert(QosMapKey::new(policy.as_str(), map_type), id);
                }
            }
        }
    }

    fn parse_te_flow_table(&mut self, hw_switch: &Value) {
        let Some(node) = section(hw_switch, &[document::TE_FLOW_TABLE]) else {
            return;
        };
        match serde_json::from_value::<TeFlowTableSettings>(node.clone()) {
            Ok(settings) => self.te_flow_table = Some(settings),
            Err(e) => warn!("Ignoring malformed teFlowTable section: {}", e),
        }
    }

    fn parse_udf(&mut self, hw_switch: &Value) {
        for (name, id) in object_entries("udfGroups", section(hw_switch, &[document::UDF, document::UDF_GROUPS])) {
            if let Some(id) = parse_handle("udf group", id) {
                self.udf_groups.insert(name.clone(), id);
            }
        }
        for (name, id) in object_entries(
            "udfPacketMatchers",
            section(hw_switch, &[document::UDF, document::UDF_PACKET_MATCHERS]),
        ) {
            if let Some(id) = parse_handle("udf packet matcher", id) {
                self.udf_packet_matchers.insert(name.clone(), id);
            }
        }
    }
}

/// Deserializes every element of an array section, skipping bad ones.
fn array_entries<T: DeserializeOwned>(name: &str, node: Option<&Value>) -> Vec<T> {
    let Some(node) = node else {
        debug!("Snapshot section {} absent", name);
        return Vec::new();
    };
    let Some(items) = node.as_array() else {
        warn!("Snapshot section {} is not a list, ignoring it", name);
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value(item.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping malformed {} entry {}: {}", name, i, e);
                None
            }
        })
        .collect()
}

fn object_entries<'a>(name: &str, node: Option<&'a Value>) -> Vec<(&'a String, &'a Value)> {
    let Some(node) = node else {
        debug!("Snapshot section {} absent", name);
        return Vec::new();
    };
    match node.as_object() {
        Some(map) => map.iter().collect(),
        None => {
            warn!("Snapshot section {} is not a map, ignoring it", name);
            Vec::new()
        }
    }
}

fn parse_handle<K: HandleKind>(what: &str, node: &Value) -> Option<HwHandle<K>> {
    let raw = node.as_i64().and_then(|raw| RawHandle::try_from(raw).ok());
    match raw.and_then(HwHandle::from_raw) {
        Some(handle) => Some(handle),
        None => {
            warn!("Skipping {} with invalid id {}", what, node);
            None
        }
    }
}
