//! Post-replay cleanup of everything replay did not claim.
//!
//! Tables are drained one at a time in dependency order: an object is only
//! deleted after everything that can reference it is gone. A delete whose
//! target is already absent is tolerated; any other hardware failure aborts
//! the cleanup.

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::error::{ConsistencyFault, DeleteOutcome, ReconcileError, Result, TableKind};
use crate::index::{ClaimTable, Phase, ReconciledIndex};
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::fmt;
use warmboot_hw::{HwDeleter, HwResult};

/// One step of the cleanup, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CleanupStage {
    PrefixRoutes,
    HostRoutes,
    LabelSwitchActions,
    Hosts,
    Ecmps,
    Egresses,
    TunnelInitiators,
    L3Intfs,
    L2Stations,
    Vlans,
    AclStats,
    AclEntries,
    TeFlowStats,
    TeFlowEntries,
    RxReasonMappings,
    UdfGroups,
    UdfPacketMatchers,
    MirroredPorts,
    MirroredAcls,
    Mirrors,
    QosMaps,
    SoftwareTables,
}

impl CleanupStage {
    pub const ALL: [CleanupStage; 22] = [
        CleanupStage::PrefixRoutes,
        CleanupStage::HostRoutes,
        CleanupStage::LabelSwitchActions,
        CleanupStage::Hosts,
        CleanupStage::Ecmps,
        CleanupStage::Egresses,
        CleanupStage::TunnelInitiators,
        CleanupStage::L3Intfs,
        CleanupStage::L2Stations,
        CleanupStage::Vlans,
        CleanupStage::AclStats,
        CleanupStage::AclEntries,
        CleanupStage::TeFlowStats,
        CleanupStage::TeFlowEntries,
        CleanupStage::RxReasonMappings,
        CleanupStage::UdfGroups,
        CleanupStage::UdfPacketMatchers,
        CleanupStage::MirroredPorts,
        CleanupStage::MirroredAcls,
        CleanupStage::Mirrors,
        CleanupStage::QosMaps,
        CleanupStage::SoftwareTables,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            CleanupStage::PrefixRoutes => "prefix_routes",
            CleanupStage::HostRoutes => "host_routes",
            CleanupStage::LabelSwitchActions => "label_switch_actions",
            CleanupStage::Hosts => "hosts",
            CleanupStage::Ecmps => "ecmps",
            CleanupStage::Egresses => "egresses",
            CleanupStage::TunnelInitiators => "tunnel_initiators",
            CleanupStage::L3Intfs => "l3_intfs",
            CleanupStage::L2Stations => "l2_stations",
            CleanupStage::Vlans => "vlans",
            CleanupStage::AclStats => "acl_stats",
            CleanupStage::AclEntries => "acl_entries",
            CleanupStage::TeFlowStats => "te_flow_stats",
            CleanupStage::TeFlowEntries => "te_flow_entries",
            CleanupStage::RxReasonMappings => "rx_reason_mappings",
            CleanupStage::UdfGroups => "udf_groups",
            CleanupStage::UdfPacketMatchers => "udf_packet_matchers",
            CleanupStage::MirroredPorts => "mirrored_ports",
            CleanupStage::MirroredAcls => "mirrored_acls",
            CleanupStage::Mirrors => "mirrors",
            CleanupStage::QosMaps => "qos_maps",
            CleanupStage::SoftwareTables => "software_tables",
        }
    }
}

impl fmt::Display for CleanupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one stage did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: CleanupStage,
    /// Hardware deletes and detaches that succeeded.
    pub deleted: usize,
    /// Targets that were already gone.
    pub already_absent: usize,
    /// Entries left in place: claimed ones, plus the default VLAN.
    pub retained: usize,
}

impl StageReport {
    fn new(stage: CleanupStage) -> Self {
        Self {
            stage,
            deleted: 0,
            already_absent: 0,
            retained: 0,
        }
    }

    fn record(&mut self, outcome: DeleteOutcome) {
        match outcome {
            DeleteOutcome::Deleted => self.deleted += 1,
            DeleteOutcome::AlreadyAbsent => self.already_absent += 1,
        }
    }
}

/// Per-stage results of one cleanup run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub stages: Vec<StageReport>,
}

impl CleanupReport {
    pub fn stage(&self, stage: CleanupStage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }

    pub fn total_deleted(&self) -> usize {
        self.stages.iter().map(|report| report.deleted).sum()
    }

    pub fn total_already_absent(&self) -> usize {
        self.stages.iter().map(|report| report.already_absent).sum()
    }
}

/// Deletes unclaimed hardware state through an [`HwDeleter`].
pub struct Reclaimer<'a, D: HwDeleter + ?Sized> {
    hw: &'a D,
}

impl<'a, D: HwDeleter + ?Sized> Reclaimer<'a, D> {
    pub fn new(hw: &'a D) -> Self {
        Self { hw }
    }

    /// Deletes every unclaimed entry, stage by stage. Runs once per index.
    pub fn run_cleanup(&self, index: &mut ReconciledIndex) -> Result<CleanupReport> {
        if index.phase == Phase::Cleaned {
            return Err(ConsistencyFault::CleanupAlreadyRan.into());
        }
        index.phase = Phase::Cleaned;

        info!(
            "Warm boot: removing {} unclaimed entries",
            index.unclaimed_total()
        );
        audit_log!(AuditRecord::new(AuditCategory::WarmRestart, "Reclaimer", "run_cleanup")
            .with_outcome(AuditOutcome::InProgress));

        match self.run_stages(index) {
            Ok(report) => {
                info!(
                    "Warm boot cleanup done: {} deleted, {} already absent",
                    report.total_deleted(),
                    report.total_already_absent()
                );
                audit_log!(AuditRecord::new(AuditCategory::WarmRestart, "Reclaimer", "run_cleanup")
                    .with_outcome(AuditOutcome::Success)
                    .with_details(serde_json::json!({
                        "deleted": report.total_deleted(),
                        "already_absent": report.total_already_absent(),
                    })));
                Ok(report)
            }
            Err(e) => {
                error!("Warm boot cleanup failed: {}", e);
                audit_log!(AuditRecord::new(AuditCategory::ErrorCondition, "Reclaimer", "run_cleanup")
                    .with_outcome(AuditOutcome::Failure)
                    .with_error(e.to_string()));
                Err(e)
            }
        }
    }

    fn run_stages(&self, index: &mut ReconciledIndex) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();
        let mut push = |stage: StageReport| {
            audit_log!(AuditRecord::new(AuditCategory::ResourceDelete, "Reclaimer", "cleanup_stage")
                .with_outcome(AuditOutcome::Success)
                .with_object_type(stage.stage.as_str())
                .with_details(serde_json::json!({
                    "deleted": stage.deleted,
                    "already_absent": stage.already_absent,
                    "retained": stage.retained,
                })));
            report.stages.push(stage);
        };

        // Nothing references routes; they reference ecmps and egresses.
        push(self.drain_stage(CleanupStage::PrefixRoutes, &mut index.prefix_routes, |hw, _, route| {
            hw.delete_prefix_route(route)
        })?);
        push(self.drain_stage(CleanupStage::HostRoutes, &mut index.host_routes, |hw, _, route| {
            hw.delete_host_route(route)
        })?);
        push(self.drain_stage(
            CleanupStage::LabelSwitchActions,
            &mut index.label_switch_actions,
            |hw, label, _| hw.delete_label_switch_action(*label),
        )?);
        push(self.drain_stage(CleanupStage::Hosts, &mut index.hosts, |hw, _, host| {
            hw.delete_host(host)
        })?);

        index.recovered_ecmp.clear();
        push(self.drain_stage(CleanupStage::Ecmps, &mut index.ecmps, |hw, ecmp, _| {
            hw.destroy_ecmp(*ecmp)
        })?);
        push(self.drain_stage(CleanupStage::Egresses, &mut index.egresses, |hw, egress, _| {
            hw.destroy_egress(*egress)
        })?);
        push(self.drain_stage(
            CleanupStage::TunnelInitiators,
            &mut index.label_stacks,
            |hw, _, tunnel| hw.delete_tunnel_initiator(tunnel.intf),
        )?);
        push(self.drain_stage(CleanupStage::L3Intfs, &mut index.l3_intfs, |hw, _, intf| {
            hw.delete_l3_intf(intf)
        })?);
        push(self.drain_stage(CleanupStage::L2Stations, &mut index.l2_stations, |hw, vlan, _| {
            hw.delete_l2_station(*vlan)
        })?);

        let default_vlan = index.default_vlan;
        push(self.drain_stage_except(
            CleanupStage::Vlans,
            &mut index.vlans,
            |vlan| *vlan == default_vlan,
            |hw, vlan, _| hw.destroy_vlan(*vlan),
        )?);
        index.host_egress.clear();
        index.labeled_host_egress.clear();

        push(self.stat_stage(
            CleanupStage::AclStats,
            &mut index.acl_stats,
            |stat| *stat,
            |hw, entry, stat| hw.detach_acl_stat(*entry, *stat),
            |hw, stat| hw.remove_acl_stat(stat),
        )?);
        push(self.drain_stage(CleanupStage::AclEntries, &mut index.acl_entries, |hw, _, entry| {
            hw.remove_acl_entry(entry.handle)
        })?);

        push(self.stat_stage(
            CleanupStage::TeFlowStats,
            &mut index.te_flow_stats,
            |binding| binding.stat,
            |hw, entry, binding| hw.detach_te_flow_stat(*entry, binding.stat),
            |hw, stat| hw.remove_te_flow_stat(stat),
        )?);
        push(self.drain_stage(CleanupStage::TeFlowEntries, &mut index.te_flows, |hw, _, flow| {
            hw.remove_te_flow_entry(flow.handle)
        })?);

        push(self.drain_stage(CleanupStage::RxReasonMappings, &mut index.rx_reasons, |hw, idx, _| {
            hw.delete_rx_reason_mapping(*idx)
        })?);

        push(self.udf_group_stage(index)?);
        push(self.drain_stage(
            CleanupStage::UdfPacketMatchers,
            &mut index.udf_packet_matchers,
            |hw, _, matcher| hw.delete_udf_packet_matcher(*matcher),
        )?);

        // Mirrors are removed by replay itself; anything left is a bug.
        push(assert_drained(CleanupStage::MirroredPorts, &mut index.mirrored_ports)?);
        push(assert_drained(CleanupStage::MirroredAcls, &mut index.mirrored_acls)?);
        push(assert_drained(CleanupStage::Mirrors, &mut index.mirrors)?);

        push(qos_stage(index)?);
        push(software_stage(index));

        Ok(report)
    }

    fn delete(
        &self,
        stage: CleanupStage,
        what: &dyn fmt::Display,
        op: impl FnOnce() -> HwResult<()>,
    ) -> Result<DeleteOutcome> {
        match op() {
            Ok(()) => {
                debug!("Deleted unclaimed {} entry {}", stage, what);
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                warn!("Unclaimed {} entry {} already gone from hardware: {}", stage, what, e);
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => {
                error!("Failed to delete unclaimed {} entry {}: {}", stage, what, e);
                audit_log!(AuditRecord::new(AuditCategory::ResourceDelete, "Reclaimer", "delete_entry")
                    .with_outcome(AuditOutcome::Failure)
                    .with_object_type(stage.as_str())
                    .with_details(serde_json::json!({ "entry": what.to_string() }))
                    .with_error(e.to_string()));
                Err(ReconcileError::hardware(
                    format!("failed to delete unclaimed {} entry {}", stage, what),
                    e,
                ))
            }
        }
    }

    fn drain_stage<K, V>(
        &self,
        stage: CleanupStage,
        table: &mut ClaimTable<K, V>,
        delete: impl Fn(&D, &K, &V) -> HwResult<()>,
    ) -> Result<StageReport>
    where
        K: Ord + fmt::Display,
    {
        self.drain_stage_except(stage, table, |_| false, delete)
    }

    fn drain_stage_except<K, V>(
        &self,
        stage: CleanupStage,
        table: &mut ClaimTable<K, V>,
        keep: impl Fn(&K) -> bool,
        delete: impl Fn(&D, &K, &V) -> HwResult<()>,
    ) -> Result<StageReport>
    where
        K: Ord + fmt::Display,
    {
        let mut report = StageReport::new(stage);
        for (key, value) in table.drain_unclaimed_except(keep) {
            let outcome = self.delete(stage, &key, || delete(self.hw, &key, &value))?;
            report.record(outcome);
        }
        table.seal();
        report.retained = table.len();
        Ok(report)
    }

    /// Detaches every unclaimed counter association, then removes each
    /// counter no claimed association still uses.
    fn stat_stage<E, V, S>(
        &self,
        stage: CleanupStage,
        table: &mut ClaimTable<E, V>,
        stat_of: impl Fn(&V) -> S,
        detach: impl Fn(&D, &E, &V) -> HwResult<()>,
        remove: impl Fn(&D, S) -> HwResult<()>,
    ) -> Result<StageReport>
    where
        E: Ord + fmt::Display,
        S: Ord + Copy + fmt::Display,
    {
        let mut report = StageReport::new(stage);
        let detached = table.drain_unclaimed();
        for (entry, value) in &detached {
            let what = format!("{} on {}", stat_of(value), entry);
            let outcome = self.delete(stage, &what, || detach(self.hw, entry, value))?;
            report.record(outcome);
        }

        let in_use: BTreeSet<S> = table.claimed().map(|(_, value)| stat_of(value)).collect();
        let mut removed = BTreeSet::new();
        for (_, value) in &detached {
            let stat = stat_of(value);
            if in_use.contains(&stat) || !removed.insert(stat) {
                continue;
            }
            let outcome = self.delete(stage, &stat, || remove(self.hw, stat))?;
            report.record(outcome);
        }
        table.seal();
        report.retained = table.len();
        Ok(report)
    }

    fn udf_group_stage(&self, index: &mut ReconciledIndex) -> Result<StageReport> {
        let stage = CleanupStage::UdfGroups;
        let mut report = StageReport::new(stage);
        for (name, group) in index.udf_groups.drain_unclaimed() {
            for matcher in &group.matchers {
                let what = format!("{} matcher {}", name, matcher);
                let outcome = self.delete(stage, &what, || {
                    self.hw.detach_udf_packet_matcher(group.id, *matcher)
                })?;
                report.record(outcome);
            }
            let outcome = self.delete(stage, &name, || self.hw.delete_udf_group(group.id))?;
            report.record(outcome);
        }
        index.udf_groups.seal();
        report.retained = index.udf_groups.len();
        Ok(report)
    }
}

/// Assert-only tables must have been fully claimed by replay.
fn assert_drained<K, V>(stage: CleanupStage, table: &mut ClaimTable<K, V>) -> Result<StageReport>
where
    K: Ord + fmt::Display,
{
    table.seal();
    let survivors = table.unclaimed_len();
    if survivors > 0 {
        for (key, _) in table.unclaimed() {
            error!("Unclaimed {} entry {} survived replay", table.kind(), key);
        }
        return Err(ConsistencyFault::UnclaimedSurvivors {
            table: table.kind(),
            count: survivors,
        }
        .into());
    }
    let mut report = StageReport::new(stage);
    report.retained = table.len();
    Ok(report)
}

fn qos_stage(index: &mut ReconciledIndex) -> Result<StageReport> {
    index.qos_map_keys.seal();
    index.qos_maps.seal();

    for (key, id) in index.qos_map_keys.unclaimed() {
        error!("Unclaimed qos map key {} -> map {}", key, id);
    }
    for (id, map) in index.qos_maps.unclaimed() {
        error!(
            "Unclaimed qos map {} ({}, {} rules)",
            id,
            map.map_type,
            map.rules.len()
        );
    }

    let unclaimed_keys = index.qos_map_keys.unclaimed_len();
    if unclaimed_keys > 0 {
        return Err(ConsistencyFault::UnclaimedSurvivors {
            table: TableKind::QosMapKey,
            count: unclaimed_keys,
        }
        .into());
    }
    let unclaimed_maps = index.qos_maps.unclaimed_len();
    if unclaimed_maps > 0 {
        return Err(ConsistencyFault::UnclaimedSurvivors {
            table: TableKind::QosMap,
            count: unclaimed_maps,
        }
        .into());
    }

    let mut report = StageReport::new(CleanupStage::QosMaps);
    report.retained = index.qos_maps.len();
    Ok(report)
}

/// Trunks and route counters have no hardware object of their own here;
/// unclaimed ones are simply forgotten.
fn software_stage(index: &mut ReconciledIndex) -> StageReport {
    let mut report = StageReport::new(CleanupStage::SoftwareTables);
    for (agg_port, trunk) in index.trunks.drain_unclaimed() {
        info!("Dropping unclaimed trunk {} of aggregate port {}", trunk, agg_port);
    }
    for (name, counter) in index.route_counters.drain_unclaimed() {
        info!("Dropping unclaimed route counter {} ({})", name, counter);
    }
    index.trunks.seal();
    index.route_counters.seal();
    report.retained = index.trunks.len() + index.route_counters.len();
    report
}
