//! Builds the reconciled index from the recovered snapshot and a live
//! hardware enumeration.

use super::{
    HostKey, L3IntfKey, LabelStackKey, MirrorKey, MirroredAclKey, MirroredPortKey, QosMapKey,
    RecoveredSwitchSettings, ReconciledIndex, RouteKey, TeFlowKey, UdfGroupEntry,
};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::config::{ReconcileConfig, DEFAULT_TE_FLOW_GROUP_ID};
use crate::error::{ConsistencyFault, ReconcileError, Result};
use crate::snapshot::RecoveredAux;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use warmboot_hw::{
    EgressId, EgressRecord, FieldGroupId, HwEnumerator, HwIter, HwResult, IntfId, NextHopRef,
    QosMapId, UdfGroupId, UdfPacketMatcherId,
};
use warmboot_types::VlanId;

/// Feeds every live item of one traversal to `visit`.
///
/// An entry-scoped read error skips only that entry; any other error ends
/// the traversal and is fatal.
pub(crate) fn visit_live<T>(
    what: &str,
    items: HwIter<'_, T>,
    mut visit: impl FnMut(T) -> Result<()>,
) -> Result<()> {
    for item in items {
        match item {
            Ok(item) => visit(item)?,
            Err(e) if e.is_entry_scoped() => warn!("Skipping unreadable {} entry: {}", what, e),
            Err(e) => {
                return Err(ReconcileError::hardware(
                    format!("failed to traverse {} table", what),
                    e,
                ))
            }
        }
    }
    Ok(())
}

/// A group traversal whose group does not exist is an empty table.
fn group_entries<'a, T>(
    what: &str,
    group: FieldGroupId,
    entries: HwResult<HwIter<'a, T>>,
) -> Result<Option<HwIter<'a, T>>> {
    match entries {
        Ok(entries) => Ok(Some(entries)),
        Err(e) if e.is_not_found() => {
            info!("No {} group {} in hardware, nothing to recover", what, group);
            Ok(None)
        }
        Err(e) => Err(ReconcileError::hardware(
            format!("failed to open {} group {}", what, group),
            e,
        )),
    }
}

impl ReconciledIndex {
    /// Populates every table. Runs once, before replay starts.
    pub fn build(aux: RecoveredAux, hw: &dyn HwEnumerator, config: &ReconcileConfig) -> Result<Self> {
        let mut index = ReconciledIndex::empty();
        let result = index.populate(aux, hw, config);
        match result {
            Ok(()) => {
                info!(
                    "Warm boot index built: {} entries awaiting replay",
                    index.unclaimed_total()
                );
                audit_log!(AuditRecord::new(AuditCategory::WarmRestart, "ReconciledIndex", "build_index")
                    .with_outcome(AuditOutcome::Success)
                    .with_details(serde_json::json!({
                        "hosts": index.hosts.len(),
                        "routes": index.prefix_routes.len() + index.host_routes.len(),
                        "egresses": index.egresses.len(),
                        "ecmps": index.ecmps.len(),
                        "acl_entries": index.acl_entries.len(),
                        "te_flows": index.te_flows.len(),
                    })));
                Ok(index)
            }
            Err(e) => {
                audit_log!(AuditRecord::new(AuditCategory::ErrorCondition, "ReconciledIndex", "build_index")
                    .with_outcome(AuditOutcome::Failure)
                    .with_error(e.to_string()));
                Err(e)
            }
        }
    }

    fn populate(&mut self, aux: RecoveredAux, hw: &dyn HwEnumerator, config: &ReconcileConfig) -> Result<()> {
        let RecoveredAux {
            ecmp_paths,
            trunks,
            route_counters,
            host_egress,
            labeled_host_egress,
            intf_hints,
            qos_policies,
            te_flow_table,
            udf_groups,
            udf_packet_matchers,
        } = aux;

        self.recovered_ecmp = ecmp_paths;
        self.host_egress = host_egress;
        self.labeled_host_egress = labeled_host_egress;
        self.te_flow_table = te_flow_table;
        for (agg_port, trunk) in trunks {
            self.trunks.insert(agg_port, trunk)?;
        }
        self.route_counter_mode_id = route_counters.mode_id;
        self.route_counter_v6_flex_action_id = route_counters.v6_flex_action_id;
        for (name, id) in route_counters.counters {
            self.route_counters.insert(name, id)?;
        }

        self.default_vlan = hw
            .default_vlan()
            .map_err(|e| ReconcileError::hardware("failed to read default vlan", e))?;
        self.populate_vlans(hw, &intf_hints)?;
        self.populate_hosts_and_routes(hw, config)?;
        self.populate_ecmps(hw)?;
        self.populate_egresses(hw)?;
        self.populate_mpls(hw)?;
        self.populate_acls(hw, config)?;
        self.populate_te_flows(hw, config)?;
        self.populate_mirrors(hw)?;
        self.populate_qos(hw, qos_policies)?;
        self.populate_udf(hw, udf_groups, udf_packet_matchers)?;

        visit_live("rx reason", hw.rx_reason_to_queue(), |mapping| {
            self.rx_reasons.insert(mapping.index, mapping)?;
            Ok(())
        })?;

        let settings = hw
            .switch_settings()
            .map_err(|e| ReconcileError::hardware("failed to read switch settings", e))?;
        self.switch_settings = RecoveredSwitchSettings {
            l2_learning: settings.l2_learning,
            ptp_tc_enabled: Some(settings.ptp_tc_enabled),
            hash_controls: settings.hash_controls,
        };
        Ok(())
    }

    fn populate_vlans(
        &mut self,
        hw: &dyn HwEnumerator,
        intf_hints: &BTreeMap<VlanId, IntfId>,
    ) -> Result<()> {
        visit_live("vlan", hw.vlans(), |vlan| {
            let id = vlan.vlan;
            self.vlans.insert(id, vlan)?;

            let hint = intf_hints.get(&id).copied();
            let intf = hw
                .l3_intf(id, hint)
                .map_err(|e| ReconcileError::hardware(format!("failed to read l3 interface of vlan {}", id), e))?;
            let Some(intf) = intf else {
                debug!("Vlan {} has no l3 interface", id);
                return Ok(());
            };
            self.l3_intfs.insert(L3IntfKey { vlan: id, mac: intf.mac }, intf)?;

            let station = hw
                .l2_station(id)
                .map_err(|e| ReconcileError::hardware(format!("failed to read l2 station of vlan {}", id), e))?;
            if let Some(station) = station {
                self.l2_stations.insert(id, station)?;
            }
            Ok(())
        })
    }

    fn populate_hosts_and_routes(&mut self, hw: &dyn HwEnumerator, config: &ReconcileConfig) -> Result<()> {
        visit_live("host", hw.hosts(), |host| {
            let key = HostKey::new(host.vrf, host.ip, host.intf);
            debug!("Recovered host {} -> egress {}", key, host.egress);
            self.hosts.insert(key, host)?;
            Ok(())
        })?;

        visit_live("route", hw.routes(), |route| {
            let key = RouteKey::new(route.vrf, route.prefix);
            if config.host_table_for_host_routes && route.prefix.is_full_mask() {
                self.host_routes.insert(key, route)?;
            } else {
                self.prefix_routes.insert(key, route)?;
            }
            Ok(())
        })
    }

    /// ECMP membership comes from the snapshot: the live member array drops
    /// members whose links are down.
    fn populate_ecmps(&mut self, hw: &dyn HwEnumerator) -> Result<()> {
        visit_live("ecmp", hw.ecmp_groups(), |ecmp| {
            let Some(weights) = self.recovered_ecmp.get(&ecmp.id) else {
                if ecmp.members.is_empty() {
                    // Double-wide groups report a phantom id with no members.
                    debug!("Skipping ecmp {} with no members and no recovered paths", ecmp.id);
                    return Ok(());
                }
                return Err(ConsistencyFault::UnrecoveredEcmpMembership {
                    ecmp: ecmp.id,
                    live_members: ecmp.members.len(),
                }
                .into());
            };
            if weights.is_empty() {
                return Err(ConsistencyFault::EmptyRecoveredEcmp { ecmp: ecmp.id }.into());
            }
            if let Some(existing) = self.ecmps.find_by(|_, members| members == weights) {
                return Err(ConsistencyFault::DuplicateEcmpMembership {
                    ecmp: ecmp.id,
                    existing: *existing.key(),
                }
                .into());
            }
            debug!(
                "Recovered ecmp {} -> [{}], hardware reports {} members",
                ecmp.id,
                weights,
                ecmp.members.len()
            );
            let weights = weights.clone();
            self.ecmps.insert(ecmp.id, weights)?;
            Ok(())
        })
    }

    /// Every egress nothing references must be the drop or the to-CPU
    /// sentinel.
    fn populate_egresses(&mut self, hw: &dyn HwEnumerator) -> Result<()> {
        let mut referenced: BTreeSet<EgressId> = BTreeSet::new();
        referenced.extend(self.host_egress.values().copied());
        referenced.extend(self.labeled_host_egress.values().copied());
        referenced.extend(self.recovered_ecmp.values().flat_map(|w| w.members()));
        referenced.extend(self.hosts.iter().map(|entry| entry.value().egress));
        for entry in self.prefix_routes.iter().chain(self.host_routes.iter()) {
            if let NextHopRef::Egress(egress) = entry.value().next_hop {
                referenced.insert(egress);
            }
        }

        visit_live("egress", hw.egresses(), |egress| {
            if referenced.contains(&egress.id) {
                self.egresses.insert(egress.id, egress)?;
                return Ok(());
            }
            self.classify_unreferenced_egress(egress)
        })
    }

    fn classify_unreferenced_egress(&mut self, egress: EgressRecord) -> Result<()> {
        if egress.flags.is_drop() {
            if let Some(first) = self.drop_egress {
                return Err(ConsistencyFault::DuplicatedDropEgress {
                    first,
                    second: egress.id,
                }
                .into());
            }
            debug!("Found drop egress {}", egress.id);
            self.drop_egress = Some(egress.id);
        } else if egress.flags.is_to_cpu() {
            if let Some(first) = self.to_cpu_egress {
                return Err(ConsistencyFault::DuplicatedToCpuEgress {
                    first,
                    second: egress.id,
                }
                .into());
            }
            debug!("Found to-cpu egress {}", egress.id);
            self.to_cpu_egress = Some(egress.id);
        } else {
            return Err(ConsistencyFault::UnreferencedEgress {
                egress: egress.id,
                intf: egress.intf,
                flags: egress.flags,
            }
            .into());
        }
        Ok(())
    }

    fn populate_mpls(&mut self, hw: &dyn HwEnumerator) -> Result<()> {
        visit_live("label switch action", hw.label_switch_actions(), |action| {
            self.label_switch_actions.insert(action.label, action)?;
            Ok(())
        })?;

        visit_live("tunnel initiator", hw.tunnel_initiators(), |tunnel| {
            let key = LabelStackKey {
                vlan: tunnel.vlan,
                stack: tunnel.stack.clone(),
            };
            self.label_stacks.insert(key, tunnel)?;
            Ok(())
        })
    }

    fn populate_acls(&mut self, hw: &dyn HwEnumerator, config: &ReconcileConfig) -> Result<()> {
        let group = FieldGroupId::new(config.acl_group_id);
        let Some(entries) = group_entries("acl", group, hw.acl_entries(group))? else {
            return Ok(());
        };
        visit_live("acl entry", entries, |entry| {
            if let Some(stat) = entry.stat {
                self.acl_stats.insert(entry.handle, stat)?;
            }
            self.acl_entries.insert(entry.priority, entry)?;
            Ok(())
        })
    }

    fn populate_te_flows(&mut self, hw: &dyn HwEnumerator, config: &ReconcileConfig) -> Result<()> {
        let group_id = config
            .te_flow_group_id
            .or_else(|| self.te_flow_table.map(|t| t.group_id))
            .unwrap_or(DEFAULT_TE_FLOW_GROUP_ID);
        let group = FieldGroupId::new(group_id);
        let Some(entries) = group_entries("te flow", group, hw.te_flow_entries(group))? else {
            return Ok(());
        };
        visit_live("te flow entry", entries, |flow| {
            if let Some(stat) = flow.stat {
                self.te_flow_stats.insert(flow.handle, stat)?;
            }
            let key = TeFlowKey {
                src_port: flow.src_port,
                dst_ip: flow.dst_ip,
            };
            self.te_flows.insert(key, flow)?;
            Ok(())
        })
    }

    fn populate_mirrors(&mut self, hw: &dyn HwEnumerator) -> Result<()> {
        visit_live("mirror", hw.mirrors(), |mirror| {
            let key = MirrorKey {
                egress_port: mirror.egress_port,
                tunnel: mirror.tunnel.clone(),
            };
            self.mirrors.insert(key, mirror)?;
            Ok(())
        })?;

        visit_live("mirrored port", hw.mirrored_ports(), |port| {
            let key = MirroredPortKey {
                port: port.port,
                flags: port.flags,
            };
            self.mirrored_ports.insert(key, port)?;
            Ok(())
        })?;

        visit_live("mirrored acl", hw.mirrored_acls(), |acl| {
            let key = MirroredAclKey {
                entry: acl.entry,
                direction: acl.direction,
            };
            self.mirrored_acls.insert(key, acl.mirror)?;
            Ok(())
        })
    }

    fn populate_qos(
        &mut self,
        hw: &dyn HwEnumerator,
        policies: BTreeMap<QosMapKey, QosMapId>,
    ) -> Result<()> {
        visit_live("qos map", hw.qos_maps(), |map| {
            self.qos_maps.insert(map.id, map)?;
            Ok(())
        })?;

        // A key naming a vanished map stays in; replay cannot claim it, so
        // cleanup faults on it.
        for (key, id) in policies {
            if self.qos_maps.find(&id).is_none() {
                warn!("Qos policy {} names map {} which is gone from hardware", key, id);
            }
            self.qos_map_keys.insert(key, id)?;
        }
        Ok(())
    }

    fn populate_udf(
        &mut self,
        hw: &dyn HwEnumerator,
        groups: BTreeMap<String, UdfGroupId>,
        matchers: BTreeMap<String, UdfPacketMatcherId>,
    ) -> Result<()> {
        for (name, id) in groups {
            match hw.udf_group_matchers(id) {
                Ok(attached) => {
                    self.udf_groups.insert(
                        name,
                        UdfGroupEntry {
                            id,
                            matchers: attached,
                        },
                    )?;
                }
                Err(e) if e.is_not_found() => {
                    warn!("Udf group {} ({}) is gone from hardware: {}", name, id, e);
                }
                Err(e) => {
                    return Err(ReconcileError::hardware(
                        format!("failed to read udf group {}", name),
                        e,
                    ))
                }
            }
        }
        for (name, id) in matchers {
            self.udf_packet_matchers.insert(name, id)?;
        }
        Ok(())
    }
}
