//! Writes the auxiliary hardware section of a snapshot from live state.
//!
//! This is the shutdown half of the warm-boot cycle: what it records is
//! exactly what [`RecoveredAux::parse`](super::RecoveredAux::parse) reads
//! back on the next start.

use super::document;
use crate::error::{ReconcileError, Result};
use crate::index::populate::visit_live;
use log::info;
use serde_json::{json, Map, Value};
use warmboot_hw::{EgressWeights, HwEnumerator};

/// Builds the `hwSwitch` section from a live enumeration.
pub fn capture_hw_switch(hw: &dyn HwEnumerator) -> Result<Value> {
    let mut ecmp_objects = Vec::new();
    visit_live("ecmp", hw.ecmp_groups(), |ecmp| {
        let weights = EgressWeights::from_paths(ecmp.members.iter().copied());
        let paths: Vec<Value> = weights
            .iter()
            .map(|(egress, weight)| match weight {
                1 => json!(egress.as_raw()),
                weight => json!({ "egressId": egress.as_raw(), "weight": weight }),
            })
            .collect();
        ecmp_objects.push(json!({ "ecmpEgressId": ecmp.id.as_raw(), "paths": paths }));
        Ok(())
    })?;

    let mut trunks = Map::new();
    visit_live("trunk", hw.trunks(), |trunk| {
        trunks.insert(trunk.agg_port.to_string(), json!(trunk.trunk.as_raw()));
        Ok(())
    })?;

    let counters = hw
        .route_counters()
        .map_err(|e| ReconcileError::hardware("failed to read route counters", e))?;
    let mut route_counters = Map::new();
    if let Some(mode_id) = counters.mode_id {
        route_counters.insert("modeId".to_string(), json!(mode_id));
    }
    if let Some(action_id) = counters.v6_flex_action_id {
        route_counters.insert("v6FlexActionId".to_string(), json!(action_id));
    }
    let named: Map<String, Value> = counters
        .counters
        .iter()
        .map(|(name, id)| (name.clone(), json!(id.as_raw())))
        .collect();
    route_counters.insert("counters".to_string(), Value::Object(named));

    let mut hosts = Vec::new();
    visit_live("host", hw.hosts(), |host| {
        let mut entry = json!({
            "vrf": host.vrf,
            "ip": host.ip.to_string(),
            "egressId": host.egress.as_raw(),
        });
        if let Some(intf) = host.intf {
            entry["egress"] = json!({ "intfId": intf.as_raw() });
        }
        if let Some(class_id) = host.class_id {
            entry["classID"] = json!(class_id);
        }
        hosts.push(entry);
        Ok(())
    })?;

    info!(
        "Captured {} ecmp groups, {} trunks, {} hosts for warm boot",
        ecmp_objects.len(),
        trunks.len(),
        hosts.len()
    );

    let mut hw_switch = Map::new();
    hw_switch.insert(document::HOST_TABLE.to_string(), json!({ (document::HOSTS): hosts }));
    hw_switch.insert(
        document::WARM_BOOT_CACHE.to_string(),
        json!({
            (document::ECMP_OBJECTS): ecmp_objects,
            (document::TRUNKS): trunks,
            (document::ROUTE_COUNTERS): route_counters,
        }),
    );
    Ok(Value::Object(hw_switch))
}
