//! Warm-boot snapshot document layout.
//!
//! ```text
//! {
//!   "swSwitch":          desired-state tree
//!   "thriftSwitchState": raw configuration state (optional, dumped on failure)
//!   "hwSwitch": {
//!     "hostTable":      { "hosts": [...], "ecmpHosts": [...] }
//!     "warmBootCache":  { "ecmpObjects": [...], "trunks": {...}, "routeCounters": {...} }
//!     "mplsNextHops":   [...]
//!     "intfTable":      [...]
//!     "qosPolicyTable": {...}
//!     "teFlowTable":    {...}
//!     "udf":            { "udfGroups": {...}, "udfPacketMatchers": {...} }
//!   }
//! }
//! ```
//!
//! Every `hwSwitch` section is optional; agents older than a section never
//! wrote it.

use serde_json::{Map, Value};

pub const SW_SWITCH: &str = "swSwitch";
pub const HW_SWITCH: &str = "hwSwitch";
pub const THRIFT_SWITCH_STATE: &str = "thriftSwitchState";

pub const HOST_TABLE: &str = "hostTable";
pub const HOSTS: &str = "hosts";
pub const ECMP_HOSTS: &str = "ecmpHosts";
pub const WARM_BOOT_CACHE: &str = "warmBootCache";
pub const ECMP_OBJECTS: &str = "ecmpObjects";
pub const TRUNKS: &str = "trunks";
pub const ROUTE_COUNTERS: &str = "routeCounters";
pub const MPLS_NEXT_HOPS: &str = "mplsNextHops";
pub const INTF_TABLE: &str = "intfTable";
pub const QOS_POLICY_TABLE: &str = "qosPolicyTable";
pub const TE_FLOW_TABLE: &str = "teFlowTable";
pub const UDF: &str = "udf";
pub const UDF_GROUPS: &str = "udfGroups";
pub const UDF_PACKET_MATCHERS: &str = "udfPacketMatchers";

/// A snapshot under construction, as the agent writes it on shutdown.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotDocument {
    pub sw_switch: Value,
    pub hw_switch: Value,
    pub thrift_switch_state: Option<Value>,
}

impl SnapshotDocument {
    pub fn new(sw_switch: Value, hw_switch: Value) -> Self {
        Self {
            sw_switch,
            hw_switch,
            thrift_switch_state: None,
        }
    }

    pub fn with_thrift_switch_state(mut self, state: Value) -> Self {
        self.thrift_switch_state = Some(state);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut doc = Map::new();
        doc.insert(SW_SWITCH.to_string(), self.sw_switch.clone());
        doc.insert(HW_SWITCH.to_string(), self.hw_switch.clone());
        if let Some(state) = &self.thrift_switch_state {
            doc.insert(THRIFT_SWITCH_STATE.to_string(), state.clone());
        }
        Value::Object(doc)
    }
}

/// Looks up `path` below `root`, treating anything missing as absent.
pub(crate) fn section<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(key))
}
