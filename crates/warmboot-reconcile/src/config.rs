//! Reconciliation settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Field-processor group the agent programs ACL entries into.
pub const DEFAULT_ACL_GROUP_ID: i32 = 128;

/// Field-processor group used for TE-flow entries when the snapshot does
/// not name one.
pub const DEFAULT_TE_FLOW_GROUP_ID: i32 = 2;

pub const DEFAULT_DIAGNOSTIC_DUMP_PATH: &str = "/var/run/warmboot/recovered_switch_state.json";

/// Configuration for one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ReconcileConfig {
    /// Hardware group holding ACL entries.
    pub acl_group_id: i32,
    /// Overrides the TE-flow group recorded in the snapshot.
    pub te_flow_group_id: Option<i32>,
    /// Full-mask routes live in the host-route table when the platform
    /// supports it; otherwise every route is a prefix route.
    pub host_table_for_host_routes: bool,
    /// Where the raw configuration state is written when the desired-state
    /// tree cannot be deserialized.
    pub diagnostic_dump_path: PathBuf,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            acl_group_id: DEFAULT_ACL_GROUP_ID,
            te_flow_group_id: None,
            host_table_for_host_routes: true,
            diagnostic_dump_path: PathBuf::from(DEFAULT_DIAGNOSTIC_DUMP_PATH),
        }
    }
}

impl ReconcileConfig {
    /// Parses a JSON config; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.diagnostic_dump_path = path.into();
        self
    }
}
