//! Error taxonomy for warm-boot reconciliation.
//!
//! Only fatal outcomes are errors. Benign outcomes (a snapshot section that
//! an older agent never wrote, a delete target that is already gone, a
//! lookup miss) are ordinary values: empty tables, `Option::None` and
//! [`DeleteOutcome::AlreadyAbsent`]. Nothing in [`ReconcileError`] is meant
//! to be caught and ignored.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use warmboot_hw::{EcmpId, EgressFlags, EgressId, HwError, IntfId};

/// Names one table of the reconciled index in faults and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    PrefixRoute,
    HostRoute,
    LabelSwitchAction,
    Host,
    Ecmp,
    Egress,
    LabelStack,
    L3Intf,
    L2Station,
    Vlan,
    AclStat,
    AclEntry,
    TeFlowStat,
    TeFlowEntry,
    RxReasonToQueue,
    UdfGroup,
    UdfPacketMatcher,
    Mirror,
    MirroredPort,
    MirroredAcl,
    QosMapKey,
    QosMap,
    Trunk,
    RouteCounter,
    RecoveredEcmp,
}

impl TableKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TableKind::PrefixRoute => "prefix_route",
            TableKind::HostRoute => "host_route",
            TableKind::LabelSwitchAction => "label_switch_action",
            TableKind::Host => "host",
            TableKind::Ecmp => "ecmp",
            TableKind::Egress => "egress",
            TableKind::LabelStack => "label_stack",
            TableKind::L3Intf => "l3_intf",
            TableKind::L2Station => "l2_station",
            TableKind::Vlan => "vlan",
            TableKind::AclStat => "acl_stat",
            TableKind::AclEntry => "acl_entry",
            TableKind::TeFlowStat => "te_flow_stat",
            TableKind::TeFlowEntry => "te_flow_entry",
            TableKind::RxReasonToQueue => "rx_reason_to_queue",
            TableKind::UdfGroup => "udf_group",
            TableKind::UdfPacketMatcher => "udf_packet_matcher",
            TableKind::Mirror => "mirror",
            TableKind::MirroredPort => "mirrored_port",
            TableKind::MirroredAcl => "mirrored_acl",
            TableKind::QosMapKey => "qos_map_key",
            TableKind::QosMap => "qos_map",
            TableKind::Trunk => "trunk",
            TableKind::RouteCounter => "route_counter",
            TableKind::RecoveredEcmp => "recovered_ecmp",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cross-check between the snapshot, live hardware and claim bookkeeping
/// failed. There is no local recovery from any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyFault {
    #[error("duplicate {table} entry for {key}")]
    DuplicateEntry { table: TableKind, key: String },

    #[error("duplicated drop egress found in hardware: {second} and {first}")]
    DuplicatedDropEgress { first: EgressId, second: EgressId },

    #[error("duplicated to-cpu egress found in hardware: {second} and {first}")]
    DuplicatedToCpuEgress { first: EgressId, second: EgressId },

    #[error("egress {egress} is not referenced by any host, route or ecmp (intf {intf}, flags {flags})")]
    UnreferencedEgress {
        egress: EgressId,
        intf: IntfId,
        flags: EgressFlags,
    },

    #[error("{table} entry {key} claimed twice")]
    DoubleClaim { table: TableKind, key: String },

    #[error("claim of {table} entry {key} which was never recovered")]
    ClaimMissing { table: TableKind, key: String },

    #[error("claim of {table} entry {key} after cleanup")]
    ClaimAfterCleanup { table: TableKind, key: String },

    #[error("ecmp {ecmp} is live in hardware but absent from the recovered ecmp map")]
    EcmpNotRecovered { ecmp: EcmpId },

    /// Hardware reports members for a group the snapshot has no weights for.
    #[error("ecmp {ecmp} reports {live_members} live members but the snapshot has no weights for it")]
    UnrecoveredEcmpMembership { ecmp: EcmpId, live_members: usize },

    #[error("recovered weight set of ecmp {ecmp} is empty")]
    EmptyRecoveredEcmp { ecmp: EcmpId },

    #[error("ecmp {ecmp} has the same weighted members as ecmp {existing}")]
    DuplicateEcmpMembership { ecmp: EcmpId, existing: EcmpId },

    #[error("{count} unclaimed {table} entries survived cleanup")]
    UnclaimedSurvivors { table: TableKind, count: usize },

    #[error("hash control {key} was not recovered or already programmed")]
    HashControlNotRecovered { key: String },

    #[error("cleanup already ran for this warm-boot cycle")]
    CleanupAlreadyRan,
}

/// Where the diagnostic copy of the configuration state went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpOutcome {
    Written(PathBuf),
    Failed { path: PathBuf, reason: String },
    /// The document had nothing to dump.
    NothingToDump,
}

impl fmt::Display for DumpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpOutcome::Written(path) => write!(f, "state dumped to {}", path.display()),
            DumpOutcome::Failed { path, reason } => {
                write!(f, "dump to {} failed: {}", path.display(), reason)
            }
            DumpOutcome::NothingToDump => write!(f, "no configuration state to dump"),
        }
    }
}

/// Fatal reconciliation error. The caller is expected to terminate.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("warm boot consistency fault: {0}")]
    Consistency(#[from] ConsistencyFault),

    #[error("unable to recover desired state from snapshot: {reason} ({dump})")]
    Deserialization { reason: String, dump: DumpOutcome },

    #[error("{context}: {source}")]
    Hardware {
        context: String,
        #[source]
        source: HwError,
    },
}

impl ReconcileError {
    pub fn hardware(context: impl Into<String>, source: HwError) -> Self {
        ReconcileError::Hardware {
            context: context.into(),
            source,
        }
    }

    pub fn consistency(&self) -> Option<&ConsistencyFault> {
        match self {
            ReconcileError::Consistency(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// How a single cleanup delete or detach ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The target was already gone from hardware.
    AlreadyAbsent,
}
