//! Warm-boot reconciliation engine.
//!
//! After a warm restart the switch agent must adopt whatever the previous
//! instance left programmed in the ASIC without disturbing traffic. This
//! crate drives that adoption:
//!
//! 1. [`SnapshotLoader`] reads the persisted snapshot: the desired-state
//!    tree plus auxiliary per-class sections.
//! 2. [`ReconciledIndex::build`] merges the snapshot with a live
//!    [`HwEnumerator`](warmboot_hw::HwEnumerator) pass into one table per
//!    object class, every entry Unclaimed.
//! 3. The replay layer re-derives its configuration and claims each object
//!    it would have programmed (see the `claim` methods on
//!    [`ReconciledIndex`] and [`ClaimTable::claim`]).
//! 4. [`Reclaimer::run_cleanup`] deletes everything still Unclaimed, in
//!    dependency order.
//!
//! On the way down, [`snapshot::capture_hw_switch`] records the auxiliary
//! section for the next start.
//!
//! # Example
//!
//! ```ignore
//! use warmboot_reconcile::{ReconcileConfig, ReconciledIndex, Reclaimer, SnapshotLoader};
//!
//! let config = ReconcileConfig::default();
//! let model = SnapshotLoader::new(&config).load_str::<SwitchState>(&snapshot_json)?;
//! let mut index = ReconciledIndex::build(model.aux, &asic, &config)?;
//! replay(&model.desired_state, &mut index)?;
//! Reclaimer::new(&asic).run_cleanup(&mut index)?;
//! ```

pub mod audit;
mod claim;
pub mod config;
pub mod error;
pub mod index;
pub mod reclaim;
pub mod snapshot;

pub use audit::{init_logging, AuditCategory, AuditOutcome, AuditRecord};
pub use config::ReconcileConfig;
pub use error::{ConsistencyFault, DeleteOutcome, DumpOutcome, ReconcileError, Result, TableKind};
pub use index::{ClaimState, ClaimTable, EntryRef, Phase, ReconciledIndex, UdfGroupEntry};
pub use reclaim::{CleanupReport, CleanupStage, Reclaimer, StageReport};
pub use snapshot::{RecoveredAux, RecoveredModel, SnapshotDocument, SnapshotLoader};
