//! Hardware-facing types for warm-boot reconciliation.
//!
//! This crate is the boundary between the reconciliation engine and the
//! switch ASIC SDK:
//!
//! - [`handle`]: typed object handles, one phantom kind per object class
//! - [`error`]: SDK status codes and [`HwError`]
//! - [`records`]: raw per-class records as a table traversal reports them
//! - [`HwEnumerator`]: one lazy traversal per object class
//! - [`HwDeleter`]: one delete or detach primitive per object class
//!
//! Production code supplies an adapter over the real SDK. With the `fake`
//! feature, [`fake::FakeAsic`] provides an in-memory implementation of both
//! capabilities for tests.
//!
//! # Example
//!
//! ```ignore
//! use warmboot_hw::{HwEnumerator, HwResult};
//!
//! fn count_live_egresses(hw: &dyn HwEnumerator) -> HwResult<usize> {
//!     let mut count = 0;
//!     for egress in hw.egresses() {
//!         egress?;
//!         count += 1;
//!     }
//!     Ok(count)
//! }
//! ```

pub mod delete;
pub mod enumerate;
pub mod error;
pub mod handle;
pub mod records;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use delete::HwDeleter;
pub use enumerate::{HwEnumerator, HwIter};
pub use error::{HwError, HwResult, HwStatus, HwStatusExt};
pub use handle::{
    AclEntryHandle, AclStatHandle, EcmpId, EgressId, FieldGroupId, HandleKind, HwHandle, IntfId,
    MirrorHandle, QosMapId, RawHandle, RouteCounterId, TeFlowEntryHandle, TeFlowStatHandle,
    TrunkId, TunnelIntfId, UdfGroupId, UdfPacketMatcherId,
};
pub use records::*;
