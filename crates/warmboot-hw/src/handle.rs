//! Type-safe ASIC object handles.
//!
//! The SDK hands out plain `int` identifiers for every object class and
//! reuses the same numeric ranges across classes. Wrapping them in
//! [`HwHandle`] with a phantom kind keeps an egress id from being passed
//! where an ACL entry handle is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Raw SDK identifier type.
pub type RawHandle = i32;

/// Marker trait for ASIC object kinds.
pub trait HandleKind: 'static {
    /// Returns the object class name for logs.
    fn kind_name() -> &'static str;
}

/// A typed ASIC handle.
///
/// The SDK uses `-1` as the "no object" sentinel; [`HwHandle::INVALID`]
/// carries it and [`HwHandle::from_raw`] refuses it.
pub struct HwHandle<K: HandleKind> {
    raw: RawHandle,
    _kind: PhantomData<fn() -> K>,
}

impl<K: HandleKind> HwHandle<K> {
    pub const INVALID: Self = Self {
        raw: -1,
        _kind: PhantomData,
    };

    /// Creates a handle from a raw id, returning `None` for the sentinel.
    pub fn from_raw(raw: RawHandle) -> Option<Self> {
        if raw == -1 {
            None
        } else {
            Some(Self::new(raw))
        }
    }

    /// Creates a handle without rejecting the sentinel.
    pub const fn new(raw: RawHandle) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    pub const fn as_raw(&self) -> RawHandle {
        self.raw
    }

    pub const fn is_valid(&self) -> bool {
        self.raw != -1
    }
}

impl<K: HandleKind> Clone for HwHandle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: HandleKind> Copy for HwHandle<K> {}

impl<K: HandleKind> fmt::Debug for HwHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", K::kind_name(), self.raw)
    }
}

impl<K: HandleKind> fmt::Display for HwHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl<K: HandleKind> PartialEq for HwHandle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: HandleKind> Eq for HwHandle<K> {}

impl<K: HandleKind> PartialOrd for HwHandle<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: HandleKind> Ord for HwHandle<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<K: HandleKind> Hash for HwHandle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K: HandleKind> Default for HwHandle<K> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<K: HandleKind> Serialize for HwHandle<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.raw)
    }
}

impl<'de, K: HandleKind> Deserialize<'de> for HwHandle<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawHandle::deserialize(deserializer).map(Self::new)
    }
}

macro_rules! define_handle_kind {
    ($name:ident, $kind_name:literal, $alias:ident) => {
        #[doc = concat!("Marker type for ", $kind_name, " handles.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl HandleKind for $name {
            fn kind_name() -> &'static str {
                $kind_name
            }
        }

        #[doc = concat!("Typed handle for ", $kind_name, " objects.")]
        pub type $alias = HwHandle<$name>;
    };
}

define_handle_kind!(EgressKind, "egress", EgressId);
define_handle_kind!(EcmpKind, "ecmp", EcmpId);
define_handle_kind!(L3IntfKind, "l3_intf", IntfId);
define_handle_kind!(TunnelIntfKind, "tunnel_intf", TunnelIntfId);
define_handle_kind!(FieldGroupKind, "field_group", FieldGroupId);
define_handle_kind!(AclEntryKind, "acl_entry", AclEntryHandle);
define_handle_kind!(AclStatKind, "acl_stat", AclStatHandle);
define_handle_kind!(TeFlowEntryKind, "te_flow_entry", TeFlowEntryHandle);
define_handle_kind!(TeFlowStatKind, "te_flow_stat", TeFlowStatHandle);
define_handle_kind!(MirrorKind, "mirror", MirrorHandle);
define_handle_kind!(QosMapKind, "qos_map", QosMapId);
define_handle_kind!(TrunkKind, "trunk", TrunkId);
define_handle_kind!(UdfGroupKind, "udf_group", UdfGroupId);
define_handle_kind!(UdfPacketMatcherKind, "udf_packet_matcher", UdfPacketMatcherId);
define_handle_kind!(RouteCounterKind, "route_counter", RouteCounterId);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_invalid_sentinel() {
        assert_eq!(EgressId::from_raw(-1), None);
        assert!(!EgressId::INVALID.is_valid());
        assert!(EgressId::from_raw(100002).unwrap().is_valid());
        assert_eq!(EgressId::default(), EgressId::INVALID);
    }

    #[test]
    fn test_debug_names_kind() {
        let acl = AclEntryHandle::new(7);
        assert_eq!(format!("{:?}", acl), "acl_entry(7)");
        assert_eq!(acl.to_string(), "7");
    }

    #[test]
    fn test_ordering_follows_raw() {
        assert!(EcmpId::new(200256) < EcmpId::new(200258));
    }

    #[test]
    fn test_serde_is_bare_integer() {
        let id = EgressId::new(100010);
        assert_eq!(serde_json::to_string(&id).unwrap(), "100010");
        let back: EgressId = serde_json::from_str("100010").unwrap();
        assert_eq!(back, id);
    }
}
