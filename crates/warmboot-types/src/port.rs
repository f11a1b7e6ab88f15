//! Logical port numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical port as the switch agent numbers it; port 0 is the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(u32);

impl PortId {
    pub const fn new(id: u32) -> Self {
        PortId(id)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_and_serde() {
        let port = PortId::new(12);
        assert_eq!(port.to_string(), "port12");
        assert_eq!(serde_json::to_string(&port).unwrap(), "12");
        assert_eq!(serde_json::from_str::<PortId>("12").unwrap(), port);
    }
}
