//! Bundle and service identifiers.
//!
//! Both id spaces are monotonically assigned per framework instance and
//! never reused within a process lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an installed bundle.
///
/// Id 0 is reserved for the system bundle representing the framework
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BundleId(pub u64);

impl BundleId {
    /// The system bundle's id.
    pub const SYSTEM: BundleId = BundleId(0);

    /// Whether this id names the system bundle.
    #[must_use]
    pub fn is_system(self) -> bool {
        self == Self::SYSTEM
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a registered service.
///
/// Strictly increasing across registrations; stable for the lifetime of
/// the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub u64);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_bundle_id() {
        assert!(BundleId::SYSTEM.is_system());
        assert!(!BundleId(1).is_system());
        assert_eq!(BundleId::SYSTEM.to_string(), "0");
    }

    #[test]
    fn test_id_ordering() {
        assert!(ServiceId(1) < ServiceId(2));
        assert!(BundleId(0) < BundleId(10));
    }
}
