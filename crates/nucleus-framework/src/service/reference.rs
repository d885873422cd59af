//! Lightweight handles to service registration metadata.

use crate::service::entry::ServiceEntry;
use nucleus_core::{BundleId, Properties, ServiceId, Value, get_ci};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A cheap, copyable handle to a registered service's metadata.
///
/// A reference never holds the service instance itself. It stays usable
/// after the registration is removed, but resolution through it then
/// yields nothing; downstream operations must re-validate.
///
/// References to the same registration compare equal. Ordering follows
/// the service ranking property; on a tie the lower service id (the
/// earlier registration) is the greater reference.
#[derive(Clone)]
pub struct ServiceReference {
    pub(crate) entry: Arc<ServiceEntry>,
    pub(crate) interface: String,
}

impl ServiceReference {
    pub(crate) fn new(entry: Arc<ServiceEntry>, interface: impl Into<String>) -> Self {
        Self {
            entry,
            interface: interface.into(),
        }
    }

    /// The registration's service id.
    #[must_use]
    pub fn service_id(&self) -> ServiceId {
        self.entry.id
    }

    /// Id of the bundle that registered the service.
    #[must_use]
    pub fn bundle_id(&self) -> BundleId {
        self.entry.owner
    }

    /// The interface name this reference was obtained under.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// All interface names the service was registered with.
    #[must_use]
    pub fn interfaces(&self) -> &[String] {
        &self.entry.interfaces
    }

    /// A snapshot of the service's current properties.
    #[must_use]
    pub fn properties(&self) -> Properties {
        self.entry.properties()
    }

    /// One property from the current snapshot (case-insensitive key).
    #[must_use]
    pub fn property(&self, key: &str) -> Option<Value> {
        get_ci(&self.entry.properties(), key).cloned()
    }

    /// The service ranking, 0 when unset.
    #[must_use]
    pub fn ranking(&self) -> i64 {
        self.entry.ranking()
    }

    /// Whether the registration is still live in its registry.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.entry.is_available()
    }
}

impl PartialEq for ServiceReference {
    fn eq(&self, other: &Self) -> bool {
        self.entry.id == other.entry.id
    }
}

impl Eq for ServiceReference {}

impl Hash for ServiceReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entry.id.hash(state);
    }
}

impl PartialOrd for ServiceReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ranking()
            .cmp(&other.ranking())
            .then_with(|| other.entry.id.cmp(&self.entry.id))
    }
}

impl fmt::Debug for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReference")
            .field("service_id", &self.entry.id)
            .field("interface", &self.interface)
            .field("available", &self.is_available())
            .finish()
    }
}
