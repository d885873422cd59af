//! The service model: registry, registrations and references.

pub(crate) mod entry;
pub(crate) mod reference;
pub(crate) mod registration;
pub(crate) mod registry;

pub use reference::ServiceReference;
pub use registration::ServiceRegistration;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A type-erased service instance.
pub(crate) type ServiceObject = Arc<dyn Any + Send + Sync>;

/// The payload of a service registration: a mapping from interface name to
/// a type-erased instance.
///
/// A service is polymorphic over an open, caller-declared set of interface
/// names. Resolving a typed handle is the consumer's job: look up by name,
/// then downcast at the call site via
/// [`BundleContext::get_service`](crate::BundleContext::get_service).
#[derive(Default, Clone)]
pub struct InterfaceMap {
    entries: Vec<(String, ServiceObject)>,
}

impl InterfaceMap {
    /// Create an empty map. Registering an empty map fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A map with a single interface, the common case.
    #[must_use]
    pub fn single<T: Any + Send + Sync>(interface: impl Into<String>, instance: Arc<T>) -> Self {
        Self::new().insert(interface, instance)
    }

    /// Add an interface, consuming and returning `self`. Re-inserting an
    /// existing name replaces its instance.
    #[must_use]
    pub fn insert<T: Any + Send + Sync>(
        mut self,
        interface: impl Into<String>,
        instance: Arc<T>,
    ) -> Self {
        let interface = interface.into();
        let object: ServiceObject = instance;
        if let Some(slot) = self.entries.iter_mut().find(|(name, _)| *name == interface) {
            slot.1 = object;
        } else {
            self.entries.push((interface, object));
        }
        self
    }

    /// Whether any interface has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The declared interface names, in insertion order.
    #[must_use]
    pub fn interfaces(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, HashMap<String, ServiceObject>) {
        let interfaces = self.interfaces();
        let instances = self.entries.into_iter().collect();
        (interfaces, instances)
    }
}

impl std::fmt::Debug for InterfaceMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceMap")
            .field("interfaces", &self.interfaces())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_duplicate_interface() {
        let map = InterfaceMap::new()
            .insert("greeter", Arc::new(1_u32))
            .insert("greeter", Arc::new(2_u32))
            .insert("counter", Arc::new(3_u32));
        assert_eq!(map.interfaces(), vec!["greeter", "counter"]);

        let (_, instances) = map.into_parts();
        let value = instances
            .get("greeter")
            .and_then(|o| Arc::clone(o).downcast::<u32>().ok())
            .unwrap();
        assert_eq!(*value, 2);
    }

    #[test]
    fn test_empty_map() {
        assert!(InterfaceMap::new().is_empty());
        assert!(!InterfaceMap::single("x", Arc::new(())).is_empty());
    }
}
