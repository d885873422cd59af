//! The central, process-wide service registry (one per framework).

use crate::core_context::CoreContext;
use crate::events::{ServiceEvent, ServiceEventKind};
use crate::service::entry::ServiceEntry;
use crate::service::reference::ServiceReference;
use crate::service::registration::ServiceRegistration;
use crate::service::{InterfaceMap, ServiceObject};
use dashmap::DashMap;
use nucleus_core::{
    BundleId, FrameworkError, FrameworkResult, OBJECT_CLASS, SERVICE_ID, ServiceId,
};
use nucleus_filter::Filter;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Thread-safe map from service id to entry, with a secondary index by
/// interface name for efficient querying.
///
/// Queries observe a consistent per-entry snapshot but may miss or include
/// entries registered or unregistered concurrently; only per-entry
/// atomicity is promised, never registry-wide linearizability.
pub(crate) struct ServiceRegistry {
    entries: DashMap<ServiceId, Arc<ServiceEntry>>,
    by_class: DashMap<String, Vec<ServiceId>>,
    next_id: AtomicU64,
}

impl ServiceRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_class: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a service on behalf of `owner`, delivering the REGISTERED
    /// event before returning.
    pub(crate) fn register(
        &self,
        core: &Arc<CoreContext>,
        owner: BundleId,
        service: InterfaceMap,
        mut properties: nucleus_core::Properties,
    ) -> FrameworkResult<ServiceRegistration> {
        if service.is_empty() {
            return Err(FrameworkError::InvalidArgument(
                "a service must declare at least one interface".to_string(),
            ));
        }

        let (interfaces, instances) = service.into_parts();
        let id = ServiceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        properties.insert(SERVICE_ID.to_string(), json!(id.0));
        properties.insert(OBJECT_CLASS.to_string(), json!(interfaces));

        let entry = Arc::new(ServiceEntry::new(
            id,
            owner,
            interfaces.clone(),
            instances,
            properties,
        ));
        self.entries.insert(id, Arc::clone(&entry));
        for interface in &interfaces {
            self.by_class
                .entry(interface.clone())
                .or_default()
                .push(id);
        }

        debug!(service_id = %id, bundle = %owner, interfaces = ?interfaces, "service registered");
        core.log
            .log(format_args!("registered service {id} for bundle {owner}"));

        let registration = ServiceRegistration::new(Arc::clone(&entry), Arc::downgrade(core));
        core.listeners.service_changed(&ServiceEvent::new(
            ServiceEventKind::Registered,
            registration.reference(),
        ));
        Ok(registration)
    }

    /// Deliver UNREGISTERING while the entry is still resolvable, then
    /// physically remove it.
    pub(crate) fn remove(&self, core: &Arc<CoreContext>, entry: &Arc<ServiceEntry>) {
        let interface = entry.interfaces.first().cloned().unwrap_or_default();
        core.listeners.service_changed(&ServiceEvent::new(
            ServiceEventKind::Unregistering,
            ServiceReference::new(Arc::clone(entry), interface),
        ));

        entry.mark_unavailable();
        self.entries.remove(&entry.id);
        for interface in &entry.interfaces {
            if let Some(mut ids) = self.by_class.get_mut(interface) {
                ids.retain(|id| *id != entry.id);
            }
        }

        debug!(service_id = %entry.id, "service unregistered");
        core.log
            .log(format_args!("unregistered service {}", entry.id));
    }

    /// Unregister every live service owned by a stopping bundle.
    pub(crate) fn unregister_owned(&self, core: &Arc<CoreContext>, owner: BundleId) {
        let owned: Vec<Arc<ServiceEntry>> = self
            .entries
            .iter()
            .filter(|item| item.value().owner == owner)
            .map(|item| Arc::clone(item.value()))
            .collect();
        for entry in owned {
            if entry.begin_unregister() {
                self.remove(core, &entry);
            }
        }
    }

    /// Every reference whose `objectclass` contains `class` (or all
    /// services when `class` is empty) and whose properties satisfy the
    /// optional filter, best match first.
    pub(crate) fn get_references(
        &self,
        class: &str,
        filter: Option<&Filter>,
    ) -> Vec<ServiceReference> {
        let candidates: Vec<Arc<ServiceEntry>> = if class.is_empty() {
            self.entries
                .iter()
                .map(|item| Arc::clone(item.value()))
                .collect()
        } else {
            let ids = self
                .by_class
                .get(class)
                .map(|ids| ids.value().clone())
                .unwrap_or_default();
            ids.iter()
                .filter_map(|id| self.entries.get(id).map(|item| Arc::clone(item.value())))
                .collect()
        };

        let mut references: Vec<ServiceReference> = candidates
            .into_iter()
            .filter(|entry| entry.is_available())
            .filter(|entry| filter.is_none_or(|f| f.matches(&entry.properties())))
            .map(|entry| {
                let interface = if class.is_empty() {
                    entry.interfaces.first().cloned().unwrap_or_default()
                } else {
                    class.to_string()
                };
                ServiceReference::new(entry, interface)
            })
            .collect();

        references.sort_by(|a, b| b.cmp(a));
        references
    }

    /// The single highest-ranked match for `class`, if any.
    pub(crate) fn get_reference(&self, class: &str) -> Option<ServiceReference> {
        self.get_references(class, None).into_iter().next()
    }

    /// Resolve a reference for a consuming bundle, incrementing its use
    /// count. Returns nothing when the entry was removed since the
    /// reference was obtained.
    pub(crate) fn get(
        &self,
        reference: &ServiceReference,
        consumer: BundleId,
    ) -> Option<ServiceObject> {
        if !reference.entry.is_available() {
            return None;
        }
        let instance = resolve_instance(reference)?;
        reference.entry.acquire(consumer);
        Some(instance)
    }

    /// Decrement a consumer's use count. A count already at zero is a
    /// safe no-op reported as `false`.
    pub(crate) fn unget(&self, reference: &ServiceReference, consumer: BundleId) -> bool {
        reference.entry.release(consumer)
    }
}

fn resolve_instance(reference: &ServiceReference) -> Option<ServiceObject> {
    let entry = &reference.entry;
    if reference.interface.is_empty() {
        let first = entry.interfaces.first()?;
        entry.instances.get(first).cloned()
    } else {
        entry.instances.get(&reference.interface).cloned()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Framework, FrameworkConfig, InterfaceMap};
    use nucleus_core::Properties;
    use serde_json::json;
    use std::sync::Arc;

    struct Greeter;
    struct Counter;

    fn started_framework() -> Framework {
        let framework = Framework::new(FrameworkConfig::new());
        framework.start().unwrap();
        framework
    }

    #[test]
    fn test_register_then_query_by_interface() {
        let framework = started_framework();
        let ctx = framework.context();

        let registration = ctx
            .register_service(InterfaceMap::single("greeter", Arc::new(Greeter)), Properties::new())
            .unwrap();

        let refs = ctx.get_service_references("greeter", None).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].service_id(), registration.service_id());

        registration.unregister().unwrap();
        assert!(ctx.get_service_references("greeter", None).unwrap().is_empty());
    }

    #[test]
    fn test_empty_interface_map_is_rejected() {
        let framework = started_framework();
        let ctx = framework.context();
        assert!(ctx.register_service(InterfaceMap::new(), Properties::new()).is_err());
    }

    #[test]
    fn test_service_ids_strictly_increase() {
        let framework = started_framework();
        let ctx = framework.context();

        let first = ctx
            .register_service(InterfaceMap::single("a", Arc::new(Greeter)), Properties::new())
            .unwrap();
        let second = ctx
            .register_service(InterfaceMap::single("a", Arc::new(Greeter)), Properties::new())
            .unwrap();
        assert!(second.service_id() > first.service_id());

        // Ids are not reused after unregistration.
        first.unregister().unwrap();
        let third = ctx
            .register_service(InterfaceMap::single("a", Arc::new(Greeter)), Properties::new())
            .unwrap();
        assert!(third.service_id() > second.service_id());
    }

    #[test]
    fn test_ranking_orders_references() {
        let framework = started_framework();
        let ctx = framework.context();

        let mut low = Properties::new();
        low.insert("service.ranking".to_string(), json!(1));
        let mut high = Properties::new();
        high.insert("service.ranking".to_string(), json!(9));

        let low_reg = ctx
            .register_service(InterfaceMap::single("svc", Arc::new(Greeter)), low)
            .unwrap();
        let high_reg = ctx
            .register_service(InterfaceMap::single("svc", Arc::new(Greeter)), high)
            .unwrap();

        let refs = ctx.get_service_references("svc", None).unwrap();
        assert_eq!(refs[0].service_id(), high_reg.service_id());
        assert_eq!(refs[1].service_id(), low_reg.service_id());

        let best = ctx.get_service_reference("svc").unwrap().unwrap();
        assert_eq!(best.service_id(), high_reg.service_id());
    }

    #[test]
    fn test_equal_ranking_prefers_lower_id() {
        let framework = started_framework();
        let ctx = framework.context();

        let first = ctx
            .register_service(InterfaceMap::single("svc", Arc::new(Greeter)), Properties::new())
            .unwrap();
        let _second = ctx
            .register_service(InterfaceMap::single("svc", Arc::new(Greeter)), Properties::new())
            .unwrap();

        let best = ctx.get_service_reference("svc").unwrap().unwrap();
        assert_eq!(best.service_id(), first.service_id());
    }

    #[test]
    fn test_filtered_query() {
        let framework = started_framework();
        let ctx = framework.context();

        let mut props = Properties::new();
        props.insert("vendor".to_string(), json!("acme"));
        ctx.register_service(InterfaceMap::single("svc", Arc::new(Greeter)), props)
            .unwrap();
        ctx.register_service(InterfaceMap::single("svc", Arc::new(Greeter)), Properties::new())
            .unwrap();

        let refs = ctx
            .get_service_references("svc", Some("(vendor=acme)"))
            .unwrap();
        assert_eq!(refs.len(), 1);

        // Empty class matches all services.
        let all = ctx.get_service_references("", Some("(vendor=acme)")).unwrap();
        assert_eq!(all.len(), 1);

        assert!(ctx.get_service_references("svc", Some("(vendor=")).is_err());
    }

    #[test]
    fn test_get_and_unget_service() {
        let framework = started_framework();
        let ctx = framework.context();

        let value = Arc::new(Counter);
        ctx.register_service(InterfaceMap::single("counter", value), Properties::new())
            .unwrap();

        let reference = ctx.get_service_reference("counter").unwrap().unwrap();
        let service: Arc<Counter> = ctx.get_service(&reference).unwrap().unwrap();
        drop(service);

        // Wrong type yields nothing.
        assert!(ctx.get_service::<Greeter>(&reference).unwrap().is_none());

        assert!(ctx.unget_service(&reference).unwrap());
        // A second release finds the count already at zero: safe no-op.
        assert!(!ctx.unget_service(&reference).unwrap());
    }

    #[test]
    fn test_get_after_unregister_returns_none() {
        let framework = started_framework();
        let ctx = framework.context();

        let registration = ctx
            .register_service(InterfaceMap::single("svc", Arc::new(Greeter)), Properties::new())
            .unwrap();
        let reference = registration.reference();
        registration.unregister().unwrap();

        assert!(ctx.get_service::<Greeter>(&reference).unwrap().is_none());
        assert!(registration.unregister().is_err());
    }

    #[test]
    fn test_set_properties_preserves_implicit_keys() {
        let framework = started_framework();
        let ctx = framework.context();

        let registration = ctx
            .register_service(InterfaceMap::single("svc", Arc::new(Greeter)), Properties::new())
            .unwrap();
        let mut replacement = Properties::new();
        replacement.insert("service.id".to_string(), json!(9999));
        replacement.insert("vendor".to_string(), json!("acme"));
        registration.set_properties(replacement).unwrap();

        let reference = registration.reference();
        assert_eq!(
            reference.property("service.id").and_then(|v| v.as_u64()),
            Some(registration.service_id().0)
        );
        assert_eq!(
            reference.property("objectclass"),
            Some(json!(["svc"]))
        );
        assert_eq!(reference.property("vendor"), Some(json!("acme")));
    }
}
