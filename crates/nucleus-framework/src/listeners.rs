//! Listener tables and synchronous event dispatch.
//!
//! Three listener kinds, each keyed by the registering bundle context, the
//! callback's identity and an optional user-data token. Delivery runs on
//! the thread that triggered the event, before the triggering operation
//! returns.
//!
//! The listener table is snapshotted at the start of each dispatch pass:
//! a listener added during dispatch first sees the next event, and a
//! listener removed during dispatch may still receive the in-flight one.

use crate::events::{BundleEvent, FrameworkEvent, ServiceEvent};
use crate::sync;
use nucleus_filter::Filter;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

/// Callback receiving service events.
pub type ServiceListener = Arc<dyn Fn(&ServiceEvent) + Send + Sync>;

/// Callback receiving bundle events.
pub type BundleListener = Arc<dyn Fn(&BundleEvent) + Send + Sync>;

/// Callback receiving framework events.
pub type FrameworkListener = Arc<dyn Fn(&FrameworkEvent) + Send + Sync>;

/// Identity of the bundle context that registered a listener.
pub(crate) type ContextKey = usize;

/// Compare callbacks by allocation address, ignoring vtable metadata.
fn same_callback<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

struct ServiceListenerEntry {
    key: ContextKey,
    listener: ServiceListener,
    data: Option<u64>,
    filter: Option<Filter>,
}

struct BundleListenerEntry {
    key: ContextKey,
    listener: BundleListener,
    data: Option<u64>,
}

struct FrameworkListenerEntry {
    key: ContextKey,
    listener: FrameworkListener,
    data: Option<u64>,
}

/// The per-framework listener tables.
pub(crate) struct ListenerHub {
    service: Mutex<Vec<ServiceListenerEntry>>,
    bundle: Mutex<Vec<BundleListenerEntry>>,
    framework: Mutex<Vec<FrameworkListenerEntry>>,
}

impl ListenerHub {
    pub(crate) fn new() -> Self {
        Self {
            service: Mutex::new(Vec::new()),
            bundle: Mutex::new(Vec::new()),
            framework: Mutex::new(Vec::new()),
        }
    }

    /// Add a service listener. Re-adding the identical
    /// (context, callback, data) triple replaces the stored filter rather
    /// than duplicating delivery.
    pub(crate) fn add_service_listener(
        &self,
        key: ContextKey,
        listener: ServiceListener,
        data: Option<u64>,
        filter: Option<Filter>,
    ) {
        let mut table = sync::lock(&self.service);
        if let Some(entry) = table
            .iter_mut()
            .find(|e| e.key == key && same_callback(&e.listener, &listener) && e.data == data)
        {
            entry.filter = filter;
            return;
        }
        table.push(ServiceListenerEntry {
            key,
            listener,
            data,
            filter,
        });
    }

    /// Remove a service listener by its (context, callback, data) triple.
    /// Removing an absent entry is a no-op.
    pub(crate) fn remove_service_listener(
        &self,
        key: ContextKey,
        listener: &ServiceListener,
        data: Option<u64>,
    ) {
        sync::lock(&self.service)
            .retain(|e| !(e.key == key && same_callback(&e.listener, listener) && e.data == data));
    }

    pub(crate) fn add_bundle_listener(
        &self,
        key: ContextKey,
        listener: BundleListener,
        data: Option<u64>,
    ) {
        let mut table = sync::lock(&self.bundle);
        if table
            .iter()
            .any(|e| e.key == key && same_callback(&e.listener, &listener) && e.data == data)
        {
            return;
        }
        table.push(BundleListenerEntry {
            key,
            listener,
            data,
        });
    }

    pub(crate) fn remove_bundle_listener(
        &self,
        key: ContextKey,
        listener: &BundleListener,
        data: Option<u64>,
    ) {
        sync::lock(&self.bundle)
            .retain(|e| !(e.key == key && same_callback(&e.listener, listener) && e.data == data));
    }

    pub(crate) fn add_framework_listener(
        &self,
        key: ContextKey,
        listener: FrameworkListener,
        data: Option<u64>,
    ) {
        let mut table = sync::lock(&self.framework);
        if table
            .iter()
            .any(|e| e.key == key && same_callback(&e.listener, &listener) && e.data == data)
        {
            return;
        }
        table.push(FrameworkListenerEntry {
            key,
            listener,
            data,
        });
    }

    pub(crate) fn remove_framework_listener(
        &self,
        key: ContextKey,
        listener: &FrameworkListener,
        data: Option<u64>,
    ) {
        sync::lock(&self.framework)
            .retain(|e| !(e.key == key && same_callback(&e.listener, listener) && e.data == data));
    }

    /// Drop every listener owned by an invalidated context.
    pub(crate) fn remove_context(&self, key: ContextKey) {
        sync::lock(&self.service).retain(|e| e.key != key);
        sync::lock(&self.bundle).retain(|e| e.key != key);
        sync::lock(&self.framework).retain(|e| e.key != key);
    }

    /// Deliver a service event to every listener whose filter matches the
    /// service's current properties. Listeners without a filter always
    /// match.
    pub(crate) fn service_changed(&self, event: &ServiceEvent) {
        let snapshot: Vec<(ServiceListener, Option<Filter>)> = sync::lock(&self.service)
            .iter()
            .map(|e| (Arc::clone(&e.listener), e.filter.clone()))
            .collect();

        trace!(
            kind = %event.kind(),
            service_id = %event.reference().service_id(),
            listeners = snapshot.len(),
            "dispatching service event"
        );

        // Filters are re-evaluated against the live property snapshot at
        // dispatch time, never against the properties seen at add time.
        let props = event.reference().properties();
        for (listener, filter) in snapshot {
            if filter.as_ref().is_none_or(|f| f.matches(&props)) {
                invoke(|| listener(event), "service");
            }
        }
    }

    /// Deliver a bundle event to every bundle listener, unconditionally.
    pub(crate) fn bundle_changed(&self, event: &BundleEvent) {
        let snapshot: Vec<BundleListener> = sync::lock(&self.bundle)
            .iter()
            .map(|e| Arc::clone(&e.listener))
            .collect();

        trace!(
            kind = %event.kind(),
            bundle = %event.bundle().id(),
            listeners = snapshot.len(),
            "dispatching bundle event"
        );

        for listener in snapshot {
            invoke(|| listener(event), "bundle");
        }
    }

    /// Deliver a framework event to every framework listener,
    /// unconditionally.
    pub(crate) fn framework_event(&self, event: &FrameworkEvent) {
        let snapshot: Vec<FrameworkListener> = sync::lock(&self.framework)
            .iter()
            .map(|e| Arc::clone(&e.listener))
            .collect();

        for listener in snapshot {
            invoke(|| listener(event), "framework");
        }
    }
}

/// Invoke one listener, isolating its failure from the rest of the
/// dispatch pass.
fn invoke(call: impl FnOnce(), kind: &str) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        warn!(listener_kind = kind, "listener panicked during dispatch");
    }
}

#[cfg(test)]
mod tests {
    use crate::events::ServiceEventKind;
    use crate::{Framework, FrameworkConfig, InterfaceMap};
    use nucleus_core::Properties;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Svc;

    fn started_framework() -> Framework {
        let framework = Framework::new(FrameworkConfig::new());
        framework.start().unwrap();
        framework
    }

    fn register_svc(framework: &Framework, props: Properties) -> crate::ServiceRegistration {
        framework
            .context()
            .register_service(InterfaceMap::single("svc", Arc::new(Svc)), props)
            .unwrap()
    }

    #[test]
    fn test_service_events_delivered_synchronously() {
        let framework = started_framework();
        let ctx = framework.context();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        ctx.add_service_listener(
            Arc::new(move |event| log.lock().unwrap().push(event.kind())),
            None,
        )
        .unwrap();

        let registration = register_svc(&framework, Properties::new());
        // Delivery completes before register_service returns.
        assert_eq!(*seen.lock().unwrap(), vec![ServiceEventKind::Registered]);

        registration.set_properties(Properties::new()).unwrap();
        registration.unregister().unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ServiceEventKind::Registered,
                ServiceEventKind::Modified,
                ServiceEventKind::Unregistering,
            ]
        );
    }

    #[test]
    fn test_filter_evaluated_against_live_properties() {
        let framework = started_framework();
        let ctx = framework.context();

        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        ctx.add_service_listener(
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Some("(flavor=vanilla)"),
        )
        .unwrap();

        let registration = register_svc(&framework, Properties::new());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let mut props = Properties::new();
        props.insert("flavor".into(), json!("vanilla"));
        registration.set_properties(props).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Unregistering is matched against the properties the service
        // still carries at dispatch time.
        registration.unregister().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_readding_listener_replaces_filter() {
        let framework = started_framework();
        let ctx = framework.context();

        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let listener: crate::ServiceListener = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        ctx.add_service_listener(Arc::clone(&listener), Some("(flavor=vanilla)"))
            .unwrap();
        ctx.add_service_listener(Arc::clone(&listener), None).unwrap();

        register_svc(&framework, Properties::new());
        // Delivered once: the second add replaced the filter instead of
        // duplicating the entry.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_data_token_distinguishes_entries() {
        let framework = started_framework();
        let ctx = framework.context();

        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let listener: crate::ServiceListener = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        ctx.add_service_listener_with_data(Arc::clone(&listener), Some(1), None)
            .unwrap();
        ctx.add_service_listener_with_data(Arc::clone(&listener), Some(2), None)
            .unwrap();
        register_svc(&framework, Properties::new());
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        ctx.remove_service_listener_with_data(&listener, Some(2)).unwrap();
        register_svc(&framework, Properties::new());
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        // Removing an absent entry is a no-op.
        ctx.remove_service_listener_with_data(&listener, Some(7)).unwrap();
    }

    #[test]
    fn test_panicking_listener_does_not_poison_dispatch() {
        let framework = started_framework();
        let ctx = framework.context();

        ctx.add_service_listener(Arc::new(|_| panic!("listener bug")), None)
            .unwrap();

        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        ctx.add_service_listener(
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        )
        .unwrap();

        // The registering call still succeeds and later listeners still
        // run.
        register_svc(&framework, Properties::new());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bundle_listener_sees_lifecycle_events() {
        use crate::events::BundleEventKind;

        let framework = started_framework();
        let ctx = framework.context();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        ctx.add_bundle_listener(Arc::new(move |event| {
            log.lock().unwrap().push((event.bundle().id(), event.kind()));
        }))
        .unwrap();

        let bundle = ctx.install_bundle("bundles/libTestBundleA.so").unwrap();
        bundle.start().unwrap();
        bundle.stop().unwrap();

        let id = bundle.id();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (id, BundleEventKind::Installed),
                (id, BundleEventKind::Starting),
                (id, BundleEventKind::Started),
                (id, BundleEventKind::Stopping),
                (id, BundleEventKind::Stopped),
            ]
        );
    }
}
