//! A generic utility that maintains a live set of matching services.

use crate::bundle::context::BundleContext;
use crate::events::{ServiceEvent, ServiceEventKind};
use crate::listeners::ServiceListener;
use crate::service::ServiceReference;
use crate::sync;
use nucleus_core::{FrameworkResult, OBJECT_CLASS, SERVICE_ID};
use nucleus_filter::Filter;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Hook invoked as services enter, change within, and leave the tracked
/// set.
///
/// The default customizer simply retrieves the service on add and ungets
/// it on remove.
pub trait TrackerCustomizer<T: Send + Sync + 'static>: Send + Sync {
    /// A matching service appeared. Return the object to track, or `None`
    /// to ignore this service.
    fn adding(&self, ctx: &BundleContext, reference: &ServiceReference) -> Option<Arc<T>>;

    /// A tracked service's properties were replaced.
    fn modified(&self, ctx: &BundleContext, reference: &ServiceReference, service: &Arc<T>) {
        let _ = (ctx, reference, service);
    }

    /// A tracked service is being unregistered. Still resolvable during
    /// this call.
    fn removed(&self, ctx: &BundleContext, reference: &ServiceReference, service: &Arc<T>) {
        let _ = (ctx, reference, service);
    }
}

struct DefaultCustomizer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TrackerCustomizer<T> for DefaultCustomizer<T> {
    fn adding(&self, ctx: &BundleContext, reference: &ServiceReference) -> Option<Arc<T>> {
        ctx.get_service::<T>(reference).ok().flatten()
    }

    fn removed(&self, ctx: &BundleContext, reference: &ServiceReference, _service: &Arc<T>) {
        let _ = ctx.unget_service(reference);
    }
}

struct TrackerState<T> {
    tracked: Vec<(ServiceReference, Arc<T>)>,
    /// Most recently resolved best match, invalidated on any structural
    /// change and recomputed lazily under the tracker lock.
    cached: Option<(ServiceReference, Arc<T>)>,
}

struct TrackerShared<T: Send + Sync + 'static> {
    ctx: BundleContext,
    customizer: Arc<dyn TrackerCustomizer<T>>,
    /// Parsed at `open`; evaluated here rather than by the dispatcher so
    /// the tracker also observes services *leaving* the matched set.
    filter: Mutex<Option<Filter>>,
    state: Mutex<TrackerState<T>>,
}

impl<T: Send + Sync + 'static> TrackerShared<T> {
    fn handle(&self, event: &ServiceEvent) {
        let matched = {
            let filter = sync::lock(&self.filter);
            let Some(filter) = filter.as_ref() else {
                return;
            };
            filter.matches(&event.reference().properties())
        };
        match event.kind() {
            ServiceEventKind::Registered if matched => self.add(event.reference()),
            ServiceEventKind::Registered => {}
            ServiceEventKind::Modified if matched => self.modified(event.reference()),
            // The new properties fell out of the filter: the service
            // leaves the tracked set.
            ServiceEventKind::Modified | ServiceEventKind::Unregistering => {
                self.remove(event.reference());
            }
        }
    }

    fn add(&self, reference: &ServiceReference) {
        {
            let state = sync::lock(&self.state);
            if state.tracked.iter().any(|(r, _)| r == reference) {
                return;
            }
        }
        // The customizer runs outside the tracker lock; it may call back
        // into the framework.
        let Some(service) = self.customizer.adding(&self.ctx, reference) else {
            return;
        };
        let mut state = sync::lock(&self.state);
        if state.tracked.iter().any(|(r, _)| r == reference) {
            return;
        }
        state.tracked.push((reference.clone(), service));
        state.cached = None;
    }

    fn modified(&self, reference: &ServiceReference) {
        let service = {
            let mut state = sync::lock(&self.state);
            state.cached = None;
            state
                .tracked
                .iter()
                .find(|(r, _)| r == reference)
                .map(|(_, s)| Arc::clone(s))
        };
        match service {
            Some(service) => self.customizer.modified(&self.ctx, reference, &service),
            // It matched the filter only after the property change.
            None => self.add(reference),
        }
    }

    fn remove(&self, reference: &ServiceReference) {
        let removed = {
            let mut state = sync::lock(&self.state);
            match state.tracked.iter().position(|(r, _)| r == reference) {
                Some(idx) => {
                    state.cached = None;
                    Some(state.tracked.remove(idx))
                }
                None => None,
            }
        };
        if let Some((reference, service)) = removed {
            self.customizer.removed(&self.ctx, &reference, &service);
        }
    }
}

/// Tracks the set of services matching a class name, a filter, or one
/// explicit reference.
///
/// On [`open`](Self::open) the tracker registers a service listener,
/// evaluates its filter against every service event, and seeds its set
/// from a synchronous query; from then on the set changes synchronously
/// with the registrations and property updates that affect it, on the
/// triggering caller's own stack. [`close`](Self::close) removes the
/// listener and releases every tracked service exactly once.
pub struct ServiceTracker<T: Send + Sync + 'static> {
    filter: String,
    shared: Arc<TrackerShared<T>>,
    listener: Mutex<Option<ServiceListener>>,
}

impl<T: Send + Sync + 'static> ServiceTracker<T> {
    /// Track every service registered under `class`.
    #[must_use]
    pub fn for_class(ctx: BundleContext, class: &str) -> Self {
        Self::build(ctx, format!("({OBJECT_CLASS}={class})"))
    }

    /// Track every service matching an explicit filter string.
    ///
    /// # Errors
    ///
    /// Fails on filter syntax errors.
    pub fn for_filter(ctx: BundleContext, filter: &str) -> FrameworkResult<Self> {
        Filter::parse(filter)?;
        Ok(Self::build(ctx, filter.to_string()))
    }

    /// Track exactly one registration, by its service id.
    #[must_use]
    pub fn for_reference(ctx: BundleContext, reference: &ServiceReference) -> Self {
        Self::build(ctx, format!("({SERVICE_ID}={})", reference.service_id()))
    }

    fn build(ctx: BundleContext, filter: String) -> Self {
        Self {
            filter,
            shared: Arc::new(TrackerShared {
                ctx,
                customizer: Arc::new(DefaultCustomizer {
                    _marker: PhantomData,
                }),
                filter: Mutex::new(None),
                state: Mutex::new(TrackerState {
                    tracked: Vec::new(),
                    cached: None,
                }),
            }),
            listener: Mutex::new(None),
        }
    }

    /// Replace the default customizer. Must be called before
    /// [`open`](Self::open).
    #[must_use]
    pub fn with_customizer(mut self, customizer: Arc<dyn TrackerCustomizer<T>>) -> Self {
        let shared = Arc::new(TrackerShared {
            ctx: self.shared.ctx.clone(),
            customizer,
            filter: Mutex::new(None),
            state: Mutex::new(TrackerState {
                tracked: Vec::new(),
                cached: None,
            }),
        });
        self.shared = shared;
        self
    }

    /// Begin tracking: register the listener, then seed the set from all
    /// currently matching references.
    ///
    /// The listener is registered without a dispatch-side filter; the
    /// tracker evaluates its own filter against every service event, so a
    /// property change that stops matching removes the entry.
    ///
    /// # Errors
    ///
    /// Fails once the owning context is invalidated.
    pub fn open(&self) -> FrameworkResult<()> {
        let mut slot = sync::lock(&self.listener);
        if slot.is_some() {
            return Ok(());
        }

        *sync::lock(&self.shared.filter) = Some(Filter::parse(&self.filter)?);
        let shared = Arc::clone(&self.shared);
        let listener: ServiceListener = Arc::new(move |event| shared.handle(event));
        self.shared
            .ctx
            .add_service_listener(Arc::clone(&listener), None)?;
        *slot = Some(listener);
        drop(slot);

        for reference in self
            .shared
            .ctx
            .get_service_references("", Some(&self.filter))?
        {
            self.shared.add(&reference);
        }
        debug!(filter = %self.filter, tracked = self.size(), "service tracker opened");
        Ok(())
    }

    /// Stop tracking: remove the listener and release every tracked
    /// service exactly once.
    ///
    /// # Errors
    ///
    /// Fails when the owning context was invalidated before the listener
    /// could be removed; tracked services are still released.
    pub fn close(&self) -> FrameworkResult<()> {
        let listener = sync::lock(&self.listener).take();
        let Some(listener) = listener else {
            return Ok(());
        };
        let result = self.shared.ctx.remove_service_listener(&listener);

        let drained = {
            let mut state = sync::lock(&self.shared.state);
            state.cached = None;
            std::mem::take(&mut state.tracked)
        };
        for (reference, service) in drained {
            self.shared
                .customizer
                .removed(&self.shared.ctx, &reference, &service);
        }
        debug!(filter = %self.filter, "service tracker closed");
        result
    }

    /// The best (highest-ranked) tracked reference, if any.
    #[must_use]
    pub fn reference(&self) -> Option<ServiceReference> {
        self.best().map(|(reference, _)| reference)
    }

    /// The best tracked service instance, if any.
    #[must_use]
    pub fn service(&self) -> Option<Arc<T>> {
        self.best().map(|(_, service)| service)
    }

    /// All tracked references, unordered.
    #[must_use]
    pub fn references(&self) -> Vec<ServiceReference> {
        sync::lock(&self.shared.state)
            .tracked
            .iter()
            .map(|(reference, _)| reference.clone())
            .collect()
    }

    /// All tracked service instances, unordered.
    #[must_use]
    pub fn services(&self) -> Vec<Arc<T>> {
        sync::lock(&self.shared.state)
            .tracked
            .iter()
            .map(|(_, service)| Arc::clone(service))
            .collect()
    }

    /// Number of tracked services.
    #[must_use]
    pub fn size(&self) -> usize {
        sync::lock(&self.shared.state).tracked.len()
    }

    /// Whether nothing is currently tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn best(&self) -> Option<(ServiceReference, Arc<T>)> {
        let mut state = sync::lock(&self.shared.state);
        if state.cached.is_none() {
            state.cached = state
                .tracked
                .iter()
                .max_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(reference, service)| (reference.clone(), Arc::clone(service)));
        }
        state.cached.clone()
    }
}

impl<T: Send + Sync + 'static> Drop for ServiceTracker<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
