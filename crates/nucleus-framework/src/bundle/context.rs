//! The per-bundle capability handle.

use crate::bundle::{Bundle, BundleActivator, BundleInner};
use crate::core_context::CoreContext;
use crate::listeners::{BundleListener, FrameworkListener, ServiceListener};
use crate::service::{InterfaceMap, ServiceReference, ServiceRegistration};
use crate::sync;
use nucleus_core::{BundleId, FrameworkError, FrameworkResult, Properties};
use nucleus_filter::Filter;
use std::any::Any;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

struct ContextState {
    valid: bool,
    bundle: Weak<BundleInner>,
}

/// A bundle's handle to the framework.
///
/// One context exists per bundle, created at install time and invalidated
/// the instant the bundle stops or uninstalls. Every operation first
/// checks validity and fails with an invalid-state error once invalid.
///
/// Validity checks are check-then-act by intent: the context may be torn
/// down between the check and the delegated operation, with the same
/// outcome as if the caller had won that race. The window is bounded by a
/// lock scoped to the read-and-dereference step alone.
#[derive(Clone)]
pub struct BundleContext {
    inner: Arc<Mutex<ContextState>>,
}

impl BundleContext {
    pub(crate) fn new(bundle: Weak<BundleInner>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ContextState {
                valid: true,
                bundle,
            })),
        }
    }

    /// Stable identity used to key listener ownership.
    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.inner).addr()
    }

    pub(crate) fn invalidate(&self) {
        sync::lock(&self.inner).valid = false;
    }

    pub(crate) fn revalidate(&self, bundle: Weak<BundleInner>) {
        let mut state = sync::lock(&self.inner);
        state.valid = true;
        state.bundle = bundle;
    }

    /// The single logical "enter": lock, check validity, dereference the
    /// owning bundle.
    fn enter(&self) -> FrameworkResult<(Bundle, Arc<CoreContext>)> {
        let state = sync::lock(&self.inner);
        if !state.valid {
            return Err(FrameworkError::InvalidState(
                "bundle context is no longer valid".to_string(),
            ));
        }
        let inner = state.bundle.upgrade().ok_or_else(|| {
            FrameworkError::InvalidState("the owning bundle no longer exists".to_string())
        })?;
        let core = inner.core.upgrade().ok_or_else(|| {
            FrameworkError::InvalidState("the owning framework no longer exists".to_string())
        })?;
        Ok((Bundle { inner }, core))
    }

    /// Whether the context is currently valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        sync::lock(&self.inner).valid
    }

    /// The bundle this context belongs to.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn bundle(&self) -> FrameworkResult<Bundle> {
        self.enter().map(|(bundle, _)| bundle)
    }

    /// Look up a bundle by id, subject to installed bundle hooks.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn bundle_by_id(&self, id: BundleId) -> FrameworkResult<Option<Bundle>> {
        let (_, core) = self.enter()?;
        let mut found: Vec<Bundle> = core.bundles.get(id).into_iter().collect();
        core.filter_bundles(self, &mut found);
        Ok(found.into_iter().next())
    }

    /// Look up a bundle by symbolic name, subject to installed bundle
    /// hooks.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn bundle_by_name(&self, name: &str) -> FrameworkResult<Option<Bundle>> {
        let (_, core) = self.enter()?;
        let mut found: Vec<Bundle> = core.bundles.get_by_name(name).into_iter().collect();
        core.filter_bundles(self, &mut found);
        Ok(found.into_iter().next())
    }

    /// All installed bundles in ascending id order, subject to installed
    /// bundle hooks.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn bundles(&self) -> FrameworkResult<Vec<Bundle>> {
        let (_, core) = self.enter()?;
        let mut bundles = core.bundles.list();
        core.filter_bundles(self, &mut bundles);
        Ok(bundles)
    }

    /// Install a bundle with no activator.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated, or when the location cannot
    /// be canonicalized.
    pub fn install_bundle(&self, location: &str) -> FrameworkResult<Bundle> {
        let (_, core) = self.enter()?;
        core.bundles.install(&core, location, None)
    }

    /// Install a bundle together with its activator object.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated, or when the location cannot
    /// be canonicalized.
    pub fn install_bundle_with_activator(
        &self,
        location: &str,
        activator: Box<dyn BundleActivator>,
    ) -> FrameworkResult<Bundle> {
        let (_, core) = self.enter()?;
        core.bundles.install(&core, location, Some(activator))
    }

    /// Register a service owned by this context's bundle.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated, or when the interface map
    /// is empty.
    pub fn register_service(
        &self,
        service: InterfaceMap,
        properties: Properties,
    ) -> FrameworkResult<ServiceRegistration> {
        let (bundle, core) = self.enter()?;
        core.services
            .register(&core, bundle.id(), service, properties)
    }

    /// Every matching reference, best match first. An empty `class`
    /// matches all services; an absent filter matches everything.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated, or on filter syntax errors.
    pub fn get_service_references(
        &self,
        class: &str,
        filter: Option<&str>,
    ) -> FrameworkResult<Vec<ServiceReference>> {
        let (_, core) = self.enter()?;
        let filter = filter.map(Filter::parse).transpose()?;
        Ok(core.services.get_references(class, filter.as_ref()))
    }

    /// The single highest-ranked reference for `class`, if any.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn get_service_reference(&self, class: &str) -> FrameworkResult<Option<ServiceReference>> {
        let (_, core) = self.enter()?;
        Ok(core.services.get_reference(class))
    }

    /// Resolve a reference to its typed instance, incrementing this
    /// bundle's use count. Returns `None` when the registration was
    /// removed since the reference was obtained, or when the instance is
    /// not of type `T`.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn get_service<T: Any + Send + Sync>(
        &self,
        reference: &ServiceReference,
    ) -> FrameworkResult<Option<Arc<T>>> {
        let (bundle, core) = self.enter()?;
        let Some(object) = core.services.get(reference, bundle.id()) else {
            return Ok(None);
        };
        match object.downcast::<T>() {
            Ok(typed) => Ok(Some(typed)),
            Err(_) => {
                // A failed downcast leaves no use count behind.
                core.services.unget(reference, bundle.id());
                Ok(None)
            }
        }
    }

    /// Release one use of a service. Returns `false` when this bundle's
    /// use count was already zero; that case is a safe no-op.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn unget_service(&self, reference: &ServiceReference) -> FrameworkResult<bool> {
        let (bundle, core) = self.enter()?;
        Ok(core.services.unget(reference, bundle.id()))
    }

    /// Add a service listener with an optional pre-selection filter.
    /// Re-adding the identical listener replaces its filter.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated, or on filter syntax errors.
    pub fn add_service_listener(
        &self,
        listener: ServiceListener,
        filter: Option<&str>,
    ) -> FrameworkResult<()> {
        self.add_service_listener_with_data(listener, None, filter)
    }

    /// Add a service listener keyed with an opaque user-data token.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated, or on filter syntax errors.
    pub fn add_service_listener_with_data(
        &self,
        listener: ServiceListener,
        data: Option<u64>,
        filter: Option<&str>,
    ) -> FrameworkResult<()> {
        let (_, core) = self.enter()?;
        let filter = filter.map(Filter::parse).transpose()?;
        core.listeners
            .add_service_listener(self.key(), listener, data, filter);
        Ok(())
    }

    /// Remove a service listener. Removing an absent listener is a safe
    /// no-op.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn remove_service_listener(&self, listener: &ServiceListener) -> FrameworkResult<()> {
        self.remove_service_listener_with_data(listener, None)
    }

    /// Remove a service listener registered with a user-data token.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn remove_service_listener_with_data(
        &self,
        listener: &ServiceListener,
        data: Option<u64>,
    ) -> FrameworkResult<()> {
        let (_, core) = self.enter()?;
        core.listeners
            .remove_service_listener(self.key(), listener, data);
        Ok(())
    }

    /// Add a bundle listener. All bundle listeners receive every bundle
    /// event unconditionally.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn add_bundle_listener(&self, listener: BundleListener) -> FrameworkResult<()> {
        self.add_bundle_listener_with_data(listener, None)
    }

    /// Add a bundle listener keyed with an opaque user-data token.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn add_bundle_listener_with_data(
        &self,
        listener: BundleListener,
        data: Option<u64>,
    ) -> FrameworkResult<()> {
        let (_, core) = self.enter()?;
        core.listeners
            .add_bundle_listener(self.key(), listener, data);
        Ok(())
    }

    /// Remove a bundle listener. Removing an absent listener is a safe
    /// no-op.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn remove_bundle_listener(&self, listener: &BundleListener) -> FrameworkResult<()> {
        self.remove_bundle_listener_with_data(listener, None)
    }

    /// Remove a bundle listener registered with a user-data token.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn remove_bundle_listener_with_data(
        &self,
        listener: &BundleListener,
        data: Option<u64>,
    ) -> FrameworkResult<()> {
        let (_, core) = self.enter()?;
        core.listeners
            .remove_bundle_listener(self.key(), listener, data);
        Ok(())
    }

    /// Add a framework listener.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn add_framework_listener(&self, listener: FrameworkListener) -> FrameworkResult<()> {
        let (_, core) = self.enter()?;
        core.listeners
            .add_framework_listener(self.key(), listener, None);
        Ok(())
    }

    /// Remove a framework listener. Removing an absent listener is a safe
    /// no-op.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn remove_framework_listener(&self, listener: &FrameworkListener) -> FrameworkResult<()> {
        let (_, core) = self.enter()?;
        core.listeners
            .remove_framework_listener(self.key(), listener, None);
        Ok(())
    }

    /// The path `<storageRoot>/<bundleId>_<bundleName>/<filename>`, or
    /// `None` when no storage root is configured. The per-bundle prefix
    /// is cached and recomputed only when the configured root changes.
    ///
    /// # Errors
    ///
    /// Fails once the context is invalidated.
    pub fn data_file(&self, filename: &str) -> FrameworkResult<Option<PathBuf>> {
        let (bundle, core) = self.enter()?;
        Ok(bundle.data_file(&core, filename))
    }
}

impl std::fmt::Debug for BundleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleContext")
            .field("valid", &self.is_valid())
            .finish()
    }
}
