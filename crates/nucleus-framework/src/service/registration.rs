//! Owner-side service registration handles.

use crate::core_context::CoreContext;
use crate::events::{ServiceEvent, ServiceEventKind};
use crate::service::entry::ServiceEntry;
use crate::service::reference::ServiceReference;
use nucleus_core::{
    FrameworkError, FrameworkResult, OBJECT_CLASS, Properties, SERVICE_ID, ServiceId,
};
use serde_json::json;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// The token returned to the registering bundle.
///
/// Exactly one registration exists per registered service instance; it is
/// the sole handle able to update properties or unregister.
pub struct ServiceRegistration {
    entry: Arc<ServiceEntry>,
    core: Weak<CoreContext>,
}

impl ServiceRegistration {
    pub(crate) fn new(entry: Arc<ServiceEntry>, core: Weak<CoreContext>) -> Self {
        Self { entry, core }
    }

    /// The registered service's id.
    #[must_use]
    pub fn service_id(&self) -> ServiceId {
        self.entry.id
    }

    /// A reference to this registration, obtained under its first declared
    /// interface.
    #[must_use]
    pub fn reference(&self) -> ServiceReference {
        let interface = self
            .entry
            .interfaces
            .first()
            .cloned()
            .unwrap_or_default();
        ServiceReference::new(Arc::clone(&self.entry), interface)
    }

    /// Atomically replace the service's property map, then deliver a
    /// MODIFIED event.
    ///
    /// The implicit `service.id` and `objectclass` properties are
    /// preserved regardless of the supplied map.
    ///
    /// # Errors
    ///
    /// Fails with an invalid-state error once the service is
    /// unregistered, or when the owning framework is gone.
    pub fn set_properties(&self, properties: Properties) -> FrameworkResult<()> {
        let core = self.core()?;
        if !self.entry.is_available() {
            return Err(FrameworkError::InvalidState(format!(
                "service {} is unregistered",
                self.entry.id
            )));
        }

        let mut properties = properties;
        properties.insert(SERVICE_ID.to_string(), json!(self.entry.id.0));
        properties.insert(OBJECT_CLASS.to_string(), json!(self.entry.interfaces));
        self.entry.replace_properties(properties);

        debug!(service_id = %self.entry.id, "service properties replaced");
        core.listeners.service_changed(&ServiceEvent::new(
            ServiceEventKind::Modified,
            self.reference(),
        ));
        Ok(())
    }

    /// Remove the service from the registry.
    ///
    /// The UNREGISTERING event is delivered *before* removal, so listeners
    /// and trackers can still resolve the service while reacting. A second
    /// call fails.
    ///
    /// # Errors
    ///
    /// Fails with an invalid-state error when already unregistered or
    /// when the owning framework is gone.
    pub fn unregister(&self) -> FrameworkResult<()> {
        let core = self.core()?;
        if !self.entry.begin_unregister() {
            return Err(FrameworkError::InvalidState(format!(
                "service {} is already unregistered",
                self.entry.id
            )));
        }
        core.services.remove(&core, &self.entry);
        Ok(())
    }

    fn core(&self) -> FrameworkResult<Arc<CoreContext>> {
        self.core.upgrade().ok_or_else(|| {
            FrameworkError::InvalidState("the owning framework no longer exists".to_string())
        })
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("service_id", &self.entry.id)
            .field("interfaces", &self.entry.interfaces)
            .finish()
    }
}
