//! Event value types.
//!
//! Events are immutable values constructed and delivered within a single
//! call; no component owns them beyond that call. Ordering is delivery
//! order.

use crate::bundle::Bundle;
use crate::service::ServiceReference;
use std::fmt;

/// Kinds of bundle lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleEventKind {
    /// The bundle was installed.
    Installed,
    /// The bundle is about to invoke its activator's start hook.
    Starting,
    /// The bundle became active.
    Started,
    /// The bundle is about to invoke its activator's stop hook.
    Stopping,
    /// The bundle stopped.
    Stopped,
    /// The bundle was uninstalled.
    Uninstalled,
}

/// A change in a bundle's lifecycle.
#[derive(Debug, Clone)]
pub struct BundleEvent {
    kind: BundleEventKind,
    bundle: Bundle,
}

impl BundleEvent {
    pub(crate) fn new(kind: BundleEventKind, bundle: Bundle) -> Self {
        Self { kind, bundle }
    }

    /// What happened.
    #[must_use]
    pub fn kind(&self) -> BundleEventKind {
        self.kind
    }

    /// The affected bundle.
    #[must_use]
    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }
}

/// Kinds of service events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
    /// The service was registered.
    Registered,
    /// The service's properties were replaced.
    Modified,
    /// The service is about to be removed from the registry. It is still
    /// resolvable while this event is dispatched.
    Unregistering,
}

/// A change to a registered service.
#[derive(Debug, Clone)]
pub struct ServiceEvent {
    kind: ServiceEventKind,
    reference: ServiceReference,
}

impl ServiceEvent {
    pub(crate) fn new(kind: ServiceEventKind, reference: ServiceReference) -> Self {
        Self { kind, reference }
    }

    /// What happened.
    #[must_use]
    pub fn kind(&self) -> ServiceEventKind {
        self.kind
    }

    /// A reference to the affected service.
    #[must_use]
    pub fn reference(&self) -> &ServiceReference {
        &self.reference
    }
}

/// Kinds of framework-level events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameworkEventKind {
    /// The framework began starting.
    Starting,
    /// The framework finished starting.
    Started,
    /// The framework began stopping.
    Stopping,
    /// The framework finished stopping.
    Stopped,
}

/// A framework lifecycle event.
#[derive(Debug, Clone)]
pub struct FrameworkEvent {
    kind: FrameworkEventKind,
    bundle: Bundle,
    message: String,
}

impl FrameworkEvent {
    pub(crate) fn new(kind: FrameworkEventKind, bundle: Bundle, message: impl Into<String>) -> Self {
        Self {
            kind,
            bundle,
            message: message.into(),
        }
    }

    /// What happened.
    #[must_use]
    pub fn kind(&self) -> FrameworkEventKind {
        self.kind
    }

    /// The system bundle the event concerns.
    #[must_use]
    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BundleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BundleEventKind::Installed => "installed",
            BundleEventKind::Starting => "starting",
            BundleEventKind::Started => "started",
            BundleEventKind::Stopping => "stopping",
            BundleEventKind::Stopped => "stopped",
            BundleEventKind::Uninstalled => "uninstalled",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for ServiceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceEventKind::Registered => "registered",
            ServiceEventKind::Modified => "modified",
            ServiceEventKind::Unregistering => "unregistering",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for FrameworkEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameworkEventKind::Starting => "starting",
            FrameworkEventKind::Started => "started",
            FrameworkEventKind::Stopping => "stopping",
            FrameworkEventKind::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}
