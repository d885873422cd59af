//! Prelude module - commonly used types for convenient import.
//!
//! Use `use nucleus_framework::prelude::*;` to import all essential types.

// Framework and bundles
pub use crate::{Bundle, BundleActivator, BundleContext, BundleState, Framework, FrameworkConfig};

// Services
pub use crate::{InterfaceMap, ServiceReference, ServiceRegistration, ServiceTracker};

// Events and listeners
pub use crate::{
    BundleEvent, BundleEventKind, BundleListener, FrameworkEvent, FrameworkEventKind,
    FrameworkListener, ServiceEvent, ServiceEventKind, ServiceListener,
};

// Shared foundation types
pub use nucleus_core::prelude::*;
pub use nucleus_filter::Filter;
