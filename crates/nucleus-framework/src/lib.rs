//! Nucleus Framework - an in-process, OSGi-style modular runtime.
//!
//! This crate provides:
//! - The bundle lifecycle state machine and bundle registry
//! - A concurrent, reference-counted service registry
//! - Synchronous bundle/service/framework event dispatch
//! - Per-bundle capability contexts
//! - A generic service tracker utility
//!
//! # Architecture
//!
//! A [`Framework`] owns one core context holding the bundle registry, the
//! service registry and the listener tables. Registries are per-framework
//! state, never process-wide globals: independent frameworks in one
//! process share nothing. Bundles reach the shared registries through
//! their [`BundleContext`], which is invalidated the moment its bundle
//! stops or uninstalls.
//!
//! Event delivery is synchronous and runs on the thread that triggered
//! the event: registering a service, for example, invokes every matching
//! service listener before `register_service` returns.
//!
//! # Example
//!
//! ```rust
//! use nucleus_framework::{Framework, FrameworkConfig, InterfaceMap};
//! use nucleus_core::Properties;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! let framework = Framework::new(FrameworkConfig::new());
//! framework.start().unwrap();
//!
//! let ctx = framework.context();
//! let registration = ctx
//!     .register_service(
//!         InterfaceMap::single("echo", Arc::new(Echo)),
//!         Properties::new(),
//!     )
//!     .unwrap();
//!
//! let reference = ctx.get_service_reference("echo").unwrap().unwrap();
//! let echo: Arc<Echo> = ctx.get_service(&reference).unwrap().unwrap();
//! # let _ = echo;
//! registration.unregister().unwrap();
//! framework.stop().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bundle;
mod config;
mod core_context;
mod events;
mod framework;
mod listeners;
mod service;
mod sync;
mod tracker;

pub use bundle::{Bundle, BundleActivator, BundleState};
pub use bundle::context::BundleContext;
pub use bundle::registry::BundleHook;
pub use config::{FrameworkConfig, PROP_LOG, PROP_STORAGE_LOCATION, PROP_THREADING_SUPPORT};
pub use events::{
    BundleEvent, BundleEventKind, FrameworkEvent, FrameworkEventKind, ServiceEvent,
    ServiceEventKind,
};
pub use framework::Framework;
pub use listeners::{BundleListener, FrameworkListener, ServiceListener};
pub use service::{InterfaceMap, ServiceReference, ServiceRegistration};
pub use tracker::{ServiceTracker, TrackerCustomizer};

// Re-exported so downstream crates get the whole public surface from one
// place.
pub use nucleus_core::{
    BundleId, FrameworkError, FrameworkResult, Properties, ServiceId, Value,
};
pub use nucleus_filter::{Filter, FilterError};
