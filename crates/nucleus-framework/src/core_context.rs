//! The per-framework core context.

use crate::bundle::registry::{BundleHook, BundleRegistry};
use crate::config::{self, DiagnosticLog};
use crate::listeners::ListenerHub;
use crate::service::registry::ServiceRegistry;
use crate::sync;
use nucleus_core::{Properties, Value};
use std::sync::{Arc, RwLock};

/// Shared state owned by exactly one [`Framework`](crate::Framework)
/// instance.
///
/// The bundle registry, service registry and listener tables live here and
/// are reached from every bundle context through a weak handle. Two
/// framework instances in one process share nothing.
pub(crate) struct CoreContext {
    pub(crate) config: RwLock<Properties>,
    pub(crate) log: DiagnosticLog,
    pub(crate) services: ServiceRegistry,
    pub(crate) bundles: BundleRegistry,
    pub(crate) listeners: ListenerHub,
    pub(crate) hooks: RwLock<Vec<Arc<dyn BundleHook>>>,
}

impl CoreContext {
    pub(crate) fn new(config: Properties, log: DiagnosticLog) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            log,
            services: ServiceRegistry::new(),
            bundles: BundleRegistry::new(),
            listeners: ListenerHub::new(),
            hooks: RwLock::new(Vec::new()),
        })
    }

    /// Read one framework property.
    pub(crate) fn property(&self, key: &str) -> Option<Value> {
        sync::read(&self.config).get(key).cloned()
    }

    /// The configured storage root, or `None` when storage is unset or
    /// empty.
    pub(crate) fn storage_root(&self) -> Option<String> {
        let root = self
            .property(config::PROP_STORAGE_LOCATION)?
            .as_str()?
            .to_string();
        if root.is_empty() { None } else { Some(root) }
    }

    /// Run every registered bundle hook over a lookup result.
    pub(crate) fn filter_bundles(
        &self,
        ctx: &crate::bundle::context::BundleContext,
        bundles: &mut Vec<crate::bundle::Bundle>,
    ) {
        for hook in sync::read(&self.hooks).iter() {
            hook.filter_bundles(ctx, bundles);
        }
    }
}
