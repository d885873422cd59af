//! The table of installed bundles.

use crate::bundle::context::BundleContext;
use crate::bundle::{Bundle, BundleActivator};
use crate::core_context::CoreContext;
use crate::events::{BundleEvent, BundleEventKind};
use crate::sync;
use nucleus_core::{BundleId, FrameworkResult, bundle_location, bundle_name_from_location};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Visibility extension point for bundle lookups.
///
/// Hooks run over the result of every lookup made through a
/// [`BundleContext`] and may remove bundles from it, hiding them from
/// that caller. No hook is installed by default.
pub trait BundleHook: Send + Sync {
    /// Filter a lookup result in place on behalf of `ctx`.
    fn filter_bundles(&self, ctx: &BundleContext, bundles: &mut Vec<Bundle>);
}

/// Owns the table of installed bundles, keyed by id.
///
/// Ids ascend in installation order and are never reused; iteration order
/// of [`list`](Self::list) is ascending id order.
pub(crate) struct BundleRegistry {
    bundles: RwLock<BTreeMap<BundleId, Bundle>>,
    next_id: AtomicU64,
}

impl BundleRegistry {
    pub(crate) fn new() -> Self {
        Self {
            bundles: RwLock::new(BTreeMap::new()),
            // Id 0 is reserved for the system bundle.
            next_id: AtomicU64::new(1),
        }
    }

    /// Register the system bundle under id 0.
    pub(crate) fn insert_system(&self, bundle: Bundle) {
        sync::write(&self.bundles).insert(BundleId::SYSTEM, bundle);
    }

    /// Install a bundle from a location string, delivering the INSTALLED
    /// event before returning.
    pub(crate) fn install(
        &self,
        core: &Arc<CoreContext>,
        location: &str,
        activator: Option<Box<dyn BundleActivator>>,
    ) -> FrameworkResult<Bundle> {
        let name = bundle_name_from_location(location)?;
        let canonical = bundle_location(location)?;
        let id = BundleId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let bundle = Bundle::new(id, name, canonical, Arc::downgrade(core), activator);
        sync::write(&self.bundles).insert(id, bundle.clone());

        debug!(bundle = %id, name = %bundle.name(), "bundle installed");
        core.log
            .log(format_args!("installed bundle {} as {id}", bundle.name()));
        core.listeners
            .bundle_changed(&BundleEvent::new(BundleEventKind::Installed, bundle.clone()));
        Ok(bundle)
    }

    pub(crate) fn remove(&self, id: BundleId) {
        sync::write(&self.bundles).remove(&id);
    }

    pub(crate) fn get(&self, id: BundleId) -> Option<Bundle> {
        sync::read(&self.bundles).get(&id).cloned()
    }

    /// The lowest-id bundle with the given symbolic name.
    pub(crate) fn get_by_name(&self, name: &str) -> Option<Bundle> {
        sync::read(&self.bundles)
            .values()
            .find(|bundle| bundle.name() == name)
            .cloned()
    }

    pub(crate) fn list(&self) -> Vec<Bundle> {
        sync::read(&self.bundles).values().cloned().collect()
    }
}
