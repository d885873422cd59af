//! Registry-internal service entries.

use crate::service::ServiceObject;
use crate::sync;
use nucleus_core::{BundleId, Properties, ServiceId, ranking_of};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

/// One registered service.
///
/// The property map is mutable only through the owning registration and is
/// replaced whole on update; every reader sees a consistent snapshot.
/// Use counts are tracked per consuming bundle.
pub(crate) struct ServiceEntry {
    pub(crate) id: ServiceId,
    pub(crate) owner: BundleId,
    pub(crate) interfaces: Vec<String>,
    pub(crate) instances: HashMap<String, ServiceObject>,
    props: RwLock<Properties>,
    /// False once the UNREGISTERING event has been delivered; gates
    /// queries and `get_service`.
    available: AtomicBool,
    /// Set by the first `unregister` call; the second call fails.
    unregistering: AtomicBool,
    use_counts: Mutex<HashMap<BundleId, u64>>,
}

impl ServiceEntry {
    pub(crate) fn new(
        id: ServiceId,
        owner: BundleId,
        interfaces: Vec<String>,
        instances: HashMap<String, ServiceObject>,
        props: Properties,
    ) -> Self {
        Self {
            id,
            owner,
            interfaces,
            instances,
            props: RwLock::new(props),
            available: AtomicBool::new(true),
            unregistering: AtomicBool::new(false),
            use_counts: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn properties(&self) -> Properties {
        sync::read(&self.props).clone()
    }

    pub(crate) fn replace_properties(&self, props: Properties) {
        *sync::write(&self.props) = props;
    }

    pub(crate) fn ranking(&self) -> i64 {
        ranking_of(&sync::read(&self.props))
    }

    pub(crate) fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub(crate) fn mark_unavailable(&self) {
        self.available.store(false, Ordering::Release);
    }

    /// Claim the right to unregister. Only the first claim succeeds.
    pub(crate) fn begin_unregister(&self) -> bool {
        !self.unregistering.swap(true, Ordering::AcqRel)
    }

    /// Increment the consumer's use count, returning the new count.
    pub(crate) fn acquire(&self, consumer: BundleId) -> u64 {
        let mut counts = sync::lock(&self.use_counts);
        let count = counts.entry(consumer).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Decrement the consumer's use count. Returns false when the count
    /// was already zero; that case is a safe no-op.
    pub(crate) fn release(&self, consumer: BundleId) -> bool {
        let mut counts = sync::lock(&self.use_counts);
        match counts.get_mut(&consumer) {
            Some(count) if *count > 0 => {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    counts.remove(&consumer);
                }
                true
            }
            _ => false,
        }
    }
}
