//! Shared event-recording harness for integration tests.

use std::sync::{Arc, Mutex};

use nucleus_core::BundleId;
use nucleus_framework::{
    BundleContext, BundleEventKind, FrameworkEventKind, ServiceEventKind,
};

/// One recorded event, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Recorded {
    /// A bundle event, tagged with the affected bundle's id.
    Bundle(BundleId, BundleEventKind),
    /// A framework event.
    Framework(FrameworkEventKind),
    /// A service event, tagged with the first interface name.
    Service(String, ServiceEventKind),
}

/// Records every bundle, framework and service event it observes, in the
/// order delivery happened. The listeners it registers stay owned by the
/// context passed to [`attach`](Self::attach).
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Recorded>>>,
}

#[allow(dead_code)]
impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register all three listener kinds on `ctx`.
    pub fn attach(&self, ctx: &BundleContext) {
        let sink = Arc::clone(&self.events);
        ctx.add_bundle_listener(Arc::new(move |event| {
            sink.lock()
                .unwrap()
                .push(Recorded::Bundle(event.bundle().id(), event.kind()));
        }))
        .unwrap();

        let sink = Arc::clone(&self.events);
        ctx.add_framework_listener(Arc::new(move |event| {
            sink.lock().unwrap().push(Recorded::Framework(event.kind()));
        }))
        .unwrap();

        let sink = Arc::clone(&self.events);
        ctx.add_service_listener(
            Arc::new(move |event| {
                sink.lock().unwrap().push(Recorded::Service(
                    event.reference().interface().to_string(),
                    event.kind(),
                ));
            }),
            None,
        )
        .unwrap();
    }

    /// Everything recorded so far, oldest first.
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Assert the recorded sequence matches `expected` exactly.
    pub fn assert_order(&self, expected: &[Recorded]) {
        assert_eq!(self.events(), expected);
    }
}
