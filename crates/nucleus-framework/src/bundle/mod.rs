//! Bundles and their lifecycle state machine.

pub(crate) mod context;
pub(crate) mod registry;

use crate::core_context::CoreContext;
use crate::events::{BundleEvent, BundleEventKind};
use crate::sync;
use context::BundleContext;
use nucleus_core::{BundleId, FrameworkError, FrameworkResult};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::{debug, warn};

/// The lifecycle hooks every installable bundle exposes.
///
/// `start` and `stop` are invoked exactly once per corresponding
/// lifecycle transition. A failure aborts that transition and propagates
/// to the caller of [`Bundle::start`] / [`Bundle::stop`] instead of being
/// swallowed.
pub trait BundleActivator: Send {
    /// Called while the bundle moves from STARTING to ACTIVE.
    fn start(&mut self, ctx: &BundleContext) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Called while the bundle moves from STOPPING to STOPPED.
    fn stop(&mut self, ctx: &BundleContext) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Lifecycle states of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleState {
    /// Installed but never started (or not yet started).
    Installed,
    /// The activator's start hook is running.
    Starting,
    /// Started.
    Active,
    /// The activator's stop hook is running.
    Stopping,
    /// Stopped after having been active, or returned here by a failed
    /// start.
    Stopped,
    /// Removed from the registry. Terminal.
    Uninstalled,
}

pub(crate) struct StorageCache {
    base: String,
    prefix: Option<PathBuf>,
}

pub(crate) struct BundleInner {
    pub(crate) id: BundleId,
    pub(crate) name: String,
    pub(crate) location: String,
    pub(crate) core: Weak<CoreContext>,
    pub(crate) state: RwLock<BundleState>,
    activator: Mutex<Option<Box<dyn BundleActivator>>>,
    pub(crate) context: BundleContext,
    pub(crate) storage: Mutex<StorageCache>,
}

/// An installable, independently startable and stoppable unit of code.
///
/// `Bundle` is a cheap-clone handle; all clones observe the same
/// lifecycle state. A bundle is destroyed only on uninstall, and the
/// system bundle (id 0) can never be uninstalled.
#[derive(Clone)]
pub struct Bundle {
    pub(crate) inner: Arc<BundleInner>,
}

impl Bundle {
    pub(crate) fn new(
        id: BundleId,
        name: String,
        location: String,
        core: Weak<CoreContext>,
        activator: Option<Box<dyn BundleActivator>>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<BundleInner>| BundleInner {
            id,
            name,
            location,
            core,
            state: RwLock::new(BundleState::Installed),
            activator: Mutex::new(activator),
            context: BundleContext::new(weak.clone()),
            storage: Mutex::new(StorageCache {
                base: String::new(),
                prefix: None,
            }),
        });
        Self { inner }
    }

    /// The bundle's id. Id 0 is the system bundle.
    #[must_use]
    pub fn id(&self) -> BundleId {
        self.inner.id
    }

    /// The bundle's symbolic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The canonical location the bundle was installed from.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.inner.location
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BundleState {
        *sync::read(&self.inner.state)
    }

    /// Whether the bundle is in the ACTIVE state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == BundleState::Active
    }

    /// This bundle's context. Operations through it fail once the bundle
    /// stops or uninstalls.
    #[must_use]
    pub fn context(&self) -> BundleContext {
        self.inner.context.clone()
    }

    /// Start the bundle.
    ///
    /// No-op when already active. Otherwise the bundle moves through
    /// STARTING (event delivered), runs its activator's start hook, and
    /// reaches ACTIVE (event delivered). When the hook fails the bundle
    /// is returned to STOPPED and the failure is surfaced to the caller.
    ///
    /// # Errors
    ///
    /// Fails on an uninstalled bundle, a concurrent transition, or an
    /// activator failure.
    pub fn start(&self) -> FrameworkResult<()> {
        let core = self.core()?;
        {
            let mut state = sync::write(&self.inner.state);
            match *state {
                BundleState::Active => return Ok(()),
                BundleState::Uninstalled => {
                    return Err(FrameworkError::InvalidState(format!(
                        "bundle {} is uninstalled",
                        self.inner.name
                    )));
                }
                BundleState::Starting | BundleState::Stopping => {
                    return Err(FrameworkError::InvalidState(format!(
                        "bundle {} is already in a lifecycle transition",
                        self.inner.name
                    )));
                }
                BundleState::Installed | BundleState::Stopped => {
                    *state = BundleState::Starting;
                }
            }
        }
        debug!(bundle = %self.inner.id, name = %self.inner.name, "starting bundle");
        core.log
            .log(format_args!("starting bundle {}", self.inner.name));

        self.inner
            .context
            .revalidate(Arc::downgrade(&self.inner));
        self.emit(&core, BundleEventKind::Starting);

        if let Err(source) = self.run_activator(ActivatorHook::Start) {
            *sync::write(&self.inner.state) = BundleState::Stopped;
            return Err(FrameworkError::ActivatorFailed {
                operation: "start".to_string(),
                bundle: self.inner.name.clone(),
                source,
            });
        }

        *sync::write(&self.inner.state) = BundleState::Active;
        self.emit(&core, BundleEventKind::Started);
        Ok(())
    }

    /// Stop the bundle.
    ///
    /// No-op when not active. Otherwise STOPPING is delivered, the
    /// activator's stop hook runs, the bundle's context is invalidated
    /// (with its listeners and registered services removed), and the
    /// bundle reaches STOPPED (event delivered). A failing stop hook
    /// still invalidates the context and completes the transition; the
    /// state machine favors forward progress over rollback.
    ///
    /// # Errors
    ///
    /// Fails when the activator's stop hook failed, after the transition
    /// has completed.
    pub fn stop(&self) -> FrameworkResult<()> {
        let core = self.core()?;
        {
            let mut state = sync::write(&self.inner.state);
            if *state != BundleState::Active {
                return Ok(());
            }
            *state = BundleState::Stopping;
        }
        debug!(bundle = %self.inner.id, name = %self.inner.name, "stopping bundle");
        core.log
            .log(format_args!("stopping bundle {}", self.inner.name));

        self.emit(&core, BundleEventKind::Stopping);
        let hook_result = self.run_activator(ActivatorHook::Stop);

        core.services.unregister_owned(&core, self.inner.id);
        core.listeners.remove_context(self.inner.context.key());
        self.inner.context.invalidate();
        *sync::write(&self.inner.state) = BundleState::Stopped;
        self.emit(&core, BundleEventKind::Stopped);

        hook_result.map_err(|source| FrameworkError::ActivatorFailed {
            operation: "stop".to_string(),
            bundle: self.inner.name.clone(),
            source,
        })
    }

    /// Uninstall the bundle, stopping it first when active.
    ///
    /// # Errors
    ///
    /// Always fails for the system bundle with an illegal-operation
    /// error; fails on an already-uninstalled bundle.
    pub fn uninstall(&self) -> FrameworkResult<()> {
        if self.inner.id.is_system() {
            return Err(FrameworkError::IllegalOperation(
                "cannot uninstall a system bundle".to_string(),
            ));
        }
        let core = self.core()?;
        if self.state() == BundleState::Uninstalled {
            return Err(FrameworkError::InvalidState(format!(
                "bundle {} is already uninstalled",
                self.inner.name
            )));
        }
        if self.is_active()
            && let Err(err) = self.stop()
        {
            warn!(bundle = %self.inner.id, error = %err, "stop failed during uninstall");
        }

        core.bundles.remove(self.inner.id);
        core.listeners.remove_context(self.inner.context.key());
        self.inner.context.invalidate();
        *sync::write(&self.inner.state) = BundleState::Uninstalled;
        debug!(bundle = %self.inner.id, name = %self.inner.name, "bundle uninstalled");
        self.emit(&core, BundleEventKind::Uninstalled);
        Ok(())
    }

    /// Compute the per-bundle data file prefix, reusing the cached value
    /// until the configured storage root changes.
    pub(crate) fn data_file(&self, core: &CoreContext, filename: &str) -> Option<PathBuf> {
        let base = core.storage_root()?;
        let mut cache = sync::lock(&self.inner.storage);
        if cache.base != base || cache.prefix.is_none() {
            let prefix =
                PathBuf::from(&base).join(format!("{}_{}", self.inner.id, self.inner.name));
            cache.base = base;
            cache.prefix = Some(prefix);
        }
        cache.prefix.as_ref().map(|prefix| prefix.join(filename))
    }

    fn run_activator(&self, hook: ActivatorHook) -> Result<(), Box<dyn Error + Send + Sync>> {
        // Taken out of the slot for the duration of the call so the hook
        // can re-enter the framework without holding the activator lock.
        let activator = sync::lock(&self.inner.activator).take();
        let Some(mut activator) = activator else {
            return Ok(());
        };
        let result = match hook {
            ActivatorHook::Start => activator.start(&self.inner.context),
            ActivatorHook::Stop => activator.stop(&self.inner.context),
        };
        *sync::lock(&self.inner.activator) = Some(activator);
        result
    }

    fn emit(&self, core: &CoreContext, kind: BundleEventKind) {
        core.listeners
            .bundle_changed(&BundleEvent::new(kind, self.clone()));
    }

    fn core(&self) -> FrameworkResult<Arc<CoreContext>> {
        self.inner.core.upgrade().ok_or_else(|| {
            FrameworkError::InvalidState("the owning framework no longer exists".to_string())
        })
    }
}

enum ActivatorHook {
    Start,
    Stop,
}

impl PartialEq for Bundle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Bundle {}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}
