//! The framework: the distinguished system bundle.

use crate::bundle::context::BundleContext;
use crate::bundle::registry::BundleHook;
use crate::bundle::{Bundle, BundleActivator, BundleState};
use crate::config::{self, DiagnosticLog, FrameworkConfig};
use crate::core_context::CoreContext;
use crate::events::{FrameworkEvent, FrameworkEventKind};
use crate::sync;
use nucleus_core::{BundleId, FrameworkError, FrameworkResult, Value};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, warn};

/// Symbolic name of the system bundle.
const SYSTEM_BUNDLE_NAME: &str = "system_bundle";

/// Location reported for the system bundle (OSGi Core R6 §4.6).
const SYSTEM_BUNDLE_LOCATION: &str = "System Bundle";

/// The system bundle: the framework itself.
///
/// Each instance owns its registries outright; two frameworks in one
/// process share no state. Dropping a framework stops it.
pub struct Framework {
    core: Arc<CoreContext>,
    bundle: Bundle,
}

impl Framework {
    /// Configured storage location for per-bundle data files.
    pub const PROP_STORAGE_LOCATION: &'static str = config::PROP_STORAGE_LOCATION;

    /// Read-only threading capability indicator.
    pub const PROP_THREADING_SUPPORT: &'static str = config::PROP_THREADING_SUPPORT;

    /// Diagnostic log toggle.
    pub const PROP_LOG: &'static str = config::PROP_LOG;

    /// Create a framework with the default diagnostic log sink (stderr).
    #[must_use]
    pub fn new(configuration: FrameworkConfig) -> Self {
        Self::build(configuration, None)
    }

    /// Create a framework redirecting its diagnostic log to `sink`.
    #[must_use]
    pub fn with_log_sink(configuration: FrameworkConfig, sink: Box<dyn Write + Send>) -> Self {
        Self::build(configuration, Some(sink))
    }

    fn build(configuration: FrameworkConfig, sink: Option<Box<dyn Write + Send>>) -> Self {
        let props = config::init_default_properties(configuration.into_props());
        let log_enabled = props
            .get(config::PROP_LOG)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let core = CoreContext::new(props, DiagnosticLog::new(log_enabled, sink));

        let bundle = Bundle::new(
            BundleId::SYSTEM,
            SYSTEM_BUNDLE_NAME.to_string(),
            SYSTEM_BUNDLE_LOCATION.to_string(),
            Arc::downgrade(&core),
            None,
        );
        core.bundles.insert_system(bundle.clone());
        debug!(threading = config::threading_support(), "framework created");
        Self { core, bundle }
    }

    /// The system bundle handle.
    #[must_use]
    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    /// The system bundle's context.
    #[must_use]
    pub fn context(&self) -> BundleContext {
        self.bundle.context()
    }

    /// The system bundle's id, always 0.
    #[must_use]
    pub fn id(&self) -> BundleId {
        self.bundle.id()
    }

    /// The system bundle's symbolic name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.bundle.name()
    }

    /// Always the string `"System Bundle"`.
    #[must_use]
    pub fn location(&self) -> &str {
        self.bundle.location()
    }

    /// Current lifecycle state of the system bundle.
    #[must_use]
    pub fn state(&self) -> BundleState {
        self.bundle.state()
    }

    /// Whether the framework is started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.bundle.is_active()
    }

    /// Whether this build carries multi-threading support. Fixed at
    /// build time; configuration cannot change it.
    #[must_use]
    pub fn is_multithreaded() -> bool {
        cfg!(feature = "threading")
    }

    /// Read one framework property, including unknown configuration keys
    /// preserved verbatim.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<Value> {
        self.core.property(key)
    }

    /// Set a framework property.
    ///
    /// The threading property is read-only; attempts to change it are
    /// discarded.
    pub fn set_property(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if key == config::PROP_THREADING_SUPPORT {
            return;
        }
        sync::write(&self.core.config).insert(key, value);
    }

    /// Install a visibility hook applied to bundle lookups.
    pub fn add_bundle_hook(&self, hook: Arc<dyn BundleHook>) {
        sync::write(&self.core.hooks).push(hook);
    }

    /// Start the framework.
    ///
    /// Delivers the framework STARTING event, moves the system bundle to
    /// ACTIVE (with its own STARTING/STARTED bundle events), then
    /// delivers framework STARTED.
    ///
    /// # Errors
    ///
    /// Propagates system bundle transition failures.
    pub fn start(&self) -> FrameworkResult<()> {
        if self.is_started() {
            return Ok(());
        }
        self.core.log.log(format_args!("starting framework"));
        self.emit(FrameworkEventKind::Starting, "starting framework");
        self.bundle.start()?;
        self.emit(FrameworkEventKind::Started, "framework started");
        Ok(())
    }

    /// Stop the framework and every other installed bundle.
    ///
    /// Event order: framework STOPPING first; then every bundle with
    /// id > 0 is stopped in the order reported by bundle listing, each
    /// delivering its own STOPPING/STOPPED pair; then the system bundle's
    /// own STOPPING/STOPPED pair; framework STOPPED last. A bundle whose
    /// stop hook fails is logged and does not block the rest.
    ///
    /// # Errors
    ///
    /// Propagates system bundle transition failures.
    pub fn stop(&self) -> FrameworkResult<()> {
        if !self.is_started() {
            return Ok(());
        }
        self.core.log.log(format_args!("stopping framework"));
        self.emit(FrameworkEventKind::Stopping, "stopping framework");

        for bundle in self.core.bundles.list() {
            if bundle.id().is_system() {
                continue;
            }
            if let Err(err) = bundle.stop() {
                warn!(bundle = %bundle.id(), error = %err, "bundle failed to stop");
            }
        }

        self.bundle.stop()?;
        self.emit(FrameworkEventKind::Stopped, "framework stopped");
        Ok(())
    }

    /// Uninstalling the system bundle is never permitted.
    ///
    /// # Errors
    ///
    /// Always fails with an illegal-operation error, regardless of
    /// framework state.
    pub fn uninstall(&self) -> FrameworkResult<()> {
        Err(FrameworkError::IllegalOperation(
            "cannot uninstall a system bundle".to_string(),
        ))
    }

    /// Install a bundle with no activator.
    ///
    /// # Errors
    ///
    /// Fails when the location cannot be canonicalized.
    pub fn install_bundle(&self, location: &str) -> FrameworkResult<Bundle> {
        self.core.bundles.install(&self.core, location, None)
    }

    /// Install a bundle together with its activator object.
    ///
    /// # Errors
    ///
    /// Fails when the location cannot be canonicalized.
    pub fn install_bundle_with_activator(
        &self,
        location: &str,
        activator: Box<dyn BundleActivator>,
    ) -> FrameworkResult<Bundle> {
        self.core
            .bundles
            .install(&self.core, location, Some(activator))
    }

    fn emit(&self, kind: FrameworkEventKind, message: &str) {
        self.core
            .listeners
            .framework_event(&FrameworkEvent::new(kind, self.bundle.clone(), message));
    }
}

impl Drop for Framework {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "framework stop failed during drop");
        }
    }
}

impl std::fmt::Debug for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framework")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_bundle_identity() {
        let framework = Framework::new(FrameworkConfig::new());
        assert_eq!(framework.id(), BundleId::SYSTEM);
        assert_eq!(framework.name(), "system_bundle");
        assert_eq!(framework.location(), "System Bundle");
        assert_eq!(framework.state(), BundleState::Installed);

        framework.start().unwrap();
        assert!(framework.is_started());
        // Starting twice is a no-op.
        framework.start().unwrap();

        framework.stop().unwrap();
        assert_eq!(framework.state(), BundleState::Stopped);
        framework.stop().unwrap();
    }

    #[test]
    fn test_default_properties() {
        let framework = Framework::new(FrameworkConfig::new());

        let storage = framework
            .property(Framework::PROP_STORAGE_LOCATION)
            .unwrap();
        assert_eq!(
            storage.as_str().unwrap(),
            std::env::current_dir().unwrap().display().to_string()
        );
        assert_eq!(
            framework.property(Framework::PROP_LOG).unwrap(),
            json!(false)
        );

        let expected = if Framework::is_multithreaded() {
            "multi"
        } else {
            "single"
        };
        assert_eq!(
            framework
                .property(Framework::PROP_THREADING_SUPPORT)
                .unwrap(),
            json!(expected)
        );
    }

    #[test]
    fn test_configuration_overrides_and_unknown_keys() {
        let config = FrameworkConfig::new()
            .with(Framework::PROP_STORAGE_LOCATION, json!("/tmp/store"))
            .with(Framework::PROP_LOG, json!(true))
            .with("org.example.custom", json!(42));
        let framework = Framework::new(config);

        assert_eq!(
            framework.property(Framework::PROP_STORAGE_LOCATION).unwrap(),
            json!("/tmp/store")
        );
        assert_eq!(framework.property(Framework::PROP_LOG).unwrap(), json!(true));
        // Unknown keys pass through verbatim.
        assert_eq!(
            framework.property("org.example.custom").unwrap(),
            json!(42)
        );
        assert!(framework.property("org.example.absent").is_none());
    }

    #[test]
    fn test_threading_property_is_read_only() {
        let config =
            FrameworkConfig::new().with(Framework::PROP_THREADING_SUPPORT, json!("bogus"));
        let framework = Framework::new(config);

        let expected = if Framework::is_multithreaded() {
            json!("multi")
        } else {
            json!("single")
        };
        assert_eq!(
            framework.property(Framework::PROP_THREADING_SUPPORT).unwrap(),
            expected
        );

        framework.set_property(Framework::PROP_THREADING_SUPPORT, json!("bogus"));
        assert_eq!(
            framework.property(Framework::PROP_THREADING_SUPPORT).unwrap(),
            expected
        );

        framework.set_property("org.example.later", json!("yes"));
        assert_eq!(
            framework.property("org.example.later").unwrap(),
            json!("yes")
        );
    }

    #[test]
    fn test_uninstall_is_always_rejected() {
        let framework = Framework::new(FrameworkConfig::new());
        assert!(matches!(
            framework.uninstall(),
            Err(FrameworkError::IllegalOperation(_))
        ));
        framework.start().unwrap();
        assert!(framework.uninstall().is_err());
        assert!(framework.bundle().uninstall().is_err());
    }

    #[test]
    fn test_stop_stops_installed_bundles() {
        let framework = Framework::new(FrameworkConfig::new());
        framework.start().unwrap();

        let first = framework.install_bundle("bundles/libFirst.so").unwrap();
        let second = framework.install_bundle("bundles/libSecond.so").unwrap();
        first.start().unwrap();
        second.start().unwrap();

        framework.stop().unwrap();
        assert_eq!(first.state(), BundleState::Stopped);
        assert_eq!(second.state(), BundleState::Stopped);
        assert_eq!(framework.state(), BundleState::Stopped);
    }

    #[test]
    fn test_two_frameworks_share_no_state() {
        let a = Framework::new(FrameworkConfig::new());
        let b = Framework::new(FrameworkConfig::new());
        a.start().unwrap();
        b.start().unwrap();

        a.install_bundle("bundles/libOnlyInA.so").unwrap();
        assert!(a.context().bundle_by_name("OnlyInA").unwrap().is_some());
        assert!(b.context().bundle_by_name("OnlyInA").unwrap().is_none());
    }
}
