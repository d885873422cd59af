//! Framework configuration and the diagnostic log sink.

use crate::sync;
use nucleus_core::{Properties, Value};
use serde_json::json;
use std::fmt;
use std::io::Write;
use std::sync::Mutex;

/// Configured storage location for per-bundle data files. Defaults to the
/// current working directory.
pub const PROP_STORAGE_LOCATION: &str = "nucleus.framework.storage";

/// Read-only threading capability indicator, `"multi"` or `"single"`.
/// Fixed at build time; any caller-supplied value is overwritten with the
/// build-time truth.
pub const PROP_THREADING_SUPPORT: &str = "nucleus.framework.threading.support";

/// Diagnostic log toggle. Defaults to off.
pub const PROP_LOG: &str = "nucleus.framework.log";

/// Configuration map handed to [`Framework::new`](crate::Framework::new).
///
/// A string-keyed property bag. Unknown keys are preserved verbatim and
/// retrievable later through
/// [`Framework::property`](crate::Framework::property).
#[derive(Debug, Default, Clone)]
pub struct FrameworkConfig {
    props: Properties,
}

impl FrameworkConfig {
    /// Create an empty configuration; the framework fills in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a configuration property, consuming and returning `self`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Set a configuration property in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.props.insert(key.into(), value);
    }

    pub(crate) fn into_props(self) -> Properties {
        self.props
    }
}

impl From<Properties> for FrameworkConfig {
    fn from(props: Properties) -> Self {
        Self { props }
    }
}

/// Whether this build carries multi-threading support.
pub(crate) fn threading_support() -> &'static str {
    if cfg!(feature = "threading") {
        "multi"
    } else {
        "single"
    }
}

/// Merge framework defaults into a caller-supplied configuration.
///
/// Storage location defaults to the current working directory and the
/// diagnostic log to off. The threading property is read-only: whatever
/// the caller supplied is replaced with the build-time value.
pub(crate) fn init_default_properties(mut props: Properties) -> Properties {
    props
        .entry(PROP_STORAGE_LOCATION.to_string())
        .or_insert_with(|| json!(current_working_directory()));
    props
        .entry(PROP_LOG.to_string())
        .or_insert(Value::Bool(false));
    props.insert(
        PROP_THREADING_SUPPORT.to_string(),
        json!(threading_support()),
    );
    props
}

pub(crate) fn current_working_directory() -> String {
    std::env::current_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_default()
}

/// Config-toggled diagnostic log writing to a caller-supplied sink.
///
/// Distinct from `tracing`: this is the framework's own debug channel,
/// off by default and redirected wherever the embedder points it
/// (default: stderr).
pub(crate) struct DiagnosticLog {
    enabled: bool,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl DiagnosticLog {
    pub(crate) fn new(enabled: bool, sink: Option<Box<dyn Write + Send>>) -> Self {
        Self {
            enabled,
            sink: Mutex::new(sink.unwrap_or_else(|| Box::new(std::io::stderr()))),
        }
    }

    pub(crate) fn log(&self, args: fmt::Arguments<'_>) {
        if !self.enabled {
            return;
        }
        let mut sink = sync::lock(&self.sink);
        let _ = writeln!(sink, "nucleus: {args}");
    }
}

impl fmt::Debug for DiagnosticLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticLog")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let props = init_default_properties(Properties::new());
        assert_eq!(
            props.get(PROP_STORAGE_LOCATION).and_then(Value::as_str),
            Some(current_working_directory().as_str())
        );
        assert_eq!(props.get(PROP_LOG), Some(&Value::Bool(false)));
        assert_eq!(
            props.get(PROP_THREADING_SUPPORT).and_then(Value::as_str),
            Some(threading_support())
        );
    }

    #[test]
    fn test_threading_override_is_discarded() {
        let supplied = if cfg!(feature = "threading") {
            "single"
        } else {
            "multi"
        };
        let config = FrameworkConfig::new().with(PROP_THREADING_SUPPORT, json!(supplied));
        let props = init_default_properties(config.into_props());
        assert_eq!(
            props.get(PROP_THREADING_SUPPORT).and_then(Value::as_str),
            Some(threading_support())
        );
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let config = FrameworkConfig::new().with("com.example.custom", json!("foo"));
        let props = init_default_properties(config.into_props());
        assert_eq!(
            props.get("com.example.custom").and_then(Value::as_str),
            Some("foo")
        );
    }
}
