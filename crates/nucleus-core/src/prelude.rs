//! Prelude module - commonly used types for convenient import.
//!
//! Use `use nucleus_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{FrameworkError, FrameworkResult};

// Identifiers
pub use crate::{BundleId, ServiceId};

// Property model
pub use crate::{OBJECT_CLASS, Properties, SERVICE_ID, SERVICE_RANKING, Value};
