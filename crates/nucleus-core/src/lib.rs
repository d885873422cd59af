//! Nucleus Core - Foundation types for the Nucleus modular runtime.
//!
//! This crate provides:
//! - Bundle and service identifiers
//! - The shared property model (string-keyed JSON value maps)
//! - The framework error taxonomy
//! - Bundle location parsing helpers

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod ids;
mod location;
mod props;

pub use error::{FrameworkError, FrameworkResult};
pub use ids::{BundleId, ServiceId};
pub use location::{bundle_location, bundle_name_from_location};
pub use props::{
    OBJECT_CLASS, Properties, SERVICE_ID, SERVICE_RANKING, Value, get_ci, ranking_of, service_id_of,
};
