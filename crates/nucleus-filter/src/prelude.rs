//! Prelude module - commonly used types for convenient import.
//!
//! Use `use nucleus_filter::prelude::*;` to import all essential types.

pub use crate::{Filter, FilterError};
