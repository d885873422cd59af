//! Bundle name and location parsing.
//!
//! A bundle is installed from a raw location string. The framework only
//! needs two things from it: a canonical form (stable under
//! re-canonicalization) and a symbolic name derived from the final path
//! segment, with shared-library decoration stripped.

use crate::error::{FrameworkError, FrameworkResult};

const LIBRARY_SUFFIXES: &[&str] = &[".so", ".dylib", ".dll"];

/// Canonicalize a raw bundle location string.
///
/// Canonicalization trims surrounding whitespace and collapses a trailing
/// path separator; it is idempotent. Fails for an empty location.
pub fn bundle_location(location: &str) -> FrameworkResult<String> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(FrameworkError::InvalidArgument(
            "bundle location must not be empty".to_string(),
        ));
    }
    let trimmed = trimmed.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        return Err(FrameworkError::InvalidArgument(format!(
            "bundle location `{location}` has no name component"
        )));
    }
    Ok(trimmed.to_string())
}

/// Derive a bundle's symbolic name from its location.
///
/// The name is the final path segment with a `lib` prefix and any known
/// shared-library suffix removed. Deriving a name from an
/// already-canonical location yields the same name.
pub fn bundle_name_from_location(location: &str) -> FrameworkResult<String> {
    let canonical = bundle_location(location)?;
    let segment = canonical
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(canonical.as_str());

    let mut name = segment.strip_prefix("lib").unwrap_or(segment);
    for suffix in LIBRARY_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped;
            break;
        }
    }

    if name.is_empty() {
        return Err(FrameworkError::InvalidArgument(format!(
            "cannot derive a bundle name from location `{location}`"
        )));
    }
    Ok(name.to_string())
}
