//! Filter parse errors.

use nucleus_core::FrameworkError;
use thiserror::Error;

/// A filter string failed to parse.
///
/// Carries the offending fragment of the input so callers can report
/// where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("filter syntax error at `{fragment}`: {reason}")]
pub struct FilterError {
    /// The fragment of the filter string where parsing failed.
    pub fragment: String,
    /// Why parsing stopped there.
    pub reason: String,
}

impl FilterError {
    pub(crate) fn new(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }
}

impl From<FilterError> for FrameworkError {
    fn from(err: FilterError) -> Self {
        FrameworkError::FilterSyntax {
            fragment: err.fragment,
            reason: err.reason,
        }
    }
}
