//! Error types for framework operations.

use thiserror::Error;

/// Errors surfaced by framework operations.
///
/// All errors are reported synchronously to the immediate caller; the
/// framework never retries an operation on its own.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// A caller-supplied argument was malformed or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was attempted on an invalidated or torn-down entity,
    /// such as a stopped bundle context or an unregistered service.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The operation is never permitted, regardless of state.
    #[error("illegal operation: {0}")]
    IllegalOperation(String),

    /// A bundle's activator hook failed. The transition it was part of is
    /// aborted and the underlying error is preserved as the source.
    #[error("activator {operation} failed for bundle {bundle}")]
    ActivatorFailed {
        /// The lifecycle hook that failed (`start` or `stop`).
        operation: String,
        /// Symbolic name of the bundle whose activator failed.
        bundle: String,
        /// The error raised by the activator.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A filter expression could not be parsed.
    #[error("filter syntax error at `{fragment}`: {reason}")]
    FilterSyntax {
        /// The offending fragment of the filter string.
        fragment: String,
        /// Why parsing stopped there.
        reason: String,
    },
}

/// Result type for framework operations.
pub type FrameworkResult<T> = Result<T, FrameworkError>;
