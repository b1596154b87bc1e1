//! Error types for Corral
//!
//! All components share one error enum. Store-level failures and component
//! failures are variants of the same type so that callers can match on the
//! cases they care about without unwrapping nested error chains.

/// Application-specific error types
#[derive(Debug, thiserror::Error)]
pub enum CorralError {
    /// The remote store could not be reached or answered with a
    /// server-side failure. Always propagated, never swallowed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A key already holds a value of a different kind (e.g. an ordered-set
    /// operation against a plain key).
    #[error("key '{0}' holds a value of the wrong kind")]
    WrongKind(String),

    /// A stream entry id that does not parse as `ms-seq`.
    #[error("malformed stream entry id: {0}")]
    MalformedEntryId(String),

    /// The lock wait budget ran out before the lease could be taken.
    #[error("lock acquisition timed out after {waited_ms} ms on '{resource}'")]
    AcquireTimeout { resource: String, waited_ms: u64 },

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CorralError>;

impl CorralError {
    /// Whether retrying the failed operation can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CorralError::StoreUnavailable(_) | CorralError::AcquireTimeout { .. }
        )
    }
}
