//! Error types for the quota gate
use std::fmt;
use std::time::Duration;

/// Failure talking to, or executing against, the quota store.
///
/// Every variant means "store unavailable" to the gate: the request fails closed and is
/// never treated as admitted or as rate limited.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Transport or protocol failure (connection refused, broken pipe, server error).
    #[error("quota store unavailable: {reason}")]
    Unavailable { reason: String },
    /// The store no longer knows the prepared increment+expire operation.
    #[error("quota store does not recognise prepared operation {handle}")]
    UnknownOperation { handle: String },
    /// The store call did not complete within the configured bound.
    #[error("quota store call timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    /// The counter holds something that is not an integer.
    #[error("counter {key:?} holds non-integer value {value:?}")]
    InvalidValue { key: String, value: String },
}

impl StoreError {
    /// Shorthand for [`StoreError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_unknown_operation(&self) -> bool {
        matches!(self, Self::UnknownOperation { .. })
    }
}

/// Invalid gate or key configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Window must be a whole, non-zero number of seconds.
    #[error("window must be a whole number of seconds >= 1 (got {0:?})")]
    InvalidWindow(Duration),
    /// Store timeout must be non-zero and finite.
    #[error("store_timeout must be non-zero and finite (got {0:?})")]
    InvalidStoreTimeout(Duration),
    /// Key prefix must be non-empty and free of control characters.
    #[error("invalid key prefix {prefix:?}: {reason}")]
    InvalidKeyPrefix { prefix: String, reason: &'static str },
}

/// Outcome of a gated request that did not reach, or failed inside, the protected service.
#[derive(Debug, Clone)]
pub enum GateError<E> {
    /// Observed count was above the limit; the counter was not advanced.
    Rejected { observed: u64, limit: u64, retry_after: Duration },
    /// The store failed during read or increment.
    Store(StoreError),
    /// No client identifier could be taken from the request.
    MissingClientId,
    /// The protected service itself failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for GateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { observed, limit, retry_after } => write!(
                f,
                "rate limit exceeded ({} observed, limit {}, retry after {:?})",
                observed, limit, retry_after
            ),
            Self::Store(e) => write!(f, "{}", e),
            Self::MissingClientId => write!(f, "request carries no client identifier"),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for GateError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<StoreError> for GateError<E> {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl<E> GateError<E> {
    /// HTTP status the web layer should answer with, or `None` for inner errors,
    /// which belong to the protected handler.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { .. } => Some(429),
            Self::Store(_) | Self::MissingClientId => Some(500),
            Self::Inner(_) => None,
        }
    }

    /// Check if this error is a policy rejection
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Check if this error is a store failure
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the store error if present.
    pub fn as_store(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }

    /// Suggested wait before retrying, for `Retry-After` headers.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Rejected { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}
