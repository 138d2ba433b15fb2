//! Crate-wide error type and the category taxonomy the tool dispatcher maps onto responses.

use thiserror::Error;

/// Convenience alias used throughout `memory-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the cognitive memory core.
///
/// Each variant corresponds to one of the error categories (1–7): validation,
/// not-found is handled separately as a structured response rather than an
/// `Err`, transient embedding/database errors, timeout, policy, and fatal
/// configuration errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied parameters failed validation. Never retried, no side effects.
    #[error("validation failed for '{field}': {message}")]
    Validation {
        /// Name of the offending parameter.
        field: String,
        /// Human-readable explanation.
        message: String,
    },

    /// The embedding provider failed after exhausting the retry budget.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A database operation failed and was rolled back by the storage adapter.
    #[error("database operation failed: {0}")]
    Database(String),

    /// A statement exceeded its configured timeout (e.g. pathfinding).
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Attempted to delete a constitutive edge without bilateral consent.
    #[error("constitutive edge {edge_id} ({relation}) cannot be deleted without consent")]
    ConstitutiveProtection {
        /// Identifier of the protected edge.
        edge_id: uuid::Uuid,
        /// The edge's relation string.
        relation: String,
    },

    /// Configuration is invalid or the connection pool could not initialize.
    /// Fatal: the process aborts before entering the protocol loop.
    #[error("fatal configuration error: {0}")]
    Configuration(String),

    /// The storage circuit breaker is open and is failing fast.
    #[error("circuit breaker is open")]
    CircuitBreakerOpen,

    /// A requested entity does not exist. Handlers typically translate this
    /// into a `status: "not_found"` response rather than propagating it as
    /// an error; it exists as a variant for adapters that need to signal it
    /// through a `Result`.
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization of a property bag or wire payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Construct a [`Error::Validation`] for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error represents a transient condition that a circuit
    /// breaker or retry loop should count as a failure. Validation and
    /// policy errors are the caller's fault and never recoverable by retry.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_) | Self::Database(_) | Self::Timeout(_) | Self::CircuitBreakerOpen
        )
    }

    /// Machine-readable category string surfaced as `error_type` in tool responses.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Embedding(_) => "embedding_failed",
            Self::Database(_) => "database_error",
            Self::Timeout(_) => "timeout",
            Self::ConstitutiveProtection { .. } => "constitutive_protection",
            Self::Configuration(_) => "configuration",
            Self::CircuitBreakerOpen => "circuit_breaker_open",
            Self::NotFound(_) => "not_found",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_not_recoverable() {
        let err = Error::validation("weight", "must be in [0,1]");
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn database_and_timeout_errors_are_recoverable() {
        assert!(Error::Database("connection reset".into()).is_recoverable());
        assert!(Error::Timeout(std::time::Duration::from_secs(1)).is_recoverable());
    }

    #[test]
    fn constitutive_protection_is_not_recoverable() {
        let err = Error::ConstitutiveProtection {
            edge_id: uuid::Uuid::nil(),
            relation: "LOVES".into(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "constitutive_protection");
    }
}
