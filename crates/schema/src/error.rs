use thiserror::Error;

/// Batch-level validation failures.
///
/// Record-level problems are never errors; they are
/// [`FieldError`](crate::FieldError)s inside a rejected outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// No contract is registered for the domain.
    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    #[error("invalid validation configuration: {0}")]
    InvalidConfig(String),

    /// The validation worker pool could not be started.
    #[error("validation worker pool unavailable: {0}")]
    WorkerPool(String),
}
