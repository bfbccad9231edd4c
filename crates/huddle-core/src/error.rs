//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur when building domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required field was present but blank
    #[error("{field} must not be empty")]
    EmptyField { field: String },

    /// Unknown negotiation kind label
    #[error("unknown negotiation kind: {0}")]
    UnknownNegotiationKind(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
