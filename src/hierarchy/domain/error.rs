//! Error taxonomy for hierarchy mutations.
//!
//! Every failure surfaced to a caller carries a stable kind (used on the
//! wire) plus a human-readable message. Structural violations are detected
//! before any write; store-level conflicts are retried by the transaction
//! coordinator and only surface here once the retry budget is exhausted.

use super::{SpaceId, TaskId};
use crate::hierarchy::ports::StoreError;
use thiserror::Error;

/// Errors returned by hierarchy operations.
#[derive(Debug, Error)]
pub enum HierarchyError {
    /// A referenced task does not exist (or is archived, which is
    /// structurally equivalent).
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// A referenced space does not exist.
    #[error("space not found: {0}")]
    SpaceNotFound(SpaceId),

    /// The caller does not own the targeted record.
    #[error("caller does not own {0}")]
    Unauthorized(String),

    /// Input failed validation before any structural change was planned.
    #[error("{0}")]
    Validation(String),

    /// The mutation would exceed the two-level nesting bound.
    #[error("{0}")]
    DepthViolation(String),

    /// A business precondition (not a structural invariant) was violated.
    #[error("{0}")]
    BusinessRule(String),

    /// The operation kept losing write races and exhausted its retry budget,
    /// or a declared parent/space no longer matches the stored one.
    #[error("{0}")]
    Conflict(String),

    /// The persistence layer failed for a non-conflict reason.
    #[error(transparent)]
    Store(StoreError),
}

impl HierarchyError {
    /// Returns the stable error kind used on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TaskNotFound(_) | Self::SpaceNotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Validation(_) => "validation_error",
            Self::DepthViolation(_) => "depth_violation",
            Self::BusinessRule(_) => "business_rule_violation",
            Self::Conflict(_) => "conflict",
            Self::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for HierarchyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => Self::Conflict(detail),
            other => Self::Store(other),
        }
    }
}

/// Result type for hierarchy operations.
pub type HierarchyResult<T> = Result<T, HierarchyError>;

/// Error returned while parsing progress states from persistence or wire
/// payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown progress state: {0}")]
pub struct ParseProgressError(pub String);
