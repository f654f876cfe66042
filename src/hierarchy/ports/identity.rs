//! Identity port resolving request credentials to an owning account.

use crate::hierarchy::domain::OwnerId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Credentials accompanying one client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Opaque bearer token presented by the client.
    pub token: String,
}

impl RequestContext {
    /// Creates a context carrying the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// Identity resolution contract.
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    /// Resolves request credentials to the owning account.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::UnknownCredentials`] when the token maps to
    /// no account.
    async fn resolve(&self, context: &RequestContext) -> IdentityResult<OwnerId>;
}

/// Errors returned by identity implementations.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The presented credentials map to no account.
    #[error("unknown credentials")]
    UnknownCredentials,

    /// Identity-backend failure.
    #[error("identity backend error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl IdentityError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}
