//! In-memory owner directory for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::hierarchy::{
    domain::OwnerId,
    ports::{IdentityError, IdentityResult, OwnerDirectory, RequestContext},
};

/// Thread-safe in-memory token-to-owner directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryOwnerDirectory {
    state: Arc<RwLock<HashMap<String, OwnerId>>>,
}

impl MemoryOwnerDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token for an owner, replacing any previous mapping.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Backend`] when the directory lock is
    /// poisoned.
    pub fn register(&self, token: impl Into<String>, owner: OwnerId) -> IdentityResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| IdentityError::backend(std::io::Error::other(err.to_string())))?;
        state.insert(token.into(), owner);
        Ok(())
    }
}

#[async_trait]
impl OwnerDirectory for MemoryOwnerDirectory {
    async fn resolve(&self, context: &RequestContext) -> IdentityResult<OwnerId> {
        let state = self
            .state
            .read()
            .map_err(|err| IdentityError::backend(std::io::Error::other(err.to_string())))?;
        state
            .get(&context.token)
            .copied()
            .ok_or(IdentityError::UnknownCredentials)
    }
}
