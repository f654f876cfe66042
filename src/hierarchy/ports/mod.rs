//! Ports (interfaces) for hierarchy infrastructure dependencies.

mod identity;
mod store;

pub use identity::{IdentityError, IdentityResult, OwnerDirectory, RequestContext};
pub use store::{
    ForestStore, Precondition, RecordKey, RecordPut, StoreError, StoreResult, WriteBatch,
};
