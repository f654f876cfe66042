//! Task hierarchy consistency engine.
//!
//! This module keeps bounded-depth parent/child task trees — strictly two
//! levels, task and subtask — coherent under reparenting, cascading archive
//! and delete, subtree duplication, and sibling reordering, with tasks
//! grouped into ordered spaces. Concurrent structural edits are resolved by
//! optimistic concurrency: every operation plans against a versioned
//! working set and commits atomically, retrying from fresh reads when a
//! competing commit lands first. The module follows hexagonal architecture:
//!
//! - Domain types and mutation rules in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
