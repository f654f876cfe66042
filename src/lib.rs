//! Espalier: task hierarchy consistency engine.
//!
//! This crate keeps bounded-depth task trees — strictly two levels, task
//! and subtask — coherent under reparenting, cascading archive and delete,
//! subtree duplication, and sibling reordering, with optimistic concurrency
//! resolving competing structural edits.
//!
//! # Architecture
//!
//! Espalier follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, APIs, etc.)
//!
//! # Modules
//!
//! - [`hierarchy`]: Versioned task forests, mutation intents, and the
//!   retrying commit engine
//! - [`mirror`]: Client-side optimistic mirror predicting outcomes ahead of
//!   confirmation
//! - [`transport`]: Serialised request/response surface over the engine

pub mod hierarchy;
pub mod mirror;
pub mod transport;
