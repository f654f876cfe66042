//! Infrastructure adapters for the hierarchy module.
//!
//! Concrete implementations of the hierarchy ports, following hexagonal
//! architecture: the domain stays pure while adapters carry the
//! infrastructure concerns.
//!
//! - [`memory::MemoryForestStore`] and [`memory::MemoryOwnerDirectory`]:
//!   thread-safe in-memory implementations for tests and single-process use
//! - [`postgres::PostgresForestStore`]: production persistence using Diesel
//!   with jsonb-encoded id lists and compare-and-swap commits

pub mod memory;
pub mod postgres;
