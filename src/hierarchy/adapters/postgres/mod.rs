//! `PostgreSQL` adapters for hierarchy persistence.

pub(crate) mod models;
mod schema;
mod store;

pub use store::{ForestPgPool, PostgresForestStore};
pub(crate) use store::{row_to_space, row_to_task, space_to_row, task_to_row};
