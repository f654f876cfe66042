//! Step definitions for hierarchy operation behaviour tests.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
