//! Unit tests for the hierarchy module.
//!
//! Tests are organised by layer: domain value objects, forest mutations,
//! duplication, intents, the retry coordinator, adapters, and the
//! orchestration service.
