//! Unit tests for the optimistic mirror.
