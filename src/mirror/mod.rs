//! Optimistic mirror: client-resident predictive state.
//!
//! The mirror keeps a local copy of one owner's full task and space state
//! and applies mutation intents to it synchronously, before the server has
//! confirmed them, so the caller sees structural changes immediately. The
//! same [`MutationIntent`](crate::hierarchy::domain::MutationIntent)
//! dispatch the server engine uses drives the prediction, which is what
//! makes predictions trustworthy: they can only diverge from the eventual
//! outcome when the underlying records changed server-side in between.
//!
//! Reconciliation is rebase-shaped. Confirmed outcomes fold into the last
//! authoritative snapshot by record version (idempotent, order-tolerant),
//! provisional ids are rewritten to their canonical replacements through an
//! explicit remap table, and the still-pending intents are replayed on top.
//! A replay that no longer validates is dropped and surfaced as a
//! [`DiscardedPrediction`]; a full [`TaskMirror::resync`] recovers from any
//! divergence the incremental path cannot absorb.

mod identity;
mod state;

pub use identity::{DiscardedPrediction, MirrorIdentity, MirrorTicket, Prediction};
pub use state::TaskMirror;

#[cfg(test)]
mod tests;
