//! Prediction lifecycle values: tickets, identity states, and notices.

use crate::hierarchy::domain::{HierarchyError, IntentEffect};
use std::fmt;

/// Handle for one in-flight prediction, issued in prediction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MirrorTicket(pub(crate) u64);

impl fmt::Display for MirrorTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prediction #{}", self.0)
    }
}

/// Whether an id is backed by a server-confirmed record or exists only in
/// the local prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorIdentity {
    /// The id belongs to a record the server has confirmed.
    Confirmed,
    /// The id was drawn locally and awaits its canonical replacement.
    Provisional,
}

/// What a successful prediction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    /// Handle to pass back on confirmation or rejection.
    pub ticket: MirrorTicket,
    /// The predicted outcome, in id terms. Ids introduced here are
    /// provisional until confirmed.
    pub effect: IntentEffect,
}

/// A pending prediction dropped during reconciliation.
///
/// Raised when the server rejects the intent outright, or when a replay on
/// top of newly confirmed state no longer satisfies the mutation rules.
/// The caller surfaces these as user-visible notices; the affected records
/// have already been rolled back to their confirmed state.
#[derive(Debug)]
pub struct DiscardedPrediction {
    /// The dropped prediction's handle.
    pub ticket: MirrorTicket,
    /// The rule the intent no longer satisfies.
    pub reason: HierarchyError,
}
