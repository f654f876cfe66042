//! The mirror state machine: predict, confirm, reject, resync.

use super::{DiscardedPrediction, MirrorIdentity, MirrorTicket, Prediction};
use crate::hierarchy::domain::{
    CloneIds, HierarchyError, HierarchyResult, IntentEffect, MutationIntent, OwnerId, SpaceId,
    TaskForest, TaskId,
};
use crate::hierarchy::services::{CommittedMutation, Snapshot};
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};

/// One prediction awaiting its server outcome.
///
/// The clone-id table is per-entry so a replayed duplication keeps handing
/// out the provisional ids the first prediction drew.
struct PendingIntent {
    ticket: MirrorTicket,
    intent: MutationIntent,
    clone_ids: CloneIds,
}

/// Client-resident predictive copy of one owner's task and space state.
///
/// Two forests are held: the last server-confirmed snapshot, and the
/// predicted state derived from it by replaying every pending intent in
/// prediction order. Reconciliation never edits the predicted forest
/// directly; it folds authoritative records into the confirmed snapshot and
/// rebuilds the prediction by replay, so predicted state is always
/// confirmed-state-plus-pending by construction.
///
/// The mirror is single-threaded: every operation takes `&mut self` and
/// completes synchronously.
pub struct TaskMirror<C: Clock> {
    owner: OwnerId,
    clock: C,
    confirmed: TaskForest,
    predicted: TaskForest,
    pending: Vec<PendingIntent>,
    /// Ids the server has deleted. Guards the fold against a slow
    /// out-of-order put resurrecting a deleted record.
    tombstones: BTreeSet<TaskId>,
    next_ticket: u64,
}

impl<C: Clock> TaskMirror<C> {
    /// Creates an empty mirror for `owner`.
    #[must_use]
    pub fn new(owner: OwnerId, clock: C) -> Self {
        Self {
            owner,
            clock,
            confirmed: TaskForest::new(),
            predicted: TaskForest::new(),
            pending: Vec::new(),
            tombstones: BTreeSet::new(),
            next_ticket: 1,
        }
    }

    /// The predicted forest: confirmed state plus every pending intent.
    #[must_use]
    pub const fn predicted(&self) -> &TaskForest {
        &self.predicted
    }

    /// The last server-confirmed state.
    #[must_use]
    pub const fn confirmed(&self) -> &TaskForest {
        &self.confirmed
    }

    /// Number of predictions awaiting confirmation.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// `true` while any prediction awaits confirmation.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Reports how a task id is currently backed, or `None` for an id the
    /// mirror has never seen.
    #[must_use]
    pub fn identity(&self, id: TaskId) -> Option<MirrorIdentity> {
        if self.confirmed.contains_task(id) {
            return Some(MirrorIdentity::Confirmed);
        }
        self.pending
            .iter()
            .any(|entry| entry.intent.introduced_ids(&entry.clone_ids).contains(&id))
            .then_some(MirrorIdentity::Provisional)
    }

    /// Reports how a space id is currently backed.
    #[must_use]
    pub fn space_identity(&self, id: SpaceId) -> Option<MirrorIdentity> {
        if self.confirmed.space(id).is_some() {
            return Some(MirrorIdentity::Confirmed);
        }
        self.pending
            .iter()
            .any(|entry| {
                matches!(&entry.intent, MutationIntent::CreateSpace { space, .. } if *space == id)
            })
            .then_some(MirrorIdentity::Provisional)
    }

    /// Applies `intent` to the predicted state and queues it for
    /// confirmation.
    ///
    /// Ids inside creating intents are the caller's provisional ids;
    /// duplication draws its provisional clone ids here and keeps them
    /// stable across replays.
    ///
    /// # Errors
    ///
    /// Surfaces the domain error when the intent violates the mutation
    /// rules against the current predicted state; nothing is changed or
    /// queued in that case.
    pub fn predict(&mut self, intent: MutationIntent) -> HierarchyResult<Prediction> {
        let mut clone_ids = CloneIds::new();
        let effect = intent.apply(&mut self.predicted, self.owner, &mut clone_ids, &self.clock)?;
        let ticket = MirrorTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.saturating_add(1);
        self.pending.push(PendingIntent {
            ticket,
            intent,
            clone_ids,
        });
        Ok(Prediction { ticket, effect })
    }

    /// Reconciles the server outcome for `ticket`.
    ///
    /// Authoritative records fold into the confirmed snapshot by version,
    /// so redelivery and out-of-order arrival are harmless. Provisional ids
    /// the prediction introduced are rewritten to their canonical
    /// replacements everywhere they are still referenced, the entry is
    /// dropped, and the remaining pending intents are replayed on top of
    /// the new confirmed state. Replays that no longer validate are
    /// discarded and returned.
    pub fn confirm(
        &mut self,
        ticket: MirrorTicket,
        outcome: &CommittedMutation,
    ) -> Vec<DiscardedPrediction> {
        self.fold_outcome(outcome);
        if let Some(index) = self.pending.iter().position(|entry| entry.ticket == ticket) {
            let entry = self.pending.remove(index);
            let (tasks, spaces) = remap_tables(&entry, outcome);
            if !(tasks.is_empty() && spaces.is_empty()) {
                for remaining in &mut self.pending {
                    remaining.intent.remap_ids(&tasks, &spaces);
                    remaining.clone_ids.rekey_originals(&tasks);
                }
            }
        }
        self.rebase()
    }

    /// Folds an outcome the mirror holds no prediction for — a commit made
    /// by another session of the same account.
    pub fn observe(&mut self, outcome: &CommittedMutation) -> Vec<DiscardedPrediction> {
        self.fold_outcome(outcome);
        self.rebase()
    }

    /// Drops the rejected prediction and rolls its records back to their
    /// confirmed state, replaying the predictions still pending.
    ///
    /// Unknown tickets are ignored, so a response raced by a resync is
    /// harmless.
    pub fn reject(
        &mut self,
        ticket: MirrorTicket,
        reason: HierarchyError,
    ) -> Vec<DiscardedPrediction> {
        let Some(index) = self.pending.iter().position(|entry| entry.ticket == ticket) else {
            return Vec::new();
        };
        let entry = self.pending.remove(index);
        let mut discarded = vec![DiscardedPrediction {
            ticket: entry.ticket,
            reason,
        }];
        discarded.extend(self.rebase());
        discarded
    }

    /// Replaces the confirmed snapshot wholesale and drops all pending
    /// state. The full-refetch path after an unrecoverable divergence.
    pub fn resync(&mut self, snapshot: Snapshot) {
        let mut confirmed = TaskForest::new();
        for space in snapshot.spaces {
            confirmed.load_space(space);
        }
        for task in snapshot.tasks {
            confirmed.load_task(task);
        }
        self.confirmed = confirmed;
        self.predicted = self.confirmed.clone();
        self.pending.clear();
        self.tombstones.clear();
    }

    /// Folds authoritative records into the confirmed snapshot.
    ///
    /// A record is accepted only when its version is not older than the
    /// held one; deletions are terminal and tombstoned.
    fn fold_outcome(&mut self, outcome: &CommittedMutation) {
        for id in &outcome.changes.deleted {
            self.tombstones.insert(*id);
            self.confirmed.evict_task(*id);
        }
        for task in &outcome.changes.tasks {
            if self.tombstones.contains(&task.id) {
                continue;
            }
            let accept = self
                .confirmed
                .task(task.id)
                .is_none_or(|held| held.version <= task.version);
            if accept {
                self.confirmed.load_task(task.clone());
            }
        }
        for space in &outcome.changes.spaces {
            let accept = self
                .confirmed
                .space(space.id)
                .is_none_or(|held| held.version <= space.version);
            if accept {
                self.confirmed.load_space(space.clone());
            }
        }
    }

    /// Rebuilds the predicted forest: confirmed snapshot plus every pending
    /// intent replayed in prediction order. Replays that no longer satisfy
    /// the mutation rules are dropped and reported.
    fn rebase(&mut self) -> Vec<DiscardedPrediction> {
        self.predicted = self.confirmed.clone();
        let mut discarded = Vec::new();
        let owner = self.owner;
        let predicted = &mut self.predicted;
        let clock = &self.clock;
        self.pending.retain_mut(|entry| {
            match entry
                .intent
                .apply(predicted, owner, &mut entry.clone_ids, clock)
            {
                Ok(_) => true,
                Err(reason) => {
                    discarded.push(DiscardedPrediction {
                        ticket: entry.ticket,
                        reason,
                    });
                    false
                }
            }
        });
        discarded
    }
}

/// Derives the provisional→canonical id tables for one confirmed entry.
///
/// Creations join on the outcome's created id; duplication clones join on
/// their original's id, which both sides share.
fn remap_tables(
    entry: &PendingIntent,
    outcome: &CommittedMutation,
) -> (BTreeMap<TaskId, TaskId>, BTreeMap<SpaceId, SpaceId>) {
    let mut tasks = BTreeMap::new();
    let mut spaces = BTreeMap::new();
    match (&entry.intent, &outcome.effect) {
        (
            MutationIntent::CreateSpace {
                space: provisional, ..
            },
            IntentEffect::SpaceCreated { space: canonical },
        ) => {
            if provisional != canonical {
                spaces.insert(*provisional, *canonical);
            }
        }
        (
            MutationIntent::CreateTask { seed } | MutationIntent::CreateSubtask { seed, .. },
            IntentEffect::TaskCreated { task: canonical },
        ) => {
            if seed.id != *canonical {
                tasks.insert(seed.id, *canonical);
            }
        }
        (MutationIntent::Duplicate { .. }, IntentEffect::Duplicated { pairs }) => {
            let provisional_by_original: BTreeMap<TaskId, TaskId> = entry
                .clone_ids
                .pairs()
                .into_iter()
                .map(|pair| (pair.original, pair.clone))
                .collect();
            for pair in pairs {
                if let Some(provisional) = provisional_by_original.get(&pair.original) {
                    if *provisional != pair.clone {
                        tasks.insert(*provisional, pair.clone);
                    }
                }
            }
        }
        _ => {}
    }
    (tasks, spaces)
}
