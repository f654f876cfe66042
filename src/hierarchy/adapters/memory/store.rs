//! In-memory forest store for tests and single-process use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::hierarchy::{
    domain::{OwnerId, Space, SpaceId, Task, TaskId},
    ports::{ForestStore, Precondition, RecordKey, RecordPut, StoreError, StoreResult, WriteBatch},
};

/// Thread-safe in-memory forest store with compare-and-swap commits.
#[derive(Debug, Clone, Default)]
pub struct MemoryForestStore {
    state: Arc<RwLock<MemoryForestState>>,
}

#[derive(Debug, Default)]
struct MemoryForestState {
    tasks: HashMap<TaskId, Task>,
    spaces: HashMap<SpaceId, Space>,
}

impl MemoryForestStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_precondition(
    state: &MemoryForestState,
    precondition: &Precondition,
) -> StoreResult<()> {
    let actual = match precondition.key {
        RecordKey::Task(id) => state.tasks.get(&id).map(|task| task.version),
        RecordKey::Space(id) => state.spaces.get(&id).map(|space| space.version),
    };
    if actual == precondition.expected {
        Ok(())
    } else {
        Err(StoreError::conflict_on(precondition.key))
    }
}

#[async_trait]
impl ForestStore for MemoryForestStore {
    async fn task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn space(&self, id: SpaceId) -> StoreResult<Option<Space>> {
        let state = self
            .state
            .read()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state.spaces.get(&id).cloned())
    }

    async fn tasks_with_ancestor(&self, id: TaskId) -> StoreResult<Vec<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state
            .tasks
            .values()
            .filter(|task| task.ancestors.contains(&id))
            .cloned()
            .collect())
    }

    async fn tasks_in_space(&self, id: SpaceId) -> StoreResult<Vec<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state
            .tasks
            .values()
            .filter(|task| !task.archived && task.space == Some(id))
            .cloned()
            .collect())
    }

    async fn tasks_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state
            .tasks
            .values()
            .filter(|task| task.owner == owner)
            .cloned()
            .collect())
    }

    async fn spaces_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Space>> {
        let state = self
            .state
            .read()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state
            .spaces
            .values()
            .filter(|space| space.owner == owner)
            .cloned()
            .collect())
    }

    async fn archived_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state
            .tasks
            .values()
            .filter(|task| {
                task.archived
                    && task
                        .archived_at
                        .is_some_and(|archived_at| archived_at < cutoff)
            })
            .cloned()
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))?;
        for precondition in &batch.preconditions {
            check_precondition(&state, precondition)?;
        }
        for put in batch.puts {
            match put {
                RecordPut::Task(task) => {
                    state.tasks.insert(task.id, task);
                }
                RecordPut::Space(space) => {
                    state.spaces.insert(space.id, space);
                }
            }
        }
        for id in batch.deletes {
            state.tasks.remove(&id);
        }
        Ok(())
    }

    async fn purge(&self, ids: &[TaskId]) -> StoreResult<usize> {
        let mut state = self
            .state
            .write()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))?;
        let mut removed = 0_usize;
        for id in ids {
            if state.tasks.remove(id).is_some() {
                removed = removed.saturating_add(1);
            }
        }
        Ok(removed)
    }
}
