//! Shared world state for hierarchy operation BDD scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use espalier::hierarchy::{
    adapters::memory::MemoryForestStore,
    domain::{HierarchyError, OwnerId, SpaceId, TaskId},
    services::HierarchyService,
};
use mockable::DefaultClock;
use rstest::fixture;

/// Service type used by the BDD world.
pub type TestHierarchyService = HierarchyService<MemoryForestStore, DefaultClock>;

/// Scenario world for hierarchy operation behaviour tests.
pub struct HierarchyWorld {
    pub service: TestHierarchyService,
    pub owner: OwnerId,
    pub space: Option<SpaceId>,
    pub tasks: HashMap<String, TaskId>,
    pub last_failure: Option<HierarchyError>,
}

impl HierarchyWorld {
    /// Creates a world over a fresh in-memory store.
    #[must_use]
    pub fn new() -> Self {
        let service = HierarchyService::new(
            Arc::new(MemoryForestStore::new()),
            Arc::new(DefaultClock),
        );
        Self {
            service,
            owner: OwnerId::new(),
            space: None,
            tasks: HashMap::new(),
            last_failure: None,
        }
    }

    /// Looks up the id recorded for a named task.
    ///
    /// # Errors
    ///
    /// Returns an error when no task with that name was created.
    pub fn task_id(&self, name: &str) -> Result<TaskId, eyre::Report> {
        self.tasks
            .get(name)
            .copied()
            .ok_or_else(|| eyre::eyre!("no task named {name:?} in scenario world"))
    }
}

impl Default for HierarchyWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> HierarchyWorld {
    HierarchyWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
