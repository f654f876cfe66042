//! `PostgreSQL` forest store implementation.
//!
//! Id-list and geometry fields are stored as `jsonb`; the descendant scan
//! uses jsonb containment on the `ancestors` column. Commits run as one SQL
//! transaction: every precondition row is locked and its version compared
//! first, then the whole batch is upserted, so a concurrent commit that
//! touched an overlapping record rolls the transaction back with
//! [`StoreError::Conflict`] and leaves nothing behind.

use super::{
    models::{SpaceRow, TaskRow},
    schema::{espalier_spaces, espalier_tasks},
};
use crate::hierarchy::{
    domain::{
        BoardExtent, BoardPosition, OwnerId, Progress, Space, SpaceId, Task, TaskId,
    },
    ports::{ForestStore, Precondition, RecordKey, RecordPut, StoreError, StoreResult, WriteBatch},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};

/// `PostgreSQL` connection pool type used by hierarchy adapters.
pub type ForestPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed forest store.
#[derive(Debug, Clone)]
pub struct PostgresForestStore {
    pool: ForestPgPool,
}

impl PostgresForestStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: ForestPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(StoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(StoreError::persistence)?
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl ForestStore for PostgresForestStore {
    async fn task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = espalier_tasks::table
                .filter(espalier_tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(StoreError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn space(&self, id: SpaceId) -> StoreResult<Option<Space>> {
        self.run_blocking(move |connection| {
            let row = espalier_spaces::table
                .filter(espalier_spaces::id.eq(id.into_inner()))
                .select(SpaceRow::as_select())
                .first::<SpaceRow>(connection)
                .optional()
                .map_err(StoreError::persistence)?;
            row.map(row_to_space).transpose()
        })
        .await
    }

    async fn tasks_with_ancestor(&self, id: TaskId) -> StoreResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = espalier_tasks::table
                .filter(espalier_tasks::ancestors.contains(serde_json::json!([id.into_inner()])))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(StoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn tasks_in_space(&self, id: SpaceId) -> StoreResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = espalier_tasks::table
                .filter(espalier_tasks::space.eq(id.into_inner()))
                .filter(espalier_tasks::archived.eq(false))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(StoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn tasks_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = espalier_tasks::table
                .filter(espalier_tasks::owner.eq(owner.into_inner()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(StoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn spaces_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Space>> {
        self.run_blocking(move |connection| {
            let rows = espalier_spaces::table
                .filter(espalier_spaces::owner.eq(owner.into_inner()))
                .select(SpaceRow::as_select())
                .load::<SpaceRow>(connection)
                .map_err(StoreError::persistence)?;
            rows.into_iter().map(row_to_space).collect()
        })
        .await
    }

    async fn archived_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = espalier_tasks::table
                .filter(espalier_tasks::archived.eq(true))
                .filter(espalier_tasks::archived_at.lt(cutoff))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(StoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, StoreError, _>(|tx_connection| {
                check_preconditions(tx_connection, &batch.preconditions)?;
                for put in &batch.puts {
                    match put {
                        RecordPut::Task(task) => upsert_task(tx_connection, task)?,
                        RecordPut::Space(space) => upsert_space(tx_connection, space)?,
                    }
                }
                if !batch.deletes.is_empty() {
                    let ids: Vec<uuid::Uuid> = batch
                        .deletes
                        .iter()
                        .map(|id| id.into_inner())
                        .collect();
                    diesel::delete(
                        espalier_tasks::table.filter(espalier_tasks::id.eq_any(ids)),
                    )
                    .execute(tx_connection)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn purge(&self, ids: &[TaskId]) -> StoreResult<usize> {
        let raw: Vec<uuid::Uuid> = ids.iter().map(|id| id.into_inner()).collect();
        self.run_blocking(move |connection| {
            diesel::delete(espalier_tasks::table.filter(espalier_tasks::id.eq_any(raw)))
                .execute(connection)
                .map_err(StoreError::persistence)
        })
        .await
    }
}

/// Locks every precondition row and compares versions; any divergence fails
/// the batch before a single write happens.
fn check_preconditions(
    connection: &mut PgConnection,
    preconditions: &[Precondition],
) -> StoreResult<()> {
    for precondition in preconditions {
        let stored = match precondition.key {
            RecordKey::Task(task_id) => espalier_tasks::table
                .filter(espalier_tasks::id.eq(task_id.into_inner()))
                .select(espalier_tasks::version)
                .for_update()
                .first::<i64>(connection)
                .optional()
                .map_err(StoreError::persistence)?,
            RecordKey::Space(space_id) => espalier_spaces::table
                .filter(espalier_spaces::id.eq(space_id.into_inner()))
                .select(espalier_spaces::version)
                .for_update()
                .first::<i64>(connection)
                .optional()
                .map_err(StoreError::persistence)?,
        };
        let expected = precondition
            .expected
            .map(i64::try_from)
            .transpose()
            .map_err(StoreError::persistence)?;
        if stored != expected {
            return Err(StoreError::conflict_on(precondition.key));
        }
    }
    Ok(())
}

fn upsert_task(connection: &mut PgConnection, task: &Task) -> StoreResult<()> {
    let row = task_to_row(task)?;
    diesel::insert_into(espalier_tasks::table)
        .values(&row)
        .on_conflict(espalier_tasks::id)
        .do_update()
        .set(&row)
        .execute(connection)?;
    Ok(())
}

fn upsert_space(connection: &mut PgConnection, space: &Space) -> StoreResult<()> {
    let row = space_to_row(space)?;
    diesel::insert_into(espalier_spaces::table)
        .values(&row)
        .on_conflict(espalier_spaces::id)
        .do_update()
        .set(&row)
        .execute(connection)?;
    Ok(())
}

pub(crate) fn task_to_row(task: &Task) -> StoreResult<TaskRow> {
    Ok(TaskRow {
        id: task.id.into_inner(),
        owner: task.owner.into_inner(),
        name: task.name.clone(),
        description: task.description.clone(),
        progress: task.progress.as_str().to_owned(),
        position: serde_json::to_value(task.position).map_err(StoreError::persistence)?,
        size: serde_json::to_value(task.size).map_err(StoreError::persistence)?,
        space: task.space.map(SpaceId::into_inner),
        parent_task: task.parent_task.map(TaskId::into_inner),
        subtasks: serde_json::to_value(&task.subtasks).map_err(StoreError::persistence)?,
        ancestors: serde_json::to_value(&task.ancestors).map_err(StoreError::persistence)?,
        archived: task.archived,
        archived_at: task.archived_at,
        version: i64::try_from(task.version).map_err(StoreError::persistence)?,
        created_at: task.created_at,
        updated_at: task.updated_at,
    })
}

pub(crate) fn row_to_task(row: TaskRow) -> StoreResult<Task> {
    let progress =
        Progress::try_from(row.progress.as_str()).map_err(StoreError::persistence)?;
    let position: BoardPosition =
        serde_json::from_value(row.position).map_err(StoreError::persistence)?;
    let size: BoardExtent = serde_json::from_value(row.size).map_err(StoreError::persistence)?;
    let subtasks: Vec<TaskId> =
        serde_json::from_value(row.subtasks).map_err(StoreError::persistence)?;
    let ancestors: Vec<TaskId> =
        serde_json::from_value(row.ancestors).map_err(StoreError::persistence)?;

    Ok(Task {
        id: TaskId::from_uuid(row.id),
        owner: OwnerId::from_uuid(row.owner),
        name: row.name,
        description: row.description,
        progress,
        position,
        size,
        space: row.space.map(SpaceId::from_uuid),
        parent_task: row.parent_task.map(TaskId::from_uuid),
        subtasks,
        ancestors,
        archived: row.archived,
        archived_at: row.archived_at,
        version: u64::try_from(row.version).map_err(StoreError::persistence)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub(crate) fn space_to_row(space: &Space) -> StoreResult<SpaceRow> {
    Ok(SpaceRow {
        id: space.id.into_inner(),
        owner: space.owner.into_inner(),
        name: space.name.clone(),
        color: space.color.clone(),
        max_z_index: space.max_z_index,
        task_order: serde_json::to_value(&space.task_order).map_err(StoreError::persistence)?,
        version: i64::try_from(space.version).map_err(StoreError::persistence)?,
        created_at: space.created_at,
        updated_at: space.updated_at,
    })
}

pub(crate) fn row_to_space(row: SpaceRow) -> StoreResult<Space> {
    let task_order: Vec<TaskId> =
        serde_json::from_value(row.task_order).map_err(StoreError::persistence)?;
    Ok(Space {
        id: SpaceId::from_uuid(row.id),
        owner: OwnerId::from_uuid(row.owner),
        name: row.name,
        color: row.color,
        max_z_index: row.max_z_index,
        task_order,
        version: u64::try_from(row.version).map_err(StoreError::persistence)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
