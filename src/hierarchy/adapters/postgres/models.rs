//! Diesel row models for hierarchy persistence.

use super::schema::{espalier_spaces, espalier_tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query and write model for task records.
///
/// One struct serves reads, inserts, and changeset updates: commits upsert
/// whole records, so there is no partial-update shape to model.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = espalier_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct TaskRow {
    /// Task identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Owning account.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub owner: uuid::Uuid,
    /// Display name.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub name: String,
    /// Free-form description.
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub description: String,
    /// Progress state.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub progress: String,
    /// Board position payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub position: Value,
    /// Card extent payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub size: Value,
    /// Containing space.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    pub space: Option<uuid::Uuid>,
    /// Parent task.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    pub parent_task: Option<uuid::Uuid>,
    /// Ordered child id list.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub subtasks: Value,
    /// Root-to-parent ancestor id path.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub ancestors: Value,
    /// Whether the task is archived.
    #[diesel(sql_type = diesel::sql_types::Bool)]
    pub archived: bool,
    /// When the task was archived.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub archived_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency version.
    #[diesel(sql_type = diesel::sql_types::Int8)]
    pub version: i64,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Query and write model for space records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = espalier_spaces)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SpaceRow {
    /// Space identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Owning account.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub owner: uuid::Uuid,
    /// Display name.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub name: String,
    /// Display colour.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub color: String,
    /// High-water stacking index.
    #[diesel(sql_type = diesel::sql_types::Int8)]
    pub max_z_index: i64,
    /// Ordered root-task id list.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub task_order: Value,
    /// Optimistic-concurrency version.
    #[diesel(sql_type = diesel::sql_types::Int8)]
    pub version: i64,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}
