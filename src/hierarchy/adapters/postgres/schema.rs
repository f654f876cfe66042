//! Diesel schema for hierarchy persistence.

diesel::table! {
    /// Task records of the hierarchy.
    espalier_tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Owning account.
        owner -> Uuid,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Free-form description.
        description -> Text,
        /// Progress state.
        #[max_length = 50]
        progress -> Varchar,
        /// Board position payload (`x`, `y`, `z_index`).
        position -> Jsonb,
        /// Card extent payload (`width`, `height`).
        size -> Jsonb,
        /// Containing space; null while archived.
        space -> Nullable<Uuid>,
        /// Parent task; null for root tasks.
        parent_task -> Nullable<Uuid>,
        /// Ordered child id list.
        subtasks -> Jsonb,
        /// Root-to-parent ancestor id path.
        ancestors -> Jsonb,
        /// Whether the task is archived.
        archived -> Bool,
        /// When the task was archived.
        archived_at -> Nullable<Timestamptz>,
        /// Optimistic-concurrency version.
        version -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Space records: ordered containers of root tasks.
    espalier_spaces (id) {
        /// Space identifier.
        id -> Uuid,
        /// Owning account.
        owner -> Uuid,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Display colour.
        #[max_length = 50]
        color -> Varchar,
        /// High-water stacking index.
        max_z_index -> Int8,
        /// Ordered root-task id list.
        task_order -> Jsonb,
        /// Optimistic-concurrency version.
        version -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(espalier_tasks, espalier_spaces);
