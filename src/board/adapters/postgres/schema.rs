//! Diesel schema for board persistence.

diesel::table! {
    /// Board columns.
    stages (id) {
        /// Stage identifier.
        id -> Uuid,
        /// Owning project.
        project_id -> Uuid,
        /// Column title.
        #[max_length = 255]
        name -> Varchar,
        /// Column index on the board.
        ordinal -> Int4,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Task cards with their stage and sort key.
    tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Owning project.
        project_id -> Uuid,
        /// Stage currently holding the task.
        stage_id -> Uuid,
        /// Sort key within the stage.
        position -> Int8,
        /// Per-project sequence number.
        task_number -> Int8,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(tasks -> stages (stage_id));
diesel::allow_tables_to_appear_in_same_query!(stages, tasks);
