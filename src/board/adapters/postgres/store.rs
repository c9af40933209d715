//! `PostgreSQL` position store.

use super::{
    models::{NewStageRow, NewTaskRow, StageRow, TaskRow},
    schema::{stages, tasks},
};
use crate::board::{
    domain::{
        PersistedStageData, PersistedTaskData, Position, ProjectId, Stage, StageId, StageName,
        Task, TaskId, TaskName, TaskNumber,
    },
    ports::{PositionStore, PositionStoreError, PositionStoreResult, PositionTransaction},
};
use async_trait::async_trait;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::dsl::max;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

/// `PostgreSQL` connection pool type used by board adapters.
pub type BoardPgPool = Pool<ConnectionManager<PgConnection>>;

type PooledConn = PooledConnection<ConnectionManager<PgConnection>>;

const TASK_NUMBER_CONSTRAINT: &str = "idx_tasks_project_number_unique";

/// `PostgreSQL`-backed position store.
///
/// Diesel is synchronous, so every statement runs on the blocking thread
/// pool. A [`PostgresTransaction`] owns one pooled connection from `BEGIN`
/// until `COMMIT` or `ROLLBACK`.
#[derive(Debug, Clone)]
pub struct PostgresPositionStore {
    pool: BoardPgPool,
}

impl PostgresPositionStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: BoardPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> PositionStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> PositionStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(PositionStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(PositionStoreError::persistence)?
    }
}

impl From<DieselError> for PositionStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl PositionStore for PostgresPositionStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> PositionStoreResult<Self::Transaction> {
        let pool = self.pool.clone();
        let connection = tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(PositionStoreError::persistence)?;
            AnsiTransactionManager::begin_transaction(&mut *connection)?;
            Ok::<_, PositionStoreError>(connection)
        })
        .await
        .map_err(PositionStoreError::persistence)??;
        Ok(PostgresTransaction {
            connection: Some(connection),
        })
    }

    async fn find_by_id(&self, id: TaskId) -> PositionStoreResult<Option<Task>> {
        self.run_blocking(move |connection| select_task(connection, id))
            .await
    }

    async fn find_stage(&self, id: StageId) -> PositionStoreResult<Option<Stage>> {
        self.run_blocking(move |connection| select_stage(connection, id))
            .await
    }

    async fn find_all_ordered_by_position(&self, stage: StageId) -> PositionStoreResult<Vec<Task>> {
        self.run_blocking(move |connection| select_stage_tasks(connection, stage))
            .await
    }

    async fn list_stages(&self, project: ProjectId) -> PositionStoreResult<Vec<Stage>> {
        self.run_blocking(move |connection| {
            let rows = stages::table
                .filter(stages::project_id.eq(project.into_inner()))
                .order((stages::ordinal.asc(), stages::id.asc()))
                .select(StageRow::as_select())
                .load::<StageRow>(connection)?;
            rows.into_iter().map(row_to_stage).collect()
        })
        .await
    }
}

/// Open `PostgreSQL` transaction holding a pooled connection.
///
/// Dropping an uncommitted transaction issues `ROLLBACK` on the blocking
/// pool before the connection returns to the pool.
pub struct PostgresTransaction {
    connection: Option<PooledConn>,
}

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransaction")
            .field("open", &self.connection.is_some())
            .finish()
    }
}

impl PostgresTransaction {
    async fn with_connection<F, T>(&mut self, f: F) -> PositionStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> PositionStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut connection = self.connection.take().ok_or_else(connection_released)?;
        let (returned, result) = tokio::task::spawn_blocking(move || {
            let outcome = f(&mut connection);
            (connection, outcome)
        })
        .await
        .map_err(PositionStoreError::persistence)?;
        self.connection = Some(returned);
        result
    }

    async fn finish<F>(mut self, f: F) -> PositionStoreResult<()>
    where
        F: FnOnce(&mut PgConnection) -> Result<(), DieselError> + Send + 'static,
    {
        let mut connection = self.connection.take().ok_or_else(connection_released)?;
        tokio::task::spawn_blocking(move || f(&mut connection))
            .await
            .map_err(PositionStoreError::persistence)?
            .map_err(PositionStoreError::from)
    }
}

fn connection_released() -> PositionStoreError {
    PositionStoreError::persistence(std::io::Error::other(
        "transaction connection was released by an earlier failure",
    ))
}

fn commit_connection(connection: &mut PgConnection) -> Result<(), DieselError> {
    AnsiTransactionManager::commit_transaction(connection)
}

fn rollback_connection(connection: &mut PgConnection) -> Result<(), DieselError> {
    AnsiTransactionManager::rollback_transaction(connection)
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        let mut rollback = move || {
            if let Err(err) = rollback_connection(&mut connection) {
                tracing::warn!(error = %err, "rollback of abandoned transaction failed");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(rollback);
            }
            Err(_) => rollback(),
        }
    }
}

#[async_trait]
impl PositionTransaction for PostgresTransaction {
    async fn lock_stage(&mut self, stage: StageId) -> PositionStoreResult<()> {
        self.with_connection(move |connection| {
            diesel::sql_query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind::<diesel::sql_types::Text, _>(stage.to_string())
                .execute(connection)?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&mut self, id: TaskId) -> PositionStoreResult<Option<Task>> {
        self.with_connection(move |connection| select_task(connection, id))
            .await
    }

    async fn find_stage(&mut self, id: StageId) -> PositionStoreResult<Option<Stage>> {
        self.with_connection(move |connection| select_stage(connection, id))
            .await
    }

    async fn find_max_position(
        &mut self,
        stage: StageId,
        excluding: Option<TaskId>,
    ) -> PositionStoreResult<Option<Position>> {
        self.with_connection(move |connection| {
            let value = tasks::table
                .filter(tasks::stage_id.eq(stage.into_inner()))
                .filter(tasks::id.ne(excluded_uuid(excluding)))
                .select(max(tasks::position))
                .get_result::<Option<i64>>(connection)?;
            Ok(value.map(Position::new))
        })
        .await
    }

    async fn find_predecessor(
        &mut self,
        following: &Task,
        excluding: Option<TaskId>,
    ) -> PositionStoreResult<Option<Task>> {
        let stage = following.stage().into_inner();
        let before = following.position().value();
        let before_id = following.id().into_inner();
        self.with_connection(move |connection| {
            let row = tasks::table
                .filter(tasks::stage_id.eq(stage))
                .filter(tasks::id.ne(excluded_uuid(excluding)))
                .filter(
                    tasks::position
                        .lt(before)
                        .or(tasks::position.eq(before).and(tasks::id.lt(before_id))),
                )
                .order((tasks::position.desc(), tasks::id.desc()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_all_ordered_by_position(
        &mut self,
        stage: StageId,
    ) -> PositionStoreResult<Vec<Task>> {
        self.with_connection(move |connection| select_stage_tasks(connection, stage))
            .await
    }

    async fn find_max_task_number(
        &mut self,
        project: ProjectId,
    ) -> PositionStoreResult<Option<TaskNumber>> {
        self.with_connection(move |connection| {
            let value = tasks::table
                .filter(tasks::project_id.eq(project.into_inner()))
                .select(max(tasks::task_number))
                .get_result::<Option<i64>>(connection)?;
            value.map(task_number_from_column).transpose()
        })
        .await
    }

    async fn find_max_stage_ordinal(
        &mut self,
        project: ProjectId,
    ) -> PositionStoreResult<Option<u32>> {
        self.with_connection(move |connection| {
            let value = stages::table
                .filter(stages::project_id.eq(project.into_inner()))
                .select(max(stages::ordinal))
                .get_result::<Option<i32>>(connection)?;
            value
                .map(|ordinal| u32::try_from(ordinal).map_err(PositionStoreError::persistence))
                .transpose()
        })
        .await
    }

    async fn insert_task(&mut self, task: &Task) -> PositionStoreResult<()> {
        let task_id = task.id();
        let project = task.project();
        let number = task.number();
        let stage = task.stage();
        let new_row = to_new_task_row(task)?;
        self.with_connection(move |connection| {
            diesel::insert_into(tasks::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if is_constraint(info.as_ref(), TASK_NUMBER_CONSTRAINT) =>
                    {
                        PositionStoreError::DuplicateTaskNumber { project, number }
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        PositionStoreError::DuplicateTask(task_id)
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        PositionStoreError::StageNotFound(stage)
                    }
                    _ => PositionStoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn insert_stage(&mut self, stage: &Stage) -> PositionStoreResult<()> {
        let stage_id = stage.id();
        let new_row = to_new_stage_row(stage)?;
        self.with_connection(move |connection| {
            diesel::insert_into(stages::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        PositionStoreError::DuplicateStage(stage_id)
                    }
                    _ => PositionStoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_position(&mut self, task: &Task) -> PositionStoreResult<()> {
        let task_id = task.id();
        let stage = task.stage().into_inner();
        let position = task.position().value();
        let updated_at = task.updated_at();
        self.with_connection(move |connection| {
            let updated = diesel::update(tasks::table.filter(tasks::id.eq(task_id.into_inner())))
                .set((
                    tasks::stage_id.eq(stage),
                    tasks::position.eq(position),
                    tasks::updated_at.eq(updated_at),
                ))
                .execute(connection)?;
            if updated == 0 {
                return Err(PositionStoreError::TaskNotFound(task_id));
            }
            Ok(())
        })
        .await
    }

    async fn bulk_update_positions(
        &mut self,
        stage: StageId,
        updates: &[(TaskId, Position)],
    ) -> PositionStoreResult<()> {
        let owned = updates.to_vec();
        self.with_connection(move |connection| {
            // Nested transaction: a savepoint, so a rejected row undoes the
            // rows already rewritten by this call.
            connection.transaction::<_, PositionStoreError, _>(|savepoint| {
                for (task_id, position) in owned {
                    let updated = diesel::update(
                        tasks::table
                            .filter(tasks::id.eq(task_id.into_inner()))
                            .filter(tasks::stage_id.eq(stage.into_inner())),
                    )
                    .set(tasks::position.eq(position.value()))
                    .execute(savepoint)?;
                    if updated == 0 {
                        return Err(match select_task(savepoint, task_id)? {
                            Some(_) => PositionStoreError::TaskLeftStage {
                                task: task_id,
                                stage,
                            },
                            None => PositionStoreError::TaskNotFound(task_id),
                        });
                    }
                }
                Ok(())
            })
        })
        .await
    }

    async fn commit(self) -> PositionStoreResult<()> {
        self.finish(commit_connection).await
    }

    async fn rollback(self) -> PositionStoreResult<()> {
        self.finish(rollback_connection).await
    }
}

fn excluded_uuid(excluding: Option<TaskId>) -> Uuid {
    excluding.map_or_else(Uuid::nil, TaskId::into_inner)
}

fn select_task(connection: &mut PgConnection, id: TaskId) -> PositionStoreResult<Option<Task>> {
    let row = tasks::table
        .filter(tasks::id.eq(id.into_inner()))
        .select(TaskRow::as_select())
        .first::<TaskRow>(connection)
        .optional()?;
    row.map(row_to_task).transpose()
}

fn select_stage(connection: &mut PgConnection, id: StageId) -> PositionStoreResult<Option<Stage>> {
    let row = stages::table
        .filter(stages::id.eq(id.into_inner()))
        .select(StageRow::as_select())
        .first::<StageRow>(connection)
        .optional()?;
    row.map(row_to_stage).transpose()
}

fn select_stage_tasks(
    connection: &mut PgConnection,
    stage: StageId,
) -> PositionStoreResult<Vec<Task>> {
    let rows = tasks::table
        .filter(tasks::stage_id.eq(stage.into_inner()))
        .order((tasks::position.asc(), tasks::id.asc()))
        .select(TaskRow::as_select())
        .load::<TaskRow>(connection)?;
    rows.into_iter().map(row_to_task).collect()
}

fn task_number_from_column(value: i64) -> PositionStoreResult<TaskNumber> {
    let number = u64::try_from(value).map_err(PositionStoreError::persistence)?;
    TaskNumber::new(number).map_err(PositionStoreError::persistence)
}

fn to_new_task_row(task: &Task) -> PositionStoreResult<NewTaskRow> {
    let task_number =
        i64::try_from(task.number().value()).map_err(PositionStoreError::persistence)?;
    Ok(NewTaskRow {
        id: task.id().into_inner(),
        project_id: task.project().into_inner(),
        stage_id: task.stage().into_inner(),
        position: task.position().value(),
        task_number,
        name: task.name().as_str().to_owned(),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn to_new_stage_row(stage: &Stage) -> PositionStoreResult<NewStageRow> {
    let ordinal = i32::try_from(stage.ordinal()).map_err(PositionStoreError::persistence)?;
    Ok(NewStageRow {
        id: stage.id().into_inner(),
        project_id: stage.project().into_inner(),
        name: stage.name().as_str().to_owned(),
        ordinal,
        created_at: stage.created_at(),
    })
}

fn row_to_task(row: TaskRow) -> PositionStoreResult<Task> {
    let TaskRow {
        id,
        project_id,
        stage_id,
        position,
        task_number,
        name,
        created_at,
        updated_at,
    } = row;

    let data = PersistedTaskData {
        id: TaskId::from_uuid(id),
        project: ProjectId::from_uuid(project_id),
        stage: StageId::from_uuid(stage_id),
        position: Position::new(position),
        number: task_number_from_column(task_number)?,
        name: TaskName::new(name).map_err(PositionStoreError::persistence)?,
        created_at,
        updated_at,
    };
    Ok(Task::from_persisted(data))
}

fn row_to_stage(row: StageRow) -> PositionStoreResult<Stage> {
    let data = PersistedStageData {
        id: StageId::from_uuid(row.id),
        project: ProjectId::from_uuid(row.project_id),
        name: StageName::new(row.name).map_err(PositionStoreError::persistence)?,
        ordinal: u32::try_from(row.ordinal).map_err(PositionStoreError::persistence)?,
        created_at: row.created_at,
    };
    Ok(Stage::from_persisted(data))
}

fn is_constraint(info: &dyn DatabaseErrorInformation, constraint: &str) -> bool {
    info.constraint_name().is_some_and(|name| name == constraint)
}
