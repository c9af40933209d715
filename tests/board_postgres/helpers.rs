//! Shared helpers for `PostgreSQL` board integration tests.
//!
//! Tests run against the server named by `TASKBOARD_TEST_DATABASE_URL`. Each
//! test gets its own schema with the migrations applied, dropped again when
//! the [`PgBoard`] goes out of scope. Without the variable the tests return
//! early.

use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use eyre::WrapErr;
use mockable::DefaultClock;
use taskboard::board::{
    adapters::postgres::PostgresPositionStore,
    domain::{
        Position, ProjectId, Stage, StageId, StageName, Task, TaskId, TaskName, TaskNumber,
    },
    ports::{PositionStore, PositionTransaction},
    services::{BoardService, MoveOrchestrator},
};
use uuid::Uuid;

/// Environment variable naming the test server.
pub const DATABASE_URL_VAR: &str = "TASKBOARD_TEST_DATABASE_URL";

/// SQL creating the board tables.
pub const CREATE_BOARD_SQL: &str =
    include_str!("../../migrations/2026-10-18-000000_create_board_tables/up.sql");

/// Points every pooled connection at the test schema.
#[derive(Debug)]
struct SearchPath(String);

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for SearchPath {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!("SET search_path TO {}", self.0))
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Services wired to a `PostgreSQL` store in an isolated schema.
pub struct PgBoard {
    pub store: PostgresPositionStore,
    pub service: BoardService<PostgresPositionStore, DefaultClock>,
    pub mover: MoveOrchestrator<PostgresPositionStore, DefaultClock>,
    pub project: ProjectId,
    url: String,
    schema: String,
}

impl PgBoard {
    /// Seeds a stage holding tasks at exact `positions` in one transaction.
    pub async fn seed(
        &self,
        ordinal: u32,
        first_number: u64,
        positions: &[i64],
    ) -> (StageId, Vec<TaskId>) {
        let stage = Stage::new(
            self.project,
            StageName::new(format!("Stage {ordinal}")).expect("valid stage name"),
            ordinal,
            &DefaultClock,
        );
        let mut tx = self.store.begin().await.expect("begin should succeed");
        tx.insert_stage(&stage).await.expect("stage insert should succeed");
        let mut ids = Vec::with_capacity(positions.len());
        for (position, number) in positions.iter().zip(first_number..) {
            let task = Task::new(
                self.project,
                stage.id(),
                TaskName::new(format!("Task {number}")).expect("valid task name"),
                TaskNumber::new(number).expect("valid task number"),
                Position::new(*position),
                &DefaultClock,
            );
            tx.insert_task(&task).await.expect("task insert should succeed");
            ids.push(task.id());
        }
        tx.commit().await.expect("commit should succeed");
        (stage.id(), ids)
    }

    /// Reads a stage as `(id, position)` pairs in display order.
    pub async fn ordered(&self, stage: StageId) -> Vec<(TaskId, i64)> {
        self.store
            .find_all_ordered_by_position(stage)
            .await
            .expect("stage read should succeed")
            .iter()
            .map(|task| (task.id(), task.position().value()))
            .collect()
    }
}

impl Drop for PgBoard {
    fn drop(&mut self) {
        let Ok(mut conn) = PgConnection::establish(&self.url) else {
            return;
        };
        if let Err(err) = conn.batch_execute(&format!("DROP SCHEMA {} CASCADE", self.schema)) {
            tracing::warn!(error = %err, schema = %self.schema, "test schema cleanup failed");
        }
    }
}

/// Creates an isolated board, or `None` when no test server is configured.
///
/// # Errors
///
/// Returns an error if the schema cannot be created or migrated.
pub async fn pg_board() -> Result<Option<PgBoard>, eyre::Report> {
    let Ok(url) = std::env::var(DATABASE_URL_VAR) else {
        return Ok(None);
    };
    let schema = format!("board_test_{}", Uuid::new_v4().simple());

    let setup_url = url.clone();
    let setup_schema = schema.clone();
    let pool = tokio::task::spawn_blocking(move || -> Result<_, eyre::Report> {
        let mut conn = PgConnection::establish(&setup_url).wrap_err("connect to test server")?;
        conn.batch_execute(&format!(
            "CREATE SCHEMA {setup_schema}; SET search_path TO {setup_schema};"
        ))
        .wrap_err("create test schema")?;
        conn.batch_execute(CREATE_BOARD_SQL)
            .wrap_err("apply board migration")?;
        Pool::builder()
            .max_size(8)
            .connection_customizer(Box::new(SearchPath(setup_schema)))
            .build(ConnectionManager::<PgConnection>::new(setup_url))
            .wrap_err("build connection pool")
    })
    .await
    .wrap_err("join pool setup")??;

    let store = PostgresPositionStore::new(pool);
    let shared = Arc::new(store.clone());
    let clock = Arc::new(DefaultClock);
    Ok(Some(PgBoard {
        service: BoardService::new(Arc::clone(&shared), Arc::clone(&clock)),
        mover: MoveOrchestrator::new(shared, clock),
        store,
        project: ProjectId::new(),
        url,
        schema,
    }))
}
