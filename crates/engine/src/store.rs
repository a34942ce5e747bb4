//! Where run records go.
//!
//! The runner persists the whole record at start and end of a run; the
//! progress aggregator overwrites just the logs and output files while the
//! run is in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use db::models::{AutomationRunRow, RunRecord};
use db::{DbError, DbPool};

use crate::aggregator::LogEntry;
use crate::models::{AutomationRun, RunStatus};
use crate::EngineError;

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert or overwrite the full run record.
    async fn save_run(&self, run: &AutomationRun) -> Result<(), EngineError>;

    /// Overwrite the in-flight logs and output files of a run.
    async fn save_progress(
        &self,
        run_id: Uuid,
        logs: &[LogEntry],
        output_files: &[String],
    ) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// MemoryRunStore
// ---------------------------------------------------------------------------

/// Keeps run records in process memory.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<Uuid, AutomationRun>>,
    progress_saves: AtomicUsize,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, run_id: Uuid) -> Option<AutomationRun> {
        self.runs.read().get(&run_id).cloned()
    }

    /// Number of `save_progress` calls received.
    pub fn progress_saves(&self) -> usize {
        self.progress_saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save_run(&self, run: &AutomationRun) -> Result<(), EngineError> {
        self.runs.write().insert(run.id, run.clone());
        Ok(())
    }

    async fn save_progress(
        &self,
        run_id: Uuid,
        logs: &[LogEntry],
        output_files: &[String],
    ) -> Result<(), EngineError> {
        {
            let mut runs = self.runs.write();
            let run = runs.entry(run_id).or_insert_with(|| AutomationRun {
                id: run_id,
                ..AutomationRun::new(Uuid::nil())
            });
            run.logs = logs.to_vec();
            run.output_files = output_files.to_vec();
        }
        self.progress_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PgRunStore
// ---------------------------------------------------------------------------

/// Persists run records to the `automation_runs` table.
#[derive(Debug, Clone)]
pub struct PgRunStore {
    pool: DbPool,
}

impl PgRunStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Load a run back into its domain form.
    pub async fn load_run(&self, run_id: Uuid) -> Result<AutomationRun, EngineError> {
        let row = db::repository::runs::get_run(&self.pool, run_id).await?;
        Ok(row_to_run(row)?)
    }
}

fn to_json<T: serde::Serialize>(
    column: &'static str,
    value: &T,
) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(|source| DbError::Json { column, source })
}

fn run_to_record(run: &AutomationRun) -> Result<RunRecord, DbError> {
    Ok(RunRecord {
        id: run.id,
        automation_id: run.automation_id,
        status: run.status.to_string(),
        start_time: run.start_time,
        end_time: run.end_time,
        logs_json: to_json("logs_json", &run.logs)?,
        output_files_json: to_json("output_files_json", &run.output_files)?,
        error_message: run.error_message.clone(),
    })
}

fn row_to_run(row: AutomationRunRow) -> Result<AutomationRun, DbError> {
    let status: RunStatus = row
        .status
        .parse()
        .map_err(|reason| DbError::InvalidColumn {
            column: "status",
            reason,
        })?;
    Ok(AutomationRun {
        id: row.id,
        automation_id: row.automation_id,
        status,
        start_time: row.start_time,
        end_time: row.end_time,
        logs: serde_json::from_value(row.logs_json).map_err(|source| DbError::Json {
            column: "logs_json",
            source,
        })?,
        output_files: serde_json::from_value(row.output_files_json).map_err(|source| {
            DbError::Json {
                column: "output_files_json",
                source,
            }
        })?,
        error_message: row.error_message,
    })
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn save_run(&self, run: &AutomationRun) -> Result<(), EngineError> {
        let record = run_to_record(run)?;
        db::repository::runs::upsert_run(&self.pool, &record).await?;
        Ok(())
    }

    async fn save_progress(
        &self,
        run_id: Uuid,
        logs: &[LogEntry],
        output_files: &[String],
    ) -> Result<(), EngineError> {
        db::repository::runs::update_run_progress(
            &self.pool,
            run_id,
            &to_json("logs_json", &logs)?,
            &to_json("output_files_json", &output_files)?,
        )
        .await?;
        Ok(())
    }
}
