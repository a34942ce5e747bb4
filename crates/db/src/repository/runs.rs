//! `automation_runs` repository functions.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{AutomationRunRow, RunRecord},
    DbError,
};

const RUN_COLUMNS: &str = "id, automation_id, status, start_time, end_time, logs_json, \
                           output_files_json, error_message, created_at, updated_at";

/// Insert the run, or overwrite every mutable column if it already exists.
pub async fn upsert_run(pool: &PgPool, run: &RunRecord) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO automation_runs
            (id, automation_id, status, start_time, end_time,
             logs_json, output_files_json, error_message)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE SET
            status            = EXCLUDED.status,
            start_time        = EXCLUDED.start_time,
            end_time          = EXCLUDED.end_time,
            logs_json         = EXCLUDED.logs_json,
            output_files_json = EXCLUDED.output_files_json,
            error_message     = EXCLUDED.error_message,
            updated_at        = now()
        "#,
    )
    .bind(run.id)
    .bind(run.automation_id)
    .bind(&run.status)
    .bind(run.start_time)
    .bind(run.end_time)
    .bind(&run.logs_json)
    .bind(&run.output_files_json)
    .bind(&run.error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Replace the progress columns of an existing run.
///
/// # Errors
/// [`DbError::NotFound`] when no row has `run_id`.
pub async fn update_run_progress(
    pool: &PgPool,
    run_id: Uuid,
    logs_json: &serde_json::Value,
    output_files_json: &serde_json::Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE automation_runs
        SET logs_json = $1, output_files_json = $2, updated_at = now()
        WHERE id = $3
        "#,
    )
    .bind(logs_json)
    .bind(output_files_json)
    .bind(run_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Fetch one run by id.
pub async fn get_run(pool: &PgPool, run_id: Uuid) -> Result<AutomationRunRow, DbError> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM automation_runs WHERE id = $1");
    sqlx::query_as::<_, AutomationRunRow>(&sql)
        .bind(run_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}
