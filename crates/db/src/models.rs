//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models; they carry no domain behaviour.
//! Domain types live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// automation_runs
// ---------------------------------------------------------------------------

/// A persisted automation run row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AutomationRunRow {
    pub id: Uuid,
    pub automation_id: Uuid,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// JSON array of log entries.
    pub logs_json: serde_json::Value,
    /// JSON array of output file URLs.
    pub output_files_json: serde_json::Value,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values written by [`upsert_run`](crate::repository::runs::upsert_run).
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: Uuid,
    pub automation_id: Uuid,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub logs_json: serde_json::Value,
    pub output_files_json: serde_json::Value,
    pub error_message: String,
}
