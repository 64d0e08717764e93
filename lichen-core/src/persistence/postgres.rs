//! Postgres-backed collaborator adapters.
//!
//! The relational schema is owned by the storage collaborator; these
//! adapters only read and write the rows the scheduling core is entitled
//! to. Expected shapes: `scan_jobs (id uuid, context_id uuid, upload_id
//! uuid, agent text, args text, status text, created_at timestamptz,
//! updated_at timestamptz)`, `scan_job_depends (job_id uuid, depends_on
//! uuid, position int)`, and one result table per agent with `(upload_id
//! uuid, accepted bool, finding_count bigint, completed_at timestamptz)`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, ScanError};
use crate::registry::AgentRegistry;
use crate::scheduling::job::{JobRecord, JobRef, JobStatus, NewJob};
use crate::scheduling::queue::{JobQueue, QueueInstrumentation, QueueSnapshot};
use crate::scheduling::results::{ResultStore, ResultSummary};
use lichen_model::{AgentName, JobContextID, JobID, UploadID};

fn unavailable(context: &str, err: sqlx::Error) -> ScanError {
    ScanError::Unavailable(format!("{context}: {err}"))
}

fn parse_status(status: &str) -> Result<JobStatus> {
    match status {
        "queued" => Ok(JobStatus::Queued),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(ScanError::Internal(format!(
            "queue returned unknown status value {other}"
        ))),
    }
}

/// Result-table identifiers are interpolated into query text, so they are
/// restricted to the same alphabet agent names use.
fn checked_table_ident(table: &str) -> Result<&str> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(table)
    } else {
        Err(ScanError::Configuration(format!(
            "result table identifier {table:?} is not a safe SQL identifier"
        )))
    }
}

/// Durable job queue backed by Postgres.
#[derive(Clone)]
pub struct PostgresJobQueue {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresJobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresJobQueue")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresJobQueue {
    /// Create the adapter and verify database health.
    pub async fn new(pool: PgPool) -> Result<Self> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| unavailable("job queue failed Postgres health check", e))?;
        info!("job queue connected to Postgres");
        Ok(Self { pool })
    }

    fn decode_job(row: &PgRow, prerequisites: Vec<JobID>) -> Result<JobRecord> {
        let status: String = row.try_get("status").map_err(|e| unavailable("job decode", e))?;
        Ok(JobRecord {
            id: JobID(row.try_get::<Uuid, _>("id").map_err(|e| unavailable("job decode", e))?),
            context: JobContextID(
                row.try_get::<Uuid, _>("context_id")
                    .map_err(|e| unavailable("job decode", e))?,
            ),
            upload: UploadID(
                row.try_get::<Uuid, _>("upload_id")
                    .map_err(|e| unavailable("job decode", e))?,
            ),
            agent: AgentName::from(
                row.try_get::<String, _>("agent")
                    .map_err(|e| unavailable("job decode", e))?,
            ),
            prerequisites,
            args: row.try_get("args").map_err(|e| unavailable("job decode", e))?,
            status: parse_status(&status)?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| unavailable("job decode", e))?,
            updated_at: row
                .try_get::<DateTime<Utc>, _>("updated_at")
                .map_err(|e| unavailable("job decode", e))?,
        })
    }

    async fn prerequisites_of(&self, id: JobID) -> Result<Vec<JobID>> {
        let rows = sqlx::query(
            "SELECT depends_on FROM scan_job_depends WHERE job_id = $1 ORDER BY position",
        )
        .bind(id.to_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable("dependency edge lookup failed", e))?;
        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("depends_on")
                    .map(JobID)
                    .map_err(|e| unavailable("dependency edge decode", e))
            })
            .collect()
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn find_active_job(
        &self,
        context: JobContextID,
        upload: UploadID,
        agent: &AgentName,
    ) -> Result<Option<JobRef>> {
        let row = sqlx::query(
            r#"
            SELECT id, agent
            FROM scan_jobs
            WHERE context_id = $1
              AND upload_id = $2
              AND agent = $3
              AND status IN ('queued', 'running')
            LIMIT 1
            "#,
        )
        .bind(context.to_uuid())
        .bind(upload.to_uuid())
        .bind(agent.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable("active job lookup failed", e))?;

        row.map(|row| {
            Ok(JobRef {
                id: JobID(row.try_get::<Uuid, _>("id").map_err(|e| unavailable("job decode", e))?),
                agent: AgentName::from(
                    row.try_get::<String, _>("agent")
                        .map_err(|e| unavailable("job decode", e))?,
                ),
            })
        })
        .transpose()
    }

    async fn create_job(&self, spec: NewJob) -> Result<JobRef> {
        let record = JobRecord::new(spec);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| unavailable("job insert begin failed", e))?;

        sqlx::query(
            r#"
            INSERT INTO scan_jobs
                (id, context_id, upload_id, agent, args, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.to_uuid())
        .bind(record.context.to_uuid())
        .bind(record.upload.to_uuid())
        .bind(record.agent.as_str())
        .bind(record.args.as_deref())
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unavailable("job insert failed", e))?;

        for (position, edge) in record.prerequisites.iter().enumerate() {
            sqlx::query(
                "INSERT INTO scan_job_depends (job_id, depends_on, position) VALUES ($1, $2, $3)",
            )
            .bind(record.id.to_uuid())
            .bind(edge.to_uuid())
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| unavailable("dependency edge insert failed", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| unavailable("job insert commit failed", e))?;

        Ok(record.reference())
    }

    async fn job(&self, id: JobID) -> Result<Option<JobRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, context_id, upload_id, agent, args, status, created_at, updated_at
            FROM scan_jobs
            WHERE id = $1
            "#,
        )
        .bind(id.to_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable("job lookup failed", e))?;

        match row {
            Some(row) => {
                let prerequisites = self.prerequisites_of(id).await?;
                Ok(Some(Self::decode_job(&row, prerequisites)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl QueueInstrumentation for PostgresJobQueue {
    async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS jobs FROM scan_jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| unavailable("queue snapshot failed", e))?;

        let mut snapshot = QueueSnapshot::new(Utc::now());
        for row in rows {
            let status: String = row.try_get("status").map_err(|e| unavailable("snapshot decode", e))?;
            let jobs: i64 = row.try_get("jobs").map_err(|e| unavailable("snapshot decode", e))?;
            snapshot
                .by_status
                .insert(parse_status(&status)?, jobs.max(0) as usize);
        }
        Ok(snapshot)
    }
}

/// Read-only view over the per-agent analysis result tables.
#[derive(Clone)]
pub struct PostgresResultStore {
    pool: PgPool,
    registry: Arc<AgentRegistry>,
}

impl std::fmt::Debug for PostgresResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresResultStore")
            .field("pool_size", &self.pool.size())
            .field("agents", &self.registry.len())
            .finish()
    }
}

impl PostgresResultStore {
    pub fn new(pool: PgPool, registry: Arc<AgentRegistry>) -> Self {
        Self { pool, registry }
    }

    fn result_table(&self, agent: &AgentName) -> Result<String> {
        let descriptor = self.registry.require(agent)?;
        checked_table_ident(&descriptor.result_table).map(str::to_owned)
    }
}

#[async_trait]
impl ResultStore for PostgresResultStore {
    async fn has_accepted_results(&self, upload: UploadID, agent: &AgentName) -> Result<bool> {
        let table = self.result_table(agent)?;
        let query = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE upload_id = $1 AND accepted)");
        sqlx::query_scalar::<_, bool>(&query)
            .bind(upload.to_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unavailable("accepted result lookup failed", e))
    }

    async fn result_summary(
        &self,
        upload: UploadID,
        agent: &AgentName,
    ) -> Result<Option<ResultSummary>> {
        let table = self.result_table(agent)?;
        let query = format!(
            "SELECT accepted, finding_count, completed_at FROM {table} \
             WHERE upload_id = $1 ORDER BY completed_at DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(upload.to_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unavailable("result summary lookup failed", e))?;

        row.map(|row| {
            Ok(ResultSummary {
                upload,
                agent: agent.clone(),
                accepted: row.try_get("accepted").map_err(|e| unavailable("summary decode", e))?,
                finding_count: row
                    .try_get::<i64, _>("finding_count")
                    .map_err(|e| unavailable("summary decode", e))?
                    .max(0) as u64,
                completed_at: row
                    .try_get("completed_at")
                    .map_err(|e| unavailable("summary decode", e))?,
            })
        })
        .transpose()
    }
}
