use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use fieldline_core::availability::{business_week, CapacityCounts};
use fieldline_core::domain::installer::InstallerId;
use fieldline_core::domain::job::{Job, JobId, JobStatus};
use fieldline_core::domain::quote::QuoteId;
use fieldline_core::domain::{HomeownerId, LeadId, TenantId};

use super::{date_column, time_column, timestamp_column, JobRepository, RepositoryError};
use crate::DbPool;

pub struct SqlJobRepository {
    pool: DbPool,
}

impl SqlJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqlJobRepository {
    async fn insert(&self, job: &Job) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO job \
             (id, tenant_id, quote_id, lead_id, homeowner_id, installer_id, status, \
              scheduled_date, scheduled_time_start, scheduled_time_end, project_details, \
              internal_notes, version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id.0)
        .bind(&job.tenant_id.0)
        .bind(&job.quote_id.0)
        .bind(job.lead_id.as_ref().map(|id| id.0.clone()))
        .bind(job.homeowner_id.as_ref().map(|id| id.0.clone()))
        .bind(job.installer_id.as_ref().map(|id| id.0.clone()))
        .bind(job.status.as_str())
        .bind(job.scheduled_date.map(|date| date.to_string()))
        .bind(job.scheduled_time_start.map(|time| time.to_string()))
        .bind(job.scheduled_time_end.map(|time| time.to_string()))
        .bind(job.project_details.to_string())
        .bind(&job.internal_notes)
        .bind(job.version)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if super::is_unique_violation(&error) {
                RepositoryError::AlreadyExists {
                    entity: "job",
                    detail: format!("a job already exists for quote {}", job.quote_id.0),
                }
            } else {
                error.into()
            }
        })?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &JobId,
    ) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, quote_id, lead_id, homeowner_id, installer_id, status, \
                    scheduled_date, scheduled_time_start, scheduled_time_end, project_details, \
                    internal_notes, version, created_at, updated_at \
             FROM job WHERE tenant_id = ? AND id = ?",
        )
        .bind(&tenant_id.0)
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_job).transpose()
    }

    async fn update(&self, job: &mut Job) -> Result<(), RepositoryError> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            "UPDATE job SET \
               installer_id = ?, status = ?, scheduled_date = ?, scheduled_time_start = ?, \
               scheduled_time_end = ?, project_details = ?, internal_notes = ?, \
               version = version + 1, updated_at = ? \
             WHERE tenant_id = ? AND id = ? AND version = ?",
        )
        .bind(job.installer_id.as_ref().map(|id| id.0.clone()))
        .bind(job.status.as_str())
        .bind(job.scheduled_date.map(|date| date.to_string()))
        .bind(job.scheduled_time_start.map(|time| time.to_string()))
        .bind(job.scheduled_time_end.map(|time| time.to_string()))
        .bind(job.project_details.to_string())
        .bind(&job.internal_notes)
        .bind(now.to_rfc3339())
        .bind(&job.tenant_id.0)
        .bind(&job.id.0)
        .bind(job.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict {
                entity: "job",
                detail: format!("job {} version {} is stale or missing", job.id.0, job.version),
            });
        }

        job.version += 1;
        job.updated_at = now;
        Ok(())
    }

    async fn capacity_counts(
        &self,
        tenant_id: &TenantId,
        installer_id: &InstallerId,
        date: NaiveDate,
    ) -> Result<CapacityCounts, RepositoryError> {
        let (monday, sunday) = business_week(date);

        let row = sqlx::query(
            "SELECT \
               COALESCE(SUM(CASE WHEN scheduled_date = ? THEN 1 ELSE 0 END), 0) AS jobs_today, \
               COUNT(*) AS jobs_week \
             FROM job \
             WHERE tenant_id = ? AND installer_id = ? \
               AND status NOT IN ('completed', 'cancelled') \
               AND scheduled_date BETWEEN ? AND ?",
        )
        .bind(date.to_string())
        .bind(&tenant_id.0)
        .bind(&installer_id.0)
        .bind(monday.to_string())
        .bind(sunday.to_string())
        .fetch_one(&self.pool)
        .await?;

        let jobs_today: i64 = row.try_get("jobs_today")?;
        let jobs_week: i64 = row.try_get("jobs_week")?;
        Ok(CapacityCounts {
            jobs_today: u32::try_from(jobs_today).unwrap_or(u32::MAX),
            jobs_week: u32::try_from(jobs_week).unwrap_or(u32::MAX),
        })
    }
}

fn decode_job(row: &SqliteRow) -> Result<Job, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = JobStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown job status `{status_raw}`")))?;

    let lead_id: Option<String> = row.try_get("lead_id")?;
    let homeowner_id: Option<String> = row.try_get("homeowner_id")?;
    let installer_id: Option<String> = row.try_get("installer_id")?;
    let project_details_raw: String = row.try_get("project_details")?;

    Ok(Job {
        id: JobId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        quote_id: QuoteId(row.try_get("quote_id")?),
        lead_id: lead_id.map(LeadId),
        homeowner_id: homeowner_id.map(HomeownerId),
        installer_id: installer_id.map(InstallerId),
        status,
        scheduled_date: date_column(row, "scheduled_date")?,
        scheduled_time_start: time_column(row, "scheduled_time_start")?,
        scheduled_time_end: time_column(row, "scheduled_time_end")?,
        project_details: serde_json::from_str(&project_details_raw).map_err(|error| {
            RepositoryError::Decode(format!("column `project_details`: {error}"))
        })?,
        internal_notes: row.try_get("internal_notes")?,
        version: row.try_get("version")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}
