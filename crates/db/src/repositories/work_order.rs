use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use fieldline_core::domain::installer::InstallerId;
use fieldline_core::domain::job::JobId;
use fieldline_core::domain::work_order::{WorkOrder, WorkOrderId, WorkOrderStatus};
use fieldline_core::domain::TenantId;

use super::{
    date_column, json_column, time_column, timestamp_column, RepositoryError, WorkOrderRepository,
};
use crate::DbPool;

pub struct SqlWorkOrderRepository {
    pool: DbPool,
}

impl SqlWorkOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|error| RepositoryError::Decode(format!("snapshot encode: {error}")))
}

#[async_trait]
impl WorkOrderRepository for SqlWorkOrderRepository {
    async fn insert(&self, work_order: &WorkOrder) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO work_order \
             (id, tenant_id, job_id, installer_id, status, scheduled_date, \
              scheduled_time_start, scheduled_time_end, homeowner_info, installer_info, \
              materials_snapshot, labor_instructions, special_instructions, internal_notes, \
              version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&work_order.id.0)
        .bind(&work_order.tenant_id.0)
        .bind(&work_order.job_id.0)
        .bind(work_order.installer_id.as_ref().map(|id| id.0.clone()))
        .bind(work_order.status.as_str())
        .bind(work_order.scheduled_date.map(|date| date.to_string()))
        .bind(work_order.scheduled_time_start.map(|time| time.to_string()))
        .bind(work_order.scheduled_time_end.map(|time| time.to_string()))
        .bind(encode_json(&work_order.homeowner_info)?)
        .bind(encode_json(&work_order.installer_info)?)
        .bind(encode_json(&work_order.materials_snapshot)?)
        .bind(encode_json(&work_order.labor_instructions)?)
        .bind(&work_order.special_instructions)
        .bind(&work_order.internal_notes)
        .bind(work_order.version)
        .bind(work_order.created_at.to_rfc3339())
        .bind(work_order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if super::is_unique_violation(&error) {
                RepositoryError::AlreadyExists {
                    entity: "work_order",
                    detail: format!(
                        "a work order already exists for job {}",
                        work_order.job_id.0
                    ),
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
        id: &WorkOrderId,
    ) -> Result<Option<WorkOrder>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, job_id, installer_id, status, scheduled_date, \
                    scheduled_time_start, scheduled_time_end, homeowner_info, installer_info, \
                    materials_snapshot, labor_instructions, special_instructions, \
                    internal_notes, version, created_at, updated_at \
             FROM work_order WHERE tenant_id = ? AND id = ?",
        )
        .bind(&tenant_id.0)
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_work_order).transpose()
    }

    /// Snapshot columns are write-once: only the status (and notes) may move
    /// after generation.
    async fn update(&self, work_order: &mut WorkOrder) -> Result<(), RepositoryError> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            "UPDATE work_order SET \
               status = ?, special_instructions = ?, internal_notes = ?, \
               version = version + 1, updated_at = ? \
             WHERE tenant_id = ? AND id = ? AND version = ?",
        )
        .bind(work_order.status.as_str())
        .bind(&work_order.special_instructions)
        .bind(&work_order.internal_notes)
        .bind(now.to_rfc3339())
        .bind(&work_order.tenant_id.0)
        .bind(&work_order.id.0)
        .bind(work_order.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict {
                entity: "work_order",
                detail: format!(
                    "work order {} version {} is stale or missing",
                    work_order.id.0, work_order.version
                ),
            });
        }

        work_order.version += 1;
        work_order.updated_at = now;
        Ok(())
    }
}

fn decode_work_order(row: &SqliteRow) -> Result<WorkOrder, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = WorkOrderStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown work order status `{status_raw}`"))
    })?;

    let installer_id: Option<String> = row.try_get("installer_id")?;

    Ok(WorkOrder {
        id: WorkOrderId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        job_id: JobId(row.try_get("job_id")?),
        installer_id: installer_id.map(InstallerId),
        status,
        scheduled_date: date_column(row, "scheduled_date")?,
        scheduled_time_start: time_column(row, "scheduled_time_start")?,
        scheduled_time_end: time_column(row, "scheduled_time_end")?,
        homeowner_info: json_column(row, "homeowner_info")?,
        installer_info: json_column(row, "installer_info")?,
        materials_snapshot: json_column(row, "materials_snapshot")?,
        labor_instructions: json_column(row, "labor_instructions")?,
        special_instructions: row.try_get("special_instructions")?,
        internal_notes: row.try_get("internal_notes")?,
        version: row.try_get("version")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}
