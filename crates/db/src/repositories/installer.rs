use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use fieldline_core::domain::installer::{Installer, InstallerId, InstallerStatus};
use fieldline_core::domain::TenantId;

use super::{InstallerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlInstallerRepository {
    pool: DbPool,
}

impl SqlInstallerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstallerRepository for SqlInstallerRepository {
    async fn insert(&self, installer: &Installer) -> Result<(), RepositoryError> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO installer \
             (id, tenant_id, name, status, phone, email, max_jobs_per_day, max_jobs_per_week, \
              created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&installer.id.0)
        .bind(&installer.tenant_id.0)
        .bind(&installer.name)
        .bind(installer.status.as_str())
        .bind(&installer.phone)
        .bind(&installer.email)
        .bind(i64::from(installer.max_jobs_per_day))
        .bind(i64::from(installer.max_jobs_per_week))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if super::is_unique_violation(&error) {
                RepositoryError::AlreadyExists {
                    entity: "installer",
                    detail: format!("installer {} already exists", installer.id.0),
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
        id: &InstallerId,
    ) -> Result<Option<Installer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, status, phone, email, max_jobs_per_day, \
                    max_jobs_per_week \
             FROM installer WHERE tenant_id = ? AND id = ?",
        )
        .bind(&tenant_id.0)
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_installer).transpose()
    }
}

fn decode_installer(row: &SqliteRow) -> Result<Installer, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = InstallerStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown installer status `{status_raw}`"))
    })?;

    let max_jobs_per_day: i64 = row.try_get("max_jobs_per_day")?;
    let max_jobs_per_week: i64 = row.try_get("max_jobs_per_week")?;

    Ok(Installer {
        id: InstallerId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        name: row.try_get("name")?,
        status,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        max_jobs_per_day: u32::try_from(max_jobs_per_day)
            .map_err(|_| RepositoryError::Decode("max_jobs_per_day out of range".into()))?,
        max_jobs_per_week: u32::try_from(max_jobs_per_week)
            .map_err(|_| RepositoryError::Decode("max_jobs_per_week out of range".into()))?,
    })
}
