//! In-memory repositories mirroring the Sql* semantics, including the
//! uniqueness and version-guard conflicts, for tests that do not want a pool.

use std::collections::HashMap;

use chrono::NaiveDate;
use tokio::sync::RwLock;

use fieldline_core::availability::{business_week, CapacityCounts};
use fieldline_core::domain::installer::{Installer, InstallerId};
use fieldline_core::domain::job::{Job, JobId};
use fieldline_core::domain::quote::{Quote, QuoteId};
use fieldline_core::domain::work_order::{WorkOrder, WorkOrderId};
use fieldline_core::domain::TenantId;

use super::{
    InstallerRepository, JobRepository, QuoteRepository, RepositoryError, WorkOrderRepository,
};

fn scoped<'a, T>(
    entries: &'a HashMap<String, T>,
    tenant_id: &TenantId,
    key: &str,
    tenant_of: impl Fn(&T) -> &TenantId,
) -> Option<&'a T> {
    entries.get(key).filter(|entry| tenant_of(entry) == tenant_id)
}

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<HashMap<String, Quote>>,
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn insert(&self, quote: &Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        if quotes.contains_key(&quote.id.0) {
            return Err(RepositoryError::AlreadyExists {
                entity: "quote",
                detail: format!("quote {} already exists", quote.id.0),
            });
        }
        quotes.insert(quote.id.0.clone(), quote.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &QuoteId,
    ) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(scoped(&quotes, tenant_id, &id.0, |quote| &quote.tenant_id).cloned())
    }

    async fn update(&self, quote: &mut Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let stored = quotes
            .get(&quote.id.0)
            .filter(|stored| stored.tenant_id == quote.tenant_id)
            .ok_or_else(|| RepositoryError::Conflict {
                entity: "quote",
                detail: format!("quote {} version {} is stale or missing", quote.id.0, quote.version),
            })?;
        if stored.version != quote.version {
            return Err(RepositoryError::Conflict {
                entity: "quote",
                detail: format!("quote {} version {} is stale or missing", quote.id.0, quote.version),
            });
        }
        quote.version += 1;
        quote.updated_at = chrono::Utc::now();
        quotes.insert(quote.id.0.clone(), quote.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<String, Job>>,
}

#[async_trait::async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn insert(&self, job: &Job) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.values().any(|existing| existing.quote_id == job.quote_id) {
            return Err(RepositoryError::AlreadyExists {
                entity: "job",
                detail: format!("a job already exists for quote {}", job.quote_id.0),
            });
        }
        jobs.insert(job.id.0.clone(), job.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &JobId,
    ) -> Result<Option<Job>, RepositoryError> {
        let jobs = self.jobs.read().await;
        Ok(scoped(&jobs, tenant_id, &id.0, |job| &job.tenant_id).cloned())
    }

    async fn update(&self, job: &mut Job) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let stored = jobs
            .get(&job.id.0)
            .filter(|stored| stored.tenant_id == job.tenant_id)
            .ok_or_else(|| RepositoryError::Conflict {
                entity: "job",
                detail: format!("job {} version {} is stale or missing", job.id.0, job.version),
            })?;
        if stored.version != job.version {
            return Err(RepositoryError::Conflict {
                entity: "job",
                detail: format!("job {} version {} is stale or missing", job.id.0, job.version),
            });
        }
        job.version += 1;
        job.updated_at = chrono::Utc::now();
        jobs.insert(job.id.0.clone(), job.clone());
        Ok(())
    }

    async fn capacity_counts(
        &self,
        tenant_id: &TenantId,
        installer_id: &InstallerId,
        date: NaiveDate,
    ) -> Result<CapacityCounts, RepositoryError> {
        let (monday, sunday) = business_week(date);
        let jobs = self.jobs.read().await;

        let mut counts = CapacityCounts::default();
        for job in jobs.values() {
            if &job.tenant_id != tenant_id
                || job.installer_id.as_ref() != Some(installer_id)
                || job.status.is_terminal()
            {
                continue;
            }
            let Some(scheduled) = job.scheduled_date else {
                continue;
            };
            if scheduled >= monday && scheduled <= sunday {
                counts.jobs_week += 1;
                if scheduled == date {
                    counts.jobs_today += 1;
                }
            }
        }

        Ok(counts)
    }
}

#[derive(Default)]
pub struct InMemoryWorkOrderRepository {
    work_orders: RwLock<HashMap<String, WorkOrder>>,
}

#[async_trait::async_trait]
impl WorkOrderRepository for InMemoryWorkOrderRepository {
    async fn insert(&self, work_order: &WorkOrder) -> Result<(), RepositoryError> {
        let mut work_orders = self.work_orders.write().await;
        if work_orders.values().any(|existing| existing.job_id == work_order.job_id) {
            return Err(RepositoryError::AlreadyExists {
                entity: "work_order",
                detail: format!("a work order already exists for job {}", work_order.job_id.0),
            });
        }
        work_orders.insert(work_order.id.0.clone(), work_order.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &WorkOrderId,
    ) -> Result<Option<WorkOrder>, RepositoryError> {
        let work_orders = self.work_orders.read().await;
        Ok(scoped(&work_orders, tenant_id, &id.0, |order| &order.tenant_id).cloned())
    }

    async fn update(&self, work_order: &mut WorkOrder) -> Result<(), RepositoryError> {
        let mut work_orders = self.work_orders.write().await;
        let stored = work_orders
            .get(&work_order.id.0)
            .filter(|stored| stored.tenant_id == work_order.tenant_id)
            .ok_or_else(|| RepositoryError::Conflict {
                entity: "work_order",
                detail: format!(
                    "work order {} version {} is stale or missing",
                    work_order.id.0, work_order.version
                ),
            })?;
        if stored.version != work_order.version {
            return Err(RepositoryError::Conflict {
                entity: "work_order",
                detail: format!(
                    "work order {} version {} is stale or missing",
                    work_order.id.0, work_order.version
                ),
            });
        }
        work_order.version += 1;
        work_order.updated_at = chrono::Utc::now();
        work_orders.insert(work_order.id.0.clone(), work_order.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryInstallerRepository {
    installers: RwLock<HashMap<String, Installer>>,
}

#[async_trait::async_trait]
impl InstallerRepository for InMemoryInstallerRepository {
    async fn insert(&self, installer: &Installer) -> Result<(), RepositoryError> {
        let mut installers = self.installers.write().await;
        if installers.contains_key(&installer.id.0) {
            return Err(RepositoryError::AlreadyExists {
                entity: "installer",
                detail: format!("installer {} already exists", installer.id.0),
            });
        }
        installers.insert(installer.id.0.clone(), installer.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &InstallerId,
    ) -> Result<Option<Installer>, RepositoryError> {
        let installers = self.installers.read().await;
        Ok(scoped(&installers, tenant_id, &id.0, |installer| &installer.tenant_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use fieldline_core::domain::installer::InstallerId;
    use fieldline_core::domain::job::{Job, JobId, JobStatus};
    use fieldline_core::domain::quote::{Quote, QuoteId};
    use fieldline_core::domain::TenantId;

    use super::{InMemoryJobRepository, InMemoryQuoteRepository};
    use crate::repositories::{JobRepository, QuoteRepository};

    fn tenant() -> TenantId {
        TenantId("tn-1".into())
    }

    fn job(id: &str, quote: &str, installer: Option<&str>, date: Option<NaiveDate>) -> Job {
        let now = Utc::now();
        Job {
            id: JobId(id.into()),
            tenant_id: tenant(),
            quote_id: QuoteId(quote.into()),
            lead_id: None,
            homeowner_id: None,
            installer_id: installer.map(|value| InstallerId(value.into())),
            status: JobStatus::Scheduled,
            scheduled_date: date,
            scheduled_time_start: None,
            scheduled_time_end: None,
            project_details: serde_json::json!({}),
            internal_notes: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_quote_promotion_conflicts() {
        let repo = InMemoryJobRepository::default();
        repo.insert(&job("jb-1", "qt-1", None, None)).await.expect("first insert");
        let error = repo.insert(&job("jb-2", "qt-1", None, None)).await.expect_err("duplicate");
        assert!(error.is_conflict());
    }

    #[tokio::test]
    async fn stale_version_update_conflicts() {
        let repo = InMemoryQuoteRepository::default();
        let quote = Quote::new(QuoteId("qt-1".into()), tenant(), Decimal::ZERO).expect("quote");
        repo.insert(&quote).await.expect("insert");

        let mut first = repo.find_by_id(&tenant(), &quote.id).await.expect("find").expect("some");
        let mut second = first.clone();
        repo.update(&mut first).await.expect("first writer wins");
        let error = repo.update(&mut second).await.expect_err("second writer is stale");
        assert!(error.is_conflict());
    }

    #[tokio::test]
    async fn capacity_counts_respect_day_and_week_windows() {
        let repo = InMemoryJobRepository::default();
        let wednesday = NaiveDate::from_ymd_opt(2026, 8, 26).expect("valid date");
        let monday = NaiveDate::from_ymd_opt(2026, 8, 24).expect("valid date");
        let next_monday = NaiveDate::from_ymd_opt(2026, 8, 31).expect("valid date");

        repo.insert(&job("jb-1", "qt-1", Some("in-1"), Some(wednesday))).await.expect("insert");
        repo.insert(&job("jb-2", "qt-2", Some("in-1"), Some(monday))).await.expect("insert");
        repo.insert(&job("jb-3", "qt-3", Some("in-1"), Some(next_monday))).await.expect("insert");
        repo.insert(&job("jb-4", "qt-4", Some("in-2"), Some(wednesday))).await.expect("insert");

        let counts = repo
            .capacity_counts(&tenant(), &InstallerId("in-1".into()), wednesday)
            .await
            .expect("counts");
        assert_eq!(counts.jobs_today, 1);
        assert_eq!(counts.jobs_week, 2, "next week's job is outside the window");
    }
}
