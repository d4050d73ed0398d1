use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use fieldline_core::availability::CapacityCounts;
use fieldline_core::domain::installer::{Installer, InstallerId};
use fieldline_core::domain::job::{Job, JobId};
use fieldline_core::domain::quote::{Quote, QuoteId};
use fieldline_core::domain::work_order::{WorkOrder, WorkOrderId};
use fieldline_core::domain::TenantId;

pub mod installer;
pub mod job;
pub mod memory;
pub mod quote;
pub mod work_order;

pub use installer::SqlInstallerRepository;
pub use job::SqlJobRepository;
pub use memory::{
    InMemoryInstallerRepository, InMemoryJobRepository, InMemoryQuoteRepository,
    InMemoryWorkOrderRepository,
};
pub use quote::SqlQuoteRepository;
pub use work_order::SqlWorkOrderRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    /// A uniqueness guard fired on insert: the row, or the one-per-source
    /// pipeline link it enforces, already exists.
    #[error("{entity} already exists: {detail}")]
    AlreadyExists { entity: &'static str, detail: String },
    /// A version guard fired: a stale read raced a concurrent write.
    #[error("{entity} conflict: {detail}")]
    Conflict { entity: &'static str, detail: String },
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. } | Self::Conflict { .. })
    }
}

/// Quote aggregates persist wholesale: the quote row plus its full item
/// ledger, under one transaction. `update` guards on the version it read and
/// bumps it on success.
#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn insert(&self, quote: &Quote) -> Result<(), RepositoryError>;
    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &QuoteId,
    ) -> Result<Option<Quote>, RepositoryError>;
    async fn update(&self, quote: &mut Quote) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Fails with `Conflict` when a job already references the quote; the
    /// UNIQUE index on `job.quote_id` is the serialized check.
    async fn insert(&self, job: &Job) -> Result<(), RepositoryError>;
    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &JobId,
    ) -> Result<Option<Job>, RepositoryError>;
    async fn update(&self, job: &mut Job) -> Result<(), RepositoryError>;
    /// Non-terminal jobs assigned to the installer on the target day and in
    /// its business week. A snapshot read; callers treat it as advisory.
    async fn capacity_counts(
        &self,
        tenant_id: &TenantId,
        installer_id: &InstallerId,
        date: NaiveDate,
    ) -> Result<CapacityCounts, RepositoryError>;
}

#[async_trait]
pub trait WorkOrderRepository: Send + Sync {
    /// Fails with `Conflict` when a work order already references the job.
    async fn insert(&self, work_order: &WorkOrder) -> Result<(), RepositoryError>;
    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &WorkOrderId,
    ) -> Result<Option<WorkOrder>, RepositoryError>;
    async fn update(&self, work_order: &mut WorkOrder) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait InstallerRepository: Send + Sync {
    async fn insert(&self, installer: &Installer) -> Result<(), RepositoryError>;
    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &InstallerId,
    ) -> Result<Option<Installer>, RepositoryError>;
}

// ---------------------------------------------------------------------------
// Row decode helpers shared by the Sql* implementations
// ---------------------------------------------------------------------------

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    error.as_database_error().is_some_and(|db| db.is_unique_violation())
}

pub(crate) fn decimal_column(row: &SqliteRow, name: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = row.try_get(name)?;
    Decimal::from_str(&raw)
        .map_err(|error| RepositoryError::Decode(format!("column `{name}`: {error}")))
}

pub(crate) fn date_column(
    row: &SqliteRow,
    name: &str,
) -> Result<Option<NaiveDate>, RepositoryError> {
    let raw: Option<String> = row.try_get(name)?;
    raw.map(|value| {
        value
            .parse::<NaiveDate>()
            .map_err(|error| RepositoryError::Decode(format!("column `{name}`: {error}")))
    })
    .transpose()
}

pub(crate) fn time_column(
    row: &SqliteRow,
    name: &str,
) -> Result<Option<NaiveTime>, RepositoryError> {
    let raw: Option<String> = row.try_get(name)?;
    raw.map(|value| {
        value
            .parse::<NaiveTime>()
            .map_err(|error| RepositoryError::Decode(format!("column `{name}`: {error}")))
    })
    .transpose()
}

pub(crate) fn timestamp_column(
    row: &SqliteRow,
    name: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    let raw: String = row.try_get(name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("column `{name}`: {error}")))
}

pub(crate) fn json_column<T: DeserializeOwned>(
    row: &SqliteRow,
    name: &str,
) -> Result<T, RepositoryError> {
    let raw: String = row.try_get(name)?;
    serde_json::from_str(&raw)
        .map_err(|error| RepositoryError::Decode(format!("column `{name}`: {error}")))
}
