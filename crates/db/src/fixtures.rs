use serde_json::Value;
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Canonical seed scenarios, one per pipeline stage.
const SEED_SCENARIOS: &[SeedScenario] = &[
    SeedScenario {
        stage: "draft",
        quote_id: "seed-quote-draft",
        quote_status: "draft",
        expected_line_count: 2,
        expected_labor_count: 1,
        expected_total: "583.20",
        job_id: None,
        job_status: None,
        work_order_id: None,
        work_order_status: None,
        description: "Draft quote with an open ledger",
    },
    SeedScenario {
        stage: "scheduled",
        quote_id: "seed-quote-approved",
        quote_status: "approved",
        expected_line_count: 1,
        expected_labor_count: 1,
        expected_total: "1166.00",
        job_id: Some("seed-job-scheduled"),
        job_status: Some("scheduled"),
        work_order_id: None,
        work_order_status: None,
        description: "Approved quote promoted to a scheduled job",
    },
    SeedScenario {
        stage: "dispatched",
        quote_id: "seed-quote-dispatched",
        quote_status: "approved",
        expected_line_count: 2,
        expected_labor_count: 1,
        expected_total: "472.50",
        job_id: Some("seed-job-dispatched"),
        job_status: Some("in_progress"),
        work_order_id: Some("seed-wo-dispatched"),
        work_order_status: Some("sent"),
        description: "Full pipeline ending in a sent work order",
    },
];

const SEED_TENANT: &str = "seed-tenant";

const SEED_INSTALLER_IDS: &[&str] = &["seed-installer-001", "seed-installer-002"];

const SEED_QUOTE_IDS: &[&str] =
    &["seed-quote-draft", "seed-quote-approved", "seed-quote-dispatched"];

const SEED_JOB_IDS: &[&str] = &["seed-job-scheduled", "seed-job-dispatched"];

const SEED_WORK_ORDER_IDS: &[&str] = &["seed-wo-dispatched"];

/// Deterministic pipeline seed dataset.
///
/// Seeds one quote per pipeline stage (draft, promoted to job, dispatched as
/// work order) plus an active and an inactive installer, so local runs and
/// end-to-end tests start from the same state.
pub struct SeedDataset;

impl SeedDataset {
    /// SQL fixture content for the pipeline seed data.
    pub const SQL: &str = include_str!("../../../config/fixtures/pipeline_seed_data.sql");

    /// Load the seed dataset into the database. Reloading is idempotent.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let scenarios_seeded = SEED_SCENARIOS
            .iter()
            .map(|scenario| ScenarioSeedInfo {
                stage: scenario.stage,
                quote_id: scenario.quote_id,
                description: scenario.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { tenant_id: SEED_TENANT, scenarios_seeded })
    }

    /// Verify that the seeded rows exist and match the scenario contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let quoted_installers = sql_array_from_ids(SEED_INSTALLER_IDS);
        let installer_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM installer WHERE tenant_id = ?1 AND id IN {quoted_installers}"
        ))
        .bind(SEED_TENANT)
        .fetch_one(pool)
        .await?;
        checks.push(("installers", installer_count == SEED_INSTALLER_IDS.len() as i64));

        for scenario in SEED_SCENARIOS {
            let quote_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM quote WHERE id = ?1 AND tenant_id = ?2 AND status = ?3 AND total_price = ?4)",
            )
            .bind(scenario.quote_id)
            .bind(SEED_TENANT)
            .bind(scenario.quote_status)
            .bind(scenario.expected_total)
            .fetch_one(pool)
            .await?;
            checks.push((scenario.quote_label(), quote_ok == 1));

            let line_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM quote_line_item WHERE quote_id = ?1")
                    .bind(scenario.quote_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((scenario.line_count_label(), line_count == scenario.expected_line_count));

            let labor_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM quote_labor_item WHERE quote_id = ?1")
                    .bind(scenario.quote_id)
                    .fetch_one(pool)
                    .await?;
            checks
                .push((scenario.labor_count_label(), labor_count == scenario.expected_labor_count));

            if let (Some(job_id), Some(job_status)) = (scenario.job_id, scenario.job_status) {
                let job_ok: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM job WHERE id = ?1 AND quote_id = ?2 AND status = ?3)",
                )
                .bind(job_id)
                .bind(scenario.quote_id)
                .bind(job_status)
                .fetch_one(pool)
                .await?;
                checks.push((scenario.job_label(), job_ok == 1));
            }

            if let (Some(work_order_id), Some(work_order_status)) =
                (scenario.work_order_id, scenario.work_order_status)
            {
                checks.push((
                    scenario.work_order_label(),
                    Self::verify_work_order(pool, scenario, work_order_id, work_order_status)
                        .await?,
                ));
            }
        }

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    async fn verify_work_order(
        pool: &DbPool,
        scenario: &SeedScenario,
        work_order_id: &str,
        expected_status: &str,
    ) -> Result<bool, RepositoryError> {
        let Some(job_id) = scenario.job_id else {
            return Ok(false);
        };

        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT status, materials_snapshot FROM work_order WHERE id = ?1 AND job_id = ?2",
        )
        .bind(work_order_id)
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
        let Some((status, materials_snapshot)) = row else {
            return Ok(false);
        };
        if status != expected_status {
            return Ok(false);
        }

        // The snapshot must be a non-empty JSON array of material lines.
        let materials: Value = serde_json::from_str(&materials_snapshot)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        Ok(materials.as_array().is_some_and(|lines| !lines.is_empty()))
    }

    /// Remove the seeded fixtures from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_work_orders = sql_array_from_ids(SEED_WORK_ORDER_IDS);
        let quoted_jobs = sql_array_from_ids(SEED_JOB_IDS);
        let quoted_quotes = sql_array_from_ids(SEED_QUOTE_IDS);
        let quoted_installers = sql_array_from_ids(SEED_INSTALLER_IDS);

        sqlx::query(&format!("DELETE FROM work_order WHERE id IN {quoted_work_orders}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM job WHERE id IN {quoted_jobs}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM quote_line_item WHERE quote_id IN {quoted_quotes}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM quote_labor_item WHERE quote_id IN {quoted_quotes}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM quote WHERE id IN {quoted_quotes}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM installer WHERE id IN {quoted_installers}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedScenario {
    stage: &'static str,
    quote_id: &'static str,
    quote_status: &'static str,
    expected_line_count: i64,
    expected_labor_count: i64,
    expected_total: &'static str,
    job_id: Option<&'static str>,
    job_status: Option<&'static str>,
    work_order_id: Option<&'static str>,
    work_order_status: Option<&'static str>,
    description: &'static str,
}

impl SeedScenario {
    fn quote_label(&self) -> &'static str {
        match self.stage {
            "draft" => "draft-quote",
            "scheduled" => "scheduled-quote",
            _ => "dispatched-quote",
        }
    }

    fn line_count_label(&self) -> &'static str {
        match self.stage {
            "draft" => "draft-line-count",
            "scheduled" => "scheduled-line-count",
            _ => "dispatched-line-count",
        }
    }

    fn labor_count_label(&self) -> &'static str {
        match self.stage {
            "draft" => "draft-labor-count",
            "scheduled" => "scheduled-labor-count",
            _ => "dispatched-labor-count",
        }
    }

    fn job_label(&self) -> &'static str {
        match self.stage {
            "scheduled" => "scheduled-job",
            _ => "dispatched-job",
        }
    }

    fn work_order_label(&self) -> &'static str {
        "dispatched-work-order"
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub tenant_id: &'static str,
    pub scenarios_seeded: Vec<ScenarioSeedInfo>,
}

#[derive(Debug)]
pub struct ScenarioSeedInfo {
    pub stage: &'static str,
    pub quote_id: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
