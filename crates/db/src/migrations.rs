use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Whether the pipeline schema has been applied to the connected database.
pub async fn schema_ready(pool: &DbPool) -> Result<bool, sqlx::Error> {
    let quote_table: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'quote'")
            .fetch_optional(pool)
            .await?;
    Ok(quote_table.is_some())
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "installer",
        "quote",
        "quote_line_item",
        "quote_labor_item",
        "job",
        "work_order",
        "idx_installer_tenant_status",
        "idx_quote_tenant_status",
        "idx_job_tenant_status",
        "idx_job_installer_date",
        "idx_work_order_tenant_status",
    ];

    #[tokio::test]
    async fn migrations_create_the_pipeline_schema() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        run_pending(&pool).await.expect("migrations should apply");

        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'index') \
             AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%'",
        )
        .fetch_all(&pool)
        .await
        .expect("schema listing should succeed");

        let names: Vec<String> =
            rows.iter().map(|row| row.get::<String, _>("name")).collect();
        for object in MANAGED_SCHEMA_OBJECTS {
            assert!(names.iter().any(|name| name == object), "missing schema object {object}");
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run is a no-op");
        pool.close().await;
    }
}
