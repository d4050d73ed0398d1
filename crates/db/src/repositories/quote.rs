use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use fieldline_core::domain::quote::{
    LaborItem, LineItem, LineItemKind, Quote, QuoteId, QuoteStatus,
};
use fieldline_core::domain::installer::InstallerId;
use fieldline_core::domain::{HomeownerId, LeadId, TenantId};
use fieldline_core::pricing::QuoteTotals;

use super::{
    date_column, decimal_column, timestamp_column, QuoteRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn write_items(
        tx: &mut Transaction<'_, Sqlite>,
        quote: &Quote,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM quote_line_item WHERE quote_id = ?")
            .bind(&quote.id.0)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM quote_labor_item WHERE quote_id = ?")
            .bind(&quote.id.0)
            .execute(&mut **tx)
            .await?;

        for (position, item) in quote.line_items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO quote_line_item \
                 (quote_id, position, kind, description, product_ref, style, color, finish, \
                  quantity, unit, unit_price, total) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&quote.id.0)
            .bind(position as i64)
            .bind(item.kind.as_str())
            .bind(&item.description)
            .bind(&item.product_ref)
            .bind(&item.style)
            .bind(&item.color)
            .bind(&item.finish)
            .bind(item.quantity.to_string())
            .bind(&item.unit)
            .bind(item.unit_price.to_string())
            .bind(item.total.to_string())
            .execute(&mut **tx)
            .await?;
        }

        for (position, item) in quote.labor_items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO quote_labor_item \
                 (quote_id, position, description, hours, hourly_rate, installer_id, \
                  installer_name, total) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&quote.id.0)
            .bind(position as i64)
            .bind(&item.description)
            .bind(item.hours.to_string())
            .bind(item.hourly_rate.to_string())
            .bind(item.installer_id.as_ref().map(|id| id.0.clone()))
            .bind(&item.installer_name)
            .bind(item.total.to_string())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn load_line_items(
        tx: &mut Transaction<'_, Sqlite>,
        id: &QuoteId,
    ) -> Result<Vec<LineItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT kind, description, product_ref, style, color, finish, quantity, unit, \
                    unit_price, total \
             FROM quote_line_item WHERE quote_id = ? ORDER BY position",
        )
        .bind(&id.0)
        .fetch_all(&mut **tx)
        .await?;

        rows.iter().map(decode_line_item).collect()
    }

    async fn load_labor_items(
        tx: &mut Transaction<'_, Sqlite>,
        id: &QuoteId,
    ) -> Result<Vec<LaborItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT description, hours, hourly_rate, installer_id, installer_name, total \
             FROM quote_labor_item WHERE quote_id = ? ORDER BY position",
        )
        .bind(&id.0)
        .fetch_all(&mut **tx)
        .await?;

        rows.iter().map(decode_labor_item).collect()
    }
}

#[async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn insert(&self, quote: &Quote) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quote \
             (id, tenant_id, lead_id, homeowner_id, status, tax_rate, materials_subtotal, \
              labor_subtotal, adjustments_total, discount_total, tax_amount, total_price, \
              valid_until, internal_notes, version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quote.id.0)
        .bind(&quote.tenant_id.0)
        .bind(quote.lead_id.as_ref().map(|id| id.0.clone()))
        .bind(quote.homeowner_id.as_ref().map(|id| id.0.clone()))
        .bind(quote.status.as_str())
        .bind(quote.tax_rate.to_string())
        .bind(quote.totals.materials_subtotal.to_string())
        .bind(quote.totals.labor_subtotal.to_string())
        .bind(quote.totals.adjustments_total.to_string())
        .bind(quote.totals.discount_total.to_string())
        .bind(quote.totals.tax_amount.to_string())
        .bind(quote.totals.total_price.to_string())
        .bind(quote.valid_until.map(|date| date.to_string()))
        .bind(&quote.internal_notes)
        .bind(quote.version)
        .bind(quote.created_at.to_rfc3339())
        .bind(quote.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|error| {
            if super::is_unique_violation(&error) {
                RepositoryError::AlreadyExists {
                    entity: "quote",
                    detail: format!("quote {} already exists", quote.id.0),
                }
            } else {
                error.into()
            }
        })?;

        Self::write_items(&mut tx, quote).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        id: &QuoteId,
    ) -> Result<Option<Quote>, RepositoryError> {
        // The quote row and its item ledger must come from one committed
        // state; read both inside a single transaction so a concurrent
        // update cannot land between the fetches.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, tenant_id, lead_id, homeowner_id, status, tax_rate, \
                    materials_subtotal, labor_subtotal, adjustments_total, discount_total, \
                    tax_amount, total_price, valid_until, internal_notes, version, \
                    created_at, updated_at \
             FROM quote WHERE tenant_id = ? AND id = ?",
        )
        .bind(&tenant_id.0)
        .bind(&id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let line_items = Self::load_line_items(&mut tx, id).await?;
        let labor_items = Self::load_labor_items(&mut tx, id).await?;
        tx.commit().await?;

        decode_quote(&row, line_items, labor_items).map(Some)
    }

    async fn update(&self, quote: &mut Quote) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let now = chrono::Utc::now();

        let result = sqlx::query(
            "UPDATE quote SET \
               lead_id = ?, homeowner_id = ?, status = ?, tax_rate = ?, \
               materials_subtotal = ?, labor_subtotal = ?, adjustments_total = ?, \
               discount_total = ?, tax_amount = ?, total_price = ?, valid_until = ?, \
               internal_notes = ?, version = version + 1, updated_at = ? \
             WHERE tenant_id = ? AND id = ? AND version = ?",
        )
        .bind(quote.lead_id.as_ref().map(|id| id.0.clone()))
        .bind(quote.homeowner_id.as_ref().map(|id| id.0.clone()))
        .bind(quote.status.as_str())
        .bind(quote.tax_rate.to_string())
        .bind(quote.totals.materials_subtotal.to_string())
        .bind(quote.totals.labor_subtotal.to_string())
        .bind(quote.totals.adjustments_total.to_string())
        .bind(quote.totals.discount_total.to_string())
        .bind(quote.totals.tax_amount.to_string())
        .bind(quote.totals.total_price.to_string())
        .bind(quote.valid_until.map(|date| date.to_string()))
        .bind(&quote.internal_notes)
        .bind(now.to_rfc3339())
        .bind(&quote.tenant_id.0)
        .bind(&quote.id.0)
        .bind(quote.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict {
                entity: "quote",
                detail: format!(
                    "quote {} version {} is stale or missing",
                    quote.id.0, quote.version
                ),
            });
        }

        Self::write_items(&mut tx, quote).await?;
        tx.commit().await?;

        quote.version += 1;
        quote.updated_at = now;
        Ok(())
    }
}

fn decode_quote(
    row: &SqliteRow,
    line_items: Vec<LineItem>,
    labor_items: Vec<LaborItem>,
) -> Result<Quote, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = QuoteStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status_raw}`")))?;

    let lead_id: Option<String> = row.try_get("lead_id")?;
    let homeowner_id: Option<String> = row.try_get("homeowner_id")?;

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        lead_id: lead_id.map(LeadId),
        homeowner_id: homeowner_id.map(HomeownerId),
        status,
        line_items,
        labor_items,
        tax_rate: decimal_column(row, "tax_rate")?,
        totals: QuoteTotals {
            materials_subtotal: decimal_column(row, "materials_subtotal")?,
            labor_subtotal: decimal_column(row, "labor_subtotal")?,
            adjustments_total: decimal_column(row, "adjustments_total")?,
            discount_total: decimal_column(row, "discount_total")?,
            tax_amount: decimal_column(row, "tax_amount")?,
            total_price: decimal_column(row, "total_price")?,
        },
        valid_until: date_column(row, "valid_until")?,
        internal_notes: row.try_get("internal_notes")?,
        version: row.try_get("version")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

fn decode_line_item(row: &SqliteRow) -> Result<LineItem, RepositoryError> {
    let kind_raw: String = row.try_get("kind")?;
    let kind = LineItemKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown line item kind `{kind_raw}`")))?;

    Ok(LineItem {
        kind,
        description: row.try_get("description")?,
        product_ref: row.try_get("product_ref")?,
        style: row.try_get("style")?,
        color: row.try_get("color")?,
        finish: row.try_get("finish")?,
        quantity: decimal_column(row, "quantity")?,
        unit: row.try_get("unit")?,
        unit_price: decimal_column(row, "unit_price")?,
        total: decimal_column(row, "total")?,
    })
}

fn decode_labor_item(row: &SqliteRow) -> Result<LaborItem, RepositoryError> {
    let installer_id: Option<String> = row.try_get("installer_id")?;

    Ok(LaborItem {
        description: row.try_get("description")?,
        hours: decimal_column(row, "hours")?,
        hourly_rate: decimal_column(row, "hourly_rate")?,
        installer_id: installer_id.map(InstallerId),
        installer_name: row.try_get("installer_name")?,
        total: decimal_column(row, "total")?,
    })
}
