//! Quote → Job → Work Order promotions.
//!
//! These are the pure halves of the pipeline: given an aggregate that
//! satisfies the preconditions, build the next-stage entity. Uniqueness (one
//! job per quote, one work order per job) is a storage concern enforced by
//! the persistence layer at insert time.

use chrono::{DateTime, Utc};

use crate::domain::job::{Job, JobId, JobStatus};
use crate::domain::quote::{LineItemKind, Quote, QuoteStatus};
use crate::domain::work_order::{
    ContactInfo, LaborInstruction, MaterialLine, WorkOrder, WorkOrderId, WorkOrderStatus,
};
use crate::errors::DomainError;

/// Builds a pending job from an approved quote, copying the lead/homeowner
/// associations forward. The `quote_id` link is fixed for the job's lifetime.
pub fn job_from_quote(
    quote: &Quote,
    job_id: JobId,
    now: DateTime<Utc>,
) -> Result<Job, DomainError> {
    if quote.status != QuoteStatus::Approved {
        return Err(DomainError::Validation(format!(
            "only an approved quote can spawn a job; quote {} is {}",
            quote.id.0,
            quote.status.as_str()
        )));
    }

    Ok(Job {
        id: job_id,
        tenant_id: quote.tenant_id.clone(),
        quote_id: quote.id.clone(),
        lead_id: quote.lead_id.clone(),
        homeowner_id: quote.homeowner_id.clone(),
        installer_id: None,
        status: JobStatus::Pending,
        scheduled_date: None,
        scheduled_time_start: None,
        scheduled_time_end: None,
        project_details: serde_json::json!({}),
        internal_notes: None,
        version: 1,
        created_at: now,
        updated_at: now,
    })
}

/// Builds a work order by deep-copying the job's resolved materials and labor
/// into owned snapshot rows. Nothing in the result borrows from the live
/// quote or job, so later edits to either cannot leak through.
pub fn work_order_from_job(
    job: &Job,
    quote: &Quote,
    work_order_id: WorkOrderId,
    homeowner_info: ContactInfo,
    installer_info: ContactInfo,
    now: DateTime<Utc>,
) -> Result<WorkOrder, DomainError> {
    if job.quote_id != quote.id {
        return Err(DomainError::Validation(format!(
            "job {} references quote {}, not {}",
            job.id.0, job.quote_id.0, quote.id.0
        )));
    }

    let materials_snapshot = quote
        .line_items
        .iter()
        .filter(|item| item.kind == LineItemKind::Material)
        .map(|item| MaterialLine {
            description: item.description.clone(),
            sku: item.product_ref.clone(),
            style: item.style.clone(),
            color: item.color.clone(),
            finish: item.finish.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
        })
        .collect();

    let labor_instructions = quote
        .labor_items
        .iter()
        .map(|item| LaborInstruction {
            description: item.description.clone(),
            hours: Some(item.hours),
            installer_name: item.installer_name.clone(),
            notes: None,
        })
        .collect();

    Ok(WorkOrder {
        id: work_order_id,
        tenant_id: job.tenant_id.clone(),
        job_id: job.id.clone(),
        installer_id: job.installer_id.clone(),
        status: WorkOrderStatus::Created,
        scheduled_date: job.scheduled_date,
        scheduled_time_start: job.scheduled_time_start,
        scheduled_time_end: job.scheduled_time_end,
        homeowner_info,
        installer_info,
        materials_snapshot,
        labor_instructions,
        special_instructions: None,
        internal_notes: None,
        version: 1,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{job_from_quote, work_order_from_job};
    use crate::domain::job::{JobId, JobStatus};
    use crate::domain::quote::{
        LaborItem, LineItem, LineItemDraft, LineItemKind, Quote, QuoteId, QuoteStatus,
    };
    use crate::domain::work_order::{ContactInfo, WorkOrderId, WorkOrderStatus};
    use crate::domain::{HomeownerId, TenantId};

    fn approved_quote() -> Quote {
        let mut quote = Quote::new(
            QuoteId("qt-1".into()),
            TenantId("tn-1".into()),
            Decimal::new(8, 2),
        )
        .expect("valid quote");
        quote.homeowner_id = Some(HomeownerId("ho-1".into()));
        quote
            .add_line_item(
                LineItem::new(
                    LineItemKind::Material,
                    "oak flooring",
                    Decimal::from(10),
                    "sq_ft",
                    Decimal::new(2_500, 2),
                    LineItemDraft {
                        product_ref: Some("OAK-12".into()),
                        style: Some("wide plank".into()),
                        ..LineItemDraft::default()
                    },
                )
                .expect("valid line item"),
            )
            .expect("draft ledger open");
        quote
            .add_line_item(
                LineItem::new(
                    LineItemKind::Discount,
                    "spring promo",
                    Decimal::ONE,
                    "ea",
                    Decimal::new(1_000, 2),
                    LineItemDraft::default(),
                )
                .expect("valid discount"),
            )
            .expect("draft ledger open");
        quote
            .add_labor_item(
                LaborItem::new(
                    "install flooring",
                    Decimal::from(4),
                    Decimal::new(6_000, 2),
                    None,
                    Some("A. Mason".into()),
                )
                .expect("valid labor"),
            )
            .expect("draft ledger open");
        quote.transition_to(QuoteStatus::Sent).expect("draft -> sent");
        quote.transition_to(QuoteStatus::Approved).expect("sent -> approved");
        quote
    }

    #[test]
    fn job_creation_requires_approved_quote() {
        let quote = Quote::new(
            QuoteId("qt-2".into()),
            TenantId("tn-1".into()),
            Decimal::ZERO,
        )
        .expect("valid quote");
        assert!(job_from_quote(&quote, JobId("jb-1".into()), Utc::now()).is_err());
    }

    #[test]
    fn job_copies_associations_forward() {
        let quote = approved_quote();
        let job = job_from_quote(&quote, JobId("jb-1".into()), Utc::now()).expect("promote");

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.quote_id, quote.id);
        assert_eq!(job.tenant_id, quote.tenant_id);
        assert_eq!(job.homeowner_id, quote.homeowner_id);
        assert!(job.installer_id.is_none());
    }

    #[test]
    fn snapshot_copies_materials_and_labor_only_once() {
        let quote = approved_quote();
        let job = job_from_quote(&quote, JobId("jb-1".into()), Utc::now()).expect("promote");
        let order = work_order_from_job(
            &job,
            &quote,
            WorkOrderId("wo-1".into()),
            ContactInfo { name: Some("J. Homeowner".into()), ..ContactInfo::default() },
            ContactInfo::default(),
            Utc::now(),
        )
        .expect("generate");

        assert_eq!(order.status, WorkOrderStatus::Created);
        // Discounts are pricing entries, not field materials.
        assert_eq!(order.materials_snapshot.len(), 1);
        assert_eq!(order.materials_snapshot[0].sku.as_deref(), Some("OAK-12"));
        assert_eq!(order.labor_instructions.len(), 1);
        assert_eq!(order.labor_instructions[0].installer_name.as_deref(), Some("A. Mason"));
    }

    #[test]
    fn later_quote_edits_do_not_reach_the_snapshot() {
        let mut quote = approved_quote();
        let job = job_from_quote(&quote, JobId("jb-1".into()), Utc::now()).expect("promote");
        let order = work_order_from_job(
            &job,
            &quote,
            WorkOrderId("wo-1".into()),
            ContactInfo::default(),
            ContactInfo::default(),
            Utc::now(),
        )
        .expect("generate");

        // Mutate the source ledger directly; an approved quote's API would
        // refuse this, the snapshot must be immune either way.
        quote.line_items[0].description = "rewritten".into();
        quote.line_items.clear();

        assert_eq!(order.materials_snapshot.len(), 1);
        assert_eq!(order.materials_snapshot[0].description, "oak flooring");
    }

    #[test]
    fn mismatched_job_and_quote_are_rejected() {
        let quote = approved_quote();
        let mut job = job_from_quote(&quote, JobId("jb-1".into()), Utc::now()).expect("promote");
        job.quote_id = QuoteId("qt-other".into());

        assert!(work_order_from_job(
            &job,
            &quote,
            WorkOrderId("wo-1".into()),
            ContactInfo::default(),
            ContactInfo::default(),
            Utc::now(),
        )
        .is_err());
    }
}
