pub mod availability;
pub mod config;
pub mod domain;
pub mod errors;
pub mod money;
pub mod pipeline;
pub mod pricing;

pub use availability::{business_week, AvailabilityReport, CapacityCaps, CapacityCounts};
pub use domain::installer::{Installer, InstallerId, InstallerStatus};
pub use domain::job::{Job, JobId, JobStatus};
pub use domain::quote::{
    LaborItem, LineItem, LineItemDraft, LineItemKind, Quote, QuoteId, QuoteStatus,
};
pub use domain::work_order::{
    ContactInfo, LaborInstruction, MaterialLine, WorkOrder, WorkOrderId, WorkOrderStatus,
};
pub use domain::{HomeownerId, LeadId, TenantId};
pub use errors::DomainError;
pub use pipeline::{job_from_quote, work_order_from_job};
pub use pricing::{recalculate, QuoteTotals};
