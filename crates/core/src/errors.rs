use thiserror::Error;

use crate::domain::installer::InstallerId;
use crate::domain::job::JobStatus;
use crate::domain::quote::QuoteStatus;
use crate::domain::work_order::WorkOrderStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid quote transition from {} to {}", from.as_str(), to.as_str())]
    InvalidQuoteTransition { from: QuoteStatus, to: QuoteStatus },
    #[error("invalid job transition from {} to {}", from.as_str(), to.as_str())]
    InvalidJobTransition { from: JobStatus, to: JobStatus },
    #[error("invalid work order transition from {} to {}", from.as_str(), to.as_str())]
    InvalidWorkOrderTransition { from: WorkOrderStatus, to: WorkOrderStatus },
    #[error("quote ledger is locked in status {}; items may only change in draft or pending", status.as_str())]
    QuoteLocked { status: QuoteStatus },
    #[error("installer {} is unavailable: {reason}", installer_id.0)]
    InstallerUnavailable { installer_id: InstallerId, reason: String },
    #[error("validation failed: {0}")]
    Validation(String),
}
