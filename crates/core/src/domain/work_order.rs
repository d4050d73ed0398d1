use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::installer::InstallerId;
use crate::domain::job::JobId;
use crate::domain::TenantId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkOrderId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Created,
    Sent,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created" => Some(Self::Created),
            "sent" => Some(Self::Sent),
            "accepted" => Some(Self::Accepted),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Strictly forward, with cancellation open until the work completes.
    pub fn allowed_transitions(&self) -> &'static [WorkOrderStatus] {
        use WorkOrderStatus::{Accepted, Cancelled, Completed, Created, InProgress, Sent};
        match self {
            Created => &[Sent, Cancelled],
            Sent => &[Accepted, Cancelled],
            Accepted => &[InProgress, Cancelled],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }
}

/// Frozen contact block copied onto the work order at generation time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// One resolved material row in the snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub description: String,
    pub sku: Option<String>,
    pub style: Option<String>,
    pub color: Option<String>,
    pub finish: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
}

/// One labor instruction row in the snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaborInstruction {
    pub description: String,
    pub hours: Option<Decimal>,
    pub installer_name: Option<String>,
    pub notes: Option<String>,
}

/// An immutable field-ready snapshot generated from a job. Snapshot fields
/// are write-once: later edits to the source quote or job never reach an
/// already-generated work order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub tenant_id: TenantId,
    pub job_id: JobId,
    pub installer_id: Option<InstallerId>,
    pub status: WorkOrderStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time_start: Option<NaiveTime>,
    pub scheduled_time_end: Option<NaiveTime>,
    pub homeowner_info: ContactInfo,
    pub installer_info: ContactInfo,
    pub materials_snapshot: Vec<MaterialLine>,
    pub labor_instructions: Vec<LaborInstruction>,
    pub special_instructions: Option<String>,
    pub internal_notes: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    pub fn allowed_statuses(&self) -> &'static [WorkOrderStatus] {
        self.status.allowed_transitions()
    }

    pub fn can_transition_to(&self, next: WorkOrderStatus) -> bool {
        self.status.allowed_transitions().contains(&next)
    }

    pub fn transition_to(&mut self, next: WorkOrderStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidWorkOrderTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }
}
