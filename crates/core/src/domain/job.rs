use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::installer::InstallerId;
use crate::domain::quote::QuoteId;
use crate::domain::{HomeownerId, LeadId, TenantId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Ordered,
    InProduction,
    Shipped,
    Delivered,
    Scheduled,
    InProgress,
    Completed,
    OnHold,
    Cancelled,
    Issue,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ordered => "ordered",
            Self::InProduction => "in_production",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::OnHold => "on_hold",
            Self::Cancelled => "cancelled",
            Self::Issue => "issue",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "ordered" => Some(Self::Ordered),
            "in_production" => Some(Self::InProduction),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "scheduled" => Some(Self::Scheduled),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "on_hold" => Some(Self::OnHold),
            "cancelled" => Some(Self::Cancelled),
            "issue" => Some(Self::Issue),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Legal next states. The fulfillment chain runs forward; `on_hold` and
    /// `issue` interrupt any non-terminal state and can resume to any active
    /// state without discarding progress.
    pub fn allowed_transitions(&self) -> &'static [JobStatus] {
        use JobStatus::{
            Cancelled, Completed, Delivered, InProduction, InProgress, Issue, OnHold, Ordered,
            Pending, Scheduled, Shipped,
        };
        match self {
            // Materials may already be on hand, so pending can also go straight
            // to scheduling.
            Pending => &[Ordered, Scheduled, OnHold, Issue, Cancelled],
            Ordered => &[InProduction, Shipped, OnHold, Issue, Cancelled],
            InProduction => &[Shipped, OnHold, Issue, Cancelled],
            Shipped => &[Delivered, OnHold, Issue, Cancelled],
            Delivered => &[Scheduled, OnHold, Issue, Cancelled],
            Scheduled => &[InProgress, OnHold, Issue, Cancelled],
            InProgress => &[Completed, OnHold, Issue, Cancelled],
            OnHold => &[
                Pending, Ordered, InProduction, Shipped, Delivered, Scheduled, InProgress, Issue,
                Cancelled,
            ],
            Issue => &[
                Pending, Ordered, InProduction, Shipped, Delivered, Scheduled, InProgress, OnHold,
                Cancelled,
            ],
            Completed | Cancelled => &[],
        }
    }
}

/// A committed unit of work spawned from an approved quote. `quote_id` is set
/// at creation and never changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub quote_id: QuoteId,
    pub lead_id: Option<LeadId>,
    pub homeowner_id: Option<HomeownerId>,
    pub installer_id: Option<InstallerId>,
    pub status: JobStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time_start: Option<NaiveTime>,
    pub scheduled_time_end: Option<NaiveTime>,
    pub project_details: serde_json::Value,
    pub internal_notes: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn allowed_statuses(&self) -> &'static [JobStatus] {
        self.status.allowed_transitions()
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        self.status.allowed_transitions().contains(&next)
    }

    pub fn transition_to(&mut self, next: JobStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidJobTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }

    /// Installer assignment (and reassignment) is open until work starts on
    /// site; from `in_progress` onward the crew on the job is fixed.
    pub fn can_assign_installer(&self) -> bool {
        !matches!(self.status, JobStatus::InProgress | JobStatus::Completed | JobStatus::Cancelled)
    }

    pub fn assign_installer(&mut self, installer_id: InstallerId) -> Result<(), DomainError> {
        if !self.can_assign_installer() {
            return Err(DomainError::Validation(format!(
                "installer cannot be assigned while job is {}",
                self.status.as_str()
            )));
        }
        self.installer_id = Some(installer_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Job, JobId, JobStatus};
    use crate::domain::installer::InstallerId;
    use crate::domain::quote::QuoteId;
    use crate::domain::TenantId;
    use crate::errors::DomainError;

    fn job(status: JobStatus) -> Job {
        let now = Utc::now();
        Job {
            id: JobId("jb-1".into()),
            tenant_id: TenantId("tn-1".into()),
            quote_id: QuoteId("qt-1".into()),
            lead_id: None,
            homeowner_id: None,
            installer_id: None,
            status,
            scheduled_date: None,
            scheduled_time_start: None,
            scheduled_time_end: None,
            project_details: serde_json::json!({}),
            internal_notes: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fulfillment_chain_runs_forward() {
        let mut job = job(JobStatus::Pending);
        for next in [
            JobStatus::Ordered,
            JobStatus::InProduction,
            JobStatus::Shipped,
            JobStatus::Delivered,
            JobStatus::Scheduled,
            JobStatus::InProgress,
            JobStatus::Completed,
        ] {
            job.transition_to(next).expect("forward chain transition");
        }
        assert!(job.status.is_terminal());
    }

    #[test]
    fn pending_may_skip_straight_to_scheduled() {
        let mut job = job(JobStatus::Pending);
        job.transition_to(JobStatus::Scheduled).expect("pending -> scheduled");
    }

    #[test]
    fn hold_and_issue_interrupt_and_resume() {
        let mut job = job(JobStatus::InProduction);
        job.transition_to(JobStatus::OnHold).expect("interrupt");
        job.transition_to(JobStatus::InProduction).expect("resume where it left off");
        job.transition_to(JobStatus::Issue).expect("flag issue");
        job.transition_to(JobStatus::Scheduled).expect("issue resolved into scheduling");
    }

    #[test]
    fn terminal_states_are_frozen() {
        for terminal in [JobStatus::Completed, JobStatus::Cancelled] {
            let mut job = job(terminal);
            assert!(job.allowed_statuses().is_empty());
            let error = job.transition_to(JobStatus::Pending).expect_err("terminal is frozen");
            assert!(matches!(error, DomainError::InvalidJobTransition { .. }));
            assert_eq!(job.status, terminal);
        }
    }

    #[test]
    fn backward_fulfillment_moves_are_rejected() {
        let mut job = job(JobStatus::Delivered);
        assert!(job.transition_to(JobStatus::Ordered).is_err());
        assert_eq!(job.status, JobStatus::Delivered);
    }

    #[test]
    fn reassignment_closes_at_in_progress() {
        let mut job = job(JobStatus::Scheduled);
        job.assign_installer(InstallerId("in-1".into())).expect("reassignable while scheduled");
        job.assign_installer(InstallerId("in-2".into())).expect("reassignment allowed");
        assert_eq!(job.installer_id, Some(InstallerId("in-2".into())));

        job.transition_to(JobStatus::InProgress).expect("scheduled -> in_progress");
        let error = job.assign_installer(InstallerId("in-3".into())).expect_err("crew is fixed");
        assert!(matches!(error, DomainError::Validation(_)));
        assert_eq!(job.installer_id, Some(InstallerId("in-2".into())));
    }
}
