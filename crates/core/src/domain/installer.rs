use serde::{Deserialize, Serialize};

use crate::domain::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallerId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallerStatus {
    Pending,
    Active,
    Inactive,
    Suspended,
    Terminated,
}

impl InstallerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "suspended" => Some(Self::Suspended),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }

    pub fn is_assignable(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// An installer with daily/weekly capacity caps. Current assigned-job counts
/// are derived from jobs at query time, never stored here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installer {
    pub id: InstallerId,
    pub tenant_id: TenantId,
    pub name: String,
    pub status: InstallerStatus,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub max_jobs_per_day: u32,
    pub max_jobs_per_week: u32,
}
