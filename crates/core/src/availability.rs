//! Installer capacity decision.
//!
//! The storage layer counts the installer's non-terminal jobs on the target
//! day and in the surrounding business week; the decision itself is a pure
//! function of those counts against the installer's caps and never touches
//! state, so it is safe to call concurrently.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityCaps {
    pub max_jobs_per_day: u32,
    pub max_jobs_per_week: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CapacityCounts {
    pub jobs_today: u32,
    pub jobs_week: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub available: bool,
    pub current_jobs_today: u32,
    pub current_jobs_week: u32,
    pub max_jobs_per_day: u32,
    pub max_jobs_per_week: u32,
    pub message: String,
}

/// Monday-through-Sunday window containing `date`, used for the weekly count.
pub fn business_week(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let days_from_monday = u64::from(date.weekday().num_days_from_monday());
    let monday = date - Days::new(days_from_monday);
    let sunday = monday + Days::new(6);
    (monday, sunday)
}

pub fn evaluate(caps: CapacityCaps, counts: CapacityCounts) -> AvailabilityReport {
    let day_open = counts.jobs_today < caps.max_jobs_per_day;
    let week_open = counts.jobs_week < caps.max_jobs_per_week;
    let available = day_open && week_open;

    let message = if available {
        format!(
            "available: {} of {} daily slots and {} of {} weekly slots in use",
            counts.jobs_today, caps.max_jobs_per_day, counts.jobs_week, caps.max_jobs_per_week
        )
    } else if !day_open {
        format!(
            "daily capacity reached: {} of {} jobs already scheduled for this day",
            counts.jobs_today, caps.max_jobs_per_day
        )
    } else {
        format!(
            "weekly capacity reached: {} of {} jobs already scheduled for this week",
            counts.jobs_week, caps.max_jobs_per_week
        )
    };

    AvailabilityReport {
        available,
        current_jobs_today: counts.jobs_today,
        current_jobs_week: counts.jobs_week,
        max_jobs_per_day: caps.max_jobs_per_day,
        max_jobs_per_week: caps.max_jobs_per_week,
        message,
    }
}
