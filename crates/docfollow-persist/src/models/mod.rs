mod job;
mod update;

pub use job::{JobKind, ScheduledJob};
pub use update::{FollowupUpdate, ReminderUpdate};

use chrono::{DateTime, Utc};
use docfollow_types::ReminderStatus;
use serde::Serialize;
use std::collections::BTreeMap;

/// Query over the reminders collection. Empty fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct ReminderFilter {
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
    pub statuses: Vec<ReminderStatus>,
    pub due_before: Option<DateTime<Utc>>,
}

impl ReminderFilter {
    pub fn for_doctor(doctor_id: impl Into<String>) -> Self {
        Self {
            doctor_id: Some(doctor_id.into()),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[ReminderStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn due_before(mut self, at: DateTime<Utc>) -> Self {
        self.due_before = Some(at);
        self
    }
}

/// Per-doctor reminder breakdown for the stats endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderStats {
    pub total_reminders: u64,
    pub status_breakdown: BTreeMap<String, u64>,
    pub upcoming_reminders: u64,
    pub overdue_reminders: u64,
    pub success_rate: f64,
}

impl ReminderStats {
    pub fn from_counts(counts: BTreeMap<String, u64>, upcoming: u64, overdue: u64) -> Self {
        let total: u64 = counts.values().sum();
        let sent = counts.get(ReminderStatus::Sent.as_str()).copied().unwrap_or(0);
        let success_rate = if total > 0 {
            sent as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_reminders: total,
            status_breakdown: counts,
            upcoming_reminders: upcoming,
            overdue_reminders: overdue,
            success_rate,
        }
    }
}
