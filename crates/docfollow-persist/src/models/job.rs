use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a scheduled job does when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    FollowupReminder {
        reminder_id: String,
        followup_id: String,
        patient_id: String,
        doctor_id: String,
    },
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FollowupReminder { .. } => "followup_reminder",
        }
    }
}

/// Durable row in the `scheduled_jobs` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub kind: JobKind,
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledJob {
    pub fn new(id: impl Into<String>, kind: JobKind, run_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            kind,
            run_at,
            created_at: Utc::now(),
        }
    }
}
