use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl ReminderStatus {
    pub const RETENTION_SWEEPABLE: [ReminderStatus; 3] = [
        ReminderStatus::Sent,
        ReminderStatus::Failed,
        ReminderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown reminder status: {}", other)),
        }
    }
}

/// A deferred "send the outreach for this followup at time T" task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub followup_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub followup_date: DateTime<Utc>,
    pub message_template: Option<String>,
    pub status: ReminderStatus,
    #[serde(default)]
    pub attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub scheduled_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(
        id: impl Into<String>,
        followup_id: impl Into<String>,
        patient_id: impl Into<String>,
        doctor_id: impl Into<String>,
        followup_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            followup_id: followup_id.into(),
            patient_id: patient_id.into(),
            doctor_id: doctor_id.into(),
            followup_date,
            message_template: None,
            status: ReminderStatus::Pending,
            attempts: 0,
            last_attempt: None,
            error_message: None,
            scheduled_job_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_message_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = Some(template.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_reminder_is_pending() {
        let reminder = Reminder::new("r1", "f1", "p1", "d1", Utc::now())
            .with_message_template("Follow-up reminder for Asha");
        assert_eq!(reminder.status, ReminderStatus::Pending);
        assert_eq!(reminder.attempts, 0);
        assert!(reminder.scheduled_job_id.is_none());
        assert_eq!(
            reminder.message_template.as_deref(),
            Some("Follow-up reminder for Asha")
        );
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("SENT".parse::<ReminderStatus>().unwrap(), ReminderStatus::Sent);
        assert!("processing".parse::<ReminderStatus>().is_err());
    }
}
