use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a followup thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowupStatus {
    /// Persisted, initial outreach not yet sent
    Creating,
    /// Bound to a reminder that has not fired yet
    Scheduled,
    WaitingForPatient,
    WaitingForDoctor,
    AppointmentScheduling,
    Closed,
    Completed,
    /// Outreach failed; retryable
    Failed,
}

impl FollowupStatus {
    /// Statuses that receive inbound patient messages.
    pub const AWAITING: [FollowupStatus; 3] = [
        FollowupStatus::WaitingForPatient,
        FollowupStatus::WaitingForDoctor,
        FollowupStatus::AppointmentScheduling,
    ];

    /// Statuses from which initial outreach may be (re)attempted.
    pub const OUTREACH_READY: [FollowupStatus; 3] = [
        FollowupStatus::Creating,
        FollowupStatus::Scheduled,
        FollowupStatus::Failed,
    ];

    /// Statuses swept by the retention cleanup.
    pub const RETENTION_SWEEPABLE: [FollowupStatus; 3] = [
        FollowupStatus::Closed,
        FollowupStatus::Completed,
        FollowupStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Scheduled => "scheduled",
            Self::WaitingForPatient => "waiting_for_patient",
            Self::WaitingForDoctor => "waiting_for_doctor",
            Self::AppointmentScheduling => "appointment_scheduling",
            Self::Closed => "closed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Closed and completed threads never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Completed)
    }

    pub fn is_awaiting(&self) -> bool {
        Self::AWAITING.contains(self)
    }

    pub fn valid_transitions(&self) -> &'static [FollowupStatus] {
        use FollowupStatus::*;
        match self {
            Creating => &[WaitingForPatient, Failed],
            Scheduled => &[Creating, WaitingForPatient, Failed],
            Failed => &[Scheduled, WaitingForPatient, Failed],
            WaitingForPatient => &[WaitingForDoctor, AppointmentScheduling],
            WaitingForDoctor => &[WaitingForDoctor, AppointmentScheduling, Closed],
            AppointmentScheduling => &[AppointmentScheduling, Completed],
            Closed | Completed => &[],
        }
    }

    pub fn can_transition_to(&self, next: FollowupStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for FollowupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FollowupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "creating" => Ok(Self::Creating),
            "scheduled" => Ok(Self::Scheduled),
            "waiting_for_patient" => Ok(Self::WaitingForPatient),
            "waiting_for_doctor" => Ok(Self::WaitingForDoctor),
            "appointment_scheduling" => Ok(Self::AppointmentScheduling),
            "closed" => Ok(Self::Closed),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown followup status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Agent,
    Doctor,
    Patient,
}

/// One exchanged message in a followup thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Sender::Agent, content)
    }

    pub fn doctor(content: impl Into<String>) -> Self {
        Self::new(Sender::Doctor, content)
    }

    pub fn patient(content: impl Into<String>) -> Self {
        Self::new(Sender::Patient, content)
    }
}

/// Calendar booking recorded once an appointment is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub event_title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub calendar_event_id: Option<String>,
}

/// The conversation-thread aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Followup {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub status: FollowupStatus,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Media references received from the patient, without duplicates
    #[serde(default)]
    pub raw_data: Vec<String>,
    #[serde(default)]
    pub extracted_text: String,
    pub ai_draft_message: Option<String>,
    pub doctor_summary: Option<String>,
    #[serde(default)]
    pub suggests_appointment: bool,
    pub doctor_decision: Option<String>,
    #[serde(default)]
    pub final_message_sent: bool,
    pub final_message: Option<String>,
    pub appointment_details: Option<AppointmentDetails>,
    /// Doctor's outreach text, reused when outreach is retried
    #[serde(default)]
    pub message_template: Option<String>,
    /// Gateway message ids already appended to history
    #[serde(default)]
    pub processed_message_ids: Vec<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub scheduled_job_id: Option<String>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Followup {
    /// Build a fresh thread. `id` is assigned by the caller.
    pub fn new(
        id: impl Into<String>,
        patient_id: impl Into<String>,
        doctor_id: impl Into<String>,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        let status = if scheduled_for.is_some() {
            FollowupStatus::Scheduled
        } else {
            FollowupStatus::Creating
        };

        Self {
            id: id.into(),
            patient_id: patient_id.into(),
            doctor_id: doctor_id.into(),
            status,
            history: Vec::new(),
            raw_data: Vec::new(),
            extracted_text: String::new(),
            ai_draft_message: None,
            doctor_summary: None,
            suggests_appointment: false,
            doctor_decision: None,
            final_message_sent: false,
            final_message: None,
            appointment_details: None,
            message_template: None,
            processed_message_ids: Vec::new(),
            scheduled_for,
            scheduled_job_id: None,
            error_message: None,
            attempts: 0,
            last_attempt: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_message_template(mut self, template: Option<String>) -> Self {
        self.message_template = template.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn has_processed(&self, message_id: &str) -> bool {
        self.processed_message_ids.iter().any(|m| m == message_id)
    }
}

/// Query filter for listing followups.
#[derive(Debug, Clone, Default)]
pub struct FollowupFilter {
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
    pub status: Option<FollowupStatus>,
}
