use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::followup::AppointmentDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown appointment status: {}", other)),
        }
    }
}

/// A visit on the doctor's books, booked by the agent or entered by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub doctor_id: String,
    pub patient_id: String,
    /// Thread that booked it; `None` for manual entries
    pub followup_id: Option<String>,
    pub datetime: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub calendar_event_id: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(
        doctor_id: impl Into<String>,
        patient_id: impl Into<String>,
        datetime: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            doctor_id: doctor_id.into(),
            patient_id: patient_id.into(),
            followup_id: None,
            datetime,
            end_time: None,
            title: None,
            calendar_event_id: None,
            status: AppointmentStatus::Scheduled,
            created_at: Utc::now(),
        }
    }

    /// Row for a calendar booking made from a followup thread
    pub fn booked(
        doctor_id: impl Into<String>,
        patient_id: impl Into<String>,
        followup_id: impl Into<String>,
        details: &AppointmentDetails,
    ) -> Self {
        Self {
            followup_id: Some(followup_id.into()),
            end_time: Some(details.end_time),
            title: Some(details.event_title.clone()),
            calendar_event_id: details.calendar_event_id.clone(),
            ..Self::new(doctor_id, patient_id, details.start_time)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    pub datetime: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.datetime.is_none() && self.status.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_booked_copies_calendar_details() {
        let start = Utc::now() + Duration::days(1);
        let details = AppointmentDetails {
            event_title: "Appointment with Asha".to_string(),
            start_time: start,
            end_time: start + Duration::minutes(30),
            calendar_event_id: Some("evt_1".to_string()),
        };

        let appointment = Appointment::booked("d1", "p1", "f1", &details);
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(appointment.datetime, start);
        assert_eq!(appointment.followup_id.as_deref(), Some("f1"));
        assert_eq!(appointment.calendar_event_id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn test_status_parse_accepts_us_spelling() {
        assert_eq!(
            "Canceled".parse::<AppointmentStatus>().unwrap(),
            AppointmentStatus::Cancelled
        );
        assert!("no_show".parse::<AppointmentStatus>().is_err());
    }
}
