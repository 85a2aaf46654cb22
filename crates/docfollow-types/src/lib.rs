pub mod appointment;
pub mod doctor;
pub mod drafting;
pub mod followup;
pub mod patient;
pub mod reminder;

pub use appointment::{Appointment, AppointmentStatus, AppointmentUpdate};
pub use doctor::{Doctor, DoctorProfile, DoctorSettingsUpdate};
pub use drafting::{AppointmentRequest, Decision, DecisionError, DraftOutcome};
pub use followup::{
    AppointmentDetails, Followup, FollowupFilter, FollowupStatus, HistoryEntry, Sender,
};
pub use patient::{normalize_phone, Patient, PatientUpdate};
pub use reminder::{Reminder, ReminderStatus};

/// Retention window for terminal followups and reminders, in days.
pub const RETENTION_DAYS: i64 = 30;
