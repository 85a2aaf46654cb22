use bson::oid::ObjectId;
use bson::DateTime as BsonDateTime;
use docfollow_types::{
    Appointment, AppointmentDetails, AppointmentStatus, Doctor, Followup, FollowupStatus, HistoryEntry, Patient, Reminder,
    ReminderStatus, Sender,
};
use serde::{Deserialize, Serialize};

use crate::memory::EXTRACTED_TEXT_SEPARATOR;
use crate::models::{JobKind, ScheduledJob};

/// MongoDB-specific Doctor model (uses ObjectId)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDoctor {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub whatsapp_connected: bool,
    pub whatsapp_number: Option<String>,
    pub whatsapp_sandbox_id: Option<String>,
    #[serde(default)]
    pub google_calendar_connected: bool,
    pub settings: Option<serde_json::Value>,
    pub created_at: BsonDateTime,
}

/// MongoDB-specific Patient model (uses ObjectId)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPatient {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub doctor_id: String,
    pub name: String,
    #[serde(alias = "disease")]
    pub diagnosis: String,
    pub phone: String,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub created_at: BsonDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoHistoryEntry {
    pub sender: Sender,
    pub content: String,
    pub timestamp: BsonDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAppointmentDetails {
    pub event_title: String,
    pub start_time: BsonDateTime,
    pub end_time: BsonDateTime,
    pub calendar_event_id: Option<String>,
}

/// MongoDB-specific Followup model
///
/// Extracted text is stored as an array of segments so that appending is a
/// plain `$push` inside the same conditional update as everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoFollowup {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub patient_id: String,
    pub doctor_id: String,
    pub status: FollowupStatus,
    #[serde(default)]
    pub history: Vec<MongoHistoryEntry>,
    #[serde(default)]
    pub raw_data: Vec<String>,
    #[serde(default)]
    pub extracted_text_parts: Vec<String>,
    pub ai_draft_message: Option<String>,
    pub doctor_summary: Option<String>,
    #[serde(default)]
    pub suggests_appointment: bool,
    pub doctor_decision: Option<String>,
    #[serde(default)]
    pub final_message_sent: bool,
    pub final_message: Option<String>,
    pub appointment_details: Option<MongoAppointmentDetails>,
    pub message_template: Option<String>,
    #[serde(default)]
    pub processed_message_ids: Vec<String>,
    pub scheduled_for: Option<BsonDateTime>,
    pub scheduled_job_id: Option<String>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    pub last_attempt: Option<BsonDateTime>,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

/// MongoDB-specific Reminder model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoReminder {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub followup_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub followup_date: BsonDateTime,
    pub message_template: Option<String>,
    pub status: ReminderStatus,
    #[serde(default)]
    pub attempts: u32,
    pub last_attempt: Option<BsonDateTime>,
    pub error_message: Option<String>,
    pub scheduled_job_id: Option<String>,
    pub created_at: BsonDateTime,
}

/// MongoDB-specific Appointment model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAppointment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub doctor_id: String,
    pub patient_id: String,
    pub followup_id: Option<String>,
    pub datetime: BsonDateTime,
    pub end_time: Option<BsonDateTime>,
    pub title: Option<String>,
    pub calendar_event_id: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: BsonDateTime,
}

/// Row of the `scheduled_jobs` collection; `_id` is the job id string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoJob {
    #[serde(rename = "_id")]
    pub id: String,
    pub kind: JobKind,
    pub run_at: BsonDateTime,
    pub created_at: BsonDateTime,
}

/// Row of the `processed_messages` collection; `_id` is the gateway message id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProcessedMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub followup_id: String,
    pub received_at: BsonDateTime,
}

// Conversions between database-agnostic and MongoDB-specific models

fn opt_dt(dt: Option<chrono::DateTime<chrono::Utc>>) -> Option<BsonDateTime> {
    dt.map(BsonDateTime::from_chrono)
}

impl MongoDoctor {
    pub fn from_domain(doctor: Doctor, id: ObjectId) -> Self {
        Self {
            id,
            name: doctor.name,
            email: doctor.email,
            password_hash: doctor.password_hash,
            whatsapp_connected: doctor.whatsapp_connected,
            whatsapp_number: doctor.whatsapp_number,
            whatsapp_sandbox_id: doctor.whatsapp_sandbox_id,
            google_calendar_connected: doctor.google_calendar_connected,
            settings: doctor.settings,
            created_at: BsonDateTime::from_chrono(doctor.created_at),
        }
    }
}

impl From<MongoDoctor> for Doctor {
    fn from(doc: MongoDoctor) -> Self {
        Self {
            id: doc.id.to_hex(),
            name: doc.name,
            email: doc.email,
            password_hash: doc.password_hash,
            whatsapp_connected: doc.whatsapp_connected,
            whatsapp_number: doc.whatsapp_number,
            whatsapp_sandbox_id: doc.whatsapp_sandbox_id,
            google_calendar_connected: doc.google_calendar_connected,
            settings: doc.settings,
            created_at: doc.created_at.to_chrono(),
        }
    }
}

impl MongoPatient {
    pub fn from_domain(patient: Patient, id: ObjectId) -> Self {
        Self {
            id,
            doctor_id: patient.doctor_id,
            name: patient.name,
            diagnosis: patient.diagnosis,
            phone: patient.phone,
            address: patient.address,
            notes: patient.notes,
            image_url: patient.image_url,
            created_at: BsonDateTime::from_chrono(patient.created_at),
        }
    }
}

impl From<MongoPatient> for Patient {
    fn from(p: MongoPatient) -> Self {
        Self {
            id: p.id.to_hex(),
            doctor_id: p.doctor_id,
            name: p.name,
            diagnosis: p.diagnosis,
            phone: p.phone,
            address: p.address,
            notes: p.notes,
            image_url: p.image_url,
            created_at: p.created_at.to_chrono(),
        }
    }
}

impl From<HistoryEntry> for MongoHistoryEntry {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            sender: entry.sender,
            content: entry.content,
            timestamp: BsonDateTime::from_chrono(entry.timestamp),
        }
    }
}

impl From<MongoHistoryEntry> for HistoryEntry {
    fn from(entry: MongoHistoryEntry) -> Self {
        Self {
            sender: entry.sender,
            content: entry.content,
            timestamp: entry.timestamp.to_chrono(),
        }
    }
}

impl From<AppointmentDetails> for MongoAppointmentDetails {
    fn from(d: AppointmentDetails) -> Self {
        Self {
            event_title: d.event_title,
            start_time: BsonDateTime::from_chrono(d.start_time),
            end_time: BsonDateTime::from_chrono(d.end_time),
            calendar_event_id: d.calendar_event_id,
        }
    }
}

impl From<MongoAppointmentDetails> for AppointmentDetails {
    fn from(d: MongoAppointmentDetails) -> Self {
        Self {
            event_title: d.event_title,
            start_time: d.start_time.to_chrono(),
            end_time: d.end_time.to_chrono(),
            calendar_event_id: d.calendar_event_id,
        }
    }
}

impl MongoFollowup {
    pub fn from_domain(f: Followup, id: ObjectId) -> Self {
        let extracted_text_parts = if f.extracted_text.is_empty() {
            Vec::new()
        } else {
            vec![f.extracted_text]
        };

        Self {
            id,
            patient_id: f.patient_id,
            doctor_id: f.doctor_id,
            status: f.status,
            history: f.history.into_iter().map(Into::into).collect(),
            raw_data: f.raw_data,
            extracted_text_parts,
            ai_draft_message: f.ai_draft_message,
            doctor_summary: f.doctor_summary,
            suggests_appointment: f.suggests_appointment,
            doctor_decision: f.doctor_decision,
            final_message_sent: f.final_message_sent,
            final_message: f.final_message,
            appointment_details: f.appointment_details.map(Into::into),
            message_template: f.message_template,
            processed_message_ids: f.processed_message_ids,
            scheduled_for: opt_dt(f.scheduled_for),
            scheduled_job_id: f.scheduled_job_id,
            error_message: f.error_message,
            attempts: f.attempts,
            last_attempt: opt_dt(f.last_attempt),
            created_at: BsonDateTime::from_chrono(f.created_at),
            updated_at: BsonDateTime::from_chrono(f.updated_at),
        }
    }
}

impl From<MongoFollowup> for Followup {
    fn from(f: MongoFollowup) -> Self {
        Self {
            id: f.id.to_hex(),
            patient_id: f.patient_id,
            doctor_id: f.doctor_id,
            status: f.status,
            history: f.history.into_iter().map(Into::into).collect(),
            raw_data: f.raw_data,
            extracted_text: f.extracted_text_parts.join(EXTRACTED_TEXT_SEPARATOR),
            ai_draft_message: f.ai_draft_message,
            doctor_summary: f.doctor_summary,
            suggests_appointment: f.suggests_appointment,
            doctor_decision: f.doctor_decision,
            final_message_sent: f.final_message_sent,
            final_message: f.final_message,
            appointment_details: f.appointment_details.map(Into::into),
            message_template: f.message_template,
            processed_message_ids: f.processed_message_ids,
            scheduled_for: f.scheduled_for.map(|d| d.to_chrono()),
            scheduled_job_id: f.scheduled_job_id,
            error_message: f.error_message,
            attempts: f.attempts,
            last_attempt: f.last_attempt.map(|d| d.to_chrono()),
            created_at: f.created_at.to_chrono(),
            updated_at: f.updated_at.to_chrono(),
        }
    }
}

impl MongoReminder {
    pub fn from_domain(r: Reminder, id: ObjectId) -> Self {
        Self {
            id,
            followup_id: r.followup_id,
            patient_id: r.patient_id,
            doctor_id: r.doctor_id,
            followup_date: BsonDateTime::from_chrono(r.followup_date),
            message_template: r.message_template,
            status: r.status,
            attempts: r.attempts,
            last_attempt: opt_dt(r.last_attempt),
            error_message: r.error_message,
            scheduled_job_id: r.scheduled_job_id,
            created_at: BsonDateTime::from_chrono(r.created_at),
        }
    }
}

impl From<MongoReminder> for Reminder {
    fn from(r: MongoReminder) -> Self {
        Self {
            id: r.id.to_hex(),
            followup_id: r.followup_id,
            patient_id: r.patient_id,
            doctor_id: r.doctor_id,
            followup_date: r.followup_date.to_chrono(),
            message_template: r.message_template,
            status: r.status,
            attempts: r.attempts,
            last_attempt: r.last_attempt.map(|d| d.to_chrono()),
            error_message: r.error_message,
            scheduled_job_id: r.scheduled_job_id,
            created_at: r.created_at.to_chrono(),
        }
    }
}

impl From<ScheduledJob> for MongoJob {
    fn from(job: ScheduledJob) -> Self {
        Self {
            id: job.id,
            kind: job.kind,
            run_at: BsonDateTime::from_chrono(job.run_at),
            created_at: BsonDateTime::from_chrono(job.created_at),
        }
    }
}

impl From<MongoJob> for ScheduledJob {
    fn from(job: MongoJob) -> Self {
        Self {
            id: job.id,
            kind: job.kind,
            run_at: job.run_at.to_chrono(),
            created_at: job.created_at.to_chrono(),
        }
    }
}

impl MongoAppointment {
    pub fn from_domain(a: Appointment, id: ObjectId) -> Self {
        Self {
            id,
            doctor_id: a.doctor_id,
            patient_id: a.patient_id,
            followup_id: a.followup_id,
            datetime: BsonDateTime::from_chrono(a.datetime),
            end_time: opt_dt(a.end_time),
            title: a.title,
            calendar_event_id: a.calendar_event_id,
            status: a.status,
            created_at: BsonDateTime::from_chrono(a.created_at),
        }
    }
}

impl From<MongoAppointment> for Appointment {
    fn from(a: MongoAppointment) -> Self {
        Self {
            id: a.id.to_hex(),
            doctor_id: a.doctor_id,
            patient_id: a.patient_id,
            followup_id: a.followup_id,
            datetime: a.datetime.to_chrono(),
            end_time: a.end_time.map(|d| d.to_chrono()),
            title: a.title,
            calendar_event_id: a.calendar_event_id,
            status: a.status,
            created_at: a.created_at.to_chrono(),
        }
    }
}
