use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docfollow_types::{
    Appointment, AppointmentUpdate, Doctor, DoctorSettingsUpdate, Followup, FollowupFilter, FollowupStatus, Patient, PatientUpdate,
    Reminder, ReminderStatus,
};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{FollowupUpdate, ReminderFilter, ReminderUpdate};

/// Trait for database persistence operations
///
/// Implementations provide database-specific CRUD operations. `create_*`
/// methods assign the record id and return the stored record.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    // ---------------------------------------------------------------- doctors

    async fn create_doctor(&self, doctor: Doctor) -> Result<Doctor>;

    async fn get_doctor(&self, doctor_id: &str) -> Result<Option<Doctor>>;

    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>>;

    async fn update_doctor_settings(
        &self,
        doctor_id: &str,
        update: DoctorSettingsUpdate,
    ) -> Result<Option<Doctor>>;

    // --------------------------------------------------------------- patients

    async fn create_patient(&self, patient: Patient) -> Result<Patient>;

    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>>;

    /// Newest first
    async fn list_patients(&self, doctor_id: &str) -> Result<Vec<Patient>>;

    async fn update_patient(
        &self,
        patient_id: &str,
        doctor_id: &str,
        update: PatientUpdate,
    ) -> Result<Option<Patient>>;

    /// Returns false when no patient with that id belongs to the doctor
    async fn delete_patient(&self, patient_id: &str, doctor_id: &str) -> Result<bool>;

    /// Match on the normalized phone number
    async fn find_patients_by_phone(&self, phone: &str) -> Result<Vec<Patient>>;

    // -------------------------------------------------------------- followups

    async fn create_followup(&self, followup: Followup) -> Result<Followup>;

    async fn get_followup(&self, followup_id: &str) -> Result<Option<Followup>>;

    /// Newest first
    async fn list_followups(&self, filter: &FollowupFilter) -> Result<Vec<Followup>>;

    /// Most recently created followup of the patient whose status is in `statuses`
    async fn find_active_followup(
        &self,
        patient_id: &str,
        statuses: &[FollowupStatus],
    ) -> Result<Option<Followup>>;

    /// Apply `update` in one atomic conditional write.
    ///
    /// Returns the updated followup, or `None` when the followup does not
    /// exist or the update's guards did not match.
    async fn apply_followup_update(
        &self,
        followup_id: &str,
        update: FollowupUpdate,
    ) -> Result<Option<Followup>>;

    async fn delete_followup(&self, followup_id: &str) -> Result<bool>;

    /// Record a gateway message id under a unique key shared by all followups.
    ///
    /// Returns `None` when this call recorded the id, or the id of the
    /// followup it was first recorded against.
    async fn claim_message_id(&self, message_id: &str, followup_id: &str) -> Result<Option<String>>;

    /// Forget a claimed id whose followup write did not land
    async fn release_message_id(&self, message_id: &str) -> Result<()>;

    /// Delete followups created before `cutoff` whose status is in `statuses`
    async fn delete_stale_followups(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[FollowupStatus],
    ) -> Result<u64>;

    // -------------------------------------------------------------- reminders

    async fn create_reminder(&self, reminder: Reminder) -> Result<Reminder>;

    async fn get_reminder(&self, reminder_id: &str) -> Result<Option<Reminder>>;

    /// Ordered by `followup_date` ascending
    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<Reminder>>;

    async fn list_reminders_for_patient(&self, patient_id: &str) -> Result<Vec<Reminder>>;

    async fn update_reminder(
        &self,
        reminder_id: &str,
        update: ReminderUpdate,
    ) -> Result<Option<Reminder>>;

    async fn delete_reminder(&self, reminder_id: &str) -> Result<bool>;

    async fn delete_stale_reminders(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[ReminderStatus],
    ) -> Result<u64>;

    /// Count of reminders per status string for one doctor
    async fn reminder_status_counts(&self, doctor_id: &str) -> Result<BTreeMap<String, u64>>;

    async fn count_reminders(&self, filter: &ReminderFilter) -> Result<u64>;

    // ----------------------------------------------------------- appointments

    async fn create_appointment(&self, appointment: Appointment) -> Result<Appointment>;

    async fn get_appointment(&self, appointment_id: &str) -> Result<Option<Appointment>>;

    /// Soonest first
    async fn list_appointments(&self, doctor_id: &str) -> Result<Vec<Appointment>>;

    async fn update_appointment(
        &self,
        appointment_id: &str,
        doctor_id: &str,
        update: AppointmentUpdate,
    ) -> Result<Option<Appointment>>;

    async fn delete_appointment(&self, appointment_id: &str, doctor_id: &str) -> Result<bool>;

    // ----------------------------------------------------------------- health

    async fn ping(&self) -> Result<()>;
}
