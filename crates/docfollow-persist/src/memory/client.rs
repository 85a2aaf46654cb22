use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docfollow_types::{
    Appointment, AppointmentUpdate, Doctor, DoctorSettingsUpdate, Followup, FollowupFilter, FollowupStatus, Patient, PatientUpdate,
    Reminder, ReminderStatus,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{PersistError, Result};
use crate::models::{FollowupUpdate, ReminderFilter, ReminderUpdate};
use crate::trait_client::PersistenceClient;

/// Separator between text extracted from successive media batches
pub(crate) const EXTRACTED_TEXT_SEPARATOR: &str = "\n\n";

/// Process-local store with the same semantics as the MongoDB client.
///
/// Each collection sits behind its own lock; a followup update holds the
/// write lock for the whole guard-check-and-apply, which gives the same
/// atomicity as a conditional `find_one_and_update`.
#[derive(Default)]
pub struct InMemoryPersistenceClient {
    doctors: RwLock<HashMap<String, Doctor>>,
    patients: RwLock<HashMap<String, Patient>>,
    followups: RwLock<HashMap<String, Followup>>,
    reminders: RwLock<HashMap<String, Reminder>>,
    appointments: RwLock<HashMap<String, Appointment>>,
    /// Gateway message id -> followup id
    processed_messages: RwLock<HashMap<String, String>>,
}

impl InMemoryPersistenceClient {
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn assign_id(id: &str) -> String {
    if id.is_empty() {
        new_id()
    } else {
        id.to_string()
    }
}

fn apply_followup(followup: &mut Followup, update: FollowupUpdate, now: DateTime<Utc>) {
    if let Some(status) = update.status {
        followup.status = status;
    }
    // Stamped under the write lock so history never goes backwards
    let stamp = followup
        .history
        .last()
        .map_or(now, |last| last.timestamp.max(now));
    followup
        .history
        .extend(update.push_history.into_iter().map(|mut entry| {
            entry.timestamp = stamp;
            entry
        }));
    for url in update.add_raw_data {
        if !followup.raw_data.contains(&url) {
            followup.raw_data.push(url);
        }
    }
    if let Some(text) = update.append_extracted_text {
        if !followup.extracted_text.is_empty() {
            followup.extracted_text.push_str(EXTRACTED_TEXT_SEPARATOR);
        }
        followup.extracted_text.push_str(&text);
    }
    if let Some(v) = update.ai_draft_message {
        followup.ai_draft_message = v;
    }
    if let Some(v) = update.doctor_summary {
        followup.doctor_summary = v;
    }
    if let Some(v) = update.suggests_appointment {
        followup.suggests_appointment = v;
    }
    if let Some(v) = update.doctor_decision {
        followup.doctor_decision = v;
    }
    if let Some(v) = update.final_message_sent {
        followup.final_message_sent = v;
    }
    if let Some(v) = update.final_message {
        followup.final_message = v;
    }
    if let Some(v) = update.appointment_details {
        followup.appointment_details = Some(v);
    }
    if let Some(v) = update.scheduled_for {
        followup.scheduled_for = v;
    }
    if let Some(v) = update.scheduled_job_id {
        followup.scheduled_job_id = v;
    }
    if let Some(v) = update.error_message {
        followup.error_message = v;
    }
    if let Some(key) = update.dedup_key {
        followup.processed_message_ids.push(key);
    }
    if update.increment_attempts {
        followup.attempts += 1;
    }
    if update.touch_last_attempt {
        followup.last_attempt = Some(now);
    }
    followup.updated_at = now;
}

fn reminder_matches(reminder: &Reminder, filter: &ReminderFilter) -> bool {
    filter
        .doctor_id
        .as_deref()
        .map_or(true, |d| reminder.doctor_id == d)
        && filter
            .patient_id
            .as_deref()
            .map_or(true, |p| reminder.patient_id == p)
        && (filter.statuses.is_empty() || filter.statuses.contains(&reminder.status))
        && filter
            .due_before
            .map_or(true, |due| reminder.followup_date <= due)
}

#[async_trait]
impl PersistenceClient for InMemoryPersistenceClient {
    async fn create_doctor(&self, mut doctor: Doctor) -> Result<Doctor> {
        let mut doctors = self.doctors.write().await;
        if doctors.values().any(|d| d.email == doctor.email) {
            return Err(PersistError::Duplicate(format!("email {}", doctor.email)));
        }
        doctor.id = assign_id(&doctor.id);
        doctors.insert(doctor.id.clone(), doctor.clone());
        Ok(doctor)
    }

    async fn get_doctor(&self, doctor_id: &str) -> Result<Option<Doctor>> {
        Ok(self.doctors.read().await.get(doctor_id).cloned())
    }

    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>> {
        Ok(self
            .doctors
            .read()
            .await
            .values()
            .find(|d| d.email == email)
            .cloned())
    }

    async fn update_doctor_settings(
        &self,
        doctor_id: &str,
        update: DoctorSettingsUpdate,
    ) -> Result<Option<Doctor>> {
        let mut doctors = self.doctors.write().await;
        let Some(doctor) = doctors.get_mut(doctor_id) else {
            return Ok(None);
        };
        if let Some(v) = update.whatsapp_connected {
            doctor.whatsapp_connected = v;
        }
        if let Some(v) = update.whatsapp_number {
            doctor.whatsapp_number = Some(v);
        }
        if let Some(v) = update.whatsapp_sandbox_id {
            doctor.whatsapp_sandbox_id = Some(v);
        }
        if let Some(v) = update.google_calendar_connected {
            doctor.google_calendar_connected = v;
        }
        if let Some(v) = update.settings {
            doctor.settings = Some(v);
        }
        Ok(Some(doctor.clone()))
    }

    async fn create_patient(&self, mut patient: Patient) -> Result<Patient> {
        patient.id = assign_id(&patient.id);
        self.patients
            .write()
            .await
            .insert(patient.id.clone(), patient.clone());
        Ok(patient)
    }

    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>> {
        Ok(self.patients.read().await.get(patient_id).cloned())
    }

    async fn list_patients(&self, doctor_id: &str) -> Result<Vec<Patient>> {
        let mut patients: Vec<Patient> = self
            .patients
            .read()
            .await
            .values()
            .filter(|p| p.doctor_id == doctor_id)
            .cloned()
            .collect();
        patients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(patients)
    }

    async fn update_patient(
        &self,
        patient_id: &str,
        doctor_id: &str,
        update: PatientUpdate,
    ) -> Result<Option<Patient>> {
        let mut patients = self.patients.write().await;
        let Some(patient) = patients
            .get_mut(patient_id)
            .filter(|p| p.doctor_id == doctor_id)
        else {
            return Ok(None);
        };
        if let Some(v) = update.phone {
            patient.phone = v;
        }
        if let Some(v) = update.address {
            patient.address = Some(v);
        }
        if let Some(v) = update.notes {
            patient.notes = Some(v);
        }
        if let Some(v) = update.image_url {
            patient.image_url = Some(v);
        }
        Ok(Some(patient.clone()))
    }

    async fn delete_patient(&self, patient_id: &str, doctor_id: &str) -> Result<bool> {
        let mut patients = self.patients.write().await;
        let owned = patients
            .get(patient_id)
            .is_some_and(|p| p.doctor_id == doctor_id);
        if owned {
            patients.remove(patient_id);
        }
        Ok(owned)
    }

    async fn find_patients_by_phone(&self, phone: &str) -> Result<Vec<Patient>> {
        Ok(self
            .patients
            .read()
            .await
            .values()
            .filter(|p| p.phone == phone)
            .cloned()
            .collect())
    }

    async fn create_followup(&self, mut followup: Followup) -> Result<Followup> {
        followup.id = assign_id(&followup.id);
        self.followups
            .write()
            .await
            .insert(followup.id.clone(), followup.clone());
        Ok(followup)
    }

    async fn get_followup(&self, followup_id: &str) -> Result<Option<Followup>> {
        Ok(self.followups.read().await.get(followup_id).cloned())
    }

    async fn list_followups(&self, filter: &FollowupFilter) -> Result<Vec<Followup>> {
        let mut followups: Vec<Followup> = self
            .followups
            .read()
            .await
            .values()
            .filter(|f| {
                filter.doctor_id.as_deref().map_or(true, |d| f.doctor_id == d)
                    && filter.patient_id.as_deref().map_or(true, |p| f.patient_id == p)
                    && filter.status.map_or(true, |s| f.status == s)
            })
            .cloned()
            .collect();
        followups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(followups)
    }

    async fn find_active_followup(
        &self,
        patient_id: &str,
        statuses: &[FollowupStatus],
    ) -> Result<Option<Followup>> {
        Ok(self
            .followups
            .read()
            .await
            .values()
            .filter(|f| f.patient_id == patient_id && statuses.contains(&f.status))
            .max_by_key(|f| f.created_at)
            .cloned())
    }

    async fn apply_followup_update(
        &self,
        followup_id: &str,
        update: FollowupUpdate,
    ) -> Result<Option<Followup>> {
        let mut followups = self.followups.write().await;
        let Some(followup) = followups.get_mut(followup_id) else {
            return Ok(None);
        };
        if !update.guard_matches(followup.status, &followup.processed_message_ids) {
            return Ok(None);
        }
        apply_followup(followup, update, Utc::now());
        Ok(Some(followup.clone()))
    }

    async fn delete_followup(&self, followup_id: &str) -> Result<bool> {
        Ok(self.followups.write().await.remove(followup_id).is_some())
    }

    async fn claim_message_id(&self, message_id: &str, followup_id: &str) -> Result<Option<String>> {
        let mut processed = self.processed_messages.write().await;
        if let Some(existing) = processed.get(message_id) {
            return Ok(Some(existing.clone()));
        }
        processed.insert(message_id.to_string(), followup_id.to_string());
        Ok(None)
    }

    async fn release_message_id(&self, message_id: &str) -> Result<()> {
        self.processed_messages.write().await.remove(message_id);
        Ok(())
    }

    async fn delete_stale_followups(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[FollowupStatus],
    ) -> Result<u64> {
        let mut followups = self.followups.write().await;
        let before = followups.len();
        followups.retain(|_, f| !(f.created_at < cutoff && statuses.contains(&f.status)));
        Ok((before - followups.len()) as u64)
    }

    async fn create_reminder(&self, mut reminder: Reminder) -> Result<Reminder> {
        reminder.id = assign_id(&reminder.id);
        self.reminders
            .write()
            .await
            .insert(reminder.id.clone(), reminder.clone());
        Ok(reminder)
    }

    async fn get_reminder(&self, reminder_id: &str) -> Result<Option<Reminder>> {
        Ok(self.reminders.read().await.get(reminder_id).cloned())
    }

    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<Reminder>> {
        let mut reminders: Vec<Reminder> = self
            .reminders
            .read()
            .await
            .values()
            .filter(|r| reminder_matches(r, filter))
            .cloned()
            .collect();
        reminders.sort_by(|a, b| a.followup_date.cmp(&b.followup_date));
        Ok(reminders)
    }

    async fn list_reminders_for_patient(&self, patient_id: &str) -> Result<Vec<Reminder>> {
        self.list_reminders(&ReminderFilter {
            patient_id: Some(patient_id.to_string()),
            ..Default::default()
        })
        .await
    }

    async fn update_reminder(
        &self,
        reminder_id: &str,
        update: ReminderUpdate,
    ) -> Result<Option<Reminder>> {
        let mut reminders = self.reminders.write().await;
        let Some(reminder) = reminders.get_mut(reminder_id) else {
            return Ok(None);
        };
        if let Some(v) = update.status {
            reminder.status = v;
        }
        if let Some(v) = update.followup_date {
            reminder.followup_date = v;
        }
        if let Some(v) = update.message_template {
            reminder.message_template = v;
        }
        if let Some(v) = update.scheduled_job_id {
            reminder.scheduled_job_id = v;
        }
        if let Some(v) = update.error_message {
            reminder.error_message = v;
        }
        if update.increment_attempts {
            reminder.attempts += 1;
        }
        if update.touch_last_attempt {
            reminder.last_attempt = Some(Utc::now());
        }
        Ok(Some(reminder.clone()))
    }

    async fn delete_reminder(&self, reminder_id: &str) -> Result<bool> {
        Ok(self.reminders.write().await.remove(reminder_id).is_some())
    }

    async fn delete_stale_reminders(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[ReminderStatus],
    ) -> Result<u64> {
        let mut reminders = self.reminders.write().await;
        let before = reminders.len();
        reminders.retain(|_, r| !(r.created_at < cutoff && statuses.contains(&r.status)));
        Ok((before - reminders.len()) as u64)
    }

    async fn reminder_status_counts(&self, doctor_id: &str) -> Result<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for reminder in self
            .reminders
            .read()
            .await
            .values()
            .filter(|r| r.doctor_id == doctor_id)
        {
            *counts.entry(reminder.status.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_reminders(&self, filter: &ReminderFilter) -> Result<u64> {
        Ok(self
            .reminders
            .read()
            .await
            .values()
            .filter(|r| reminder_matches(r, filter))
            .count() as u64)
    }

    async fn create_appointment(&self, mut appointment: Appointment) -> Result<Appointment> {
        appointment.id = assign_id(&appointment.id);
        self.appointments
            .write()
            .await
            .insert(appointment.id.clone(), appointment.clone());
        Ok(appointment)
    }

    async fn get_appointment(&self, appointment_id: &str) -> Result<Option<Appointment>> {
        Ok(self.appointments.read().await.get(appointment_id).cloned())
    }

    async fn list_appointments(&self, doctor_id: &str) -> Result<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect();
        appointments.sort_by(|a, b| a.datetime.cmp(&b.datetime));
        Ok(appointments)
    }

    async fn update_appointment(
        &self,
        appointment_id: &str,
        doctor_id: &str,
        update: AppointmentUpdate,
    ) -> Result<Option<Appointment>> {
        let mut appointments = self.appointments.write().await;
        let Some(appointment) = appointments
            .get_mut(appointment_id)
            .filter(|a| a.doctor_id == doctor_id)
        else {
            return Ok(None);
        };
        if let Some(v) = update.datetime {
            appointment.datetime = v;
        }
        if let Some(v) = update.status {
            appointment.status = v;
        }
        Ok(Some(appointment.clone()))
    }

    async fn delete_appointment(&self, appointment_id: &str, doctor_id: &str) -> Result<bool> {
        let mut appointments = self.appointments.write().await;
        let owned = appointments
            .get(appointment_id)
            .is_some_and(|a| a.doctor_id == doctor_id);
        if owned {
            appointments.remove(appointment_id);
        }
        Ok(owned)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
