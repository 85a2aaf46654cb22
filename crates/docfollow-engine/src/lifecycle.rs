//! Followup lifecycle engine.
//!
//! Every status transition is one atomic conditional write through
//! [`FollowupUpdate`]: history is appended and status advanced together, and
//! only when the followup is still in the status the operation started from.
//! External failures write error and attempt fields only.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use docfollow_gateway::{InboundMessage, MediaExtractor, MediaItem, MessagingGateway};
use docfollow_persist::{
    FollowupUpdate, JobKind, PersistenceClient, ReminderFilter, ReminderStats, ReminderUpdate,
    ScheduledJob,
};
use docfollow_types::{
    normalize_phone, Appointment, AppointmentStatus, AppointmentUpdate, Decision, Doctor,
    DraftOutcome, Followup, FollowupStatus, HistoryEntry, Patient, Reminder, ReminderStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::booking::{AppointmentBooker, UnconfiguredBooker};
use crate::drafting::{DraftContext, DraftingAgent, OutreachContext};
use crate::error::{EngineError, Result};
use crate::messages::{
    appointment_confirmation, frame_document, frame_patient_message, reminder_message,
    render_template, AVAILABILITY_REQUEST,
};
use crate::scheduler::{ReminderHandler, ReminderScheduler};

/// Statuses from which the availability request may be sent
const BOOKING_ENTRY: [FollowupStatus; 2] = [
    FollowupStatus::WaitingForPatient,
    FollowupStatus::WaitingForDoctor,
];

/// Inbound messages in these statuses go to drafting
const DRAFTING_INBOUND: [FollowupStatus; 2] = [
    FollowupStatus::WaitingForPatient,
    FollowupStatus::WaitingForDoctor,
];

#[derive(Debug, Clone)]
pub struct CreateFollowup {
    pub patient_id: String,
    pub doctor_id: String,
    /// Fire time of the initial outreach; `None` sends immediately
    pub followup_at: Option<DateTime<Utc>>,
    pub message_template: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedFollowup {
    pub followup: Followup,
    pub reminder: Option<Reminder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionRequest {
    pub decision: String,
    pub custom_message: Option<String>,
}

/// Partial update accepted by `PUT /followups/:id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowupPatch {
    pub status: Option<FollowupStatus>,
    pub ai_draft_message: Option<String>,
    pub doctor_summary: Option<String>,
    pub doctor_decision: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateAppointment {
    pub patient_id: String,
    pub doctor_id: String,
    pub datetime: DateTime<Utc>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReminderPatch {
    pub followup_date: Option<DateTime<Utc>>,
    pub message_template: Option<String>,
    pub status: Option<ReminderStatus>,
}

impl ReminderPatch {
    pub fn is_empty(&self) -> bool {
        self.followup_date.is_none() && self.message_template.is_none() && self.status.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundRoute {
    Drafting,
    Booking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    EmptyMessage,
    UnknownSender,
    NoActiveFollowup,
    /// The followup moved on between lookup and write
    StateChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Accepted {
        followup_id: String,
        route: InboundRoute,
    },
    Duplicate {
        followup_id: String,
    },
    Ignored {
        reason: IgnoreReason,
    },
}

#[derive(Clone)]
pub struct FollowupEngine {
    store: Arc<dyn PersistenceClient>,
    gateway: Arc<dyn MessagingGateway>,
    extractor: Arc<dyn MediaExtractor>,
    agent: Option<Arc<dyn DraftingAgent>>,
    booker: Arc<dyn AppointmentBooker>,
    scheduler: Arc<ReminderScheduler>,
}

impl FollowupEngine {
    pub fn new(
        store: Arc<dyn PersistenceClient>,
        gateway: Arc<dyn MessagingGateway>,
        extractor: Arc<dyn MediaExtractor>,
        scheduler: Arc<ReminderScheduler>,
    ) -> Self {
        Self {
            store,
            gateway,
            extractor,
            agent: None,
            booker: Arc::new(UnconfiguredBooker),
            scheduler,
        }
    }

    pub fn with_agent(mut self, agent: Arc<dyn DraftingAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_booker(mut self, booker: Arc<dyn AppointmentBooker>) -> Self {
        self.booker = booker;
        self
    }

    pub fn store(&self) -> &Arc<dyn PersistenceClient> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    pub fn agent_available(&self) -> bool {
        self.agent.is_some()
    }

    pub fn gateway_configured(&self) -> bool {
        self.gateway.is_configured()
    }

    pub fn booking_configured(&self) -> bool {
        self.booker.is_configured()
    }

    fn agent(&self) -> Result<&Arc<dyn DraftingAgent>> {
        self.agent.as_ref().ok_or(EngineError::AgentUnavailable)
    }

    async fn load_followup(&self, followup_id: &str) -> Result<Followup> {
        self.store
            .get_followup(followup_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Followup", followup_id))
    }

    async fn load_patient(&self, patient_id: &str) -> Result<Patient> {
        self.store
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Patient", patient_id))
    }

    async fn load_doctor(&self, doctor_id: &str) -> Result<Doctor> {
        self.store
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Doctor", doctor_id))
    }

    async fn owned_patient(&self, patient_id: &str, doctor_id: &str) -> Result<Patient> {
        let patient = self.load_patient(patient_id).await?;
        if patient.doctor_id != doctor_id {
            return Err(EngineError::not_found("Patient", patient_id));
        }
        Ok(patient)
    }

    async fn owned_followup(&self, followup_id: &str, doctor_id: &str) -> Result<Followup> {
        match self.store.get_followup(followup_id).await? {
            Some(followup) if followup.doctor_id == doctor_id => Ok(followup),
            _ => Err(EngineError::not_found("Followup", followup_id)),
        }
    }

    async fn owned_reminder(&self, reminder_id: &str, doctor_id: &str) -> Result<Reminder> {
        match self.store.get_reminder(reminder_id).await? {
            Some(reminder) if reminder.doctor_id == doctor_id => Ok(reminder),
            _ => Err(EngineError::not_found("Reminder", reminder_id)),
        }
    }

    /// Apply a failure-only update; storage errors are logged, not surfaced
    async fn record_failure(&self, followup_id: &str, update: FollowupUpdate) {
        match self.store.apply_followup_update(followup_id, update).await {
            Ok(Some(_)) => {}
            Ok(None) => warn!(followup_id = %followup_id, "Failure not recorded; followup changed"),
            Err(e) => error!(followup_id = %followup_id, error = %e, "Failed to record failure"),
        }
    }

    /// Record external failures of background steps on the followup
    async fn note_failure(&self, followup_id: &str, err: &EngineError) {
        if matches!(
            err,
            EngineError::NotFound { .. } | EngineError::Conflict(_) | EngineError::InvalidInput(_)
        ) {
            return;
        }
        self.record_failure(
            followup_id,
            FollowupUpdate::new().error(err.to_string()).attempt(),
        )
        .await;
    }

    /// Let a redelivery through again when its first delivery was not recorded
    async fn release_claim(&self, message: &InboundMessage) {
        if let Some(sid) = &message.message_sid {
            if let Err(e) = self.store.release_message_id(sid).await {
                error!(message_sid = %sid, error = %e, "Failed to release message id");
            }
        }
    }

    fn conflict_after_write(followup_id: &str, step: &str) -> EngineError {
        warn!(followup_id = %followup_id, step, "Followup changed concurrently");
        EngineError::Conflict(format!(
            "followup {} changed while {} was in progress",
            followup_id, step
        ))
    }

    // ------------------------------------------------------------ creation

    /// Persist a followup, then either schedule its outreach or send it now
    #[instrument(skip(self, request), fields(patient_id = %request.patient_id))]
    pub async fn create_followup(&self, request: CreateFollowup) -> Result<CreatedFollowup> {
        let patient = self
            .owned_patient(&request.patient_id, &request.doctor_id)
            .await?;
        self.load_doctor(&request.doctor_id).await?;

        if let Some(at) = request.followup_at {
            if at <= Utc::now() {
                return Err(EngineError::InvalidInput(
                    "Follow-up date must be in the future".to_string(),
                ));
            }
        }

        let followup = self
            .store
            .create_followup(
                Followup::new(
                    String::new(),
                    &patient.id,
                    &request.doctor_id,
                    request.followup_at,
                )
                .with_message_template(request.message_template.clone()),
            )
            .await?;
        info!(
            followup_id = %followup.id,
            scheduled = request.followup_at.is_some(),
            "Followup created"
        );

        match request.followup_at {
            Some(at) => {
                let mut reminder =
                    Reminder::new(String::new(), &followup.id, &patient.id, &request.doctor_id, at);
                reminder.message_template = request.message_template;
                let mut reminder = self.store.create_reminder(reminder).await?;

                let job = self.scheduler.schedule(&reminder).await?;
                reminder.scheduled_job_id = Some(job.id);

                Ok(CreatedFollowup {
                    followup: self.load_followup(&followup.id).await?,
                    reminder: Some(reminder),
                })
            }
            None => {
                let followup = self
                    .run_outreach(&followup.id, request.message_template.as_deref())
                    .await?;
                Ok(CreatedFollowup {
                    followup,
                    reminder: None,
                })
            }
        }
    }

    /// Retry the initial outreach with the template the followup was created with
    pub async fn send_initial_outreach(&self, followup_id: &str, doctor_id: &str) -> Result<Followup> {
        self.owned_followup(followup_id, doctor_id).await?;
        self.run_outreach(followup_id, None).await
    }

    async fn outreach_text(
        &self,
        patient: &Patient,
        doctor: &Doctor,
        template: Option<&str>,
        followup_date: Option<DateTime<Utc>>,
    ) -> Result<String> {
        if let Some(template) = template.filter(|t| !t.trim().is_empty()) {
            return Ok(render_template(template, &patient.name, &doctor.name, followup_date));
        }

        match &self.agent {
            Some(agent) => Ok(agent
                .compose_outreach(OutreachContext {
                    patient: patient.clone(),
                    doctor_name: doctor.name.clone(),
                    followup_date,
                })
                .await?),
            None => Ok(reminder_message(&patient.name, &doctor.name, followup_date)),
        }
    }

    #[instrument(skip(self, template))]
    async fn run_outreach(&self, followup_id: &str, template: Option<&str>) -> Result<Followup> {
        let followup = self.load_followup(followup_id).await?;
        if !FollowupStatus::OUTREACH_READY.contains(&followup.status) {
            return Err(EngineError::Conflict(format!(
                "followup {} is {}; initial outreach already happened",
                followup_id, followup.status
            )));
        }

        let patient = self.load_patient(&followup.patient_id).await?;
        let doctor = self.load_doctor(&followup.doctor_id).await?;
        let template = template.or(followup.message_template.as_deref());

        let failed = |message: String| {
            FollowupUpdate::new()
                .expect_status(&FollowupStatus::OUTREACH_READY)
                .status(FollowupStatus::Failed)
                .error(message)
                .attempt()
        };

        let text = match self
            .outreach_text(&patient, &doctor, template, followup.scheduled_for)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Could not compose outreach");
                self.record_failure(followup_id, failed(e.to_string())).await;
                return Err(e);
            }
        };

        if let Err(e) = self.gateway.send(&patient.phone, &text).await {
            warn!(error = %e, "Initial outreach not delivered");
            self.record_failure(followup_id, failed(e.to_string())).await;
            return Err(e.into());
        }

        let update = FollowupUpdate::new()
            .expect_status(&FollowupStatus::OUTREACH_READY)
            .status(FollowupStatus::WaitingForPatient)
            .push_history(HistoryEntry::agent(text))
            .clear_error()
            .attempt();

        let updated = self
            .store
            .apply_followup_update(followup_id, update)
            .await?
            .ok_or_else(|| Self::conflict_after_write(followup_id, "outreach"))?;

        info!("Initial outreach sent; waiting for patient");
        Ok(updated)
    }

    // -------------------------------------------------------------- inbound

    /// Route an inbound patient message to its active followup
    #[instrument(skip(self, message), fields(from = %message.from))]
    pub async fn ingest_inbound(&self, message: InboundMessage) -> Result<IngestOutcome> {
        if message.is_empty() {
            return Ok(IngestOutcome::Ignored {
                reason: IgnoreReason::EmptyMessage,
            });
        }

        let phone = normalize_phone(&message.from);
        let patients = self.store.find_patients_by_phone(&phone).await?;
        if patients.is_empty() {
            info!("Inbound message from unknown number ignored");
            return Ok(IngestOutcome::Ignored {
                reason: IgnoreReason::UnknownSender,
            });
        }

        let mut active: Option<Followup> = None;
        for patient in &patients {
            if let Some(candidate) = self
                .store
                .find_active_followup(&patient.id, &FollowupStatus::AWAITING)
                .await?
            {
                if active
                    .as_ref()
                    .map_or(true, |current| candidate.created_at > current.created_at)
                {
                    active = Some(candidate);
                }
            }
        }

        let Some(followup) = active else {
            info!("No active followup for sender; message ignored");
            return Ok(IngestOutcome::Ignored {
                reason: IgnoreReason::NoActiveFollowup,
            });
        };

        if let Some(sid) = &message.message_sid {
            if let Some(first) = self.store.claim_message_id(sid, &followup.id).await? {
                info!(followup_id = %first, message_sid = %sid, "Duplicate webhook delivery");
                return Ok(IngestOutcome::Duplicate { followup_id: first });
            }
        }

        let mut update = FollowupUpdate::new()
            .push_history(HistoryEntry::patient(history_content(&message)))
            .add_raw_data(message.media_urls());
        if let Some(sid) = &message.message_sid {
            update = update.dedup(sid.clone());
        }
        if !message.body.is_empty() {
            update = update.append_extracted_text(frame_patient_message(&message.body));
        }

        let route = if followup.status == FollowupStatus::AppointmentScheduling {
            update = update.expect_status(&[FollowupStatus::AppointmentScheduling]);
            InboundRoute::Booking
        } else {
            update = update
                .expect_status(&DRAFTING_INBOUND)
                .status(FollowupStatus::WaitingForDoctor);
            InboundRoute::Drafting
        };

        let applied = match self.store.apply_followup_update(&followup.id, update).await {
            Ok(applied) => applied,
            Err(e) => {
                self.release_claim(&message).await;
                return Err(e.into());
            }
        };

        if applied.is_none() {
            let current = self.store.get_followup(&followup.id).await?;
            let duplicate = match (&message.message_sid, current) {
                (Some(sid), Some(current)) => current.has_processed(sid),
                _ => false,
            };
            if duplicate {
                return Ok(IngestOutcome::Duplicate {
                    followup_id: followup.id,
                });
            }
            self.release_claim(&message).await;
            return Ok(IngestOutcome::Ignored {
                reason: IgnoreReason::StateChanged,
            });
        }

        info!(followup_id = %followup.id, route = ?route, media = message.media.len(), "Inbound message recorded");

        match route {
            InboundRoute::Drafting => {
                let engine = self.clone();
                let followup_id = followup.id.clone();
                let media = message.media.clone();
                tokio::spawn(async move {
                    if let Err(e) = engine.generate_draft(&followup_id, &media).await {
                        warn!(followup_id = %followup_id, error = %e, "Draft generation failed");
                    }
                });
            }
            InboundRoute::Booking if !message.body.is_empty() => {
                let engine = self.clone();
                let followup_id = followup.id.clone();
                let text = message.body.clone();
                tokio::spawn(async move {
                    if let Err(e) = engine.book_appointment(&followup_id, &text).await {
                        warn!(followup_id = %followup_id, error = %e, "Appointment booking failed");
                    }
                });
            }
            InboundRoute::Booking => {
                info!(followup_id = %followup.id, "No availability text to book from");
            }
        }

        Ok(IngestOutcome::Accepted {
            followup_id: followup.id,
            route,
        })
    }

    // ------------------------------------------------------------- drafting

    /// Extract media text, ask the agent for a draft, and store it for review
    #[instrument(skip(self, media))]
    pub async fn generate_draft(&self, followup_id: &str, media: &[MediaItem]) -> Result<DraftOutcome> {
        let result = self.try_generate_draft(followup_id, media).await;
        if let Err(e) = &result {
            self.note_failure(followup_id, e).await;
        }
        result
    }

    async fn try_generate_draft(&self, followup_id: &str, media: &[MediaItem]) -> Result<DraftOutcome> {
        let mut segments = Vec::new();
        for item in media {
            match self.extractor.extract(item).await {
                Ok(extracted) if !extracted.text.trim().is_empty() => {
                    segments.push(frame_document(extracted.text.trim()));
                }
                Ok(_) => {}
                Err(e) => warn!(url = %item.url, error = %e, "Media extraction failed"),
            }
        }
        if !segments.is_empty() {
            self.store
                .apply_followup_update(
                    followup_id,
                    FollowupUpdate::new().append_extracted_text(segments.join("\n\n")),
                )
                .await?;
        }

        let agent = self.agent()?;
        let followup = self.load_followup(followup_id).await?;
        if followup.status != FollowupStatus::WaitingForDoctor {
            return Err(EngineError::Conflict(format!(
                "followup {} is {}; drafting needs waiting_for_doctor",
                followup_id, followup.status
            )));
        }
        let patient = self.load_patient(&followup.patient_id).await?;
        let doctor = self.load_doctor(&followup.doctor_id).await?;

        let outcome = agent
            .draft_reply(DraftContext {
                patient,
                doctor_name: doctor.name,
                history: followup.history,
                extracted_text: followup.extracted_text,
            })
            .await?;

        let update = FollowupUpdate::new()
            .expect_status(&[FollowupStatus::WaitingForDoctor])
            .draft(
                Some(outcome.draft_text.clone()),
                Some(outcome.doctor_summary.clone()),
                outcome.suggests_appointment,
            )
            .doctor_decision(None)
            .clear_error();
        self.store
            .apply_followup_update(followup_id, update)
            .await?
            .ok_or_else(|| Self::conflict_after_write(followup_id, "drafting"))?;

        info!(
            suggests_appointment = outcome.suggests_appointment,
            "Draft ready for doctor review"
        );
        Ok(outcome)
    }

    // ------------------------------------------------------- doctor decision

    #[instrument(skip(self, request), fields(decision = %request.decision))]
    pub async fn doctor_decision(
        &self,
        followup_id: &str,
        doctor_id: &str,
        request: DecisionRequest,
    ) -> Result<Followup> {
        let decision = Decision::parse(&request.decision)?;
        if decision != Decision::Approve {
            decision.resolve_message(None, request.custom_message.as_deref())?;
        }

        let followup = self.owned_followup(followup_id, doctor_id).await?;
        if followup.status != FollowupStatus::WaitingForDoctor {
            return Err(EngineError::Conflict(format!(
                "followup {} is {}; a decision needs waiting_for_doctor",
                followup_id, followup.status
            )));
        }

        let message = decision
            .resolve_message(
                followup.ai_draft_message.as_deref(),
                request.custom_message.as_deref(),
            )?
            .ok_or_else(|| {
                EngineError::InvalidInput("Followup has no AI draft to approve".to_string())
            })?;

        let patient = self.load_patient(&followup.patient_id).await?;
        if let Err(e) = self.gateway.send(&patient.phone, &message).await {
            warn!(error = %e, "Doctor's message not delivered");
            self.record_failure(
                followup_id,
                FollowupUpdate::new().error(e.to_string()).attempt(),
            )
            .await;
            return Err(e.into());
        }

        let handoff = followup.suggests_appointment;
        let mut update = FollowupUpdate::new()
            .expect_status(&[FollowupStatus::WaitingForDoctor])
            .push_history(HistoryEntry::doctor(message.clone()))
            .doctor_decision(Some(decision.as_str().to_string()))
            .final_message(message)
            .clear_error();
        if !handoff {
            update = update.status(FollowupStatus::Closed);
        }

        let updated = self
            .store
            .apply_followup_update(followup_id, update)
            .await?
            .ok_or_else(|| Self::conflict_after_write(followup_id, "the doctor decision"))?;

        if !handoff {
            info!("Doctor decision sent; followup closed");
            return Ok(updated);
        }

        info!("Doctor decision sent; handing off to appointment booking");
        match self.request_availability(followup_id).await {
            Ok(booking) => Ok(booking),
            Err(e) => {
                warn!(error = %e, "Appointment handoff failed; doctor can retry");
                self.load_followup(followup_id).await
            }
        }
    }

    pub async fn send_ai_draft(&self, followup_id: &str, doctor_id: &str) -> Result<Followup> {
        self.doctor_decision(
            followup_id,
            doctor_id,
            DecisionRequest {
                decision: Decision::Approve.as_str().to_string(),
                custom_message: None,
            },
        )
        .await
    }

    // ---------------------------------------------------------- appointments

    /// Ask the patient for availability and move to `appointment_scheduling`
    pub async fn start_appointment_booking(
        &self,
        followup_id: &str,
        doctor_id: &str,
    ) -> Result<Followup> {
        self.owned_followup(followup_id, doctor_id).await?;
        self.request_availability(followup_id).await
    }

    #[instrument(skip(self))]
    async fn request_availability(&self, followup_id: &str) -> Result<Followup> {
        let followup = self.load_followup(followup_id).await?;
        if !BOOKING_ENTRY.contains(&followup.status) {
            return Err(EngineError::Conflict(format!(
                "followup {} is {}; booking cannot start",
                followup_id, followup.status
            )));
        }

        let patient = self.load_patient(&followup.patient_id).await?;
        if let Err(e) = self.gateway.send(&patient.phone, AVAILABILITY_REQUEST).await {
            self.record_failure(
                followup_id,
                FollowupUpdate::new().error(e.to_string()).attempt(),
            )
            .await;
            return Err(e.into());
        }

        let update = FollowupUpdate::new()
            .expect_status(&BOOKING_ENTRY)
            .push_history(HistoryEntry::agent(AVAILABILITY_REQUEST))
            .status(FollowupStatus::AppointmentScheduling)
            .clear_error();

        let updated = self
            .store
            .apply_followup_update(followup_id, update)
            .await?
            .ok_or_else(|| Self::conflict_after_write(followup_id, "the booking request"))?;
        info!("Availability requested from patient");
        Ok(updated)
    }

    /// Turn the patient's availability into a calendar event
    #[instrument(skip(self, patient_text))]
    pub async fn book_appointment(&self, followup_id: &str, patient_text: &str) -> Result<Followup> {
        let result = self.try_book_appointment(followup_id, patient_text).await;
        if let Err(e) = &result {
            self.note_failure(followup_id, e).await;
        }
        result
    }

    async fn try_book_appointment(&self, followup_id: &str, patient_text: &str) -> Result<Followup> {
        let agent = self.agent()?;
        let followup = self.load_followup(followup_id).await?;
        if followup.status != FollowupStatus::AppointmentScheduling {
            return Err(EngineError::Conflict(format!(
                "followup {} is {}; nothing to book",
                followup_id, followup.status
            )));
        }

        let patient = self.load_patient(&followup.patient_id).await?;
        let doctor = self.load_doctor(&followup.doctor_id).await?;

        let request = agent
            .parse_availability(patient_text, &patient, &doctor.name)
            .await?;
        let details = self.booker.book(&request, &doctor).await?;
        info!(start = %details.start_time, "Appointment booked");

        let confirmation = appointment_confirmation(details.start_time);
        let booked = Appointment::booked(&doctor.id, &patient.id, followup_id, &details);
        let mut update = FollowupUpdate::new()
            .expect_status(&[FollowupStatus::AppointmentScheduling])
            .appointment_details(details)
            .status(FollowupStatus::Completed);

        update = match self.gateway.send(&patient.phone, &confirmation).await {
            Ok(_) => update
                .push_history(HistoryEntry::agent(confirmation))
                .clear_error(),
            Err(e) => {
                warn!(error = %e, "Booking confirmation not delivered");
                update.error(format!(
                    "Appointment booked but confirmation not delivered: {}",
                    e
                ))
            }
        };

        let followup = self
            .store
            .apply_followup_update(followup_id, update)
            .await?
            .ok_or_else(|| Self::conflict_after_write(followup_id, "booking"))?;

        // The calendar event exists either way; the row only mirrors it
        if let Err(e) = self.store.create_appointment(booked).await {
            error!(followup_id = %followup_id, error = %e, "Failed to record booked appointment");
        }
        Ok(followup)
    }

    pub async fn create_appointment(&self, request: CreateAppointment) -> Result<Appointment> {
        self.owned_patient(&request.patient_id, &request.doctor_id)
            .await?;

        let mut appointment =
            Appointment::new(&request.doctor_id, &request.patient_id, request.datetime);
        if let Some(status) = request.status {
            appointment.status = status;
        }
        let created = self.store.create_appointment(appointment).await?;
        info!(appointment_id = %created.id, datetime = %created.datetime, "Appointment created");
        Ok(created)
    }

    pub async fn list_appointments(&self, doctor_id: &str) -> Result<Vec<Appointment>> {
        Ok(self.store.list_appointments(doctor_id).await?)
    }

    pub async fn get_appointment(&self, appointment_id: &str, doctor_id: &str) -> Result<Appointment> {
        match self.store.get_appointment(appointment_id).await? {
            Some(appointment) if appointment.doctor_id == doctor_id => Ok(appointment),
            _ => Err(EngineError::not_found("Appointment", appointment_id)),
        }
    }

    pub async fn update_appointment(
        &self,
        appointment_id: &str,
        doctor_id: &str,
        update: AppointmentUpdate,
    ) -> Result<Appointment> {
        if update.is_empty() {
            return Err(EngineError::InvalidInput(
                "No valid fields to update".to_string(),
            ));
        }
        self.store
            .update_appointment(appointment_id, doctor_id, update)
            .await?
            .ok_or_else(|| EngineError::not_found("Appointment", appointment_id))
    }

    pub async fn delete_appointment(&self, appointment_id: &str, doctor_id: &str) -> Result<()> {
        if !self
            .store
            .delete_appointment(appointment_id, doctor_id)
            .await?
        {
            return Err(EngineError::not_found("Appointment", appointment_id));
        }
        Ok(())
    }

    // ---------------------------------------------------------- maintenance

    pub async fn get_followup(&self, followup_id: &str, doctor_id: &str) -> Result<Followup> {
        self.owned_followup(followup_id, doctor_id).await
    }

    /// Partial update from the REST surface, validated against the state machine
    pub async fn update_followup(
        &self,
        followup_id: &str,
        doctor_id: &str,
        patch: FollowupPatch,
    ) -> Result<Followup> {
        let followup = self.owned_followup(followup_id, doctor_id).await?;
        if followup.status.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "followup {} is {} and can no longer change",
                followup_id, followup.status
            )));
        }

        let mut update = FollowupUpdate::new().expect_status(&[followup.status]);
        let mut changed = false;

        if let Some(next) = patch.status.filter(|next| *next != followup.status) {
            if !followup.status.can_transition_to(next) {
                return Err(EngineError::InvalidInput(format!(
                    "Invalid status transition: {} -> {}",
                    followup.status, next
                )));
            }
            update = update.status(next);
            changed = true;
        }
        if let Some(draft) = patch.ai_draft_message {
            update.ai_draft_message = Some(Some(draft));
            changed = true;
        }
        if let Some(summary) = patch.doctor_summary {
            update.doctor_summary = Some(Some(summary));
            changed = true;
        }
        if let Some(decision) = patch.doctor_decision {
            let decision = Decision::parse(&decision)?;
            update = update.doctor_decision(Some(decision.as_str().to_string()));
            changed = true;
        }

        if !changed {
            return Err(EngineError::InvalidInput(
                "No valid fields to update".to_string(),
            ));
        }

        self.store
            .apply_followup_update(followup_id, update)
            .await?
            .ok_or_else(|| Self::conflict_after_write(followup_id, "the update"))
    }

    /// Delete a followup, cancelling its pending reminders
    pub async fn delete_followup(&self, followup_id: &str, doctor_id: &str) -> Result<()> {
        let followup = self.owned_followup(followup_id, doctor_id).await?;
        if let Some(job_id) = &followup.scheduled_job_id {
            self.scheduler.cancel(job_id).await;
        }

        for reminder in self
            .store
            .list_reminders_for_patient(&followup.patient_id)
            .await?
            .into_iter()
            .filter(|r| r.followup_id == followup_id)
        {
            self.cancel_reminder(&reminder).await?;
        }

        if !self.store.delete_followup(followup_id).await? {
            return Err(EngineError::not_found("Followup", followup_id));
        }
        info!(followup_id = %followup_id, "Followup deleted");
        Ok(())
    }

    async fn cancel_reminder(&self, reminder: &Reminder) -> Result<()> {
        if reminder.status != ReminderStatus::Pending {
            return Ok(());
        }
        if let Some(job_id) = &reminder.scheduled_job_id {
            self.scheduler.cancel(job_id).await;
        }
        self.store
            .update_reminder(
                &reminder.id,
                ReminderUpdate::new()
                    .status(ReminderStatus::Cancelled)
                    .scheduled_job_id(None),
            )
            .await?;
        Ok(())
    }

    /// Delete a patient after cancelling their pending reminders
    pub async fn remove_patient(&self, patient_id: &str, doctor_id: &str) -> Result<()> {
        self.owned_patient(patient_id, doctor_id).await?;
        for reminder in self.store.list_reminders_for_patient(patient_id).await? {
            self.cancel_reminder(&reminder).await?;
        }
        if !self.store.delete_patient(patient_id, doctor_id).await? {
            return Err(EngineError::not_found("Patient", patient_id));
        }
        Ok(())
    }

    /// Move the patient's pending reminder, or schedule a new followup
    pub async fn reschedule_patient(
        &self,
        patient_id: &str,
        doctor_id: &str,
        followup_at: DateTime<Utc>,
    ) -> Result<CreatedFollowup> {
        self.owned_patient(patient_id, doctor_id).await?;

        let pending = self
            .store
            .list_reminders_for_patient(patient_id)
            .await?
            .into_iter()
            .filter(|r| r.status == ReminderStatus::Pending)
            .max_by_key(|r| r.created_at);

        match pending {
            Some(reminder) => {
                let reminder = self
                    .update_reminder(
                        &reminder.id,
                        doctor_id,
                        ReminderPatch {
                            followup_date: Some(followup_at),
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok(CreatedFollowup {
                    followup: self.load_followup(&reminder.followup_id).await?,
                    reminder: Some(reminder),
                })
            }
            None => {
                self.create_followup(CreateFollowup {
                    patient_id: patient_id.to_string(),
                    doctor_id: doctor_id.to_string(),
                    followup_at: Some(followup_at),
                    message_template: None,
                })
                .await
            }
        }
    }

    // ------------------------------------------------------------ reminders

    pub async fn get_reminder(&self, reminder_id: &str, doctor_id: &str) -> Result<Reminder> {
        self.owned_reminder(reminder_id, doctor_id).await
    }

    pub async fn update_reminder(
        &self,
        reminder_id: &str,
        doctor_id: &str,
        patch: ReminderPatch,
    ) -> Result<Reminder> {
        let existing = self.owned_reminder(reminder_id, doctor_id).await?;
        if patch.is_empty() {
            return Err(EngineError::InvalidInput(
                "No valid fields to update".to_string(),
            ));
        }

        let mut update = ReminderUpdate::new();
        if let Some(date) = patch.followup_date {
            if date <= Utc::now() {
                return Err(EngineError::InvalidInput(
                    "Follow-up date must be in the future".to_string(),
                ));
            }
            update = update.followup_date(date);
        }
        if let Some(template) = patch.message_template {
            update = update.message_template(Some(template));
        }
        if let Some(status) = patch.status {
            update = update.status(status);
        }

        let mut updated = self
            .store
            .update_reminder(reminder_id, update)
            .await?
            .ok_or_else(|| EngineError::not_found("Reminder", reminder_id))?;

        if updated.status == ReminderStatus::Cancelled {
            if let Some(job_id) = &existing.scheduled_job_id {
                self.scheduler.cancel(job_id).await;
            }
            updated = self
                .store
                .update_reminder(reminder_id, ReminderUpdate::new().scheduled_job_id(None))
                .await?
                .ok_or_else(|| EngineError::not_found("Reminder", reminder_id))?;
        } else if patch.followup_date.is_some() && updated.status == ReminderStatus::Pending {
            let job = self
                .scheduler
                .reschedule(existing.scheduled_job_id.as_deref(), &updated)
                .await?;
            updated.scheduled_job_id = Some(job.id);
        }

        Ok(updated)
    }

    /// Delete a reminder; returns the cancelled job id, if any
    pub async fn delete_reminder(&self, reminder_id: &str, doctor_id: &str) -> Result<Option<String>> {
        let reminder = self.owned_reminder(reminder_id, doctor_id).await?;
        let cancelled = match &reminder.scheduled_job_id {
            Some(job_id) if self.scheduler.cancel(job_id).await => Some(job_id.clone()),
            _ => None,
        };
        if !self.store.delete_reminder(reminder_id).await? {
            return Err(EngineError::not_found("Reminder", reminder_id));
        }
        Ok(cancelled)
    }

    /// Fire a reminder's outreach immediately, outside the schedule
    #[instrument(skip(self))]
    pub async fn send_now(&self, reminder_id: &str, doctor_id: &str) -> Result<Reminder> {
        let reminder = self.owned_reminder(reminder_id, doctor_id).await?;
        match reminder.status {
            ReminderStatus::Sent => {
                return Err(EngineError::Conflict("Reminder already sent".to_string()))
            }
            ReminderStatus::Cancelled => {
                return Err(EngineError::Conflict("Reminder is cancelled".to_string()))
            }
            ReminderStatus::Pending | ReminderStatus::Failed => {}
        }

        if let Some(job_id) = &reminder.scheduled_job_id {
            self.scheduler.cancel(job_id).await;
        }
        self.fire_reminder(reminder_id).await
    }

    /// Run the outreach for a reminder and record the result on it
    pub async fn fire_reminder(&self, reminder_id: &str) -> Result<Reminder> {
        let reminder = self
            .store
            .get_reminder(reminder_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Reminder", reminder_id))?;

        if !matches!(reminder.status, ReminderStatus::Pending | ReminderStatus::Failed) {
            info!(reminder_id = %reminder_id, status = %reminder.status, "Reminder no longer pending; skipped");
            return Ok(reminder);
        }

        let outcome = self
            .run_outreach(&reminder.followup_id, reminder.message_template.as_deref())
            .await;

        let update = ReminderUpdate::new().attempt().scheduled_job_id(None);
        let update = match &outcome {
            Ok(_) => update.status(ReminderStatus::Sent).error(None),
            Err(e) => update
                .status(ReminderStatus::Failed)
                .error(Some(e.to_string())),
        };
        let updated = self
            .store
            .update_reminder(reminder_id, update)
            .await?
            .ok_or_else(|| EngineError::not_found("Reminder", reminder_id))?;

        outcome.map(|_| updated)
    }

    pub async fn reminder_stats(&self, doctor_id: &str) -> Result<ReminderStats> {
        let counts = self.store.reminder_status_counts(doctor_id).await?;
        let now = Utc::now();

        let upcoming = self
            .store
            .count_reminders(
                &ReminderFilter::for_doctor(doctor_id)
                    .with_statuses(&[ReminderStatus::Pending])
                    .due_before(now + ChronoDuration::days(7)),
            )
            .await?;
        let overdue = self
            .store
            .count_reminders(
                &ReminderFilter::for_doctor(doctor_id)
                    .with_statuses(&[ReminderStatus::Pending, ReminderStatus::Failed])
                    .due_before(now),
            )
            .await?;

        Ok(ReminderStats::from_counts(counts, upcoming, overdue))
    }
}

#[async_trait]
impl ReminderHandler for FollowupEngine {
    async fn fire(&self, job: &ScheduledJob) -> Result<()> {
        match &job.kind {
            JobKind::FollowupReminder { reminder_id, .. } => {
                self.fire_reminder(reminder_id).await.map(|_| ())
            }
        }
    }
}

/// History text for an inbound message; media-only messages get a marker
fn history_content(message: &InboundMessage) -> String {
    match (message.body.is_empty(), message.media.len()) {
        (false, _) => message.body.clone(),
        (true, 1) => "[1 attachment received]".to_string(),
        (true, n) => format!("[{} attachments received]", n),
    }
}
