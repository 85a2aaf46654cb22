#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use docfollow_engine::{
    AgentError, AppointmentBooker, BookingError, DraftContext, DraftingAgent, FollowupEngine,
    OutreachContext, ReminderScheduler, SchedulerConfig, outreach_instruction,
};
use docfollow_gateway::{
    ExtractedMedia, GatewayError, MediaExtractor, MediaItem, MediaKind, MessagingGateway,
    SentMessage,
};
use docfollow_persist::{InMemoryJobStore, InMemoryPersistenceClient, PersistenceClient};
use docfollow_types::{
    AppointmentDetails, AppointmentRequest, Doctor, DraftOutcome, Followup, Patient,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PATIENT_PHONE: &str = "+15550001";

#[derive(Default)]
pub struct FakeGateway {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl FakeGateway {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessagingGateway for FakeGateway {
    async fn send(&self, to: &str, body: &str) -> docfollow_gateway::Result<SentMessage> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: 503,
                message: "gateway down".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), body.to_string()));
        Ok(SentMessage {
            sid: format!("SM{}", sent.len()),
            status: "queued".to_string(),
        })
    }

    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct FakeExtractor {
    pub texts: HashMap<String, String>,
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    async fn extract(&self, item: &MediaItem) -> docfollow_gateway::Result<ExtractedMedia> {
        Ok(ExtractedMedia {
            url: item.url.clone(),
            content_type: item.content_type.clone(),
            kind: MediaKind::from_mime(&item.content_type),
            text: self.texts.get(&item.url).cloned().unwrap_or_default(),
        })
    }
}

pub struct FakeAgent {
    pub outcome: Mutex<DraftOutcome>,
    pub instructions: Mutex<Vec<String>>,
    pub drafted_from: Mutex<Vec<String>>,
}

impl FakeAgent {
    pub fn new(outcome: DraftOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            instructions: Mutex::new(Vec::new()),
            drafted_from: Mutex::new(Vec::new()),
        }
    }

    pub fn set_outcome(&self, outcome: DraftOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }
}

#[async_trait]
impl DraftingAgent for FakeAgent {
    async fn compose_outreach(&self, ctx: OutreachContext) -> Result<String, AgentError> {
        let instruction = outreach_instruction(&ctx.patient.diagnosis).to_string();
        self.instructions.lock().unwrap().push(instruction.clone());
        Ok(format!("Hello {}. {}", ctx.patient.name, instruction))
    }

    async fn draft_reply(&self, ctx: DraftContext) -> Result<DraftOutcome, AgentError> {
        self.drafted_from.lock().unwrap().push(ctx.extracted_text);
        Ok(self.outcome.lock().unwrap().clone())
    }

    async fn parse_availability(
        &self,
        text: &str,
        patient: &Patient,
        _doctor_name: &str,
    ) -> Result<AppointmentRequest, AgentError> {
        if !text.to_ascii_lowercase().contains("tomorrow") {
            return Err(AgentError::InvalidResponse("no date found".to_string()));
        }
        let start = Utc::now() + ChronoDuration::days(1);
        Ok(AppointmentRequest {
            title: format!("Appointment with {}", patient.name),
            start_time: start,
            end_time: start + ChronoDuration::minutes(30),
            description: None,
        })
    }
}

pub struct FakeBooker;

#[async_trait]
impl AppointmentBooker for FakeBooker {
    async fn book(
        &self,
        request: &AppointmentRequest,
        _doctor: &Doctor,
    ) -> Result<AppointmentDetails, BookingError> {
        Ok(AppointmentDetails {
            event_title: request.title.clone(),
            start_time: request.start_time,
            end_time: request.end_time,
            calendar_event_id: Some("evt_1".to_string()),
        })
    }

    fn is_configured(&self) -> bool {
        true
    }
}

pub fn normal_outcome() -> DraftOutcome {
    DraftOutcome {
        draft_text: "Thanks, your readings look stable. Keep up the diet.".to_string(),
        doctor_summary: "Fasting glucose 110-124 mg/dL over 3 days.".to_string(),
        suggests_appointment: false,
    }
}

pub struct Harness {
    pub store: Arc<InMemoryPersistenceClient>,
    pub jobs: Arc<InMemoryJobStore>,
    pub gateway: Arc<FakeGateway>,
    pub agent: Arc<FakeAgent>,
    pub scheduler: Arc<ReminderScheduler>,
    pub engine: FollowupEngine,
}

pub struct HarnessOptions {
    pub with_agent: bool,
    pub with_booker: bool,
    pub media_texts: HashMap<String, String>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            with_agent: true,
            with_booker: true,
            media_texts: HashMap::new(),
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_options(options: HarnessOptions) -> Self {
        let store = Arc::new(InMemoryPersistenceClient::new());
        let jobs = Arc::new(InMemoryJobStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let agent = Arc::new(FakeAgent::new(normal_outcome()));

        let scheduler = Arc::new(ReminderScheduler::new(
            store.clone(),
            jobs.clone(),
            SchedulerConfig::default().with_poll_interval(10),
        ));

        let mut engine = FollowupEngine::new(
            store.clone(),
            gateway.clone(),
            Arc::new(FakeExtractor {
                texts: options.media_texts,
            }),
            scheduler.clone(),
        );
        if options.with_agent {
            engine = engine.with_agent(agent.clone());
        }
        if options.with_booker {
            engine = engine.with_booker(Arc::new(FakeBooker));
        }

        Self {
            store,
            jobs,
            gateway,
            agent,
            scheduler,
            engine,
        }
    }

    pub async fn seed(&self, diagnosis: &str) -> (Doctor, Patient) {
        let doctor = self
            .store
            .create_doctor(Doctor {
                id: String::new(),
                name: "Rao".to_string(),
                email: format!("rao+{}@clinic.test", diagnosis),
                password_hash: "hash".to_string(),
                whatsapp_connected: true,
                whatsapp_number: None,
                whatsapp_sandbox_id: None,
                google_calendar_connected: false,
                settings: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let patient = self
            .store
            .create_patient(Patient {
                id: String::new(),
                doctor_id: doctor.id.clone(),
                name: "Asha".to_string(),
                diagnosis: diagnosis.to_string(),
                phone: PATIENT_PHONE.to_string(),
                address: None,
                notes: None,
                image_url: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        (doctor, patient)
    }

    pub async fn followup(&self, id: &str) -> Followup {
        self.store.get_followup(id).await.unwrap().unwrap()
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
