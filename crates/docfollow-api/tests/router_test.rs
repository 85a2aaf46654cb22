use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use docfollow_api::{build_router, config::Config, state::AppState};
use docfollow_engine::{
    AgentError, DraftContext, DraftingAgent, FollowupEngine, OutreachContext, ReminderScheduler,
    SchedulerConfig,
};
use docfollow_gateway::{
    ExtractedMedia, MediaExtractor, MediaItem, MediaKind, MessagingGateway, SentMessage,
};
use docfollow_persist::{InMemoryJobStore, InMemoryPersistenceClient};
use docfollow_types::{AppointmentRequest, DraftOutcome, Patient};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

const CONFIG: &str = r#"
    [server]
    host = "127.0.0.1"
    port = 0

    [cors]
    enabled = true
    origins = ["*"]

    [mongodb]
    database = "docfollow_test"

    [llm]
    model = "gpt-4o"
    temperature = 0.3

    [logging]
    level = "debug"
    format = "pretty"
"#;

#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send(&self, to: &str, body: &str) -> docfollow_gateway::Result<SentMessage> {
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

struct TextOnlyExtractor;

#[async_trait]
impl MediaExtractor for TextOnlyExtractor {
    async fn extract(&self, item: &MediaItem) -> docfollow_gateway::Result<ExtractedMedia> {
        Ok(ExtractedMedia {
            url: item.url.clone(),
            content_type: item.content_type.clone(),
            kind: MediaKind::from_mime(&item.content_type),
            text: String::new(),
        })
    }
}

struct CannedAgent;

#[async_trait]
impl DraftingAgent for CannedAgent {
    async fn compose_outreach(&self, ctx: OutreachContext) -> Result<String, AgentError> {
        Ok(format!("Hello {}, please share your sugar readings.", ctx.patient.name))
    }

    async fn draft_reply(&self, _ctx: DraftContext) -> Result<DraftOutcome, AgentError> {
        Ok(DraftOutcome {
            draft_text: "Your readings look stable. Keep it up.".to_string(),
            doctor_summary: "Fasting glucose 110-120 mg/dL.".to_string(),
            suggests_appointment: false,
        })
    }

    async fn parse_availability(
        &self,
        _text: &str,
        _patient: &Patient,
        _doctor_name: &str,
    ) -> Result<AppointmentRequest, AgentError> {
        Err(AgentError::InvalidResponse("not used".to_string()))
    }
}

struct TestApp {
    router: Router,
    gateway: Arc<RecordingGateway>,
}

fn test_app(with_agent: bool) -> TestApp {
    let config: Config = toml::from_str(CONFIG).unwrap();
    let store = Arc::new(InMemoryPersistenceClient::new());
    let jobs = Arc::new(InMemoryJobStore::new());
    let gateway = Arc::new(RecordingGateway::default());

    let scheduler = Arc::new(ReminderScheduler::new(
        store.clone(),
        jobs,
        SchedulerConfig::default(),
    ));
    let mut engine = FollowupEngine::new(
        store,
        gateway.clone(),
        Arc::new(TextOnlyExtractor),
        scheduler,
    );
    if with_agent {
        engine = engine.with_agent(Arc::new(CannedAgent));
    }

    TestApp {
        router: build_router(Arc::new(AppState::new(config, engine))),
        gateway,
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn post_webhook(router: &Router, form: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/whatsapp")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn signup(router: &Router, email: &str) -> String {
    let (status, body) = send(
        router,
        Method::POST,
        "/doctors/signup",
        Some(json!({"name": "Dr. Rao", "email": email, "password": "s3cret"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_patient(router: &Router, doctor_id: &str) -> String {
    let (status, body) = send(
        router,
        Method::POST,
        "/patients",
        Some(json!({
            "doctor_id": doctor_id,
            "name": "Asha",
            "disease": "Diabetes",
            "phone": "whatsapp:+15550001"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["phone"], "+15550001");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_signup_rejects_duplicate_email() {
    let app = test_app(true);
    signup(&app.router, "Rao@Clinic.test").await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/doctors/signup",
        Some(json!({"name": "Other", "email": "rao@clinic.test", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn test_signup_never_returns_password_hash() {
    let app = test_app(true);
    let doctor_id = signup(&app.router, "rao@clinic.test").await;

    let (status, body) = send(
        &app.router,
        Method::GET,
        &format!("/settings/{}", doctor_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("password_hash").is_none());
    assert_eq!(body["whatsapp_connected"], false);
}

#[tokio::test]
async fn test_patient_create_and_list() {
    let app = test_app(true);
    let doctor_id = signup(&app.router, "rao@clinic.test").await;
    let patient_id = create_patient(&app.router, &doctor_id).await;

    let (status, body) = send(
        &app.router,
        Method::GET,
        &format!("/patients?doctor_id={}", doctor_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let patients = body.as_array().unwrap();
    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0]["id"], patient_id.as_str());
    assert_eq!(patients[0]["scheduled_reminder"], false);
}

#[tokio::test]
async fn test_patient_with_future_date_gets_scheduled_reminder() {
    let app = test_app(true);
    let doctor_id = signup(&app.router, "rao@clinic.test").await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/patients",
        Some(json!({
            "doctor_id": doctor_id,
            "name": "Ravi",
            "diagnosis": "fever",
            "phone": "+15550002",
            "followup_date": "2099-01-15",
            "followup_time": "09:30"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["scheduled_reminder"], true);
    assert!(body["reminder_id"].is_string());
    assert!(app.gateway.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_patient_with_past_date_rejected() {
    let app = test_app(true);
    let doctor_id = signup(&app.router, "rao@clinic.test").await;

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/patients",
        Some(json!({
            "doctor_id": doctor_id,
            "name": "Ravi",
            "diagnosis": "fever",
            "phone": "+15550002",
            "followup_date": "2001-01-15",
            "followup_time": "09:30"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_followup_decision_flow() {
    let app = test_app(true);
    let doctor_id = signup(&app.router, "rao@clinic.test").await;
    let patient_id = create_patient(&app.router, &doctor_id).await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/followups",
        Some(json!({"patient_id": patient_id, "doctor_id": doctor_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["followup"]["status"], "waiting_for_patient");
    let followup_id = body["followup"]["id"].as_str().unwrap().to_string();

    let (status, body) = post_webhook(
        &app.router,
        "From=whatsapp%3A%2B15550001&Body=Fasting+sugar+118&MessageSid=SM900&NumMedia=0",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "accepted");

    // Drafting runs in the background
    let mut drafted = false;
    for _ in 0..100 {
        let (_, followup) = send(
            &app.router,
            Method::GET,
            &format!("/followups/{}?doctor_id={}", followup_id, doctor_id),
            None,
        )
        .await;
        if followup["status"] == "waiting_for_doctor" && followup["ai_draft_message"].is_string() {
            drafted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(drafted, "draft never reached the doctor");

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/followups/{}/decision?doctor_id={}", followup_id, doctor_id),
        Some(json!({"decision": "approve"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "closed");

    let sent = app.gateway.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].1, "Your readings look stable. Keep it up.");
}

#[tokio::test]
async fn test_followups_hidden_from_other_doctors() {
    let app = test_app(true);
    let doctor_id = signup(&app.router, "rao@clinic.test").await;
    let other_id = signup(&app.router, "mehta@clinic.test").await;
    let patient_id = create_patient(&app.router, &doctor_id).await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/followups",
        Some(json!({"patient_id": patient_id, "doctor_id": doctor_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let followup_id = body["followup"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app.router,
        Method::GET,
        &format!("/followups/{}?doctor_id={}", followup_id, other_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/followups/{}/appointment?doctor_id={}", followup_id, other_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        Method::DELETE,
        &format!("/followups/{}?doctor_id={}", followup_id, other_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = send(
        &app.router,
        Method::GET,
        &format!("/followups?doctor_id={}", other_id),
        None,
    )
    .await;
    assert!(listed.as_array().unwrap().is_empty());

    let (status, listed) = send(
        &app.router,
        Method::GET,
        &format!("/followups?doctor_id={}", doctor_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    // Only the outreach went out
    assert_eq!(app.gateway.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_decision_is_bad_request() {
    let app = test_app(true);
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/followups/any/decision?doctor_id=d1",
        Some(json!({"decision": "reject"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("reject"));
}

#[tokio::test]
async fn test_unknown_followup_is_not_found() {
    let app = test_app(true);
    let (status, body) = send(&app.router, Method::GET, "/followups/missing?doctor_id=d1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_status_filter_is_bad_request() {
    let app = test_app(true);
    let (status, _) = send(&app.router, Method::GET, "/followups?doctor_id=d1&status=archived", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_noop_conditions_answer_ok() {
    let app = test_app(true);

    let (status, body) = post_webhook(&app.router, "Body=hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason"], "unknown_sender");

    let (status, body) = post_webhook(&app.router, "From=whatsapp%3A%2B19990000&Body=hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
}

#[tokio::test]
async fn test_health_reports_missing_agent() {
    let app = test_app(false);
    let (status, body) = send(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["agents"], "unavailable");
    assert_eq!(body["services"]["database"], "connected");
    assert_eq!(body["scheduler"]["total_jobs"], 0);
}

#[tokio::test]
async fn test_reminder_stats_and_delete() {
    let app = test_app(true);
    let doctor_id = signup(&app.router, "rao@clinic.test").await;
    let patient_id = create_patient(&app.router, &doctor_id).await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/reminders?doctor_id={}", doctor_id),
        Some(json!({
            "patient_id": patient_id,
            "followup_date": "2099-06-01T10:00:00Z",
            "message_template": "Hi {patient_name}, checking in."
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let reminder_id = body["reminder"]["id"].as_str().unwrap().to_string();

    let (status, stats) = send(
        &app.router,
        Method::GET,
        &format!("/reminders/stats/{}", doctor_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_reminders"], 1);
    assert_eq!(stats["status_breakdown"]["pending"], 1);
    assert_eq!(stats["overdue_reminders"], 0);

    let (status, body) = send(
        &app.router,
        Method::DELETE,
        &format!("/reminders/{}?doctor_id={}", reminder_id, doctor_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["cancelled_job_id"]
        .as_str()
        .unwrap()
        .starts_with(&format!("followup_reminder_{}_", reminder_id)));

    let (status, _) = send(
        &app.router,
        Method::GET,
        &format!("/reminders/{}?doctor_id=someone-else", reminder_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_appointment_crud_scoped_to_doctor() {
    let app = test_app(true);
    let doctor_id = signup(&app.router, "rao@clinic.test").await;
    let patient_id = create_patient(&app.router, &doctor_id).await;

    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/appointments?doctor_id={}", doctor_id),
        Some(json!({
            "patient_id": patient_id,
            "datetime": "2099-06-02T09:00:00Z",
            "status": "no_show"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/appointments?doctor_id={}", doctor_id),
        Some(json!({"patient_id": patient_id, "datetime": "2099-06-02T09:00:00Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "scheduled");
    let appointment_id = body["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app.router,
        Method::GET,
        &format!("/appointments/{}?doctor_id=someone-else", appointment_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        Method::PUT,
        &format!("/appointments/{}?doctor_id={}", appointment_id, doctor_id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        Method::PUT,
        &format!("/appointments/{}?doctor_id={}", appointment_id, doctor_id),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (_, listed) = send(
        &app.router,
        Method::GET,
        &format!("/appointments?doctor_id={}", doctor_id),
        None,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app.router,
        Method::DELETE,
        &format!("/appointments/{}?doctor_id=someone-else", appointment_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        Method::DELETE,
        &format!("/appointments/{}?doctor_id={}", appointment_id, doctor_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
