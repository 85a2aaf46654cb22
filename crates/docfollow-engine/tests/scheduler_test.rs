mod common;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use common::{eventually, Harness};
use docfollow_engine::{
    CreateFollowup, EngineError, ReminderHandler, ReminderScheduler, SchedulerConfig,
};
use docfollow_persist::{
    InMemoryJobStore, InMemoryPersistenceClient, JobKind, JobStore, PersistenceClient,
    ScheduledJob,
};
use docfollow_types::{Followup, FollowupStatus, Reminder, ReminderStatus};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
struct RecordingHandler {
    fired: Mutex<Vec<String>>,
}

impl RecordingHandler {
    fn fired(&self) -> Vec<String> {
        self.fired.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReminderHandler for RecordingHandler {
    async fn fire(&self, job: &ScheduledJob) -> Result<(), EngineError> {
        self.fired.lock().unwrap().push(job.id.clone());
        Ok(())
    }
}

fn job(id: &str, run_at: chrono::DateTime<Utc>) -> ScheduledJob {
    ScheduledJob::new(
        id,
        JobKind::FollowupReminder {
            reminder_id: format!("r-{}", id),
            followup_id: "f1".to_string(),
            patient_id: "p1".to_string(),
            doctor_id: "d1".to_string(),
        },
        run_at,
    )
}

struct Fixture {
    store: Arc<InMemoryPersistenceClient>,
    jobs: Arc<InMemoryJobStore>,
    scheduler: Arc<ReminderScheduler>,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryPersistenceClient::new());
    let jobs = Arc::new(InMemoryJobStore::new());
    let scheduler = Arc::new(ReminderScheduler::new(
        store.clone(),
        jobs.clone(),
        SchedulerConfig::default().with_poll_interval(10),
    ));
    Fixture {
        store,
        jobs,
        scheduler,
    }
}

async fn seeded_reminder(store: &InMemoryPersistenceClient, at: chrono::DateTime<Utc>) -> Reminder {
    let followup = store
        .create_followup(Followup::new("", "p1", "d1", Some(at)))
        .await
        .unwrap();
    store
        .create_reminder(Reminder::new("", &followup.id, "p1", "d1", at))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_past_reminder_clamps_to_thirty_seconds() {
    let f = fixture();
    let reminder = seeded_reminder(&f.store, Utc::now() - ChronoDuration::hours(1)).await;

    let before = Utc::now();
    let scheduled = f.scheduler.schedule(&reminder).await.unwrap();
    let after = Utc::now();

    assert!(scheduled.run_at >= before + ChronoDuration::seconds(30));
    assert!(scheduled.run_at <= after + ChronoDuration::seconds(30));
    assert_eq!(
        scheduled.id,
        format!("followup_reminder_{}_{}", reminder.id, scheduled.run_at.timestamp())
    );

    let stored = f.store.get_reminder(&reminder.id).await.unwrap().unwrap();
    assert_eq!(stored.scheduled_job_id.as_deref(), Some(scheduled.id.as_str()));
    let followup = f.store.get_followup(&reminder.followup_id).await.unwrap().unwrap();
    assert_eq!(followup.scheduled_for, Some(scheduled.run_at));
    assert_eq!(followup.scheduled_job_id.as_deref(), Some(scheduled.id.as_str()));
}

#[tokio::test]
async fn test_due_jobs_fire_once_and_cancelled_never_fire() {
    let f = fixture();
    let handler = Arc::new(RecordingHandler::default());

    f.jobs
        .insert(job("due", Utc::now() - ChronoDuration::seconds(1)))
        .await
        .unwrap();
    f.jobs
        .insert(job("cancelled", Utc::now() - ChronoDuration::seconds(1)))
        .await
        .unwrap();
    assert!(f.scheduler.cancel("cancelled").await);

    let handle = f.scheduler.clone().start(handler.clone());
    assert!(eventually(|| async { handler.fired().len() == 1 }).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    handle.shutdown().await;

    assert_eq!(handler.fired(), vec!["due".to_string()]);
    assert_eq!(f.jobs.count().await.unwrap(), 0);
    // Already claimed: a late cancel reports false
    assert!(!f.scheduler.cancel("due").await);
    assert!(!f.scheduler.is_running());
}

/// Blocks the job named "slow" until released
#[derive(Default)]
struct GatedHandler {
    release: Notify,
    fired: Mutex<Vec<String>>,
}

impl GatedHandler {
    fn fired(&self) -> Vec<String> {
        self.fired.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReminderHandler for GatedHandler {
    async fn fire(&self, job: &ScheduledJob) -> Result<(), EngineError> {
        self.fired.lock().unwrap().push(format!("start:{}", job.id));
        if job.id == "slow" {
            self.release.notified().await;
        }
        self.fired.lock().unwrap().push(format!("done:{}", job.id));
        Ok(())
    }
}

#[tokio::test]
async fn test_slow_fire_does_not_hold_back_later_jobs() {
    let f = fixture();
    let handler = Arc::new(GatedHandler::default());
    f.jobs
        .insert(job("slow", Utc::now() - ChronoDuration::seconds(1)))
        .await
        .unwrap();

    let handle = f.scheduler.clone().start(handler.clone());
    assert!(eventually(|| async { handler.fired().contains(&"start:slow".to_string()) }).await);

    f.jobs
        .insert(job("quick", Utc::now() - ChronoDuration::seconds(1)))
        .await
        .unwrap();
    assert!(eventually(|| async { handler.fired().contains(&"done:quick".to_string()) }).await);
    assert!(!handler.fired().contains(&"done:slow".to_string()));

    handler.release.notify_one();
    handle.shutdown().await;
    assert!(handler.fired().contains(&"done:slow".to_string()));
}

#[tokio::test]
async fn test_misfired_job_still_fires() {
    let f = fixture();
    let handler = Arc::new(RecordingHandler::default());
    f.jobs
        .insert(job("late", Utc::now() - ChronoDuration::hours(1)))
        .await
        .unwrap();

    let handle = f.scheduler.clone().start(handler.clone());
    assert!(eventually(|| async { handler.fired() == vec!["late".to_string()] }).await);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_future_job_waits() {
    let f = fixture();
    let handler = Arc::new(RecordingHandler::default());
    f.jobs
        .insert(job("later", Utc::now() + ChronoDuration::hours(1)))
        .await
        .unwrap();

    let handle = f.scheduler.clone().start(handler.clone());
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let status = f.scheduler.status().await.unwrap();
    assert!(status.initialized);
    assert_eq!(status.total_jobs, 1);
    assert_eq!(status.jobs[0].kind, "followup_reminder");

    handle.shutdown().await;
    assert!(handler.fired().is_empty());
}

#[tokio::test]
async fn test_disabled_scheduler_does_not_poll() {
    let store = Arc::new(InMemoryPersistenceClient::new());
    let jobs = Arc::new(InMemoryJobStore::new());
    let scheduler = Arc::new(ReminderScheduler::new(
        store,
        jobs.clone(),
        SchedulerConfig::default().with_enabled(false).with_poll_interval(10),
    ));
    jobs.insert(job("due", Utc::now())).await.unwrap();

    let handler = Arc::new(RecordingHandler::default());
    let handle = scheduler.clone().start(handler.clone());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    handle.shutdown().await;

    assert!(handler.fired().is_empty());
    assert_eq!(jobs.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_cleanup_sweeps_only_old_finished_records() {
    let f = fixture();
    let now = Utc::now();

    let mut old_completed = Followup::new("", "p1", "d1", None);
    old_completed.status = FollowupStatus::Completed;
    old_completed.created_at = now - ChronoDuration::days(31);
    f.store.create_followup(old_completed).await.unwrap();

    let mut recent_closed = Followup::new("", "p1", "d1", None);
    recent_closed.status = FollowupStatus::Closed;
    recent_closed.created_at = now - ChronoDuration::days(5);
    f.store.create_followup(recent_closed).await.unwrap();

    let mut old_cancelled = Reminder::new("", "f1", "p1", "d1", now - ChronoDuration::days(40));
    old_cancelled.status = ReminderStatus::Cancelled;
    old_cancelled.created_at = now - ChronoDuration::days(40);
    f.store.create_reminder(old_cancelled).await.unwrap();

    let mut old_pending = Reminder::new("", "f2", "p1", "d1", now - ChronoDuration::days(40));
    old_pending.created_at = now - ChronoDuration::days(40);
    f.store.create_reminder(old_pending).await.unwrap();

    let report = f.scheduler.run_cleanup(now).await.unwrap();
    assert_eq!(report.followups_deleted, 1);
    assert_eq!(report.reminders_deleted, 1);
}

#[tokio::test]
async fn test_engine_fires_scheduled_reminder() {
    let h = Harness::new();
    let (doctor, patient) = h.seed("fever").await;
    let created = h
        .engine
        .create_followup(CreateFollowup {
            patient_id: patient.id.clone(),
            doctor_id: doctor.id.clone(),
            followup_at: Some(Utc::now() + ChronoDuration::days(1)),
            message_template: None,
        })
        .await
        .unwrap();
    let reminder = created.reminder.unwrap();

    // Pull the job forward so the poll loop picks it up now
    let mut jobs = h.jobs.list().await.unwrap();
    let mut due = jobs.remove(0);
    due.run_at = Utc::now() - ChronoDuration::seconds(1);
    h.jobs.insert(due).await.unwrap();

    let handle = h.scheduler.clone().start(Arc::new(h.engine.clone()));
    let sent = eventually(|| async {
        h.store
            .get_reminder(&reminder.id)
            .await
            .unwrap()
            .map_or(false, |r| r.status == ReminderStatus::Sent)
    })
    .await;
    handle.shutdown().await;
    assert!(sent);

    let followup = h.followup(&created.followup.id).await;
    assert_eq!(followup.status, FollowupStatus::WaitingForPatient);
    assert!(h.gateway.sent()[0].1.contains("temperature readings"));
}

#[tokio::test]
async fn test_failed_fire_marks_reminder_and_followup_failed() {
    let h = Harness::new();
    let (doctor, patient) = h.seed("fever").await;
    let created = h
        .engine
        .create_followup(CreateFollowup {
            patient_id: patient.id.clone(),
            doctor_id: doctor.id.clone(),
            followup_at: Some(Utc::now() + ChronoDuration::days(1)),
            message_template: None,
        })
        .await
        .unwrap();
    let reminder = created.reminder.unwrap();
    h.gateway.set_failing(true);

    let err = h.engine.fire_reminder(&reminder.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Gateway(_)));

    let stored = h.store.get_reminder(&reminder.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Failed);
    assert_eq!(stored.attempts, 1);
    assert!(stored.last_attempt.is_some());
    assert!(stored.error_message.is_some());
    assert_eq!(
        h.followup(&created.followup.id).await.status,
        FollowupStatus::Failed
    );
}
