//! Durable reminder scheduler.
//!
//! Jobs live in the [`JobStore`], so they survive restarts. A single poll loop
//! claims due jobs (claiming removes them) into free slots of a bounded set of
//! [`ReminderHandler`] tasks. The same loop runs the daily retention cleanup.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use docfollow_persist::{
    FollowupUpdate, JobKind, JobStore, PersistenceClient, ReminderUpdate, Result, ScheduledJob,
};
use docfollow_types::{FollowupStatus, Reminder, ReminderStatus, RETENTION_DAYS};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::error::EngineError;

/// Executes a claimed reminder job
#[async_trait]
pub trait ReminderHandler: Send + Sync {
    async fn fire(&self, job: &ScheduledJob) -> std::result::Result<(), EngineError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Jobs claimed later than this still fire, with a warning
    #[serde(default = "default_misfire_grace_secs")]
    pub misfire_grace_secs: i64,
    /// Past fire times are moved this far into the future
    #[serde(default = "default_past_clamp_secs")]
    pub past_clamp_secs: i64,
    #[serde(default = "default_cleanup_hour_utc")]
    pub cleanup_hour_utc: u32,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_concurrent() -> usize {
    4
}

fn default_misfire_grace_secs() -> i64 {
    300
}

fn default_past_clamp_secs() -> i64 {
    30
}

fn default_cleanup_hour_utc() -> u32 {
    2
}

fn default_retention_days() -> i64 {
    RETENTION_DAYS
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrent: default_max_concurrent(),
            misfire_grace_secs: default_misfire_grace_secs(),
            past_clamp_secs: default_past_clamp_secs(),
            cleanup_hour_utc: default_cleanup_hour_utc(),
            retention_days: default_retention_days(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub run_at: DateTime<Utc>,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub initialized: bool,
    pub total_jobs: u64,
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub followups_deleted: u64,
    pub reminders_deleted: u64,
}

/// Handle for a running poll loop
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for in-flight fires to finish
    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Scheduler loop already stopped");
        }
        if let Err(e) = self.task.await {
            error!(error = ?e, "Scheduler loop panicked");
        }
    }
}

pub struct ReminderScheduler {
    store: Arc<dyn PersistenceClient>,
    jobs: Arc<dyn JobStore>,
    config: SchedulerConfig,
    running: AtomicBool,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn PersistenceClient>,
        jobs: Arc<dyn JobStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            jobs,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// `followup_reminder_{reminder_id}_{unix_ts}`
    pub fn job_id(reminder_id: &str, fire_at: DateTime<Utc>) -> String {
        format!("followup_reminder_{}_{}", reminder_id, fire_at.timestamp())
    }

    /// Requested time, or now + clamp when it is not in the future
    pub fn effective_fire_time(&self, requested: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        if requested <= now {
            now + ChronoDuration::seconds(self.config.past_clamp_secs)
        } else {
            requested
        }
    }

    /// Persist a job for `reminder` and record its id on the reminder and followup
    #[instrument(skip(self, reminder), fields(reminder_id = %reminder.id))]
    pub async fn schedule(&self, reminder: &Reminder) -> Result<ScheduledJob> {
        let now = Utc::now();
        let fire_at = self.effective_fire_time(reminder.followup_date, now);
        if fire_at != reminder.followup_date {
            warn!(
                requested = %reminder.followup_date,
                fire_at = %fire_at,
                "Reminder time is in the past; firing shortly instead"
            );
        }

        let job = ScheduledJob::new(
            Self::job_id(&reminder.id, fire_at),
            JobKind::FollowupReminder {
                reminder_id: reminder.id.clone(),
                followup_id: reminder.followup_id.clone(),
                patient_id: reminder.patient_id.clone(),
                doctor_id: reminder.doctor_id.clone(),
            },
            fire_at,
        );
        self.jobs.insert(job.clone()).await?;

        self.store
            .update_reminder(
                &reminder.id,
                ReminderUpdate::new().scheduled_job_id(Some(job.id.clone())),
            )
            .await?;
        self.store
            .apply_followup_update(
                &reminder.followup_id,
                FollowupUpdate::new().schedule(Some(job.id.clone()), Some(fire_at)),
            )
            .await?;

        info!(job_id = %job.id, run_at = %job.run_at, "Reminder scheduled");
        Ok(job)
    }

    /// Remove a pending job. Unknown ids, and store failures, report `false`.
    pub async fn cancel(&self, job_id: &str) -> bool {
        match self.jobs.remove(job_id).await {
            Ok(true) => {
                info!(job_id = %job_id, "Scheduled job cancelled");
                true
            }
            Ok(false) => {
                warn!(job_id = %job_id, "Cancel requested for unknown job");
                false
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to cancel job");
                false
            }
        }
    }

    pub async fn reschedule(&self, old_job_id: Option<&str>, reminder: &Reminder) -> Result<ScheduledJob> {
        if let Some(old) = old_job_id {
            self.cancel(old).await;
        }
        self.schedule(reminder).await
    }

    /// Delete terminal followups and finished reminders older than the retention window
    pub async fn run_cleanup(&self, now: DateTime<Utc>) -> Result<CleanupReport> {
        let cutoff = now - ChronoDuration::days(self.config.retention_days);

        let followups_deleted = self
            .store
            .delete_stale_followups(cutoff, &FollowupStatus::RETENTION_SWEEPABLE)
            .await?;
        let reminders_deleted = self
            .store
            .delete_stale_reminders(cutoff, &ReminderStatus::RETENTION_SWEEPABLE)
            .await?;

        info!(
            followups_deleted,
            reminders_deleted,
            cutoff = %cutoff,
            "Retention cleanup finished"
        );
        Ok(CleanupReport {
            followups_deleted,
            reminders_deleted,
        })
    }

    /// Next daily cleanup instant strictly after `now`
    pub fn next_cleanup_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let hour = self.config.cleanup_hour_utc.min(23);
        let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
        let today = now.date_naive().and_time(at).and_utc();
        if today > now {
            today
        } else {
            today + ChronoDuration::days(1)
        }
    }

    pub async fn status(&self) -> Result<SchedulerStatus> {
        let jobs = self.jobs.list().await?;
        Ok(SchedulerStatus {
            initialized: self.running.load(Ordering::SeqCst),
            total_jobs: jobs.len() as u64,
            jobs: jobs
                .into_iter()
                .map(|job| JobSummary {
                    id: job.id,
                    run_at: job.run_at,
                    kind: job.kind.name().to_string(),
                })
                .collect(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the poll loop
    pub fn start(self: Arc<Self>, handler: Arc<dyn ReminderHandler>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            self.run(handler, &mut shutdown_rx).await;
        });

        SchedulerHandle { shutdown_tx, task }
    }

    async fn run(&self, handler: Arc<dyn ReminderHandler>, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Reminder scheduler is disabled, not starting");
            return;
        }

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_concurrent = self.config.max_concurrent.max(1);
        let grace = ChronoDuration::seconds(self.config.misfire_grace_secs);
        let mut next_cleanup = self.next_cleanup_after(Utc::now());

        self.running.store(true, Ordering::SeqCst);
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent,
            next_cleanup = %next_cleanup,
            "Reminder scheduler started"
        );

        // In-flight fires; a slow fire holds one slot, not the whole loop
        let mut tasks = JoinSet::new();

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Reminder scheduler received shutdown signal");
                break;
            }

            let now = Utc::now();
            if now >= next_cleanup {
                if let Err(e) = self.run_cleanup(now).await {
                    error!(error = %e, "Retention cleanup failed");
                }
                next_cleanup = self.next_cleanup_after(now);
            }

            let free = max_concurrent.saturating_sub(tasks.len());
            let due = if free == 0 {
                Vec::new()
            } else {
                match self.jobs.claim_due(now, free).await {
                    Ok(due) => due,
                    Err(e) => {
                        error!(error = %e, "Failed to claim due jobs");
                        Vec::new()
                    }
                }
            };

            if !due.is_empty() {
                debug!(claimed = due.len(), in_flight = tasks.len(), "Firing due reminders");
            }
            for job in due {
                let late_by = now - job.run_at;
                if late_by > grace {
                    warn!(
                        job_id = %job.id,
                        late_secs = late_by.num_seconds(),
                        "Reminder misfired past grace period; firing now"
                    );
                }

                let handler = handler.clone();
                tasks.spawn(async move {
                    match handler.fire(&job).await {
                        Ok(()) => info!(job_id = %job.id, "Reminder fired"),
                        Err(e) => error!(job_id = %job.id, error = %e, "Reminder fire failed"),
                    }
                });
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Reminder scheduler received shutdown signal");
                    break;
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(result);
                }
                _ = sleep(poll_interval) => {}
            }
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Waiting for in-flight reminders");
        }
        while let Some(result) = tasks.join_next().await {
            log_join(result);
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Reminder scheduler stopped");
    }
}

fn log_join(result: std::result::Result<(), JoinError>) {
    if let Err(e) = result {
        error!(error = ?e, "Reminder task panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use docfollow_persist::{InMemoryJobStore, InMemoryPersistenceClient};

    fn scheduler() -> ReminderScheduler {
        ReminderScheduler::new(
            Arc::new(InMemoryPersistenceClient::new()),
            Arc::new(InMemoryJobStore::new()),
            SchedulerConfig::default(),
        )
    }

    #[test]
    fn test_job_id_format() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            ReminderScheduler::job_id("r1", at),
            "followup_reminder_r1_1735689600"
        );
    }

    #[test]
    fn test_past_times_clamp_forward() {
        let s = scheduler();
        let now = Utc::now();
        let past = now - ChronoDuration::hours(1);
        assert_eq!(s.effective_fire_time(past, now), now + ChronoDuration::seconds(30));
        assert_eq!(s.effective_fire_time(now, now), now + ChronoDuration::seconds(30));

        let future = now + ChronoDuration::hours(2);
        assert_eq!(s.effective_fire_time(future, now), future);
    }

    #[test]
    fn test_next_cleanup_is_next_two_am() {
        let s = scheduler();
        let before = Utc.with_ymd_and_hms(2025, 5, 10, 1, 30, 0).unwrap();
        assert_eq!(
            s.next_cleanup_after(before),
            Utc.with_ymd_and_hms(2025, 5, 10, 2, 0, 0).unwrap()
        );

        let at = Utc.with_ymd_and_hms(2025, 5, 10, 2, 0, 0).unwrap();
        assert_eq!(
            s.next_cleanup_after(at),
            Utc.with_ymd_and_hms(2025, 5, 11, 2, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_false() {
        assert!(!scheduler().cancel("followup_reminder_nope_0").await);
    }
}
