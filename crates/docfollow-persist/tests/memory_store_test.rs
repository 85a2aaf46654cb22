use chrono::{Duration, Utc};
use docfollow_persist::{
    FollowupUpdate, InMemoryJobStore, InMemoryPersistenceClient, JobKind, JobStore,
    PersistError, PersistenceClient, ReminderFilter, ReminderUpdate, ScheduledJob,
};
use docfollow_types::{
    Appointment, AppointmentStatus, AppointmentUpdate, Doctor, Followup, FollowupFilter, FollowupStatus, HistoryEntry, Patient, Reminder,
    ReminderStatus,
};

fn doctor(email: &str) -> Doctor {
    Doctor {
        id: String::new(),
        name: "Dr. Rao".to_string(),
        email: email.to_string(),
        password_hash: "hash".to_string(),
        whatsapp_connected: false,
        whatsapp_number: None,
        whatsapp_sandbox_id: None,
        google_calendar_connected: false,
        settings: None,
        created_at: Utc::now(),
    }
}

fn patient(doctor_id: &str, phone: &str) -> Patient {
    Patient {
        id: String::new(),
        doctor_id: doctor_id.to_string(),
        name: "Asha".to_string(),
        diagnosis: "sugar".to_string(),
        phone: phone.to_string(),
        address: None,
        notes: None,
        image_url: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_duplicate_doctor_email_rejected() {
    let store = InMemoryPersistenceClient::new();
    store.create_doctor(doctor("a@clinic.test")).await.unwrap();

    let err = store.create_doctor(doctor("a@clinic.test")).await.unwrap_err();
    assert!(matches!(err, PersistError::Duplicate(_)));
}

#[tokio::test]
async fn test_conditional_update_respects_expected_status() {
    let store = InMemoryPersistenceClient::new();
    let followup = store
        .create_followup(Followup::new("", "p1", "d1", None))
        .await
        .unwrap();

    let applied = store
        .apply_followup_update(
            &followup.id,
            FollowupUpdate::new()
                .expect_status(&FollowupStatus::OUTREACH_READY)
                .status(FollowupStatus::WaitingForPatient)
                .push_history(HistoryEntry::agent("Hello")),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(applied.status, FollowupStatus::WaitingForPatient);
    assert_eq!(applied.history.len(), 1);

    // Same guard no longer matches
    let second = store
        .apply_followup_update(
            &followup.id,
            FollowupUpdate::new()
                .expect_status(&FollowupStatus::OUTREACH_READY)
                .push_history(HistoryEntry::agent("Hello again")),
        )
        .await
        .unwrap();
    assert!(second.is_none());

    let stored = store.get_followup(&followup.id).await.unwrap().unwrap();
    assert_eq!(stored.history.len(), 1);
}

#[tokio::test]
async fn test_dedup_key_applies_once() {
    let store = InMemoryPersistenceClient::new();
    let mut followup = Followup::new("", "p1", "d1", None);
    followup.status = FollowupStatus::WaitingForPatient;
    let followup = store.create_followup(followup).await.unwrap();

    let inbound = || {
        FollowupUpdate::new()
            .expect_status(&FollowupStatus::AWAITING)
            .dedup("SM123")
            .status(FollowupStatus::WaitingForDoctor)
            .push_history(HistoryEntry::patient("120 mg/dL"))
            .add_raw_data(vec!["https://media/1".to_string()])
    };

    assert!(store
        .apply_followup_update(&followup.id, inbound())
        .await
        .unwrap()
        .is_some());
    assert!(store
        .apply_followup_update(&followup.id, inbound())
        .await
        .unwrap()
        .is_none());

    let stored = store.get_followup(&followup.id).await.unwrap().unwrap();
    assert_eq!(stored.history.len(), 1);
    assert_eq!(stored.raw_data, vec!["https://media/1".to_string()]);
    assert!(stored.has_processed("SM123"));
}

#[tokio::test]
async fn test_message_id_claimed_once_across_followups() {
    let store = InMemoryPersistenceClient::new();

    assert_eq!(store.claim_message_id("SM42", "f1").await.unwrap(), None);
    assert_eq!(
        store.claim_message_id("SM42", "f2").await.unwrap(),
        Some("f1".to_string())
    );

    store.release_message_id("SM42").await.unwrap();
    assert_eq!(store.claim_message_id("SM42", "f2").await.unwrap(), None);
}

#[tokio::test]
async fn test_history_stamped_at_write_time() {
    let store = InMemoryPersistenceClient::new();
    let followup = store
        .create_followup(Followup::new("", "p1", "d1", None))
        .await
        .unwrap();

    // Built in the opposite order of the writes
    let mut built_late = HistoryEntry::patient("first write");
    built_late.timestamp = Utc::now() + Duration::hours(1);
    let mut built_early = HistoryEntry::patient("second write");
    built_early.timestamp = Utc::now() - Duration::hours(1);

    for entry in [built_late, built_early] {
        store
            .apply_followup_update(&followup.id, FollowupUpdate::new().push_history(entry))
            .await
            .unwrap()
            .unwrap();
    }

    let stored = store.get_followup(&followup.id).await.unwrap().unwrap();
    assert_eq!(stored.history[0].content, "first write");
    assert!(stored.history[0].timestamp >= followup.created_at);
    assert!(stored.history[0].timestamp <= stored.history[1].timestamp);
    assert!(stored.history[1].timestamp <= Utc::now());
}

#[tokio::test]
async fn test_terminal_followup_never_mutated() {
    let store = InMemoryPersistenceClient::new();
    let mut followup = Followup::new("", "p1", "d1", None);
    followup.status = FollowupStatus::Closed;
    let followup = store.create_followup(followup).await.unwrap();

    let result = store
        .apply_followup_update(&followup.id, FollowupUpdate::new().error("late failure"))
        .await
        .unwrap();
    assert!(result.is_none());

    let stored = store.get_followup(&followup.id).await.unwrap().unwrap();
    assert!(stored.error_message.is_none());
}

#[tokio::test]
async fn test_extracted_text_accumulates() {
    let store = InMemoryPersistenceClient::new();
    let followup = store
        .create_followup(Followup::new("", "p1", "d1", None))
        .await
        .unwrap();

    for text in ["Fasting 110", "Post-meal 150"] {
        store
            .apply_followup_update(&followup.id, FollowupUpdate::new().append_extracted_text(text))
            .await
            .unwrap();
    }

    let stored = store.get_followup(&followup.id).await.unwrap().unwrap();
    assert_eq!(stored.extracted_text, "Fasting 110\n\nPost-meal 150");
}

#[tokio::test]
async fn test_find_active_followup_picks_most_recent_awaiting() {
    let store = InMemoryPersistenceClient::new();

    let mut older = Followup::new("", "p1", "d1", None);
    older.status = FollowupStatus::WaitingForPatient;
    older.created_at = Utc::now() - Duration::days(2);
    store.create_followup(older).await.unwrap();

    let mut newer = Followup::new("", "p1", "d1", None);
    newer.status = FollowupStatus::WaitingForDoctor;
    let newer = store.create_followup(newer).await.unwrap();

    let mut closed = Followup::new("", "p1", "d1", None);
    closed.status = FollowupStatus::Closed;
    store.create_followup(closed).await.unwrap();

    let active = store
        .find_active_followup("p1", &FollowupStatus::AWAITING)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, newer.id);

    let listed = store
        .list_followups(&FollowupFilter {
            doctor_id: Some("d1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 3);
}

#[tokio::test]
async fn test_patient_ownership_enforced() {
    let store = InMemoryPersistenceClient::new();
    let created = store.create_patient(patient("d1", "+15550001")).await.unwrap();

    assert!(!store.delete_patient(&created.id, "d2").await.unwrap());
    assert_eq!(store.find_patients_by_phone("+15550001").await.unwrap().len(), 1);
    assert!(store.delete_patient(&created.id, "d1").await.unwrap());
    assert!(store.get_patient(&created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_sweep_only_touches_old_terminal_records() {
    let store = InMemoryPersistenceClient::new();
    let cutoff = Utc::now() - Duration::days(30);

    let mut old_closed = Followup::new("", "p1", "d1", None);
    old_closed.status = FollowupStatus::Closed;
    old_closed.created_at = Utc::now() - Duration::days(45);
    store.create_followup(old_closed).await.unwrap();

    let mut old_waiting = Followup::new("", "p1", "d1", None);
    old_waiting.status = FollowupStatus::WaitingForPatient;
    old_waiting.created_at = Utc::now() - Duration::days(45);
    store.create_followup(old_waiting).await.unwrap();

    let mut old_sent = Reminder::new("", "f1", "p1", "d1", Utc::now() - Duration::days(40));
    old_sent.status = ReminderStatus::Sent;
    old_sent.created_at = Utc::now() - Duration::days(40);
    store.create_reminder(old_sent).await.unwrap();
    store
        .create_reminder(Reminder::new("", "f2", "p1", "d1", Utc::now() + Duration::days(1)))
        .await
        .unwrap();

    let followups = store
        .delete_stale_followups(cutoff, &FollowupStatus::RETENTION_SWEEPABLE)
        .await
        .unwrap();
    let reminders = store
        .delete_stale_reminders(cutoff, &ReminderStatus::RETENTION_SWEEPABLE)
        .await
        .unwrap();

    assert_eq!(followups, 1);
    assert_eq!(reminders, 1);
    assert_eq!(
        store
            .count_reminders(&ReminderFilter::for_doctor("d1"))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_reminder_update_and_counts() {
    let store = InMemoryPersistenceClient::new();
    let reminder = store
        .create_reminder(Reminder::new("", "f1", "p1", "d1", Utc::now() + Duration::hours(1)))
        .await
        .unwrap();

    let updated = store
        .update_reminder(
            &reminder.id,
            ReminderUpdate::new()
                .status(ReminderStatus::Failed)
                .error(Some("gateway down".to_string()))
                .attempt(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.attempts, 1);
    assert!(updated.last_attempt.is_some());

    let counts = store.reminder_status_counts("d1").await.unwrap();
    assert_eq!(counts.get("failed"), Some(&1));
    assert!(store.update_reminder("missing", ReminderUpdate::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_job_store_claim_removes_due_jobs() {
    let jobs = InMemoryJobStore::new();
    let kind = JobKind::FollowupReminder {
        reminder_id: "r1".to_string(),
        followup_id: "f1".to_string(),
        patient_id: "p1".to_string(),
        doctor_id: "d1".to_string(),
    };
    let now = Utc::now();

    jobs.insert(ScheduledJob::new("due", kind.clone(), now - Duration::seconds(5)))
        .await
        .unwrap();
    jobs.insert(ScheduledJob::new("later", kind, now + Duration::hours(1)))
        .await
        .unwrap();

    let claimed = jobs.claim_due(now, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, "due");

    // Claimed jobs are gone; cancelling them reports false
    assert!(!jobs.remove("due").await.unwrap());
    assert!(jobs.claim_due(now, 10).await.unwrap().is_empty());
    assert_eq!(jobs.count().await.unwrap(), 1);
    assert!(jobs.remove("later").await.unwrap());
}

#[tokio::test]
async fn test_appointments_scoped_to_doctor_and_sorted() {
    let store = InMemoryPersistenceClient::new();
    let now = Utc::now();

    let later = store
        .create_appointment(Appointment::new("d1", "p1", now + Duration::days(5)))
        .await
        .unwrap();
    let sooner = store
        .create_appointment(Appointment::new("d1", "p2", now + Duration::days(1)))
        .await
        .unwrap();
    store
        .create_appointment(Appointment::new("d2", "p3", now))
        .await
        .unwrap();
    assert!(!later.id.is_empty());

    let listed = store.list_appointments("d1").await.unwrap();
    let ids: Vec<_> = listed.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![sooner.id.as_str(), later.id.as_str()]);

    let cancel = AppointmentUpdate {
        status: Some(AppointmentStatus::Cancelled),
        ..Default::default()
    };
    assert!(store
        .update_appointment(&later.id, "d2", cancel.clone())
        .await
        .unwrap()
        .is_none());
    let cancelled = store
        .update_appointment(&later.id, "d1", cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    assert!(!store.delete_appointment(&sooner.id, "d2").await.unwrap());
    assert!(store.delete_appointment(&sooner.id, "d1").await.unwrap());
    assert!(store.get_appointment(&sooner.id).await.unwrap().is_none());
}
