use chrono::{DateTime, Utc};
use docfollow_types::{AppointmentDetails, FollowupStatus, HistoryEntry, ReminderStatus};

/// A single atomic change to a followup document.
///
/// Stores apply every field in one conditional write: the update only lands
/// if the current status is in `expected_status` (when set) and `dedup_key`
/// (when set) has not been recorded yet. Terminal followups never match.
/// Pushed history entries are re-stamped with the store's write time.
#[derive(Debug, Clone, Default)]
pub struct FollowupUpdate {
    pub expected_status: Option<Vec<FollowupStatus>>,
    pub dedup_key: Option<String>,

    pub status: Option<FollowupStatus>,
    pub push_history: Vec<HistoryEntry>,
    pub add_raw_data: Vec<String>,
    pub append_extracted_text: Option<String>,

    pub ai_draft_message: Option<Option<String>>,
    pub doctor_summary: Option<Option<String>>,
    pub suggests_appointment: Option<bool>,
    pub doctor_decision: Option<Option<String>>,
    pub final_message_sent: Option<bool>,
    pub final_message: Option<Option<String>>,
    pub appointment_details: Option<AppointmentDetails>,
    pub scheduled_for: Option<Option<DateTime<Utc>>>,
    pub scheduled_job_id: Option<Option<String>>,
    pub error_message: Option<Option<String>>,

    pub increment_attempts: bool,
    pub touch_last_attempt: bool,
}

impl FollowupUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_status(mut self, statuses: &[FollowupStatus]) -> Self {
        self.expected_status = Some(statuses.to_vec());
        self
    }

    /// Guard on, and record, a gateway message id.
    pub fn dedup(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    pub fn status(mut self, status: FollowupStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn push_history(mut self, entry: HistoryEntry) -> Self {
        self.push_history.push(entry);
        self
    }

    pub fn add_raw_data(mut self, urls: impl IntoIterator<Item = String>) -> Self {
        self.add_raw_data.extend(urls);
        self
    }

    pub fn append_extracted_text(mut self, text: impl Into<String>) -> Self {
        self.append_extracted_text = Some(text.into());
        self
    }

    pub fn draft(mut self, draft: Option<String>, summary: Option<String>, suggests: bool) -> Self {
        self.ai_draft_message = Some(draft);
        self.doctor_summary = Some(summary);
        self.suggests_appointment = Some(suggests);
        self
    }

    pub fn doctor_decision(mut self, decision: Option<String>) -> Self {
        self.doctor_decision = Some(decision);
        self
    }

    pub fn final_message(mut self, message: impl Into<String>) -> Self {
        self.final_message = Some(Some(message.into()));
        self.final_message_sent = Some(true);
        self
    }

    pub fn appointment_details(mut self, details: AppointmentDetails) -> Self {
        self.appointment_details = Some(details);
        self
    }

    pub fn schedule(mut self, job_id: Option<String>, fire_at: Option<DateTime<Utc>>) -> Self {
        self.scheduled_job_id = Some(job_id);
        self.scheduled_for = Some(fire_at);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(Some(message.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error_message = Some(None);
        self
    }

    /// attempts += 1 and last_attempt = now
    pub fn attempt(mut self) -> Self {
        self.increment_attempts = true;
        self.touch_last_attempt = true;
        self
    }

    pub fn guard_matches(&self, status: FollowupStatus, processed: &[String]) -> bool {
        if status.is_terminal() {
            return false;
        }
        if let Some(expected) = &self.expected_status {
            if !expected.contains(&status) {
                return false;
            }
        }
        match &self.dedup_key {
            Some(key) => !processed.iter().any(|p| p == key),
            None => true,
        }
    }
}

/// Field changes to a reminder. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ReminderUpdate {
    pub status: Option<ReminderStatus>,
    pub followup_date: Option<DateTime<Utc>>,
    pub message_template: Option<Option<String>>,
    pub scheduled_job_id: Option<Option<String>>,
    pub error_message: Option<Option<String>>,
    pub increment_attempts: bool,
    pub touch_last_attempt: bool,
}

impl ReminderUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ReminderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn followup_date(mut self, date: DateTime<Utc>) -> Self {
        self.followup_date = Some(date);
        self
    }

    pub fn message_template(mut self, template: Option<String>) -> Self {
        self.message_template = Some(template);
        self
    }

    pub fn scheduled_job_id(mut self, job_id: Option<String>) -> Self {
        self.scheduled_job_id = Some(job_id);
        self
    }

    pub fn error(mut self, message: Option<String>) -> Self {
        self.error_message = Some(message);
        self
    }

    pub fn attempt(mut self) -> Self {
        self.increment_attempts = true;
        self.touch_last_attempt = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.followup_date.is_none()
            && self.message_template.is_none()
            && self.scheduled_job_id.is_none()
            && self.error_message.is_none()
            && !self.increment_attempts
            && !self.touch_last_attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rejects_terminal_even_without_expectation() {
        let update = FollowupUpdate::new().error("boom");
        assert!(!update.guard_matches(FollowupStatus::Closed, &[]));
        assert!(update.guard_matches(FollowupStatus::WaitingForPatient, &[]));
    }

    #[test]
    fn test_guard_checks_expected_status_and_dedup() {
        let update = FollowupUpdate::new()
            .expect_status(&FollowupStatus::AWAITING)
            .dedup("SM1");

        assert!(update.guard_matches(FollowupStatus::WaitingForPatient, &[]));
        assert!(!update.guard_matches(FollowupStatus::Creating, &[]));
        assert!(!update.guard_matches(
            FollowupStatus::WaitingForPatient,
            &["SM1".to_string()]
        ));
    }

    #[test]
    fn test_final_message_marks_sent() {
        let update = FollowupUpdate::new().final_message("see you");
        assert_eq!(update.final_message_sent, Some(true));
        assert_eq!(update.final_message, Some(Some("see you".to_string())));
    }
}
