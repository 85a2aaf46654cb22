use async_trait::async_trait;
use docfollow_types::{AppointmentDetails, AppointmentRequest, Doctor};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Calendar booking not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Calendar API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Creates the calendar event for a confirmed appointment slot
#[async_trait]
pub trait AppointmentBooker: Send + Sync {
    async fn book(
        &self,
        request: &AppointmentRequest,
        doctor: &Doctor,
    ) -> Result<AppointmentDetails, BookingError>;

    fn is_configured(&self) -> bool;
}

/// Booker used when no calendar credentials exist; every booking fails
pub struct UnconfiguredBooker;

#[async_trait]
impl AppointmentBooker for UnconfiguredBooker {
    async fn book(
        &self,
        _request: &AppointmentRequest,
        _doctor: &Doctor,
    ) -> Result<AppointmentDetails, BookingError> {
        Err(BookingError::NotConfigured)
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    pub access_token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    CALENDAR_API_BASE.to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base: default_api_base(),
            calendar_id: default_calendar_id(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Serialize)]
struct Attendee<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct EventPayload<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: EventTime,
    end: EventTime,
    attendees: Vec<Attendee<'a>>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarErrorBody {
    error: CalendarErrorDetail,
}

#[derive(Debug, Deserialize)]
struct CalendarErrorDetail {
    message: String,
}

/// Google Calendar v3 events API with a pre-issued bearer token
pub struct GoogleCalendarBooker {
    http_client: reqwest::Client,
    config: CalendarConfig,
}

impl GoogleCalendarBooker {
    pub fn new(config: CalendarConfig) -> Result<Self, BookingError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.config.api_base.trim_end_matches('/'),
            self.config.calendar_id
        )
    }

    fn token(&self) -> Option<&str> {
        self.config
            .access_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

#[async_trait]
impl AppointmentBooker for GoogleCalendarBooker {
    async fn book(
        &self,
        request: &AppointmentRequest,
        doctor: &Doctor,
    ) -> Result<AppointmentDetails, BookingError> {
        let token = self.token().ok_or(BookingError::NotConfigured)?;

        let payload = EventPayload {
            summary: &request.title,
            description: request.description.as_deref(),
            start: EventTime {
                date_time: request.start_time.to_rfc3339(),
                time_zone: Some("UTC".to_string()),
            },
            end: EventTime {
                date_time: request.end_time.to_rfc3339(),
                time_zone: Some("UTC".to_string()),
            },
            attendees: vec![Attendee {
                email: &doctor.email,
            }],
        };

        let response = self
            .http_client
            .post(self.events_url())
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<CalendarErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            warn!(status = status.as_u16(), error = %message, "Calendar rejected event");
            return Err(BookingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let event: CreatedEvent = response.json().await?;
        info!(event_id = %event.id, "Calendar event created");

        Ok(AppointmentDetails {
            event_title: event.summary.unwrap_or_else(|| request.title.clone()),
            start_time: request.start_time,
            end_time: request.end_time,
            calendar_event_id: Some(event.id),
        })
    }

    fn is_configured(&self) -> bool {
        self.token().is_some()
    }
}
