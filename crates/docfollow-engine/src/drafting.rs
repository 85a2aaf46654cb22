//! Drafting agent: composes outreach, drafts replies, reads availability.
//!
//! The LLM-backed implementation asks for JSON and deserializes it strictly.
//! The appointment signal comes only from the structured
//! `suggests_appointment` field.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use docfollow_llm::{ChatClient, ChatOptions, ChatRequest, Message};
use docfollow_types::{AppointmentRequest, DraftOutcome, HistoryEntry, Patient, Sender};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::AgentError;
use crate::messages::doctor_title;

/// Default appointment length when the patient only gives a start time
const DEFAULT_APPOINTMENT_MINUTES: i64 = 30;

/// Instruction for the first outbound message, keyed by diagnosis
pub fn outreach_instruction(diagnosis: &str) -> &'static str {
    match diagnosis.trim().to_ascii_lowercase().as_str() {
        "sugar" => "Ask the patient to send their past 3 days' sugar level readings.",
        "fever" => "Ask for the temperature readings of the patient.",
        _ => "Draft a general follow-up message asking the patient about their well-being.",
    }
}

#[derive(Debug, Clone)]
pub struct OutreachContext {
    pub patient: Patient,
    pub doctor_name: String,
    pub followup_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct DraftContext {
    pub patient: Patient,
    pub doctor_name: String,
    pub history: Vec<HistoryEntry>,
    /// Everything accumulated so far: patient texts and extracted documents
    pub extracted_text: String,
}

#[async_trait]
pub trait DraftingAgent: Send + Sync {
    async fn compose_outreach(&self, ctx: OutreachContext) -> Result<String, AgentError>;

    async fn draft_reply(&self, ctx: DraftContext) -> Result<DraftOutcome, AgentError>;

    async fn parse_availability(
        &self,
        text: &str,
        patient: &Patient,
        doctor_name: &str,
    ) -> Result<AppointmentRequest, AgentError>;
}

pub struct LlmDraftingAgent {
    client: Arc<dyn ChatClient>,
    model: String,
    timeout: Duration,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OutreachReply {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AvailabilityReply {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl LlmDraftingAgent {
    pub fn new(client: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            timeout: Duration::from_secs(60),
            temperature: 0.3,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn provider(&self) -> &str {
        self.client.provider()
    }

    async fn complete_json<T: DeserializeOwned>(
        &self,
        system: String,
        user: String,
    ) -> Result<T, AgentError> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![Message::system(system), Message::human(user)],
        )
        .with_options(ChatOptions::new().temperature(self.temperature).json());

        let response = tokio::time::timeout(self.timeout, self.client.chat(request))
            .await
            .map_err(|_| AgentError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| AgentError::Llm(e.to_string()))?;

        if let Some(usage) = &response.usage {
            debug!(
                provider = self.client.provider(),
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Agent completion"
            );
        }

        let content = response
            .content
            .ok_or_else(|| AgentError::InvalidResponse("empty completion".to_string()))?;

        serde_json::from_str(strip_code_fence(&content))
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }
}

/// Drop a surrounding Markdown code fence, if any
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

fn render_history(history: &[HistoryEntry]) -> String {
    history
        .iter()
        .map(|entry| {
            let who = match entry.sender {
                Sender::Agent => "Assistant",
                Sender::Doctor => "Doctor",
                Sender::Patient => "Patient",
            };
            format!("[{}] {}: {}", entry.timestamp.to_rfc3339(), who, entry.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl DraftingAgent for LlmDraftingAgent {
    async fn compose_outreach(&self, ctx: OutreachContext) -> Result<String, AgentError> {
        let doctor = doctor_title(&ctx.doctor_name);
        let system = format!(
            "You are a medical assistant for {doctor}. You write short, friendly and \
             professional WhatsApp messages to patients. Respond with a JSON object \
             {{\"message\": string}} containing only the message text."
        );
        let mut user = format!(
            "Write a follow-up message to the patient {}.\nInstruction: {}",
            ctx.patient.name,
            outreach_instruction(&ctx.patient.diagnosis)
        );
        if let Some(date) = ctx.followup_date {
            user.push_str(&format!("\nThe follow-up is due on {}.", date.format("%d %B %Y")));
        }

        let reply: OutreachReply = self.complete_json(system, user).await?;
        let message = reply.message.trim().to_string();
        if message.is_empty() {
            return Err(AgentError::InvalidResponse("empty outreach message".to_string()));
        }
        Ok(message)
    }

    async fn draft_reply(&self, ctx: DraftContext) -> Result<DraftOutcome, AgentError> {
        let doctor = doctor_title(&ctx.doctor_name);
        let system = format!(
            "You are a medical data analysis assistant for {doctor}. Read the patient's \
             messages and the text extracted from their documents. Respond with a JSON \
             object with exactly these keys:\n\
             - \"draft_text\": a reply to the patient acknowledging what they sent; if \
             the readings look abnormal or urgent, suggest booking an appointment\n\
             - \"doctor_summary\": a concise clinical summary for the doctor\n\
             - \"suggests_appointment\": true when an in-person appointment is warranted"
        );
        let user = format!(
            "Patient: {}\nCondition: {}\n\nConversation so far:\n{}\n\nPatient data:\n{}",
            ctx.patient.name,
            if ctx.patient.diagnosis.is_empty() {
                "Not specified"
            } else {
                ctx.patient.diagnosis.as_str()
            },
            render_history(&ctx.history),
            ctx.extracted_text
        );

        let outcome: DraftOutcome = self.complete_json(system, user).await?;
        if outcome.draft_text.trim().is_empty() {
            return Err(AgentError::InvalidResponse("empty draft_text".to_string()));
        }
        Ok(outcome)
    }

    async fn parse_availability(
        &self,
        text: &str,
        patient: &Patient,
        doctor_name: &str,
    ) -> Result<AppointmentRequest, AgentError> {
        let now = Utc::now();
        let system = format!(
            "You convert a patient's stated availability into an appointment slot. \
             The current time is {} (UTC). Respond with a JSON object \
             {{\"start_time\": string|null, \"end_time\": string|null}} using RFC 3339 \
             timestamps in UTC. Use null for start_time when no concrete date and time \
             can be determined.",
            now.to_rfc3339()
        );

        let reply: AvailabilityReply = self.complete_json(system, text.to_string()).await?;
        let start_time = reply.start_time.ok_or_else(|| {
            AgentError::InvalidResponse("no date and time found in availability".to_string())
        })?;
        let end_time = reply
            .end_time
            .filter(|end| *end > start_time)
            .unwrap_or(start_time + ChronoDuration::minutes(DEFAULT_APPOINTMENT_MINUTES));

        Ok(AppointmentRequest {
            title: format!("Appointment with {}", patient.name),
            start_time,
            end_time,
            description: Some(format!(
                "Follow-up appointment for {} with {}",
                patient.name,
                doctor_title(doctor_name)
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_by_diagnosis() {
        assert!(outreach_instruction("Sugar").contains("past 3 days' sugar level readings"));
        assert!(outreach_instruction("fever").contains("temperature readings"));
        assert!(outreach_instruction("fracture").contains("well-being"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }
}
