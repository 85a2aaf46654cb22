use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Structured result of one drafting cycle.
///
/// `suggests_appointment` is the only signal used for the appointment
/// handoff; the draft text itself is never scanned for keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftOutcome {
    pub draft_text: String,
    pub doctor_summary: String,
    #[serde(default)]
    pub suggests_appointment: bool,
}

/// Appointment slot derived from a patient's free-text availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
}

/// Doctor's disposition on the current draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Send the stored draft verbatim
    Approve,
    /// Send a doctor-edited version of the draft
    Edit,
    /// Send a doctor-written replacement
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("Invalid decision: {0}")]
    UnknownDecision(String),

    #[error("Custom message is required for 'edit' or 'custom' decisions")]
    MissingCustomMessage,
}

impl Decision {
    pub fn parse(value: &str) -> Result<Self, DecisionError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "edit" => Ok(Self::Edit),
            "custom" => Ok(Self::Custom),
            other => Err(DecisionError::UnknownDecision(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Edit => "edit",
            Self::Custom => "custom",
        }
    }

    /// Resolve the text to send for this decision.
    ///
    /// `approve` uses the stored draft; `edit`/`custom` require a non-blank
    /// replacement. Returns `Ok(None)` when approving but no draft exists.
    pub fn resolve_message(
        &self,
        draft: Option<&str>,
        custom_message: Option<&str>,
    ) -> Result<Option<String>, DecisionError> {
        match self {
            Self::Approve => Ok(draft
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)),
            Self::Edit | Self::Custom => custom_message
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(|m| Some(m.to_string()))
                .ok_or(DecisionError::MissingCustomMessage),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allowed_decisions() {
        assert_eq!(Decision::parse("approve").unwrap(), Decision::Approve);
        assert_eq!(Decision::parse(" Edit ").unwrap(), Decision::Edit);
        assert_eq!(Decision::parse("CUSTOM").unwrap(), Decision::Custom);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(
            Decision::parse("reject"),
            Err(DecisionError::UnknownDecision("reject".to_string()))
        );
    }

    #[test]
    fn test_edit_requires_non_blank_message() {
        assert_eq!(
            Decision::Edit.resolve_message(Some("draft"), Some("   ")),
            Err(DecisionError::MissingCustomMessage)
        );
        assert_eq!(
            Decision::Custom.resolve_message(Some("draft"), None),
            Err(DecisionError::MissingCustomMessage)
        );
        assert_eq!(
            Decision::Edit.resolve_message(Some("draft"), Some("Take 5 units")),
            Ok(Some("Take 5 units".to_string()))
        );
    }

    #[test]
    fn test_approve_uses_draft() {
        assert_eq!(
            Decision::Approve.resolve_message(Some("Readings look normal"), Some("ignored")),
            Ok(Some("Readings look normal".to_string()))
        );
        assert_eq!(Decision::Approve.resolve_message(None, None), Ok(None));
    }

    #[test]
    fn test_draft_outcome_defaults_flag() {
        let outcome: DraftOutcome = serde_json::from_str(
            r#"{"draft_text": "Thanks", "doctor_summary": "Stable"}"#,
        )
        .unwrap();
        assert!(!outcome.suggests_appointment);
    }
}
