use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub doctor_id: String,
    pub name: String,
    /// Condition label driving the outreach instruction ("sugar", "fever", ...)
    #[serde(alias = "disease")]
    pub diagnosis: String,
    pub phone: String,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Mutable contact and notes fields. Identity fields are not updatable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientUpdate {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none()
            && self.address.is_none()
            && self.notes.is_none()
            && self.image_url.is_none()
    }
}

/// Normalize a phone number as received from the gateway.
///
/// Strips the `whatsapp:` channel prefix and surrounding whitespace so that
/// inbound senders compare equal to the numbers doctors typed in.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("whatsapp:")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
