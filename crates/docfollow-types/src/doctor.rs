use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Doctor account as stored in the document store.
///
/// `password_hash` never leaves the service; use [`DoctorProfile`] for
/// anything that is sent outward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub whatsapp_connected: bool,
    pub whatsapp_number: Option<String>,
    pub whatsapp_sandbox_id: Option<String>,
    #[serde(default)]
    pub google_calendar_connected: bool,
    pub settings: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    pub fn profile(&self) -> DoctorProfile {
        DoctorProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            whatsapp_connected: self.whatsapp_connected,
            whatsapp_number: self.whatsapp_number.clone(),
            whatsapp_sandbox_id: self.whatsapp_sandbox_id.clone(),
            google_calendar_connected: self.google_calendar_connected,
            settings: self.settings.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub whatsapp_connected: bool,
    pub whatsapp_number: Option<String>,
    pub whatsapp_sandbox_id: Option<String>,
    pub google_calendar_connected: bool,
    pub settings: Option<serde_json::Value>,
}

/// Connection state and free-form settings a doctor may change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorSettingsUpdate {
    pub whatsapp_connected: Option<bool>,
    pub whatsapp_number: Option<String>,
    pub whatsapp_sandbox_id: Option<String>,
    pub google_calendar_connected: Option<bool>,
    pub settings: Option<serde_json::Value>,
}

impl DoctorSettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.whatsapp_connected.is_none()
            && self.whatsapp_number.is_none()
            && self.whatsapp_sandbox_id.is_none()
            && self.google_calendar_connected.is_none()
            && self.settings.is_none()
    }
}
