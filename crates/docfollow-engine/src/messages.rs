//! Fixed patient-facing texts.

use chrono::{DateTime, Utc};

/// Sent when the doctor's decision hands the thread over to booking
pub const AVAILABILITY_REQUEST: &str = "Your doctor suggests booking an appointment. \
Please reply with the date and time that suit you, and we will set it up for you.";

/// Prefix "Dr. " unless the stored name already carries it
pub fn doctor_title(name: &str) -> String {
    let name = name.trim();
    if name.to_ascii_lowercase().starts_with("dr") {
        name.to_string()
    } else {
        format!("Dr. {}", name)
    }
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%A, %d %B %Y").to_string())
        .unwrap_or_else(|| "the coming days".to_string())
}

/// Outreach used when no agent is configured and no template was given
pub fn reminder_message(
    patient_name: &str,
    doctor_name: &str,
    followup_date: Option<DateTime<Utc>>,
) -> String {
    let doctor = doctor_title(doctor_name);
    format!(
        "Hello {patient}!\n\n\
         This is a friendly reminder from {doctor}'s clinic.\n\n\
         You have a follow-up scheduled for {date}.\n\n\
         Please reply to this message with:\n\
         - Any recent test reports\n\
         - Photos of affected areas\n\
         - Updates on your condition\n\n\
         Best regards,\n\
         {doctor}'s Team",
        patient = patient_name,
        doctor = doctor,
        date = format_date(followup_date),
    )
}

/// Fill `{patient_name}`, `{doctor_name}` and `{followup_date}` in a doctor-supplied template
pub fn render_template(
    template: &str,
    patient_name: &str,
    doctor_name: &str,
    followup_date: Option<DateTime<Utc>>,
) -> String {
    template
        .replace("{patient_name}", patient_name)
        .replace("{doctor_name}", &doctor_title(doctor_name))
        .replace("{followup_date}", &format_date(followup_date))
}

pub fn appointment_confirmation(start: DateTime<Utc>) -> String {
    format!(
        "Your appointment is confirmed for {} (UTC). See you then!",
        start.format("%A, %d %B %Y at %H:%M")
    )
}

/// Frame a patient's text for the accumulated extracted-text buffer
pub fn frame_patient_message(body: &str) -> String {
    format!("Patient message: {}", body)
}

/// Frame text extracted from an attachment
pub fn frame_document(text: &str) -> String {
    format!(
        "--- Extracted from document ---\n{}\n--- End of document ---",
        text
    )
}
