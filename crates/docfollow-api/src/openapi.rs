use utoipa::OpenApi;

use crate::routes::{appointments, doctors, followups, health, patients, reminders, webhooks};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DocFollow API",
        description = "Patient follow-up over WhatsApp with doctor-approved AI drafts"
    ),
    paths(
        health::health_check,
        doctors::signup,
        doctors::get_settings,
        doctors::update_settings,
        patients::create_patient,
        patients::list_patients,
        patients::get_patient,
        patients::update_patient,
        patients::delete_patient,
        patients::reschedule_patient,
        followups::create_followup,
        followups::list_followups,
        followups::get_followup,
        followups::update_followup,
        followups::delete_followup,
        followups::doctor_decision,
        followups::send_ai_draft,
        followups::start_appointment,
        followups::retry_outreach,
        appointments::create_appointment,
        appointments::list_appointments,
        appointments::get_appointment,
        appointments::update_appointment,
        appointments::delete_appointment,
        reminders::create_reminder,
        reminders::list_reminders,
        reminders::get_reminder,
        reminders::update_reminder,
        reminders::delete_reminder,
        reminders::send_now,
        reminders::reminder_stats,
        webhooks::whatsapp_webhook,
    ),
    components(schemas(
        health::HealthResponse,
        doctors::SignupRequest,
        doctors::SettingsResponse,
        patients::CreatePatientRequest,
        patients::RescheduleRequest,
        followups::CreateFollowupRequest,
        appointments::CreateAppointmentRequest,
        appointments::UpdateAppointmentRequest,
        reminders::CreateReminderRequest,
        reminders::DeleteReminderResponse,
        webhooks::WebhookResponse,
    )),
    tags(
        (name = "health", description = "Service and scheduler health"),
        (name = "doctors", description = "Doctor accounts and connection settings"),
        (name = "patients", description = "Patient records"),
        (name = "followups", description = "Follow-up threads and doctor decisions"),
        (name = "appointments", description = "Booked and manually entered visits"),
        (name = "reminders", description = "Scheduled outreach"),
        (name = "webhooks", description = "Inbound WhatsApp messages")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/followups/{followup_id}/decision"));
        assert!(paths.contains_key("/webhooks/whatsapp"));
        assert!(paths.contains_key("/appointments/{appointment_id}"));
        assert!(paths.contains_key("/reminders/stats/{doctor_id}"));
    }
}
