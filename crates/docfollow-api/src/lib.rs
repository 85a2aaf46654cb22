pub mod config;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    middleware::logging,
    openapi::ApiDoc,
    routes::{appointments, doctors, followups, health, patients, reminders, webhooks},
    state::AppState,
};

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Doctors
        .route("/doctors/signup", post(doctors::signup))
        .route(
            "/settings/:doctor_id",
            get(doctors::get_settings).put(doctors::update_settings),
        )
        // Patients
        .route(
            "/patients",
            post(patients::create_patient).get(patients::list_patients),
        )
        .route(
            "/patients/:patient_id",
            get(patients::get_patient)
                .put(patients::update_patient)
                .delete(patients::delete_patient),
        )
        .route(
            "/patients/:patient_id/reschedule",
            post(patients::reschedule_patient),
        )
        // Followups
        .route(
            "/followups",
            post(followups::create_followup).get(followups::list_followups),
        )
        .route(
            "/followups/:followup_id",
            get(followups::get_followup)
                .put(followups::update_followup)
                .delete(followups::delete_followup),
        )
        .route(
            "/followups/:followup_id/decision",
            post(followups::doctor_decision),
        )
        .route(
            "/followups/:followup_id/send-ai-draft",
            post(followups::send_ai_draft),
        )
        .route(
            "/followups/:followup_id/appointment",
            post(followups::start_appointment),
        )
        .route(
            "/followups/:followup_id/outreach",
            post(followups::retry_outreach),
        )
        // Appointments
        .route(
            "/appointments",
            post(appointments::create_appointment).get(appointments::list_appointments),
        )
        .route(
            "/appointments/:appointment_id",
            get(appointments::get_appointment)
                .put(appointments::update_appointment)
                .delete(appointments::delete_appointment),
        )
        // Reminders
        .route(
            "/reminders",
            post(reminders::create_reminder).get(reminders::list_reminders),
        )
        .route(
            "/reminders/stats/:doctor_id",
            get(reminders::reminder_stats),
        )
        .route(
            "/reminders/:reminder_id",
            get(reminders::get_reminder)
                .put(reminders::update_reminder)
                .delete(reminders::delete_reminder),
        )
        .route(
            "/reminders/:reminder_id/send-now",
            post(reminders::send_now),
        )
        // Webhooks
        .route("/webhooks/whatsapp", post(webhooks::whatsapp_webhook));

    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum_middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if !config.cors.enabled {
        return CorsLayer::permissive();
    }

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    if config.cors.origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors
            .origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        cors.allow_origin(origins)
    }
}
