use axum::{extract::State, Form, Json};
use docfollow_engine::{IgnoreReason, IngestOutcome};
use docfollow_gateway::InboundMessage;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{error::ApiResult, state::AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookResponse {
    pub status: String,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub outcome: IngestOutcome,
}

/// Twilio WhatsApp inbound webhook
///
/// No-op conditions (unknown sender, no active followup, duplicate delivery)
/// answer 200 so the gateway does not retry. Drafting runs in the background.
#[utoipa::path(
    post,
    path = "/webhooks/whatsapp",
    request_body(content = String, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Message accepted or ignored", body = WebhookResponse),
        (status = 500, description = "Storage error")
    ),
    tag = "webhooks"
)]
pub async fn whatsapp_webhook(
    State(state): State<Arc<AppState>>,
    Form(form): Form<HashMap<String, String>>,
) -> ApiResult<Json<WebhookResponse>> {
    let outcome = match InboundMessage::from_twilio_form(&form) {
        Some(message) => state.engine.ingest_inbound(message).await?,
        None => {
            tracing::debug!("Webhook without sender ignored");
            IngestOutcome::Ignored {
                reason: IgnoreReason::UnknownSender,
            }
        }
    };

    tracing::info!(outcome = ?outcome, "WhatsApp webhook handled");
    Ok(Json(WebhookResponse {
        status: "success".to_string(),
        outcome,
    }))
}
