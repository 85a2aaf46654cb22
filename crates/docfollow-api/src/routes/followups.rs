use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use docfollow_engine::{CreateFollowup, CreatedFollowup, DecisionRequest, FollowupPatch};
use docfollow_types::{Followup, FollowupFilter, FollowupStatus};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use super::DoctorQuery;
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFollowupRequest {
    pub patient_id: String,
    pub doctor_id: String,
    /// Send the initial outreach at this time; omitted sends now
    pub followup_at: Option<DateTime<Utc>>,
    /// Outreach text with `{patient_name}`, `{doctor_name}`, `{followup_date}` placeholders
    pub message_template: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFollowupsQuery {
    pub doctor_id: String,
    pub patient_id: Option<String>,
    pub status: Option<String>,
}

impl ListFollowupsQuery {
    fn into_filter(self) -> ApiResult<FollowupFilter> {
        let status = self
            .status
            .map(|s| s.parse::<FollowupStatus>())
            .transpose()
            .map_err(ApiError::BadRequest)?;
        Ok(FollowupFilter {
            doctor_id: Some(self.doctor_id),
            patient_id: self.patient_id,
            status,
        })
    }
}

/// Open a followup thread
#[utoipa::path(
    post,
    path = "/followups",
    request_body = CreateFollowupRequest,
    responses(
        (status = 201, description = "Followup created", body = CreatedFollowup),
        (status = 400, description = "Past follow-up time"),
        (status = 404, description = "Patient or doctor not found"),
        (status = 502, description = "Initial outreach could not be sent")
    ),
    tag = "followups"
)]
pub async fn create_followup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateFollowupRequest>,
) -> ApiResult<(StatusCode, Json<CreatedFollowup>)> {
    let created = state
        .engine
        .create_followup(CreateFollowup {
            patient_id: req.patient_id,
            doctor_id: req.doctor_id,
            followup_at: req.followup_at,
            message_template: req.message_template,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/followups",
    params(ListFollowupsQuery),
    responses(
        (status = 200, description = "Followups, newest first", body = [Followup]),
        (status = 400, description = "Unknown status")
    ),
    tag = "followups"
)]
pub async fn list_followups(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListFollowupsQuery>,
) -> ApiResult<Json<Vec<Followup>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.persist.list_followups(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/followups/{followup_id}",
    params(("followup_id" = String, Path, description = "Followup ID"), DoctorQuery),
    responses(
        (status = 200, description = "Followup", body = Followup),
        (status = 404, description = "Followup not found")
    ),
    tag = "followups"
)]
pub async fn get_followup(
    State(state): State<Arc<AppState>>,
    Path(followup_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Followup>> {
    Ok(Json(
        state
            .engine
            .get_followup(&followup_id, &query.doctor_id)
            .await?,
    ))
}

/// Partial update; status changes must follow the lifecycle
#[utoipa::path(
    put,
    path = "/followups/{followup_id}",
    params(("followup_id" = String, Path, description = "Followup ID"), DoctorQuery),
    request_body = FollowupPatch,
    responses(
        (status = 200, description = "Updated followup", body = Followup),
        (status = 400, description = "Empty patch or illegal transition"),
        (status = 404, description = "Followup not found"),
        (status = 409, description = "Followup changed concurrently")
    ),
    tag = "followups"
)]
pub async fn update_followup(
    State(state): State<Arc<AppState>>,
    Path(followup_id): Path<String>,
    Query(query): Query<DoctorQuery>,
    Json(patch): Json<FollowupPatch>,
) -> ApiResult<Json<Followup>> {
    Ok(Json(
        state
            .engine
            .update_followup(&followup_id, &query.doctor_id, patch)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/followups/{followup_id}",
    params(("followup_id" = String, Path, description = "Followup ID"), DoctorQuery),
    responses(
        (status = 204, description = "Followup deleted"),
        (status = 404, description = "Followup not found")
    ),
    tag = "followups"
)]
pub async fn delete_followup(
    State(state): State<Arc<AppState>>,
    Path(followup_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .delete_followup(&followup_id, &query.doctor_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Doctor approves, edits or replaces the drafted reply
#[utoipa::path(
    post,
    path = "/followups/{followup_id}/decision",
    params(("followup_id" = String, Path, description = "Followup ID"), DoctorQuery),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Reply sent", body = Followup),
        (status = 400, description = "Invalid decision or empty message"),
        (status = 409, description = "Followup is not waiting for the doctor"),
        (status = 502, description = "Reply could not be sent")
    ),
    tag = "followups"
)]
pub async fn doctor_decision(
    State(state): State<Arc<AppState>>,
    Path(followup_id): Path<String>,
    Query(query): Query<DoctorQuery>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<Json<Followup>> {
    Ok(Json(
        state
            .engine
            .doctor_decision(&followup_id, &query.doctor_id, req)
            .await?,
    ))
}

/// Send the stored draft unchanged
#[utoipa::path(
    post,
    path = "/followups/{followup_id}/send-ai-draft",
    params(("followup_id" = String, Path, description = "Followup ID"), DoctorQuery),
    responses(
        (status = 200, description = "Draft sent", body = Followup),
        (status = 400, description = "No draft to send"),
        (status = 502, description = "Draft could not be sent")
    ),
    tag = "followups"
)]
pub async fn send_ai_draft(
    State(state): State<Arc<AppState>>,
    Path(followup_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Followup>> {
    Ok(Json(
        state
            .engine
            .send_ai_draft(&followup_id, &query.doctor_id)
            .await?,
    ))
}

/// Ask the patient for availability and start booking
#[utoipa::path(
    post,
    path = "/followups/{followup_id}/appointment",
    params(("followup_id" = String, Path, description = "Followup ID"), DoctorQuery),
    responses(
        (status = 200, description = "Availability request sent", body = Followup),
        (status = 409, description = "Followup cannot enter booking"),
        (status = 502, description = "Request could not be sent")
    ),
    tag = "followups"
)]
pub async fn start_appointment(
    State(state): State<Arc<AppState>>,
    Path(followup_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Followup>> {
    Ok(Json(
        state
            .engine
            .start_appointment_booking(&followup_id, &query.doctor_id)
            .await?,
    ))
}

/// Retry a failed or pending initial outreach
#[utoipa::path(
    post,
    path = "/followups/{followup_id}/outreach",
    params(("followup_id" = String, Path, description = "Followup ID"), DoctorQuery),
    responses(
        (status = 200, description = "Outreach sent", body = Followup),
        (status = 409, description = "Outreach already sent"),
        (status = 502, description = "Outreach could not be sent")
    ),
    tag = "followups"
)]
pub async fn retry_outreach(
    State(state): State<Arc<AppState>>,
    Path(followup_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Followup>> {
    Ok(Json(
        state
            .engine
            .send_initial_outreach(&followup_id, &query.doctor_id)
            .await?,
    ))
}
