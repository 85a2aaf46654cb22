use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use docfollow_engine::{CreateFollowup, CreatedFollowup, ReminderPatch};
use docfollow_persist::{ReminderFilter, ReminderStats};
use docfollow_types::{Reminder, ReminderStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use super::DoctorQuery;
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReminderRequest {
    pub patient_id: String,
    pub followup_date: DateTime<Utc>,
    pub message_template: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRemindersQuery {
    pub doctor_id: String,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteReminderResponse {
    pub success: bool,
    pub cancelled_job_id: Option<String>,
}

/// Schedule an outreach for a patient at a future time
#[utoipa::path(
    post,
    path = "/reminders",
    params(DoctorQuery),
    request_body = CreateReminderRequest,
    responses(
        (status = 201, description = "Reminder scheduled", body = CreatedFollowup),
        (status = 400, description = "Past follow-up date"),
        (status = 404, description = "Patient not found")
    ),
    tag = "reminders"
)]
pub async fn create_reminder(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DoctorQuery>,
    Json(req): Json<CreateReminderRequest>,
) -> ApiResult<(StatusCode, Json<CreatedFollowup>)> {
    if req.followup_date <= Utc::now() {
        return Err(ApiError::BadRequest(
            "Follow-up date must be in the future".to_string(),
        ));
    }

    let created = state
        .engine
        .create_followup(CreateFollowup {
            patient_id: req.patient_id,
            doctor_id: query.doctor_id,
            followup_at: Some(req.followup_date),
            message_template: req.message_template,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// A doctor's reminders, soonest first
#[utoipa::path(
    get,
    path = "/reminders",
    params(ListRemindersQuery),
    responses(
        (status = 200, description = "Reminders", body = [Reminder]),
        (status = 400, description = "Unknown status")
    ),
    tag = "reminders"
)]
pub async fn list_reminders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRemindersQuery>,
) -> ApiResult<Json<Vec<Reminder>>> {
    let mut filter = ReminderFilter::for_doctor(query.doctor_id);
    if let Some(status) = query.status {
        let status: ReminderStatus = status.parse().map_err(ApiError::BadRequest)?;
        filter = filter.with_statuses(&[status]);
    }
    Ok(Json(state.persist.list_reminders(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/reminders/{reminder_id}",
    params(("reminder_id" = String, Path, description = "Reminder ID"), DoctorQuery),
    responses(
        (status = 200, description = "Reminder", body = Reminder),
        (status = 404, description = "Reminder not found")
    ),
    tag = "reminders"
)]
pub async fn get_reminder(
    State(state): State<Arc<AppState>>,
    Path(reminder_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Reminder>> {
    Ok(Json(
        state
            .engine
            .get_reminder(&reminder_id, &query.doctor_id)
            .await?,
    ))
}

/// Change time, text or status; a new time moves the scheduled job
#[utoipa::path(
    put,
    path = "/reminders/{reminder_id}",
    params(("reminder_id" = String, Path, description = "Reminder ID"), DoctorQuery),
    request_body = ReminderPatch,
    responses(
        (status = 200, description = "Updated reminder", body = Reminder),
        (status = 400, description = "No fields or past date"),
        (status = 404, description = "Reminder not found")
    ),
    tag = "reminders"
)]
pub async fn update_reminder(
    State(state): State<Arc<AppState>>,
    Path(reminder_id): Path<String>,
    Query(query): Query<DoctorQuery>,
    Json(patch): Json<ReminderPatch>,
) -> ApiResult<Json<Reminder>> {
    Ok(Json(
        state
            .engine
            .update_reminder(&reminder_id, &query.doctor_id, patch)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/reminders/{reminder_id}",
    params(("reminder_id" = String, Path, description = "Reminder ID"), DoctorQuery),
    responses(
        (status = 200, description = "Reminder deleted", body = DeleteReminderResponse),
        (status = 404, description = "Reminder not found")
    ),
    tag = "reminders"
)]
pub async fn delete_reminder(
    State(state): State<Arc<AppState>>,
    Path(reminder_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<DeleteReminderResponse>> {
    let cancelled_job_id = state
        .engine
        .delete_reminder(&reminder_id, &query.doctor_id)
        .await?;
    Ok(Json(DeleteReminderResponse {
        success: true,
        cancelled_job_id,
    }))
}

/// Send the outreach now instead of waiting for the schedule
#[utoipa::path(
    post,
    path = "/reminders/{reminder_id}/send-now",
    params(("reminder_id" = String, Path, description = "Reminder ID"), DoctorQuery),
    responses(
        (status = 200, description = "Reminder sent", body = Reminder),
        (status = 404, description = "Reminder not found"),
        (status = 409, description = "Reminder already sent or cancelled"),
        (status = 502, description = "Outreach could not be sent")
    ),
    tag = "reminders"
)]
pub async fn send_now(
    State(state): State<Arc<AppState>>,
    Path(reminder_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Reminder>> {
    Ok(Json(
        state.engine.send_now(&reminder_id, &query.doctor_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/reminders/stats/{doctor_id}",
    params(("doctor_id" = String, Path, description = "Doctor ID")),
    responses((status = 200, description = "Reminder statistics", body = ReminderStats)),
    tag = "reminders"
)]
pub async fn reminder_stats(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<String>,
) -> ApiResult<Json<ReminderStats>> {
    Ok(Json(state.engine.reminder_stats(&doctor_id).await?))
}
