use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use docfollow_engine::CreateAppointment;
use docfollow_types::{Appointment, AppointmentStatus, AppointmentUpdate};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::DoctorQuery;
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAppointmentRequest {
    pub patient_id: String,
    pub datetime: DateTime<Utc>,
    /// Defaults to `scheduled`
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAppointmentRequest {
    pub datetime: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

fn parse_status(status: Option<String>) -> ApiResult<Option<AppointmentStatus>> {
    status
        .map(|s| s.parse().map_err(ApiError::BadRequest))
        .transpose()
}

/// Enter a visit by hand
#[utoipa::path(
    post,
    path = "/appointments",
    params(DoctorQuery),
    request_body = CreateAppointmentRequest,
    responses(
        (status = 201, description = "Appointment created", body = Appointment),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "Patient not found")
    ),
    tag = "appointments"
)]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DoctorQuery>,
    Json(req): Json<CreateAppointmentRequest>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    let status = parse_status(req.status)?;
    let created = state
        .engine
        .create_appointment(CreateAppointment {
            patient_id: req.patient_id,
            doctor_id: query.doctor_id,
            datetime: req.datetime,
            status,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// A doctor's appointments, soonest first
#[utoipa::path(
    get,
    path = "/appointments",
    params(DoctorQuery),
    responses((status = 200, description = "Appointments", body = [Appointment])),
    tag = "appointments"
)]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    Ok(Json(
        state.engine.list_appointments(&query.doctor_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/appointments/{appointment_id}",
    params(("appointment_id" = String, Path, description = "Appointment ID"), DoctorQuery),
    responses(
        (status = 200, description = "Appointment", body = Appointment),
        (status = 404, description = "Appointment not found")
    ),
    tag = "appointments"
)]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Appointment>> {
    Ok(Json(
        state
            .engine
            .get_appointment(&appointment_id, &query.doctor_id)
            .await?,
    ))
}

/// Move the visit or mark it completed or cancelled
#[utoipa::path(
    put,
    path = "/appointments/{appointment_id}",
    params(("appointment_id" = String, Path, description = "Appointment ID"), DoctorQuery),
    request_body = UpdateAppointmentRequest,
    responses(
        (status = 200, description = "Updated appointment", body = Appointment),
        (status = 400, description = "No fields or unknown status"),
        (status = 404, description = "Appointment not found")
    ),
    tag = "appointments"
)]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    Query(query): Query<DoctorQuery>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> ApiResult<Json<Appointment>> {
    let update = AppointmentUpdate {
        datetime: req.datetime,
        status: parse_status(req.status)?,
    };
    Ok(Json(
        state
            .engine
            .update_appointment(&appointment_id, &query.doctor_id, update)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/appointments/{appointment_id}",
    params(("appointment_id" = String, Path, description = "Appointment ID"), DoctorQuery),
    responses(
        (status = 204, description = "Appointment deleted"),
        (status = 404, description = "Appointment not found")
    ),
    tag = "appointments"
)]
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .delete_appointment(&appointment_id, &query.doctor_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
