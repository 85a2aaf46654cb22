use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use docfollow_engine::{CreateFollowup, CreatedFollowup};
use docfollow_types::{normalize_phone, FollowupFilter, Patient, PatientUpdate};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use super::{parse_followup_datetime, DoctorQuery};
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePatientRequest {
    pub doctor_id: String,
    pub name: String,
    #[serde(alias = "disease")]
    pub diagnosis: String,
    pub phone: String,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    /// `YYYY-MM-DD`; together with `followup_time` schedules the first outreach
    pub followup_date: Option<String>,
    /// `HH:MM`, UTC
    pub followup_time: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RescheduleRequest {
    pub new_date: String,
    pub new_time: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PatientQuery {
    pub doctor_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PatientResponse {
    #[serde(flatten)]
    pub patient: Patient,
    /// Fire time of the latest followup, or its creation time when unscheduled
    pub followup_date: Option<DateTime<Utc>>,
    pub scheduled_reminder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followup_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling_error: Option<String>,
}

impl PatientResponse {
    fn plain(patient: Patient, followup_date: Option<DateTime<Utc>>) -> Self {
        Self {
            patient,
            followup_date,
            scheduled_reminder: false,
            followup_id: None,
            reminder_id: None,
            scheduling_error: None,
        }
    }
}

async fn latest_followup_date(state: &AppState, patient_id: &str) -> ApiResult<Option<DateTime<Utc>>> {
    let followups = state
        .persist
        .list_followups(&FollowupFilter {
            patient_id: Some(patient_id.to_string()),
            ..Default::default()
        })
        .await?;
    Ok(followups
        .first()
        .map(|f| f.scheduled_for.unwrap_or(f.created_at)))
}

async fn enrich(state: &AppState, patient: Patient) -> ApiResult<PatientResponse> {
    let followup_date = latest_followup_date(state, &patient.id).await?;
    Ok(PatientResponse::plain(patient, followup_date))
}

/// Register a patient, optionally scheduling the first follow-up
#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePatientRequest,
    responses(
        (status = 201, description = "Patient created", body = PatientResponse),
        (status = 400, description = "Invalid fields or follow-up time"),
        (status = 404, description = "Doctor not found")
    ),
    tag = "patients"
)]
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePatientRequest>,
) -> ApiResult<(StatusCode, Json<PatientResponse>)> {
    let phone = normalize_phone(&req.phone);
    if req.name.trim().is_empty() || phone.is_empty() {
        return Err(ApiError::BadRequest("name and phone are required".to_string()));
    }

    state
        .persist
        .get_doctor(&req.doctor_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Doctor not found: {}", req.doctor_id)))?;

    let followup_at = match (req.followup_date.as_deref(), req.followup_time.as_deref()) {
        (Some(date), Some(time)) => {
            let at = parse_followup_datetime(date, time)?;
            if at <= Utc::now() {
                return Err(ApiError::BadRequest(
                    "Follow-up date must be in the future".to_string(),
                ));
            }
            Some(at)
        }
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "followup_date and followup_time must be given together".to_string(),
            ))
        }
    };

    let patient = state
        .persist
        .create_patient(Patient {
            id: String::new(),
            doctor_id: req.doctor_id.clone(),
            name: req.name.trim().to_string(),
            diagnosis: req.diagnosis.trim().to_string(),
            phone,
            address: req.address,
            notes: req.notes,
            image_url: req.image_url,
            created_at: Utc::now(),
        })
        .await?;
    tracing::info!(patient_id = %patient.id, doctor_id = %patient.doctor_id, "Patient created");

    let Some(at) = followup_at else {
        return Ok((StatusCode::CREATED, Json(PatientResponse::plain(patient, None))));
    };

    let scheduled = state
        .engine
        .create_followup(CreateFollowup {
            patient_id: patient.id.clone(),
            doctor_id: req.doctor_id,
            followup_at: Some(at),
            message_template: None,
        })
        .await;

    let response = match scheduled {
        Ok(CreatedFollowup { followup, reminder }) => PatientResponse {
            followup_date: followup.scheduled_for.or(Some(at)),
            scheduled_reminder: reminder.as_ref().is_some_and(|r| r.scheduled_job_id.is_some()),
            followup_id: Some(followup.id),
            reminder_id: reminder.map(|r| r.id),
            scheduling_error: None,
            patient,
        },
        Err(e) => {
            tracing::warn!(patient_id = %patient.id, error = %e, "Patient created but follow-up not scheduled");
            PatientResponse {
                scheduling_error: Some(e.to_string()),
                ..PatientResponse::plain(patient, None)
            }
        }
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// List a doctor's patients, newest first
#[utoipa::path(
    get,
    path = "/patients",
    params(DoctorQuery),
    responses((status = 200, description = "Patients", body = [PatientResponse])),
    tag = "patients"
)]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Vec<PatientResponse>>> {
    let patients = state.persist.list_patients(&query.doctor_id).await?;
    let enriched = try_join_all(patients.into_iter().map(|p| enrich(&state, p))).await?;
    Ok(Json(enriched))
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient ID"), PatientQuery),
    responses(
        (status = 200, description = "Patient", body = PatientResponse),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients"
)]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    Query(query): Query<PatientQuery>,
) -> ApiResult<Json<PatientResponse>> {
    let patient = state
        .persist
        .get_patient(&patient_id)
        .await?
        .filter(|p| query.doctor_id.as_deref().map_or(true, |d| d == p.doctor_id))
        .ok_or_else(|| ApiError::NotFound(format!("Patient not found: {}", patient_id)))?;

    Ok(Json(enrich(&state, patient).await?))
}

/// Update contact details and notes
#[utoipa::path(
    put,
    path = "/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient ID"), DoctorQuery),
    request_body = PatientUpdate,
    responses(
        (status = 200, description = "Updated patient", body = PatientResponse),
        (status = 400, description = "No fields to update"),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients"
)]
pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    Query(query): Query<DoctorQuery>,
    Json(mut update): Json<PatientUpdate>,
) -> ApiResult<Json<PatientResponse>> {
    if update.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }
    if let Some(phone) = update.phone.take() {
        let phone = normalize_phone(&phone);
        if phone.is_empty() {
            return Err(ApiError::BadRequest("phone cannot be empty".to_string()));
        }
        update.phone = Some(phone);
    }

    let patient = state
        .persist
        .update_patient(&patient_id, &query.doctor_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Patient not found: {}", patient_id)))?;

    Ok(Json(enrich(&state, patient).await?))
}

/// Delete a patient and cancel their pending reminders
#[utoipa::path(
    delete,
    path = "/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient ID"), DoctorQuery),
    responses(
        (status = 204, description = "Patient deleted"),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients"
)]
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .remove_patient(&patient_id, &query.doctor_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move the patient's pending follow-up to a new time
#[utoipa::path(
    post,
    path = "/patients/{patient_id}/reschedule",
    params(("patient_id" = String, Path, description = "Patient ID"), DoctorQuery),
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Follow-up rescheduled", body = CreatedFollowup),
        (status = 400, description = "Invalid or past date"),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients"
)]
pub async fn reschedule_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    Query(query): Query<DoctorQuery>,
    Json(req): Json<RescheduleRequest>,
) -> ApiResult<Json<CreatedFollowup>> {
    let at = parse_followup_datetime(&req.new_date, &req.new_time)?;
    if at <= Utc::now() {
        return Err(ApiError::BadRequest(
            "Follow-up date must be in the future".to_string(),
        ));
    }

    let rescheduled = state
        .engine
        .reschedule_patient(&patient_id, &query.doctor_id, at)
        .await?;
    Ok(Json(rescheduled))
}
