use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use docfollow_types::{Doctor, DoctorProfile, DoctorSettingsUpdate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub whatsapp_connected: bool,
    pub whatsapp_number: Option<String>,
    pub whatsapp_sandbox_id: Option<String>,
    #[serde(default)]
    pub google_calendar_connected: bool,
    #[schema(value_type = Option<Object>)]
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub whatsapp_connected: bool,
    pub whatsapp_number: Option<String>,
    pub whatsapp_sandbox_id: Option<String>,
    pub google_calendar_connected: bool,
    #[schema(value_type = Option<Object>)]
    pub settings: Option<serde_json::Value>,
}

impl From<Doctor> for SettingsResponse {
    fn from(doctor: Doctor) -> Self {
        Self {
            whatsapp_connected: doctor.whatsapp_connected,
            whatsapp_number: doctor.whatsapp_number,
            whatsapp_sandbox_id: doctor.whatsapp_sandbox_id,
            google_calendar_connected: doctor.google_calendar_connected,
            settings: doctor.settings,
        }
    }
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

/// Register a doctor account
#[utoipa::path(
    post,
    path = "/doctors/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Doctor registered", body = DoctorProfile),
        (status = 400, description = "Missing fields or email already registered")
    ),
    tag = "doctors"
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<DoctorProfile>)> {
    let email = req.email.trim().to_lowercase();
    if req.name.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "name and password are required".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email".to_string()));
    }
    if state.persist.find_doctor_by_email(&email).await?.is_some() {
        return Err(ApiError::BadRequest("Email already registered".to_string()));
    }

    let doctor = state
        .persist
        .create_doctor(Doctor {
            id: String::new(),
            name: req.name.trim().to_string(),
            email,
            password_hash: hash_password(&req.password)?,
            whatsapp_connected: req.whatsapp_connected,
            whatsapp_number: req.whatsapp_number,
            whatsapp_sandbox_id: req.whatsapp_sandbox_id,
            google_calendar_connected: req.google_calendar_connected,
            settings: req.settings,
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| match e {
            docfollow_persist::PersistError::Duplicate(_) => {
                ApiError::BadRequest("Email already registered".to_string())
            }
            other => other.into(),
        })?;

    tracing::info!(doctor_id = %doctor.id, "Doctor registered");
    Ok((StatusCode::CREATED, Json(doctor.profile())))
}

/// Get a doctor's connection settings
#[utoipa::path(
    get,
    path = "/settings/{doctor_id}",
    params(("doctor_id" = String, Path, description = "Doctor ID")),
    responses(
        (status = 200, description = "Doctor settings", body = SettingsResponse),
        (status = 404, description = "Doctor not found")
    ),
    tag = "doctors"
)]
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<String>,
) -> ApiResult<Json<SettingsResponse>> {
    let doctor = state
        .persist
        .get_doctor(&doctor_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Doctor not found: {}", doctor_id)))?;

    Ok(Json(doctor.into()))
}

/// Update a doctor's connection settings
#[utoipa::path(
    put,
    path = "/settings/{doctor_id}",
    params(("doctor_id" = String, Path, description = "Doctor ID")),
    request_body = DoctorSettingsUpdate,
    responses(
        (status = 200, description = "Updated settings", body = SettingsResponse),
        (status = 400, description = "No fields to update"),
        (status = 404, description = "Doctor not found")
    ),
    tag = "doctors"
)]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<String>,
    Json(update): Json<DoctorSettingsUpdate>,
) -> ApiResult<Json<SettingsResponse>> {
    if update.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let doctor = state
        .persist
        .update_doctor_settings(&doctor_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Doctor not found: {}", doctor_id)))?;

    Ok(Json(doctor.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{PasswordHash, PasswordVerifier};

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"correct horse", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"wrong", &parsed)
            .is_err());
    }
}
