pub mod appointments;
pub mod doctors;
pub mod followups;
pub mod health;
pub mod patients;
pub mod reminders;
pub mod webhooks;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{ApiError, ApiResult};

/// Owning doctor, required on patient and reminder resources
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DoctorQuery {
    pub doctor_id: String,
}

/// Combine `YYYY-MM-DD` and `HH:MM` into a UTC instant
pub(crate) fn parse_followup_datetime(date: &str, time: &str) -> ApiResult<DateTime<Utc>> {
    let invalid = || {
        ApiError::BadRequest("Invalid date or time format. Use YYYY-MM-DD and HH:MM.".to_string())
    };
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|_| invalid())?;
    Ok(date.and_time(time).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_followup_datetime() {
        assert_eq!(
            parse_followup_datetime("2030-03-14", "09:30").unwrap(),
            Utc.with_ymd_and_hms(2030, 3, 14, 9, 30, 0).unwrap()
        );
        assert!(parse_followup_datetime("14/03/2030", "09:30").is_err());
        assert!(parse_followup_datetime("2030-03-14", "9.30am").is_err());
    }
}
