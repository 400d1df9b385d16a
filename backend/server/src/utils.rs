use chrono::{FixedOffset, NaiveDate, SecondsFormat, TimeDelta, Utc};
use serde_json::{Map, Value};

use crate::{error::AppError, namespace::as_id};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const UTC_OFFSET_SECS: i32 = 8 * 3600;

pub const TRIP_REQUIRED_FIELDS: [&str; 6] = [
    "destination",
    "arrive_date",
    "arrive_time",
    "no_of_stayed_days",
    "step1_completed",
    "leave_time",
];

/// Current time as `YYYY-MM-DDTHH:MM:SS+08:00`.
pub fn timestamp() -> String {
    let now = Utc::now();

    match FixedOffset::east_opt(UTC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).to_rfc3339_opts(SecondsFormat::Secs, false),
        None => now.to_rfc3339_opts(SecondsFormat::Secs, false),
    }
}

pub fn missing_fields<'a>(payload: &Map<String, Value>, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|field| !payload.contains_key(*field))
        .collect()
}

/// Text of a field, non-string values in their JSON form.
pub fn text_field(payload: &Map<String, Value>, key: &str) -> String {
    match payload.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// `id` from a request body: must be present and integral.
pub fn required_id(id: Option<&Value>) -> Result<u64, AppError> {
    let id = id
        .filter(|id| !id.is_null())
        .ok_or_else(|| AppError::Validation("Task ID required".to_string()))?;

    as_id(id).ok_or_else(|| AppError::Validation("Task ID must be an integer".to_string()))
}

pub fn stay_days(value: Option<&Value>) -> Result<i64, AppError> {
    let days = match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };

    days.ok_or_else(|| AppError::Validation("no_of_stayed_days must be an integer".to_string()))
}

pub fn arrival_date(value: Option<&Value>) -> Result<NaiveDate, AppError> {
    let text = value.and_then(Value::as_str).unwrap_or_default();

    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| AppError::Validation(format!("Incorrect date format: {e}")))
}

pub fn departure_date(arrival: NaiveDate, stay_days: i64) -> Result<NaiveDate, AppError> {
    TimeDelta::try_days(stay_days)
        .and_then(|stay| arrival.checked_add_signed(stay))
        .ok_or_else(|| AppError::Validation("no_of_stayed_days is out of range".to_string()))
}
