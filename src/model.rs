use crate::error::{ServiceError, ServiceResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

pub const REASON_MAX_CHARS: usize = 500;
pub const NAME_MAX_CHARS: usize = 100;
pub const FULL_NAME_MAX_CHARS: usize = 150;
pub const GRADE_MAX: i64 = 32767;

/// Fixed-width UTC text form. Lexicographic order of stored values is
/// chronological order, which the range filters rely on.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Inicial,
    Primaria,
    Secundaria,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Inicial => "INICIAL",
            Level::Primaria => "PRIMARIA",
            Level::Secundaria => "SECUNDARIA",
        }
    }

    pub fn parse(raw: &str) -> ServiceResult<Level> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "INICIAL" => Ok(Level::Inicial),
            "PRIMARIA" => Ok(Level::Primaria),
            "SECUNDARIA" => Ok(Level::Secundaria),
            _ => Err(ServiceError::BadParams {
                message: "level must be one of: INICIAL, PRIMARIA, SECUNDARIA".to_string(),
                details: Some(serde_json::json!({ "field": "level", "value": raw })),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id_number: String,
    pub full_name: String,
    pub email: String,
    pub is_school_staff: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub level: String,
    pub grade: i64,
    pub active: bool,
}

pub fn validate_id_number(raw: &str) -> ServiceResult<String> {
    let t = raw.trim();
    if t.len() != 8 || !t.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ServiceError::bad_field(
            "idNumber",
            "id number must be exactly 8 digits",
        ));
    }
    Ok(t.to_string())
}

pub fn validate_email(raw: &str) -> ServiceResult<String> {
    let t = raw.trim();
    let Some((local, domain)) = t.rsplit_once('@') else {
        return Err(ServiceError::bad_field("email", "email must contain @"));
    };
    if local.is_empty() || domain.is_empty() {
        return Err(ServiceError::bad_field("email", "email is malformed"));
    }
    Ok(format!("{}@{}", local, domain.to_lowercase()))
}

pub fn validate_name(field: &str, raw: &str, max: usize) -> ServiceResult<String> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(ServiceError::bad_field(
            field,
            format!("{} must not be empty", field),
        ));
    }
    if t.chars().count() > max {
        return Err(ServiceError::bad_field(
            field,
            format!("{} must be at most {} characters", field, max),
        ));
    }
    Ok(t.to_string())
}

pub fn validate_grade(grade: i64) -> ServiceResult<i64> {
    if !(0..=GRADE_MAX).contains(&grade) {
        return Err(ServiceError::bad_field(
            "grade",
            format!("grade must be between 0 and {}", GRADE_MAX),
        ));
    }
    Ok(grade)
}

pub fn validate_reason(raw: &str) -> ServiceResult<String> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(ServiceError::bad_field("reason", "reason must not be empty"));
    }
    if t.chars().count() > REASON_MAX_CHARS {
        return Err(ServiceError::bad_field(
            "reason",
            format!("reason must be at most {} characters", REASON_MAX_CHARS),
        ));
    }
    Ok(t.to_string())
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .ok()
        .map(|n| n.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}
