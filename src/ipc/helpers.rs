use crate::clock::LocalClock;
use crate::error::{ServiceError, ServiceResult};
use crate::ipc::error::{ok, service_err};
use crate::ipc::types::{AppState, Request};
use crate::policy::Viewer;
use crate::users;
use rusqlite::Connection;
use serde_json::Value;

pub fn respond(req: &Request, result: ServiceResult<Value>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => service_err(&req.id, e),
    }
}

pub fn db_conn(state: &AppState) -> ServiceResult<&Connection> {
    state.db.as_ref().ok_or(ServiceError::NoWorkspace)
}

/// Open connection plus the viewer named by `params.viewerId`.
pub fn session<'a>(state: &'a AppState, req: &Request) -> ServiceResult<(&'a Connection, Viewer)> {
    let conn = db_conn(state)?;
    let viewer_id = match req.params.get("viewerId") {
        Some(Value::String(s)) => s.clone(),
        // Numbers would drop leading zeros from id numbers.
        Some(Value::Number(_)) => {
            return Err(ServiceError::bad_field("viewerId", "viewerId must be a string"))
        }
        _ => return Err(ServiceError::bad_field("viewerId", "missing viewerId")),
    };
    let viewer = users::resolve_viewer(conn, &viewer_id)?;
    Ok((conn, viewer))
}

pub fn clock(state: &AppState) -> LocalClock {
    LocalClock::system(state.config.timezone)
}

pub fn required_str(params: &Value, key: &str) -> ServiceResult<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| ServiceError::bad_field(key, format!("missing {}", key)))
}

pub fn optional_str(params: &Value, key: &str) -> ServiceResult<Option<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ServiceError::bad_field(
            key,
            format!("{} must be a string", key),
        )),
    }
}

/// Accepts JSON booleans as well as the `1`/`0` and `"1"`/`"0"` forms query
/// strings tend to produce.
pub fn optional_bool(params: &Value, key: &str) -> ServiceResult<Option<bool>> {
    let v = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let parsed = match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().and_then(|i| match i {
            1 => Some(true),
            0 => Some(false),
            _ => None,
        }),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| ServiceError::bad_field(key, format!("{} must be a boolean", key)))
}

pub fn optional_i64(params: &Value, key: &str) -> ServiceResult<Option<i64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| ServiceError::bad_field(key, format!("{} must be an integer", key))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ServiceError::bad_field(key, format!("{} must be an integer", key))),
        Some(_) => Err(ServiceError::bad_field(
            key,
            format!("{} must be an integer", key),
        )),
    }
}
