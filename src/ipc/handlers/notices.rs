use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{clock, optional_str, required_str, respond, session};
use crate::ipc::types::{AppState, Request};
use crate::notices::{self, NewNotice, HOME_LATEST_LIMIT};
use crate::users;
use serde_json::{json, Value};

fn notices_create(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let student_ids = match req.params.get("studentIds") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ServiceError::bad_field("studentIds", "studentIds must be strings"))
            })
            .collect::<ServiceResult<Vec<_>>>()?,
        _ => return Err(ServiceError::bad_field("studentIds", "missing studentIds")),
    };
    let notice = NewNotice {
        student_ids,
        reason: required_str(&req.params, "reason")?,
        reported_at: notices::reported_at_param(optional_str(&req.params, "reportedAt")?.as_deref())?,
    };
    let created = notices::create(conn, &viewer, &notice, clock(state).now)?;
    Ok(json!({ "notices": created }))
}

fn notices_list(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    Ok(json!({ "notices": notices::list_own(conn, &viewer, None)? }))
}

fn notices_delete(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let notice_id = required_str(&req.params, "noticeId")?;
    notices::delete_own(conn, &viewer, &notice_id)?;
    Ok(json!({ "ok": true }))
}

fn home_summary(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let latest = notices::list_own(conn, &viewer, Some(HOME_LATEST_LIMIT))?;
    let flags = users::session_flags(conn, &viewer)?;
    Ok(json!({ "latest": latest, "flags": flags }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "notices.create" => notices_create(state, req),
        "notices.list" => notices_list(state, req),
        "notices.delete" => notices_delete(state, req),
        "home.summary" => home_summary(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
