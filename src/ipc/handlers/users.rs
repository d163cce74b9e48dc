use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{db_conn, optional_bool, optional_str, required_str, respond, session};
use crate::ipc::types::{AppState, Request};
use crate::users::{self, NewUser, ProfilePatch};
use serde_json::{json, Value};

fn new_user(params: &Value) -> ServiceResult<NewUser> {
    Ok(NewUser {
        id_number: required_str(params, "idNumber")?,
        full_name: required_str(params, "fullName")?,
        email: required_str(params, "email")?,
    })
}

fn users_create(state: &AppState, req: &Request, superuser: bool) -> ServiceResult<Value> {
    let conn = db_conn(state)?;
    let user = users::create(conn, &new_user(&req.params)?, superuser)?;
    Ok(json!({ "user": user }))
}

fn users_get(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let user = users::find(conn, &viewer.id_number)?.ok_or(ServiceError::NotFound("user"))?;
    Ok(json!({ "user": user }))
}

fn users_update_profile(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let patch = req.params.get("patch").unwrap_or(&req.params);
    let patch = ProfilePatch {
        id_number: optional_str(patch, "idNumber")?,
        full_name: optional_str(patch, "fullName")?,
        email: optional_str(patch, "email")?,
    };
    let user = users::update_profile(conn, &viewer, &patch)?;
    Ok(json!({ "user": user }))
}

fn staff_assign(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let target = required_str(&req.params, "idNumber")?;
    let mark = optional_bool(&req.params, "isSchoolStaff")?.unwrap_or(false);
    let user = users::assign_school_staff(conn, &viewer, &target, mark)?;
    Ok(json!({ "user": user }))
}

fn session_flags(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    Ok(json!(users::session_flags(conn, &viewer)?))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "users.create" => users_create(state, req, false),
        "users.createSuperuser" => users_create(state, req, true),
        "users.get" => users_get(state, req),
        "users.updateProfile" => users_update_profile(state, req),
        "staff.assign" => staff_assign(state, req),
        "session.flags" => session_flags(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
