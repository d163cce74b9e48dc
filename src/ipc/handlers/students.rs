use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{optional_bool, optional_i64, optional_str, required_str, respond, session};
use crate::ipc::types::{AppState, Request};
use crate::students::{self, NewStudent, StudentPatch};
use serde_json::{json, Value};

fn new_student(params: &Value) -> ServiceResult<NewStudent> {
    Ok(NewStudent {
        first_name: required_str(params, "firstName")?,
        last_name: required_str(params, "lastName")?,
        level: required_str(params, "level")?,
        grade: optional_i64(params, "grade")?
            .ok_or_else(|| ServiceError::bad_field("grade", "missing grade"))?,
        active: optional_bool(params, "active")?.unwrap_or(true),
    })
}

fn students_list(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    Ok(json!({ "students": students::list_for(conn, &viewer)? }))
}

fn students_create(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let student = students::create(conn, &viewer, &new_student(&req.params)?)?;
    Ok(json!({ "studentId": student.id, "student": student }))
}

fn students_register(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let Some(entries) = req.params.get("students").and_then(|v| v.as_array()) else {
        return Err(ServiceError::bad_field("students", "missing students array"));
    };
    let parsed = entries
        .iter()
        .map(new_student)
        .collect::<ServiceResult<Vec<_>>>()?;
    let created = students::register_many(conn, &viewer, &parsed)?;
    Ok(json!({ "students": created }))
}

fn students_update(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let student_id = required_str(&req.params, "studentId")?;
    let patch = req.params.get("patch").unwrap_or(&Value::Null);
    let patch = StudentPatch {
        first_name: optional_str(patch, "firstName")?,
        last_name: optional_str(patch, "lastName")?,
        level: optional_str(patch, "level")?,
        grade: optional_i64(patch, "grade")?,
        active: optional_bool(patch, "active")?,
    };
    let student = students::update(conn, &viewer, &student_id, &patch)?;
    Ok(json!({ "student": student }))
}

fn students_delete(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let student_id = required_str(&req.params, "studentId")?;
    students::delete(conn, &viewer, &student_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, req),
        "students.create" => students_create(state, req),
        "students.register" => students_register(state, req),
        "students.update" => students_update(state, req),
        "students.delete" => students_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
