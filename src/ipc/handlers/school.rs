use crate::error::ServiceResult;
use crate::ipc::helpers::{clock, required_str, respond, session};
use crate::ipc::types::{AppState, Request};
use crate::{reports, review};
use serde_json::{json, Value};

/// The school desk: acknowledge today's pending arrivals, then list them.
fn school_today(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let clock = clock(state);
    let acknowledged = review::acknowledge_today(conn, &viewer, &clock)?;
    let rows = reports::today_arrivals(conn, &viewer, &clock, state.config.report_window_days)?;
    Ok(json!({
        "date": clock.today().to_string(),
        "acknowledged": acknowledged,
        "arrivals": rows,
    }))
}

fn school_acknowledge_today(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let acknowledged = review::acknowledge_today(conn, &viewer, &clock(state))?;
    Ok(json!({ "acknowledged": acknowledged }))
}

fn school_student_history(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let student_id = required_str(&req.params, "studentId")?;
    Ok(json!(reports::student_history(conn, &viewer, &student_id)?))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "school.today" => school_today(state, req),
        "school.acknowledgeToday" => school_acknowledge_today(state, req),
        "school.studentHistory" => school_student_history(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
