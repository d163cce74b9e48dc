use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{clock, optional_bool, optional_str, respond, session};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, DateFilter};
use crate::xlsx;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

fn reports_detailed(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let clock = clock(state);
    let filter = DateFilter {
        date_from: optional_str(&req.params, "dateFrom")?,
        date_to: optional_str(&req.params, "dateTo")?,
    };
    let export = optional_bool(&req.params, "export")?.unwrap_or(false);
    let out_dir = optional_str(&req.params, "outDir")?.map(PathBuf::from);
    if export && out_dir.is_none() {
        return Err(ServiceError::bad_field("outDir", "export requires outDir"));
    }

    let report = reports::detailed(
        conn,
        &state.policy,
        &viewer,
        &filter,
        &clock,
        state.config.report_window_days,
    )?;

    // An invalid filter never exports; the empty report is the answer.
    let export_info = match (export, out_dir, report.range) {
        (true, Some(dir), Some((from, to))) => {
            let summary = xlsx::write_late_arrivals(&dir, from, to, &report.rows, &clock)
                .map_err(ServiceError::Export)?;
            info!(
                path = %summary.path.to_string_lossy(),
                rows = summary.row_count,
                "detailed report exported"
            );
            json!({
                "path": summary.path.to_string_lossy(),
                "fileName": summary.file_name,
                "mimeType": xlsx::XLSX_MIME,
                "rowCount": summary.row_count,
            })
        }
        _ => Value::Null,
    };

    let mut out = json!(report);
    out["export"] = export_info;
    Ok(out)
}

fn reports_aggregated(state: &AppState, req: &Request) -> ServiceResult<Value> {
    let (conn, viewer) = session(state, req)?;
    let q = optional_str(&req.params, "q")?;
    let rows = reports::aggregated(
        conn,
        &state.policy,
        &viewer,
        q.as_deref(),
        &clock(state),
        state.config.report_window_days,
    )?;
    Ok(json!({ "q": q.unwrap_or_default().trim(), "rows": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.detailed" => reports_detailed(state, req),
        "reports.aggregated" => reports_aggregated(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
