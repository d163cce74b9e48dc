use crate::error::{ServiceError, ServiceResult};
use crate::model::{self, parse_ts};
use crate::policy::Viewer;
use crate::reports::{self, DetailedRow};
use crate::students;
use chrono::{DateTime, Utc};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

pub const HOME_LATEST_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct NewNotice {
    pub student_ids: Vec<String>,
    pub reason: String,
    pub reported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedNotice {
    pub id: String,
    pub student_id: String,
    pub reported_at: String,
}

/// Files one late arrival per selected student. Every student must be one of
/// the viewer's active students.
pub fn create(
    conn: &Connection,
    viewer: &Viewer,
    notice: &NewNotice,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<CreatedNotice>> {
    let allowed: HashSet<String> = students::active_linked_ids(conn, viewer)?
        .into_iter()
        .collect();
    if allowed.is_empty() {
        return Err(ServiceError::NoActiveStudents);
    }
    if notice.student_ids.is_empty() {
        return Err(ServiceError::bad_field(
            "studentIds",
            "select at least one student",
        ));
    }
    let reason = model::validate_reason(&notice.reason)?;
    let reported_at = match notice.reported_at {
        Some(ts) if ts > now => {
            return Err(ServiceError::bad_field(
                "reportedAt",
                "reportedAt must not be in the future",
            ))
        }
        Some(ts) => ts,
        None => now,
    };

    let mut seen = HashSet::new();
    let mut picked = Vec::new();
    for id in &notice.student_ids {
        if !allowed.contains(id) {
            return Err(ServiceError::BadParams {
                message: "student is not one of your active students".to_string(),
                details: Some(serde_json::json!({ "field": "studentIds", "studentId": id })),
            });
        }
        if seen.insert(id.as_str()) {
            picked.push(id.clone());
        }
    }

    let stamp = model::format_ts(reported_at);
    let tx = conn.unchecked_transaction()?;
    let mut created = Vec::with_capacity(picked.len());
    for student_id in picked {
        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO late_arrivals(id, responsible_id, student_id, reason, reported_at)
             VALUES(?, ?, ?, ?, ?)",
            (&id, &viewer.id_number, &student_id, &reason, &stamp),
        )?;
        created.push(CreatedNotice {
            id,
            student_id,
            reported_at: stamp.clone(),
        });
    }
    tx.commit()?;
    info!(
        responsible = %viewer.id_number,
        count = created.len(),
        "late arrival notices filed"
    );
    Ok(created)
}

/// The viewer's own notices, newest first. Staff get no special treatment
/// here: this is "my notices", not a report.
pub fn list_own(
    conn: &Connection,
    viewer: &Viewer,
    limit: Option<usize>,
) -> ServiceResult<Vec<DetailedRow>> {
    let mut sql = format!(
        "{} WHERE la.responsible_id = ? ORDER BY la.reported_at DESC, la.rowid DESC",
        reports::DETAILED_SELECT
    );
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {}", n));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter([viewer.id_number.as_str()]), reports::detailed_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Deletes one of the viewer's own notices.
pub fn delete_own(conn: &Connection, viewer: &Viewer, notice_id: &str) -> ServiceResult<()> {
    let n = conn.execute(
        "DELETE FROM late_arrivals WHERE id = ? AND responsible_id = ?",
        (notice_id, &viewer.id_number),
    )?;
    if n == 0 {
        return Err(ServiceError::NotFound("notice"));
    }
    Ok(())
}

pub fn reported_at_param(raw: Option<&str>) -> ServiceResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_ts(s).map(Some).ok_or_else(|| {
            ServiceError::bad_field("reportedAt", "reportedAt must be an RFC 3339 timestamp")
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;
    use crate::students::StudentPatch;
    use chrono::Duration;

    fn notice(ids: &[&String], reason: &str) -> NewNotice {
        NewNotice {
            student_ids: ids.iter().map(|s| s.to_string()).collect(),
            reason: reason.to_string(),
            reported_at: None,
        }
    }

    #[test]
    fn one_row_per_distinct_student_stamped_now() {
        let f = Fixture::school();
        let created = create(
            &f.conn,
            &f.resp_a,
            &notice(&[&f.ana.id, &f.axel.id, &f.ana.id], "  Turno médico  "),
            f.clock.now,
        )
        .unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|c| c.reported_at == model::format_ts(f.clock.now)));

        let latest = list_own(&f.conn, &f.resp_a, Some(2)).unwrap();
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().all(|r| r.reason == "Turno médico"));
        assert!(latest.iter().all(|r| r.reviewed_by.is_none()));
    }

    #[test]
    fn foreign_or_inactive_students_are_rejected() {
        let f = Fixture::school();
        let e = create(&f.conn, &f.resp_a, &notice(&[&f.bruno.id], "x"), f.clock.now).unwrap_err();
        assert_eq!(e.code(), "bad_params");

        students::update(
            &f.conn,
            &f.resp_a,
            &f.axel.id,
            &StudentPatch {
                active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        let e = create(&f.conn, &f.resp_a, &notice(&[&f.axel.id], "x"), f.clock.now).unwrap_err();
        assert_eq!(e.code(), "bad_params");
    }

    #[test]
    fn viewer_without_active_students_gets_a_distinct_error() {
        let f = Fixture::school();
        let e = create(&f.conn, &f.staff, &notice(&[&f.ana.id], "x"), f.clock.now).unwrap_err();
        assert_eq!(e.code(), "no_active_students");
    }

    #[test]
    fn reason_and_selection_are_validated() {
        let f = Fixture::school();
        let e = create(&f.conn, &f.resp_a, &notice(&[], "x"), f.clock.now).unwrap_err();
        assert_eq!(e.code(), "bad_params");
        let e = create(&f.conn, &f.resp_a, &notice(&[&f.ana.id], "   "), f.clock.now).unwrap_err();
        assert_eq!(e.code(), "bad_params");
        let long = "a".repeat(model::REASON_MAX_CHARS + 1);
        let e = create(&f.conn, &f.resp_a, &notice(&[&f.ana.id], &long), f.clock.now).unwrap_err();
        assert_eq!(e.code(), "bad_params");
    }

    #[test]
    fn backdating_is_allowed_but_not_the_future() {
        let f = Fixture::school();
        let mut n = notice(&[&f.ana.id], "Ayer");
        n.reported_at = Some(f.clock.now - Duration::days(1));
        let created = create(&f.conn, &f.resp_a, &n, f.clock.now).unwrap();
        assert_eq!(
            created[0].reported_at,
            model::format_ts(f.clock.now - Duration::days(1))
        );

        n.reported_at = Some(f.clock.now + Duration::minutes(1));
        let e = create(&f.conn, &f.resp_a, &n, f.clock.now).unwrap_err();
        assert_eq!(e.code(), "bad_params");
    }

    #[test]
    fn list_is_own_only_and_newest_first() {
        let f = Fixture::school();
        let mine = list_own(&f.conn, &f.resp_a, None).unwrap();
        assert_eq!(mine.len(), 4);
        assert!(mine.iter().all(|r| r.responsible_id == "22222222"));
        assert_eq!(mine[0].reason, "Médico");
        assert_eq!(mine[3].reason, "Viejo");
        assert!(list_own(&f.conn, &f.staff, None).unwrap().is_empty());
    }

    #[test]
    fn delete_only_touches_own_notices() {
        let f = Fixture::school();
        let id = f.arrival(&f.resp_b, &f.bruno, "Tarde", Duration::hours(1));
        let e = delete_own(&f.conn, &f.resp_a, &id).unwrap_err();
        assert_eq!(e.code(), "not_found");
        delete_own(&f.conn, &f.resp_b, &id).unwrap();
        assert_eq!(delete_own(&f.conn, &f.resp_b, &id).unwrap_err().code(), "not_found");
    }

    #[test]
    fn reported_at_param_parses_rfc3339() {
        assert_eq!(reported_at_param(None).unwrap(), None);
        assert_eq!(reported_at_param(Some("  ")).unwrap(), None);
        assert!(reported_at_param(Some("2025-06-15T12:00:00-03:00")).unwrap().is_some());
        assert_eq!(
            reported_at_param(Some("yesterday")).unwrap_err().code(),
            "bad_params"
        );
    }
}
