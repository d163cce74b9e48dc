//! Late-arrival reports.
//!
//! Every query here is read-only. Visibility comes from an [`AccessPolicy`]
//! so the detailed and aggregated reports always agree on who sees what.

use crate::clock::LocalClock;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{self, Student};
use crate::policy::{AccessPolicy, Viewer};
use crate::students;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use serde::Serialize;
use std::collections::HashMap;

pub(crate) const DETAILED_SELECT: &str = "SELECT
       la.id,
       la.student_id,
       s.last_name,
       s.first_name,
       s.level,
       s.grade,
       la.reported_at,
       la.reason,
       la.responsible_id,
       u.full_name,
       la.reviewed_by,
       rv.full_name,
       la.reviewed_at
     FROM late_arrivals la
     JOIN students s ON s.id = la.student_id
     JOIN users u ON u.id_number = la.responsible_id
     LEFT JOIN users rv ON rv.id_number = la.reviewed_by";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedRow {
    pub id: String,
    pub student_id: String,
    pub student_last_name: String,
    pub student_first_name: String,
    pub student_level: String,
    pub student_grade: i64,
    pub reported_at: String,
    pub reason: String,
    pub responsible_id: String,
    pub responsible_name: String,
    pub reviewed_by: Option<String>,
    pub reviewed_by_name: Option<String>,
    pub reviewed_at: Option<String>,
}

impl DetailedRow {
    pub fn student_display(&self) -> String {
        format!("{}, {}", self.student_last_name, self.student_first_name)
    }

    pub fn grade_display(&self) -> String {
        format!("{} {}", self.student_level, self.student_grade)
    }
}

pub(crate) fn detailed_from_row(r: &Row<'_>) -> rusqlite::Result<DetailedRow> {
    Ok(DetailedRow {
        id: r.get(0)?,
        student_id: r.get(1)?,
        student_last_name: r.get(2)?,
        student_first_name: r.get(3)?,
        student_level: r.get(4)?,
        student_grade: r.get(5)?,
        reported_at: r.get(6)?,
        reason: r.get(7)?,
        responsible_id: r.get(8)?,
        responsible_name: r.get(9)?,
        reviewed_by: r.get(10)?,
        reviewed_by_name: r.get(11)?,
        reviewed_at: r.get(12)?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct DateFilter {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedReport {
    /// The filter as applied (defaults filled in), echoed back for the form.
    pub date_from: String,
    pub date_to: String,
    pub filter_valid: bool,
    #[serde(skip)]
    pub range: Option<(NaiveDate, NaiveDate)>,
    pub rows: Vec<DetailedRow>,
}

fn blank_to_none(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// Fills missing bounds with the default window and parses both. `None` means
/// at least one bound was present but unparseable.
pub fn resolve_range(
    filter: &DateFilter,
    clock: &LocalClock,
    window_days: i64,
) -> (String, String, Option<(NaiveDate, NaiveDate)>) {
    let today = clock.today();
    let default_from = clock.days_before_today(window_days).to_string();
    let default_to = today.to_string();

    let raw_from = blank_to_none(filter.date_from.as_deref())
        .map(str::to_string)
        .unwrap_or(default_from);
    let raw_to = blank_to_none(filter.date_to.as_deref())
        .map(str::to_string)
        .unwrap_or(default_to);

    let parsed = match (
        NaiveDate::parse_from_str(&raw_from, "%Y-%m-%d"),
        NaiveDate::parse_from_str(&raw_to, "%Y-%m-%d"),
    ) {
        (Ok(from), Ok(to)) => Some((from, to)),
        _ => None,
    };
    (raw_from, raw_to, parsed)
}

pub fn detailed(
    conn: &Connection,
    policy: &dyn AccessPolicy,
    viewer: &Viewer,
    filter: &DateFilter,
    clock: &LocalClock,
    window_days: i64,
) -> ServiceResult<DetailedReport> {
    let (date_from, date_to, range) = resolve_range(filter, clock, window_days);
    let Some((from, to)) = range else {
        // Unparseable dates degrade to an empty report rather than an error.
        return Ok(DetailedReport {
            date_from,
            date_to,
            filter_valid: false,
            range: None,
            rows: Vec::new(),
        });
    };

    let (start, end) = clock.date_range(from, to);
    let (scope_sql, scope_vals) = policy.scope(viewer).sql("la.responsible_id");
    let sql = format!(
        "{} WHERE la.reported_at >= ? AND la.reported_at < ? AND {}
         ORDER BY la.reported_at DESC, la.rowid DESC",
        DETAILED_SELECT, scope_sql
    );
    let mut bind = vec![
        Value::Text(model::format_ts(start)),
        Value::Text(model::format_ts(end)),
    ];
    bind.extend(scope_vals);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), detailed_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DetailedReport {
        date_from,
        date_to,
        filter_valid: true,
        range: Some((from, to)),
        rows,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRow {
    pub student_id: String,
    pub student_last_name: String,
    pub student_first_name: String,
    pub student_level: String,
    pub student_grade: i64,
    pub total: i64,
    pub last30: i64,
}

fn like_pattern(q: &str) -> String {
    let mut out = String::with_capacity(q.len() + 2);
    out.push('%');
    for c in q.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Per-student totals across all time plus the rolling window count.
pub fn aggregated(
    conn: &Connection,
    policy: &dyn AccessPolicy,
    viewer: &Viewer,
    q: Option<&str>,
    clock: &LocalClock,
    window_days: i64,
) -> ServiceResult<Vec<AggregatedRow>> {
    let (scope_sql, scope_vals) = policy.scope(viewer).sql("la.responsible_id");
    let mut bind = vec![Value::Text(model::format_ts(
        clock.rolling_start(window_days),
    ))];
    bind.extend(scope_vals);

    let mut name_sql = String::new();
    if let Some(text) = blank_to_none(q) {
        name_sql.push_str(
            " AND (s.last_name LIKE ? ESCAPE '\\' OR s.first_name LIKE ? ESCAPE '\\')",
        );
        let pat = like_pattern(text);
        bind.push(Value::Text(pat.clone()));
        bind.push(Value::Text(pat));
    }

    let sql = format!(
        "SELECT
           s.id,
           s.last_name,
           s.first_name,
           s.level,
           s.grade,
           COUNT(la.id) AS total,
           SUM(CASE WHEN la.reported_at >= ?1 THEN 1 ELSE 0 END) AS last30
         FROM late_arrivals la
         JOIN students s ON s.id = la.student_id
         WHERE {}{}
         GROUP BY s.id, s.last_name, s.first_name, s.level, s.grade
         ORDER BY s.last_name, s.first_name",
        scope_sql, name_sql
    );
    // Plain `?` placeholders after `?1` are numbered from 2, matching `bind`.
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), |r| {
            Ok(AggregatedRow {
                student_id: r.get(0)?,
                student_last_name: r.get(1)?,
                student_first_name: r.get(2)?,
                student_level: r.get(3)?,
                student_grade: r.get(4)?,
                total: r.get(5)?,
                last30: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayRow {
    #[serde(flatten)]
    pub arrival: DetailedRow,
    pub total: i64,
    pub last30: i64,
}

/// Today's arrivals for the school desk, each annotated with that student's
/// counts across every reporter. Pure read; acknowledging is
/// [`crate::review::acknowledge_today`].
pub fn today_arrivals(
    conn: &Connection,
    viewer: &Viewer,
    clock: &LocalClock,
    window_days: i64,
) -> ServiceResult<Vec<TodayRow>> {
    viewer.require_school()?;
    let today = clock.today();
    let (start, end) = clock.date_range(today, today);
    let sql = format!(
        "{} WHERE la.reported_at >= ? AND la.reported_at < ?
         ORDER BY la.reported_at DESC, la.rowid DESC",
        DETAILED_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let arrivals = stmt
        .query_map(
            (model::format_ts(start), model::format_ts(end)),
            detailed_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    if arrivals.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<&str> = arrivals.iter().map(|a| a.student_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    let counts = student_counts(conn, &ids, clock, window_days)?;

    Ok(arrivals
        .into_iter()
        .map(|arrival| {
            let (total, last30) = counts.get(&arrival.student_id).copied().unwrap_or((0, 0));
            TodayRow {
                arrival,
                total,
                last30,
            }
        })
        .collect())
}

fn student_counts(
    conn: &Connection,
    student_ids: &[&str],
    clock: &LocalClock,
    window_days: i64,
) -> ServiceResult<HashMap<String, (i64, i64)>> {
    let placeholders = vec!["?"; student_ids.len()].join(", ");
    let sql = format!(
        "SELECT student_id,
                COUNT(*),
                SUM(CASE WHEN reported_at >= ?1 THEN 1 ELSE 0 END)
         FROM late_arrivals
         WHERE student_id IN ({})
         GROUP BY student_id",
        placeholders
    );
    let mut bind = vec![Value::Text(model::format_ts(
        clock.rolling_start(window_days),
    ))];
    bind.extend(student_ids.iter().map(|id| Value::Text(id.to_string())));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), |r| {
            Ok((r.get::<_, String>(0)?, (r.get(1)?, r.get(2)?)))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentHistory {
    pub student: Student,
    pub arrivals: Vec<DetailedRow>,
}

pub fn student_history(
    conn: &Connection,
    viewer: &Viewer,
    student_id: &str,
) -> ServiceResult<StudentHistory> {
    viewer.require_school()?;
    let student = students::find(conn, student_id)?.ok_or(ServiceError::NotFound("student"))?;
    let sql = format!(
        "{} WHERE la.student_id = ? ORDER BY la.reported_at DESC, la.rowid DESC",
        DETAILED_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let arrivals = stmt
        .query_map([&student.id], detailed_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(StudentHistory { student, arrivals })
}
