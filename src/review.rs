use crate::clock::LocalClock;
use crate::error::ServiceResult;
use crate::model;
use crate::policy::Viewer;
use rusqlite::Connection;
use tracing::info;

/// Marks every arrival reported today (school-local date) that nobody has
/// reviewed yet as reviewed by `reviewer`, now. Returns how many rows changed.
///
/// Already-reviewed rows are left alone, so concurrent callers only race on
/// attribution.
pub fn acknowledge_today(
    conn: &Connection,
    reviewer: &Viewer,
    clock: &LocalClock,
) -> ServiceResult<usize> {
    reviewer.require_school()?;
    let today = clock.today();
    let (start, end) = clock.date_range(today, today);
    let n = conn.execute(
        "UPDATE late_arrivals
         SET reviewed_by = ?, reviewed_at = ?
         WHERE reported_at >= ? AND reported_at < ? AND reviewed_by IS NULL",
        (
            &reviewer.id_number,
            model::format_ts(clock.now),
            model::format_ts(start),
            model::format_ts(end),
        ),
    )?;
    if n > 0 {
        info!(reviewer = %reviewer.id_number, count = n, %today, "arrivals acknowledged");
    }
    Ok(n)
}
