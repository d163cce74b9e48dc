use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Stored timestamps only sort correctly while the year has four digits.
fn earliest_storable() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(0, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn latest_storable() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
        .map(|n| n.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn clamp_storable(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.clamp(earliest_storable(), latest_storable())
}

/// The current instant as seen from the school's timezone.
///
/// Reports take a `LocalClock` rather than reading the system time so that
/// window boundaries can be pinned in tests.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    pub now: DateTime<Utc>,
    pub tz: Tz,
}

impl LocalClock {
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        Self { now, tz }
    }

    pub fn system(tz: Tz) -> Self {
        Self::new(Utc::now(), tz)
    }

    pub fn today(&self) -> NaiveDate {
        self.now.with_timezone(&self.tz).date_naive()
    }

    /// First instant of `date` in the school timezone, as UTC.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        // Zones that jump over midnight for DST have no 00:00; take the first
        // hour that exists.
        for hour in 0..24 {
            let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            if let Some(local) = self.tz.from_local_datetime(&naive).earliest() {
                return local.with_timezone(&Utc);
            }
        }
        date.and_hms_opt(0, 0, 0)
            .map(|n| n.and_utc())
            .unwrap_or(self.now)
    }

    /// Half-open UTC range `[start, end)` covering local dates `from..=to`,
    /// clamped to the years the stored text form can represent.
    pub fn date_range(&self, from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = to
            .succ_opt()
            .map(|d| self.day_start(d))
            .unwrap_or_else(latest_storable);
        (clamp_storable(self.day_start(from)), clamp_storable(end))
    }

    /// Rolling window start: exactly `days` × 24h before now.
    pub fn rolling_start(&self, days: i64) -> DateTime<Utc> {
        Duration::try_days(days)
            .and_then(|d| self.now.checked_sub_signed(d))
            .map(clamp_storable)
            .unwrap_or_else(earliest_storable)
    }

    /// Local date `days` before today, floored at the earliest storable date.
    pub fn days_before_today(&self, days: i64) -> NaiveDate {
        let floor = earliest_storable().date_naive();
        Duration::try_days(days)
            .and_then(|d| self.today().checked_sub_signed(d))
            .map(|d| d.max(floor))
            .unwrap_or(floor)
    }

    pub fn local_display(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.tz)
            .format("%d/%m/%Y %H:%M")
            .to_string()
    }
}
