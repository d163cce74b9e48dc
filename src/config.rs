use anyhow::{anyhow, Context};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_TIMEZONE: &str = "America/Argentina/Buenos_Aires";
pub const DEFAULT_REPORT_WINDOW_DAYS: i64 = 30;
pub const MAX_REPORT_WINDOW_DAYS: i64 = 36_500;

#[derive(Debug, Clone)]
pub struct Config {
    pub timezone: Tz,
    pub workspace: Option<PathBuf>,
    pub log_json: bool,
    pub report_window_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let tz_name = get("TARDYD_TIMEZONE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = tz_name
            .trim()
            .parse()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("invalid TARDYD_TIMEZONE {tz_name:?}"))?;

        let workspace = get("TARDYD_WORKSPACE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let log_json = parse_bool(get("TARDYD_LOG_JSON").as_deref(), false);

        let report_window_days = match get("TARDYD_REPORT_WINDOW_DAYS") {
            Some(v) if !v.trim().is_empty() => {
                let days: i64 = v
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid TARDYD_REPORT_WINDOW_DAYS {v:?}"))?;
                if !(1..=MAX_REPORT_WINDOW_DAYS).contains(&days) {
                    return Err(anyhow!(
                        "TARDYD_REPORT_WINDOW_DAYS must be between 1 and {MAX_REPORT_WINDOW_DAYS}"
                    ));
                }
                days
            }
            _ => DEFAULT_REPORT_WINDOW_DAYS,
        };

        Ok(Self {
            timezone,
            workspace,
            log_json,
            report_window_days,
        })
    }
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    raw.and_then(|v| match v.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    })
    .unwrap_or(default)
}
