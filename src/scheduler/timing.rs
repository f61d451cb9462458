use std::str::FromStr;

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::{QuartziteError, Result};
use crate::job::{self, Job, JobKind, JobStatus, DATETIME_FORMAT};

/// Sentinel wall-clock marking "no next fire". Interpreted in the job's
/// timezone; also the empty-store default for `get_next_run_time`. The
/// literal is part of the protocol and must match across nodes sharing
/// a store.
pub const NEXT_RUN_TIME_MAX: &str = "9999-09-09 09:09:09";

/// The sentinel in the given timezone, as second-precision UTC.
pub fn next_run_time_max(tz: Tz) -> DateTime<Utc> {
    // The literal always parses and exists in every zone.
    let naive = NaiveDateTime::parse_from_str(NEXT_RUN_TIME_MAX, DATETIME_FORMAT)
        .unwrap_or(NaiveDateTime::MAX);
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => tz.from_utc_datetime(&naive),
    };
    truncate_to_second(local.with_timezone(&Utc))
}

pub fn next_run_time_max_utc() -> DateTime<Utc> {
    next_run_time_max(chrono_tz::UTC)
}

/// Drop sub-second precision. The whole design rounds to seconds so that
/// timestamps round-trip identically through any store backend.
pub fn truncate_to_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}

/// Parse a cron expression. Standard 5-field expressions are accepted by
/// prepending a zero seconds field; 6/7-field expressions pass through.
pub fn parse_cron(expr: &str) -> std::result::Result<Schedule, String> {
    let fields = expr.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| e.to_string())
}

/// Derive the job's next fire instant.
///
/// Paused jobs pin to the far-future sentinel so the store's scalar
/// min-next-run-time query needs no separate is-paused index. The result
/// is always second-truncated UTC.
pub fn calc_next_run_time(job: &Job) -> Result<DateTime<Utc>> {
    let tz = job.parse_timezone()?;

    if job.status == JobStatus::Paused {
        return Ok(next_run_time_max(tz));
    }

    let next = match job.kind {
        JobKind::Datetime => {
            let naive = NaiveDateTime::parse_from_str(&job.start_at, DATETIME_FORMAT)
                .map_err(|e| invalid(job, "StartAt", &job.start_at, e.to_string()))?;
            match tz.from_local_datetime(&naive) {
                LocalResult::Single(dt) => dt.with_timezone(&Utc),
                LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                LocalResult::None => {
                    return Err(invalid(
                        job,
                        "StartAt",
                        &job.start_at,
                        "does not exist in timezone".to_string(),
                    ))
                }
            }
        }
        JobKind::Interval => {
            let interval = job::parse_duration(&job.interval)
                .map_err(|e| invalid(job, "Interval", &job.interval, e))?;
            let interval = chrono::Duration::from_std(interval)
                .map_err(|e| invalid(job, "Interval", &job.interval, e.to_string()))?;
            Utc::now() + interval
        }
        JobKind::Cron => {
            let schedule = parse_cron(&job.cron_expr)
                .map_err(|e| invalid(job, "CronExpr", &job.cron_expr, e))?;
            let now = Utc::now().with_timezone(&tz);
            schedule
                .after(&now)
                .next()
                .ok_or_else(|| {
                    invalid(
                        job,
                        "CronExpr",
                        &job.cron_expr,
                        "no upcoming occurrence".to_string(),
                    )
                })?
                .with_timezone(&Utc)
        }
    };

    Ok(truncate_to_second(next))
}

fn invalid(job: &Job, field: &'static str, value: &str, detail: String) -> QuartziteError {
    QuartziteError::InvalidSpec {
        job: job.full_name(),
        field,
        value: value.to_string(),
        detail,
    }
}
