use chrono::{TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use quartzite::scheduler::timing::{
    calc_next_run_time, next_run_time_max, parse_cron, NEXT_RUN_TIME_MAX,
};
use quartzite::{Job, JobKind, JobStatus, QuartziteError};

fn base_job(kind: JobKind) -> Job {
    Job {
        name: "timing".to_string(),
        kind,
        func_name: "test.noop".to_string(),
        ..Default::default()
    }
}

#[test]
fn test_sentinel_is_far_future_utc_seconds() {
    let max = next_run_time_max(chrono_tz::UTC);
    let expected = Utc.with_ymd_and_hms(9999, 9, 9, 9, 9, 9).unwrap();
    assert_eq!(max, expected);
    assert_eq!(max.nanosecond(), 0);
}

#[test]
fn test_sentinel_respects_timezone() {
    let shanghai = next_run_time_max("Asia/Shanghai".parse::<Tz>().unwrap());
    let utc = next_run_time_max(chrono_tz::UTC);
    // Shanghai is ahead of UTC, so its sentinel wall-clock maps earlier.
    assert!(shanghai < utc);
    assert_eq!(NEXT_RUN_TIME_MAX, "9999-09-09 09:09:09");
}

#[test]
fn test_paused_job_pins_to_sentinel() {
    let mut job = base_job(JobKind::Interval);
    job.interval = "1s".to_string();
    job.status = JobStatus::Paused;

    let next = calc_next_run_time(&job).unwrap();
    assert_eq!(next, next_run_time_max(chrono_tz::UTC));
}

#[test]
fn test_datetime_resolves_in_job_timezone() {
    let mut job = base_job(JobKind::Datetime);
    job.start_at = "2030-01-02 03:04:05".to_string();
    job.timezone = "America/New_York".to_string();

    let next = calc_next_run_time(&job).unwrap();
    let tz: Tz = "America/New_York".parse().unwrap();
    let expected = tz
        .with_ymd_and_hms(2030, 1, 2, 3, 4, 5)
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(next, expected);
}

#[test]
fn test_interval_is_now_plus_duration() {
    let mut job = base_job(JobKind::Interval);
    job.interval = "2s".to_string();

    let before = Utc::now();
    let next = calc_next_run_time(&job).unwrap();

    assert_eq!(next.nanosecond(), 0);
    // Second truncation can floor up to a second off the exact sum.
    assert!(next >= before + chrono::Duration::seconds(1));
    assert!(next <= before + chrono::Duration::seconds(3));
}

#[test]
fn test_interval_accepts_compound_durations() {
    let mut job = base_job(JobKind::Interval);
    job.interval = "1h30m".to_string();

    let before = Utc::now();
    let next = calc_next_run_time(&job).unwrap();
    assert!(next >= before + chrono::Duration::minutes(89));
    assert!(next <= before + chrono::Duration::minutes(91));
}

#[test]
fn test_cron_next_is_strictly_future() {
    let mut job = base_job(JobKind::Cron);
    job.cron_expr = "*/1 * * * *".to_string();

    let now = Utc::now();
    let next = calc_next_run_time(&job).unwrap();

    assert!(next > now);
    assert!(next <= now + chrono::Duration::seconds(61));
    assert_eq!(next.second(), 0);
}

#[test]
fn test_five_field_cron_is_normalized() {
    assert!(parse_cron("*/5 * * * *").is_ok());
    assert!(parse_cron("0 */5 * * * *").is_ok());
    assert!(parse_cron("not a cron").is_err());
}

#[test]
fn test_invalid_timezone_is_rejected() {
    let mut job = base_job(JobKind::Interval);
    job.interval = "1s".to_string();
    job.timezone = "Mars/Olympus".to_string();

    let err = calc_next_run_time(&job).unwrap_err();
    assert!(matches!(err, QuartziteError::InvalidSpec { field: "Timezone", .. }));
}

#[test]
fn test_invalid_interval_is_rejected() {
    let mut job = base_job(JobKind::Interval);
    job.interval = "soon".to_string();

    let err = calc_next_run_time(&job).unwrap_err();
    assert!(matches!(err, QuartziteError::InvalidSpec { field: "Interval", .. }));
}

#[test]
fn test_invalid_cron_is_rejected() {
    let mut job = base_job(JobKind::Cron);
    job.cron_expr = "61 * * * *".to_string();

    let err = calc_next_run_time(&job).unwrap_err();
    assert!(matches!(err, QuartziteError::InvalidSpec { field: "CronExpr", .. }));
}

#[test]
fn test_invalid_datetime_is_rejected() {
    let mut job = base_job(JobKind::Datetime);
    job.start_at = "tomorrow-ish".to_string();

    let err = calc_next_run_time(&job).unwrap_err();
    assert!(matches!(err, QuartziteError::InvalidSpec { field: "StartAt", .. }));
}
