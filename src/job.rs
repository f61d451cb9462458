use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QuartziteError, Result};

/// Wall-clock format for `start_at` / `end_at`, interpreted in the job's timezone.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_TIMEOUT: &str = "1h";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Datetime,
    Interval,
    Cron,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Datetime => write!(f, "datetime"),
            JobKind::Interval => write!(f, "interval"),
            JobKind::Cron => write!(f, "cron"),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "datetime" => Ok(JobKind::Datetime),
            "interval" => Ok(JobKind::Interval),
            "cron" => Ok(JobKind::Cron),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Paused,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "running" => Ok(JobStatus::Running),
            "paused" => Ok(JobStatus::Paused),
            _ => Err(()),
        }
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_timeout() -> String {
    DEFAULT_TIMEOUT.to_string()
}

fn default_status() -> JobStatus {
    JobStatus::Running
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Assigned on add; uuid v4 without dashes.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: JobKind,
    /// Required iff `kind = Datetime`; local to `timezone`.
    #[serde(default)]
    pub start_at: String,
    /// Optional hard stop, same format as `start_at`. Unused by Datetime.
    #[serde(default)]
    pub end_at: String,
    /// Required iff `kind = Interval`; duration string like "2s" or "1h30m".
    #[serde(default)]
    pub interval: String,
    /// Required iff `kind = Cron`; standard 5-field cron expression.
    #[serde(default)]
    pub cron_expr: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub func_name: String,
    #[serde(default)]
    pub args: HashMap<String, serde_json::Value>,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Cluster dispatch filter; empty means any queue.
    #[serde(default)]
    pub queues: Vec<String>,
    #[serde(default = "epoch")]
    pub last_run_time: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub next_run_time: DateTime<Utc>,
    #[serde(default = "default_status")]
    pub status: JobStatus,
}

impl Default for Job {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            kind: JobKind::Interval,
            start_at: String::new(),
            end_at: String::new(),
            interval: String::new(),
            cron_expr: String::new(),
            timezone: default_timezone(),
            func_name: String::new(),
            args: HashMap::new(),
            timeout: default_timeout(),
            queues: Vec::new(),
            last_run_time: epoch(),
            next_run_time: epoch(),
            status: JobStatus::Running,
        }
    }
}

impl Job {
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Label used in logs and error messages.
    pub fn full_name(&self) -> String {
        format!("{}_{}", self.name, self.id)
    }

    /// Fill in the defaults `add_job` guarantees.
    pub fn apply_defaults(&mut self) {
        if self.timezone.is_empty() {
            self.timezone = default_timezone();
        }
        if self.timeout.is_empty() {
            self.timeout = default_timeout();
        }
        self.status = JobStatus::Running;
    }

    pub fn parse_timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| self.invalid("Timezone", &self.timezone, e.to_string()))
    }

    /// Validate the timing fields against the declared kind: the field the
    /// kind requires must parse, and the timezone must name a real IANA
    /// zone.
    pub fn check(&self) -> Result<()> {
        self.parse_timezone()?;

        match self.kind {
            JobKind::Datetime => {
                NaiveDateTime::parse_from_str(&self.start_at, DATETIME_FORMAT)
                    .map_err(|e| self.invalid("StartAt", &self.start_at, e.to_string()))?;
            }
            JobKind::Interval => {
                parse_duration(&self.interval)
                    .map_err(|e| self.invalid("Interval", &self.interval, e))?;
            }
            JobKind::Cron => {
                crate::scheduler::timing::parse_cron(&self.cron_expr)
                    .map_err(|e| self.invalid("CronExpr", &self.cron_expr, e))?;
            }
        }

        if !self.end_at.is_empty() {
            NaiveDateTime::parse_from_str(&self.end_at, DATETIME_FORMAT)
                .map_err(|e| self.invalid("EndAt", &self.end_at, e.to_string()))?;
        }

        parse_duration(&self.timeout).map_err(|e| QuartziteError::JobTimeout {
            job: self.full_name(),
            timeout: self.timeout.clone(),
            detail: e,
        })?;

        Ok(())
    }

    fn invalid(&self, field: &'static str, value: &str, detail: String) -> QuartziteError {
        QuartziteError::InvalidSpec {
            job: self.full_name(),
            field,
            value: value.to_string(),
            detail,
        }
    }
}

/// Parse a duration string like "2s", "100ms" or "1h30m".
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| e.to_string())
}
