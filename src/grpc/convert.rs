use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tonic::Status;

use crate::cluster::NodeRecord;
use crate::job::{Job, JobKind, JobStatus, DEFAULT_TIMEOUT, DEFAULT_TIMEZONE};
use crate::proto;

fn seconds_to_utc(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub fn job_to_proto(job: &Job) -> proto::Job {
    proto::Job {
        id: job.id.clone(),
        name: job.name.clone(),
        kind: job.kind.to_string(),
        start_at: job.start_at.clone(),
        end_at: job.end_at.clone(),
        interval: job.interval.clone(),
        cron_expr: job.cron_expr.clone(),
        timezone: job.timezone.clone(),
        func_name: job.func_name.clone(),
        args_json: serde_json::to_string(&job.args).unwrap_or_else(|_| "{}".to_string()),
        timeout: job.timeout.clone(),
        queues: job.queues.clone(),
        last_run_time: job.last_run_time.timestamp(),
        next_run_time: job.next_run_time.timestamp(),
        status: job.status.to_string(),
    }
}

/// An empty timezone or timeout falls back to the defaults, and an
/// unknown status string falls back to `running`; the update handler
/// overrides that fallback with the stored status.
pub fn job_from_proto(p: proto::Job) -> Result<Job, Status> {
    let kind = JobKind::from_str(&p.kind)
        .map_err(|_| Status::invalid_argument(format!("job kind `{}` unknown", p.kind)))?;

    let args: HashMap<String, serde_json::Value> = if p.args_json.is_empty() {
        HashMap::new()
    } else {
        serde_json::from_str(&p.args_json)
            .map_err(|e| Status::invalid_argument(format!("job args invalid: {e}")))?
    };

    Ok(Job {
        id: p.id,
        name: p.name,
        kind,
        start_at: p.start_at,
        end_at: p.end_at,
        interval: p.interval,
        cron_expr: p.cron_expr,
        timezone: if p.timezone.is_empty() {
            DEFAULT_TIMEZONE.to_string()
        } else {
            p.timezone
        },
        func_name: p.func_name,
        args,
        timeout: if p.timeout.is_empty() {
            DEFAULT_TIMEOUT.to_string()
        } else {
            p.timeout
        },
        queues: p.queues,
        last_run_time: seconds_to_utc(p.last_run_time),
        next_run_time: seconds_to_utc(p.next_run_time),
        status: JobStatus::from_str(&p.status).unwrap_or(JobStatus::Running),
    })
}

pub fn node_to_proto(record: &NodeRecord) -> proto::NodeRecord {
    proto::NodeRecord {
        endpoint_main: record.endpoint_main.clone(),
        endpoint: record.endpoint.clone(),
        endpoint_grpc: record.endpoint_grpc.clone(),
        endpoint_http: record.endpoint_http.clone(),
        queue: record.queue.clone(),
        mode: record.mode.clone(),
        health: record.health,
        register_time: record.register_time.timestamp(),
        last_heartbeat_time: record.last_heartbeat_time.timestamp(),
    }
}

pub fn node_from_proto(p: proto::NodeRecord) -> NodeRecord {
    NodeRecord {
        endpoint_main: p.endpoint_main,
        endpoint: p.endpoint,
        endpoint_grpc: p.endpoint_grpc,
        endpoint_http: p.endpoint_http,
        queue: p.queue,
        mode: p.mode,
        health: p.health,
        register_time: seconds_to_utc(p.register_time),
        last_heartbeat_time: seconds_to_utc(p.last_heartbeat_time),
    }
}
