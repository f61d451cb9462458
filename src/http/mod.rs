use std::net::SocketAddr;
use std::str::FromStr;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{QuartziteError, Result};
use crate::job::{Job, JobStatus};
use crate::scheduler::Scheduler;

/// The scheduler operation surface over HTTP.
///
/// Every route answers 200 with the `{"data": …, "error": …}` envelope;
/// domain failures ride in the `error` field, not the status code.
pub struct HttpService {
    addr: SocketAddr,
    scheduler: Scheduler,
}

#[derive(Clone)]
struct AppState {
    scheduler: Scheduler,
}

impl HttpService {
    pub fn new(addr: SocketAddr, scheduler: Scheduler) -> Self {
        Self { addr, scheduler }
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/scheduler/job", post(add_job).put(update_job))
            .route("/scheduler/job/:id", get(get_job).delete(delete_job))
            .route("/scheduler/jobs", get(get_all_jobs).delete(delete_all_jobs))
            .route("/scheduler/job/:id/pause", post(pause_job))
            .route("/scheduler/job/:id/resume", post(resume_job))
            .route("/scheduler/job/run", post(run_job))
            .route("/scheduler/job/schedule", post(schedule_job))
            .route("/scheduler/start", post(start))
            .route("/scheduler/stop", post(stop))
            .route("/cluster/nodes", get(cluster_nodes))
            .route("/info", get(info))
            .route("/funcs", get(funcs))
            .layer(cors)
            .with_state(AppState {
                scheduler: self.scheduler,
            });

        tracing::info!(addr = %self.addr, "http service listening");

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| QuartziteError::Internal(format!("http service bind: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| QuartziteError::Internal(format!("http service: {e}")))?;

        Ok(())
    }
}

fn ok(data: impl Serialize) -> Json<Value> {
    Json(json!({ "data": data, "error": "" }))
}

fn fail(error: impl std::fmt::Display) -> Json<Value> {
    Json(json!({ "data": null, "error": error.to_string() }))
}

fn respond<T: Serialize>(result: Result<T>) -> Json<Value> {
    match result {
        Ok(data) => ok(data),
        Err(e) => fail(e),
    }
}

/// Mirror of the gRPC surface's main-node gate.
fn ensure_main(scheduler: &Scheduler) -> std::result::Result<(), String> {
    if let Some(node) = scheduler.cluster_node() {
        if !node.is_main_node() {
            return Err(format!(
                "not the main node, redirect to `{}`",
                node.endpoint_main
            ));
        }
    }
    Ok(())
}

async fn add_job(State(state): State<AppState>, Json(payload): Json<Value>) -> Json<Value> {
    if let Err(e) = ensure_main(&state.scheduler) {
        return fail(e);
    }
    match serde_json::from_value::<Job>(payload) {
        Ok(job) => respond(state.scheduler.add_job(job).await),
        Err(e) => fail(e),
    }
}

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    respond(state.scheduler.get_job(&id).await)
}

async fn get_all_jobs(State(state): State<AppState>) -> Json<Value> {
    respond(state.scheduler.get_all_jobs().await)
}

async fn update_job(State(state): State<AppState>, Json(mut payload): Json<Value>) -> Json<Value> {
    if let Err(e) = ensure_main(&state.scheduler) {
        return fail(e);
    }

    // An absent or unparseable status keeps the stored value.
    if let Some(body) = payload.as_object_mut() {
        let valid = body
            .get("status")
            .and_then(Value::as_str)
            .map(|s| JobStatus::from_str(s).is_ok())
            .unwrap_or(false);
        if !valid {
            let id = body
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match state.scheduler.get_job(&id).await {
                Ok(stored) => {
                    body.insert("status".to_string(), json!(stored.status));
                }
                Err(e) => return fail(e),
            }
        }
    }

    match serde_json::from_value::<Job>(payload) {
        Ok(job) => respond(state.scheduler.update_job(job).await),
        Err(e) => fail(e),
    }
}

async fn delete_job(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    if let Err(e) = ensure_main(&state.scheduler) {
        return fail(e);
    }
    respond(state.scheduler.delete_job(&id).await)
}

async fn delete_all_jobs(State(state): State<AppState>) -> Json<Value> {
    if let Err(e) = ensure_main(&state.scheduler) {
        return fail(e);
    }
    respond(state.scheduler.delete_all_jobs().await)
}

async fn pause_job(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    if let Err(e) = ensure_main(&state.scheduler) {
        return fail(e);
    }
    respond(state.scheduler.pause_job(&id).await)
}

async fn resume_job(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    if let Err(e) = ensure_main(&state.scheduler) {
        return fail(e);
    }
    respond(state.scheduler.resume_job(&id).await)
}

async fn run_job(State(state): State<AppState>, Json(payload): Json<Value>) -> Json<Value> {
    match serde_json::from_value::<Job>(payload) {
        Ok(job) => respond(state.scheduler.run_job(job).await),
        Err(e) => fail(e),
    }
}

async fn schedule_job(State(state): State<AppState>, Json(payload): Json<Value>) -> Json<Value> {
    if let Err(e) = ensure_main(&state.scheduler) {
        return fail(e);
    }
    match serde_json::from_value::<Job>(payload) {
        Ok(job) => respond(state.scheduler.schedule_job(job).await),
        Err(e) => fail(e),
    }
}

async fn start(State(state): State<AppState>) -> Json<Value> {
    if let Err(e) = ensure_main(&state.scheduler) {
        return fail(e);
    }
    state.scheduler.start().await;
    ok(Value::Null)
}

async fn stop(State(state): State<AppState>) -> Json<Value> {
    if let Err(e) = ensure_main(&state.scheduler) {
        return fail(e);
    }
    state.scheduler.stop().await;
    ok(Value::Null)
}

async fn cluster_nodes(State(state): State<AppState>) -> Json<Value> {
    match state.scheduler.cluster_node() {
        Some(node) => ok(node.peer_records().await),
        None => fail("cluster mode is not enabled"),
    }
}

async fn info(State(state): State<AppState>) -> Json<Value> {
    ok(state.scheduler.info().await)
}

async fn funcs(State(state): State<AppState>) -> Json<Value> {
    ok(state.scheduler.registry().readable())
}
