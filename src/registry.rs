use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::job::Job;

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A registered job function. The token is cancelled when the job's
/// timeout elapses; the function must observe it, there is no forced kill.
pub type JobHandler = Arc<dyn Fn(CancellationToken, Job) -> JobFuture + Send + Sync>;

#[derive(Clone)]
struct FuncEntry {
    info: String,
    handler: JobHandler,
}

/// Introspection view of a registry entry, exposed on `/funcs`.
#[derive(Debug, Clone, Serialize)]
pub struct FuncMeta {
    pub name: String,
    pub info: String,
}

/// Process-wide mapping from stable function name to its handler.
///
/// Registration is append-only and idempotent on name. Jobs reference
/// functions by name only, so every process in a cluster must register the
/// same names before the scheduler starts.
#[derive(Clone, Default)]
pub struct FuncRegistry {
    funcs: Arc<RwLock<HashMap<String, FuncEntry>>>,
}

impl FuncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: &str, info: &str, handler: F)
    where
        F: Fn(CancellationToken, Job) -> JobFuture + Send + Sync + 'static,
    {
        let mut funcs = self.funcs.write().expect("func registry lock poisoned");
        funcs.insert(
            name.to_string(),
            FuncEntry {
                info: info.to_string(),
                handler: Arc::new(handler),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<JobHandler> {
        let funcs = self.funcs.read().expect("func registry lock poisoned");
        funcs.get(name).map(|e| e.handler.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        let funcs = self.funcs.read().expect("func registry lock poisoned");
        funcs.contains_key(name)
    }

    /// Readable listing for introspection, sorted by name.
    pub fn readable(&self) -> Vec<FuncMeta> {
        let funcs = self.funcs.read().expect("func registry lock poisoned");
        let mut metas: Vec<FuncMeta> = funcs
            .iter()
            .map(|(name, e)| FuncMeta {
                name: name.clone(),
                info: e.info.clone(),
            })
            .collect();
        metas.sort_by(|a, b| a.name.cmp(&b.name));
        metas
    }
}
