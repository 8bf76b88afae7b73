//! Dispatch Orchestrator (C7): a bounded worker pool that fans
//! `(agent, action, kwargs)` requests out to the Engine Facade or to
//! external collaborators, and aggregates structured results.
//!
//! `dispatch`/`multi_dispatch`/`discover` and the `DispatchResult`/
//! `MultiDispatchResult` field names are grounded on
//! `original_source/agents/sauron/orchestrator.py`'s `SauronOrchestrator`.
//! The lazily-(re)built worker pool reuses the pattern in
//! `qvnt::threads::global_install` (rebuild only when the requested worker
//! count changes), scoped to this instance rather than a process-wide
//! global, per the no-hidden-globals configuration rule.

pub mod router;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::error::Error;
use crate::facade::EngineFacade;

pub const MAX_WORKERS: usize = 3;
const SYNTHESIS_AGENT_NAME: &str = "synthesis";
const TRUE_SYNTHESIS_AGENT_NAME: &str = "true_synthesis";

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub max_workers: usize,
    pub max_execution_time: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_workers: MAX_WORKERS, max_execution_time: Duration::from_secs(5) }
    }
}

/// Capability set for an external agent reached by name other than the two
/// reserved engine agent names.
pub trait Collaborator: Send + Sync {
    fn execute(&self, action: &str, kwargs: &Value) -> crate::error::Result<Value>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub available: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchResult {
    pub agent: String,
    pub action: String,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub execution_time_ms: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultiDispatchResult {
    pub results: Vec<DispatchResult>,
    pub total_time_ms: f64,
    pub success_count: usize,
    pub failure_count: usize,
    pub all_success: bool,
}

struct Pool {
    size: usize,
    pool: ThreadPool,
}

/// `(agent, action, kwargs)` entry-point. The Statevector Engine is not
/// reentrant-safe, so every `"synthesis"`/`"true_synthesis"` dispatch is
/// serialized through `coordinator`; external collaborators may run
/// concurrently with each other and with at most one engine action.
pub struct DispatchOrchestrator {
    config: OrchestratorConfig,
    coordinator: Mutex<EngineFacade>,
    registry: HashMap<String, Box<dyn Collaborator>>,
    pool: RwLock<Option<Pool>>,
}

impl DispatchOrchestrator {
    pub fn new(config: OrchestratorConfig, facade: EngineFacade) -> Self {
        Self {
            config,
            coordinator: Mutex::new(facade),
            registry: HashMap::new(),
            pool: RwLock::new(None),
        }
    }

    pub fn register_collaborator(&mut self, name: impl Into<String>, agent: Box<dyn Collaborator>) {
        self.registry.insert(name.into(), agent);
    }

    fn with_pool<R: Send>(&self, workers: usize, op: impl FnOnce() -> R + Send) -> R {
        let workers = workers.min(self.config.max_workers).max(1);
        {
            let guard = self.pool.read();
            if let Some(p) = guard.as_ref() {
                if p.size == workers {
                    return p.pool.install(op);
                }
            }
        }
        let mut guard = self.pool.write();
        if guard.as_ref().map(|p| p.size) != Some(workers) {
            let pool = ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .expect("failed to build worker pool");
            *guard = Some(Pool { size: workers, pool });
        }
        guard.as_ref().unwrap().pool.install(op)
    }

    /// Enumerates the fixed engine agents plus whatever the external
    /// registry holds. Pure introspection, no dispatch side effects.
    pub fn discover(&self) -> Vec<AgentInfo> {
        let mut agents = vec![
            AgentInfo { name: SYNTHESIS_AGENT_NAME.to_string(), available: true },
            AgentInfo { name: TRUE_SYNTHESIS_AGENT_NAME.to_string(), available: true },
        ];
        agents.extend(
            self.registry
                .keys()
                .map(|name| AgentInfo { name: name.clone(), available: true }),
        );
        agents
    }

    fn dispatch_inner(&self, agent: &str, action: &str, kwargs: &Value) -> crate::error::Result<Value> {
        match agent {
            SYNTHESIS_AGENT_NAME | TRUE_SYNTHESIS_AGENT_NAME => {
                let mut facade = self.coordinator.lock();
                router::route(agent, action, kwargs, &mut facade)
            }
            other => {
                let collaborator = self.registry.get(other).ok_or_else(|| {
                    Error::NotFound(format!(
                        "unknown agent '{other}'; known agents are '{SYNTHESIS_AGENT_NAME}', \
                         '{TRUE_SYNTHESIS_AGENT_NAME}', {:?}",
                        self.registry.keys().collect::<Vec<_>>()
                    ))
                })?;
                collaborator.execute(action, kwargs)
            }
        }
    }

    /// Executes one `(agent, action, kwargs)` call. Never raises: every
    /// failure, including a caught panic, becomes `DispatchResult{success:
    /// false}`.
    pub fn dispatch(&self, agent: &str, action: &str, kwargs: Value) -> DispatchResult {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.dispatch_inner(agent, action, &kwargs)));
        let execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(Ok(data)) => DispatchResult {
                agent: agent.to_string(),
                action: action.to_string(),
                success: true,
                data: Some(data),
                error: None,
                execution_time_ms,
            },
            Ok(Err(e)) => {
                warn!(agent, action, error = %e, "dispatch failed");
                DispatchResult {
                    agent: agent.to_string(),
                    action: action.to_string(),
                    success: false,
                    data: None,
                    error: Some(e.to_string()),
                    execution_time_ms,
                }
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(agent, action, message, "dispatch panicked");
                DispatchResult {
                    agent: agent.to_string(),
                    action: action.to_string(),
                    success: false,
                    data: None,
                    error: Some(format!("internal error: {message}")),
                    execution_time_ms,
                }
            }
        }
    }

    /// Runs `calls` and aggregates once all of them finish, with `results`
    /// restored to original submission order. Calls targeting the same
    /// engine agent (`"synthesis"`/`"true_synthesis"`) are always serialized
    /// through `coordinator`, so they are dispatched here one at a time, in
    /// submission order, rather than handed to the pool: rayon's
    /// `collect()` only guarantees the *output* vector matches input order,
    /// not that work-stealing acquires `coordinator.lock()` in that order.
    /// Only calls to external collaborators, which share no lock, are fanned
    /// out across the bounded pool.
    pub fn multi_dispatch(&self, calls: Vec<(String, String, Value)>) -> MultiDispatchResult {
        if calls.is_empty() {
            return MultiDispatchResult {
                results: Vec::new(),
                total_time_ms: 0.0,
                success_count: 0,
                failure_count: 0,
                all_success: true,
            };
        }
        let start = Instant::now();

        let mut slots: Vec<Option<DispatchResult>> = calls.iter().map(|_| None).collect();
        let mut engine_calls = Vec::new();
        let mut collaborator_calls = Vec::new();
        for (i, (agent, action, kwargs)) in calls.into_iter().enumerate() {
            if agent == SYNTHESIS_AGENT_NAME || agent == TRUE_SYNTHESIS_AGENT_NAME {
                engine_calls.push((i, agent, action, kwargs));
            } else {
                collaborator_calls.push((i, agent, action, kwargs));
            }
        }

        for (i, agent, action, kwargs) in engine_calls {
            slots[i] = Some(self.dispatch(&agent, &action, kwargs));
        }

        if !collaborator_calls.is_empty() {
            let workers = collaborator_calls.len();
            let done: Vec<(usize, DispatchResult)> = self.with_pool(workers, || {
                use rayon::prelude::*;
                collaborator_calls
                    .into_par_iter()
                    .map(|(i, agent, action, kwargs)| (i, self.dispatch(&agent, &action, kwargs)))
                    .collect()
            });
            for (i, result) in done {
                slots[i] = Some(result);
            }
        }

        let results: Vec<DispatchResult> =
            slots.into_iter().map(|slot| slot.expect("every call index filled")).collect();
        let total_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        let success_count = results.iter().filter(|r| r.success).count();
        let failure_count = results.len() - success_count;
        MultiDispatchResult {
            all_success: failure_count == 0,
            success_count,
            failure_count,
            total_time_ms,
            results,
        }
    }
}
