//! Action Router (C8): maps `(agent, action, kwargs)` to Engine Facade
//! methods, validating and defaulting keyword arguments.
//!
//! The action vocabulary and per-action defaults are grounded on
//! `original_source/agents/sauron/orchestrator.py`'s `_dispatch_synthesis`
//! / `_dispatch_true_synthesis` `if action == ...` ladders, translated to a
//! Rust `match` over `&str` with typed kwarg extraction instead of a Python
//! dict.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::facade::EngineFacade;

fn kwarg_u64(kwargs: &Value, key: &str, default: u64) -> Result<u64> {
    match kwargs.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .ok_or_else(|| Error::InvalidArgument(format!("'{key}' must be a non-negative integer"))),
    }
}

fn kwarg_usize(kwargs: &Value, key: &str, default: usize) -> Result<usize> {
    Ok(kwarg_u64(kwargs, key, default as u64)? as usize)
}

fn kwarg_bool(kwargs: &Value, key: &str, default: bool) -> Result<bool> {
    match kwargs.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| Error::InvalidArgument(format!("'{key}' must be a boolean"))),
    }
}

fn kwarg_str<'a>(kwargs: &'a Value, key: &str, default: &'a str) -> Result<&'a str> {
    match kwargs.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_str()
            .ok_or_else(|| Error::InvalidArgument(format!("'{key}' must be a string"))),
    }
}

fn kwarg_required_str<'a>(kwargs: &'a Value, key: &str) -> Result<&'a str> {
    kwargs
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidArgument(format!("'{key}' is required")))
}

const SYNTHESIS_ACTIONS: &[&str] = &["status", "reset", "compute", "get_state", "schrodinger"];
const TRUE_SYNTHESIS_ACTIONS: &[&str] = &[
    "status",
    "storage",
    "list_states",
    "save_state",
    "load_state",
    "delete_state",
    "initialize",
    "measure",
    "state_info",
    "bell_state",
    "ghz_state",
    "schrodinger",
];

pub fn route(agent: &str, action: &str, kwargs: &Value, facade: &mut EngineFacade) -> Result<Value> {
    match agent {
        "synthesis" => route_synthesis(action, kwargs, facade),
        "true_synthesis" => route_true_synthesis(action, kwargs, facade),
        other => Err(Error::InvalidArgument(format!("'{other}' is not a recognized engine agent"))),
    }
}

fn route_synthesis(action: &str, kwargs: &Value, facade: &mut EngineFacade) -> Result<Value> {
    match action {
        "status" => Ok(serde_json::to_value(facade.status()).unwrap()),
        "reset" => {
            let num_qubits = kwarg_usize(kwargs, "num_qubits", 1)?;
            let n = facade.reset(num_qubits)?;
            Ok(json!({ "num_qubits": n }))
        }
        "compute" => {
            let shots = kwarg_u64(kwargs, "shots", 1024)?;
            let result = facade.compute(shots)?;
            Ok(serde_json::to_value(result).unwrap())
        }
        "get_state" => match facade.get_state() {
            Some(payload) => Ok(serde_json::to_value(payload).unwrap()),
            None => Ok(json!({ "state": null })),
        },
        "schrodinger" => Ok(serde_json::to_value(EngineFacade::schrodinger_capability()).unwrap()),
        other => Err(Error::InvalidArgument(format!(
            "unknown synthesis action '{other}'; valid actions are {SYNTHESIS_ACTIONS:?}"
        ))),
    }
}

fn route_true_synthesis(action: &str, kwargs: &Value, facade: &mut EngineFacade) -> Result<Value> {
    match action {
        "status" => Ok(serde_json::to_value(facade.true_status()?).unwrap()),
        "storage" => Ok(serde_json::to_value(facade.storage()?).unwrap()),
        "list_states" => Ok(serde_json::to_value(facade.list_states()?).unwrap()),
        "save_state" => {
            let name = kwarg_required_str(kwargs, "name")?;
            Ok(serde_json::to_value(facade.save_state(name)?).unwrap())
        }
        "load_state" => {
            let name = kwarg_required_str(kwargs, "name")?;
            Ok(serde_json::to_value(facade.load_state(name)?).unwrap())
        }
        "delete_state" => {
            let name = kwarg_required_str(kwargs, "name")?;
            Ok(serde_json::to_value(facade.delete_state(name)?).unwrap())
        }
        "initialize" => {
            let n_qubits = kwarg_usize(kwargs, "n_qubits", 2)?;
            let initial_state = kwarg_str(kwargs, "initial_state", "zero")?;
            Ok(serde_json::to_value(facade.initialize(n_qubits, initial_state)?).unwrap())
        }
        "measure" => {
            let shots = kwarg_u64(kwargs, "shots", 1024)?;
            let collapse = kwarg_bool(kwargs, "collapse", true)?;
            Ok(serde_json::to_value(facade.measure(shots, collapse)?).unwrap())
        }
        "state_info" => Ok(serde_json::to_value(facade.state_info()?).unwrap()),
        "bell_state" => {
            let pair_type = kwarg_str(kwargs, "pair_type", "phi_plus")?;
            Ok(serde_json::to_value(facade.bell_state(pair_type)?).unwrap())
        }
        "ghz_state" => {
            let n_qubits = kwarg_usize(kwargs, "n_qubits", 3)?;
            Ok(serde_json::to_value(facade.ghz_state(n_qubits)?).unwrap())
        }
        "schrodinger" => Ok(serde_json::to_value(EngineFacade::true_schrodinger_capability()).unwrap()),
        other => Err(Error::InvalidArgument(format!(
            "unknown true_synthesis action '{other}'; valid actions are {TRUE_SYNTHESIS_ACTIONS:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::store::StoreConfig;
    use tempfile::tempdir;

    fn facade(dir: &std::path::Path) -> EngineFacade {
        EngineFacade::new(
            EngineConfig::default(),
            StoreConfig {
                root_path: dir.to_path_buf(),
                allocated_bytes: 1024 * 1024 * 1024,
                max_qubits: 18,
                max_time_steps: 10_000,
            },
        )
        .unwrap()
    }

    #[test]
    fn unknown_action_is_invalid_argument() {
        let dir = tempdir().unwrap();
        let mut f = facade(dir.path());
        let err = route("synthesis", "nonexistent", &json!({}), &mut f).unwrap_err();
        assert_eq!(err.tag(), "InvalidArgument");
    }

    #[test]
    fn unknown_agent_is_invalid_argument() {
        let dir = tempdir().unwrap();
        let mut f = facade(dir.path());
        let err = route("rogue", "status", &json!({}), &mut f).unwrap_err();
        assert_eq!(err.tag(), "InvalidArgument");
    }

    #[test]
    fn save_state_requires_name() {
        let dir = tempdir().unwrap();
        let mut f = facade(dir.path());
        f.reset(1).unwrap();
        let err = route("true_synthesis", "save_state", &json!({}), &mut f).unwrap_err();
        assert_eq!(err.tag(), "InvalidArgument");
    }

    #[test]
    fn reset_then_status_round_trip() {
        let dir = tempdir().unwrap();
        let mut f = facade(dir.path());
        route("synthesis", "reset", &json!({"num_qubits": 3}), &mut f).unwrap();
        let status = route("synthesis", "status", &json!({}), &mut f).unwrap();
        assert_eq!(status["num_qubits"], 3);
    }
}
