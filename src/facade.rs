//! Engine Facade (C6): a data-only API over the Statevector Engine, the
//! time-evolution solver, and the State Store. The sole legal entry point
//! for the Dispatch Orchestrator.
//!
//! Method names and default keyword arguments are grounded on
//! `original_source/agents/sauron/orchestrator.py`'s
//! `_dispatch_synthesis`/`_dispatch_true_synthesis` action ladders.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bits::bitstring;
use crate::engine::{ComputeResult, EngineConfig, StatevectorEngine};
use crate::error::{Error, Result};
use crate::gates;
use crate::math::C;
use crate::store::{NamedStateRecord, StateStore, StorageSnapshot, StoreConfig};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineStatus {
    pub num_qubits: usize,
    pub gate_count: usize,
    pub max_qubits: usize,
    pub result_history_len: usize,
    pub auto_visualize: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateVectorPayload {
    pub real: Vec<f64>,
    pub imag: Vec<f64>,
    pub num_qubits: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub available: bool,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrueSynthesisStatus {
    pub num_qubits: usize,
    pub max_qubits: usize,
    pub storage: StorageSnapshot,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListStatesPayload {
    pub states: Vec<NamedStateRecord>,
    pub storage_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveStatePayload {
    pub saved: bool,
    pub name: String,
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoadStatePayload {
    pub loaded: bool,
    pub name: String,
    pub n_qubits: u8,
    pub dimension: usize,
    pub memory_bytes: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteStatePayload {
    pub deleted: bool,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializePayload {
    pub initialized: bool,
    pub n_qubits: usize,
    pub initial_state: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeasurePayload {
    pub counts: HashMap<String, u64>,
    pub shots: u64,
    pub most_likely: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateInfoPayload {
    pub amplitudes: HashMap<String, (f64, f64)>,
    pub probabilities: HashMap<String, f64>,
}

/// `zero | one | plus | minus`, or a literal bitstring of length `n_qubits`
/// read in the crate's big-endian-over-qubit convention. Unrecognized
/// values default to `zero`, matching `quantum_compute.py::initialize`'s
/// fallthrough.
fn parse_initial_state(spec: &str, n: usize) -> Vec<C> {
    let dim = 1usize << n;
    let mut amplitudes = vec![C::new(0.0, 0.0); dim];
    if spec.len() == n && spec.chars().all(|c| c == '0' || c == '1') {
        let mut index = 0usize;
        for (pos, ch) in spec.chars().enumerate() {
            let qubit = n - 1 - pos;
            if ch == '1' {
                index |= 1 << qubit;
            }
        }
        amplitudes[index] = C::new(1.0, 0.0);
        return amplitudes;
    }
    match spec {
        "one" => amplitudes[dim - 1] = C::new(1.0, 0.0),
        "plus" => {
            let amp = 1.0 / (dim as f64).sqrt();
            for a in amplitudes.iter_mut() {
                *a = C::new(amp, 0.0);
            }
        }
        "minus" => {
            let amp = 1.0 / (dim as f64 / 2.0).sqrt();
            for (i, a) in amplitudes.iter_mut().enumerate() {
                *a = C::new(if i % 2 == 0 { amp } else { -amp }, 0.0);
            }
        }
        _ => amplitudes[0] = C::new(1.0, 0.0),
    }
    amplitudes
}

pub struct EngineFacade {
    engine: StatevectorEngine,
    store: StateStore,
}

impl EngineFacade {
    pub fn new(engine_config: EngineConfig, store_config: StoreConfig) -> Result<Self> {
        Ok(Self {
            engine: StatevectorEngine::new(engine_config),
            store: StateStore::new(store_config)?,
        })
    }

    // -- "synthesis" action group --------------------------------------

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            num_qubits: self.engine.n_qubits(),
            gate_count: self.engine.gate_count(),
            max_qubits: self.engine.max_qubits(),
            result_history_len: self.engine.result_history_len(),
            auto_visualize: false,
        }
    }

    pub fn reset(&mut self, num_qubits: usize) -> Result<usize> {
        self.engine.reset(num_qubits)?;
        debug!(num_qubits, "facade reset engine");
        Ok(num_qubits)
    }

    pub fn compute(&mut self, shots: u64) -> Result<ComputeResult> {
        debug!(shots, "facade dispatching compute");
        self.engine.compute("statevector", shots, false)
    }

    pub fn get_state(&self) -> Option<StateVectorPayload> {
        let state = self.engine.state()?;
        Some(StateVectorPayload {
            real: state.iter().map(|z| z.re).collect(),
            imag: state.iter().map(|z| z.im).collect(),
            num_qubits: self.engine.n_qubits(),
        })
    }

    pub fn schrodinger_capability() -> CapabilityDescriptor {
        CapabilityDescriptor {
            available: true,
            description: "Schrodinger equation solver (evolve_schrodinger). Requires a \
                Hamiltonian matrix."
                .to_string(),
        }
    }

    // -- "true_synthesis" action group ----------------------------------

    pub fn true_status(&self) -> Result<TrueSynthesisStatus> {
        Ok(TrueSynthesisStatus {
            num_qubits: self.engine.n_qubits(),
            max_qubits: self.engine.max_qubits(),
            storage: self.store.storage()?,
        })
    }

    pub fn storage(&self) -> Result<StorageSnapshot> {
        self.store.storage()
    }

    pub fn list_states(&self) -> Result<ListStatesPayload> {
        Ok(ListStatesPayload {
            states: self.store.list_states()?,
            storage_path: self.store.root_path().join("states").display().to_string(),
        })
    }

    pub fn save_state(&mut self, name: &str) -> Result<SaveStatePayload> {
        let state = self
            .engine
            .state()
            .ok_or_else(|| Error::InvalidState("no active state to save".into()))?;
        let path = self.store.save_state(name, state, None)?;
        debug!(name, path = %path.display(), "facade saved state");
        Ok(SaveStatePayload {
            saved: true,
            name: name.to_string(),
            path: path.display().to_string(),
        })
    }

    pub fn load_state(&mut self, name: &str) -> Result<LoadStatePayload> {
        let (n_qubits, amplitudes) = self.store.load_state(name)?;
        if n_qubits as usize > self.engine.max_qubits() {
            return Err(Error::Capacity(format!(
                "stored state has {n_qubits} qubits, engine max is {}",
                self.engine.max_qubits()
            )));
        }
        let dimension = amplitudes.len();
        let memory_bytes = dimension * 16;
        self.engine.set_state(amplitudes)?;
        debug!(name, n_qubits, "facade loaded state");
        Ok(LoadStatePayload {
            loaded: true,
            name: name.to_string(),
            n_qubits,
            dimension,
            memory_bytes,
        })
    }

    pub fn delete_state(&mut self, name: &str) -> Result<DeleteStatePayload> {
        let deleted = self.store.delete_state(name)?;
        debug!(name, deleted, "facade deleted state");
        Ok(DeleteStatePayload { deleted, name: name.to_string() })
    }

    pub fn initialize(&mut self, n_qubits: usize, initial_state: &str) -> Result<InitializePayload> {
        if n_qubits == 0 || n_qubits > self.engine.max_qubits() {
            return Err(Error::Capacity(format!(
                "n_qubits={n_qubits} exceeds max_qubits={}",
                self.engine.max_qubits()
            )));
        }
        let amplitudes = parse_initial_state(initial_state, n_qubits);
        self.engine.set_state(amplitudes)?;
        debug!(n_qubits, initial_state, "facade initialized state");
        Ok(InitializePayload {
            initialized: true,
            n_qubits,
            initial_state: initial_state.to_string(),
        })
    }

    pub fn measure(&mut self, shots: u64, collapse: bool) -> Result<MeasurePayload> {
        let counts = if collapse {
            // A real (collapsing) measurement of every qubit; the outcome is
            // then fixed, so `shots` identical samples of the collapsed
            // state are reported.
            let n = self.engine.n_qubits();
            let mut bits = vec![0u8; n];
            for (q, b) in bits.iter_mut().enumerate() {
                *b = self.engine.measure_single(q)?;
            }
            let index: usize = bits.iter().enumerate().map(|(q, &b)| (b as usize) << q).sum();
            let mut counts = HashMap::new();
            counts.insert(bitstring(index, n), shots.max(1));
            counts
        } else {
            self.engine.measure_all(shots)?
        };
        let most_likely = counts.iter().max_by_key(|(_, &c)| c).map(|(k, _)| k.clone());
        debug!(shots, collapse, "facade measured state");
        Ok(MeasurePayload { counts, shots, most_likely })
    }

    pub fn state_info(&self) -> Result<StateInfoPayload> {
        let state = self
            .engine
            .state()
            .ok_or_else(|| Error::InvalidState("no active state".into()))?;
        let n = self.engine.n_qubits();
        let mut amplitudes = HashMap::new();
        let mut probabilities = HashMap::new();
        for (i, z) in state.iter().enumerate() {
            let p = z.norm_sqr();
            if p > 1e-10 {
                let key = bitstring(i, n);
                amplitudes.insert(key.clone(), (z.re, z.im));
                probabilities.insert(key, p);
            }
        }
        Ok(StateInfoPayload { amplitudes, probabilities })
    }

    pub fn bell_state(&mut self, pair_type: &str) -> Result<StateVectorPayload> {
        self.engine.reset(2)?;
        self.engine.apply_named_gate("H", gates::h(), 0, None)?;
        self.engine.apply_named_gate("X", gates::x(), 1, Some(0))?;
        match pair_type {
            "phi_plus" => {}
            "phi_minus" => self.engine.apply_named_gate("Z", gates::z(), 0, None)?,
            "psi_plus" => self.engine.apply_named_gate("X", gates::x(), 1, None)?,
            "psi_minus" => {
                self.engine.apply_named_gate("X", gates::x(), 1, None)?;
                self.engine.apply_named_gate("Z", gates::z(), 0, None)?;
            }
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown pair_type '{other}'; expected phi_plus|phi_minus|psi_plus|psi_minus"
                )))
            }
        }
        Ok(self.get_state().expect("just initialized"))
    }

    pub fn ghz_state(&mut self, n_qubits: usize) -> Result<StateVectorPayload> {
        if n_qubits < 2 {
            return Err(Error::InvalidArgument("ghz_state requires n_qubits >= 2".into()));
        }
        self.engine.reset(n_qubits)?;
        self.engine.apply_named_gate("H", gates::h(), 0, None)?;
        for target in 1..n_qubits {
            self.engine.apply_named_gate("X", gates::x(), target, Some(0))?;
        }
        Ok(self.get_state().expect("just initialized"))
    }

    pub fn true_schrodinger_capability() -> CapabilityDescriptor {
        CapabilityDescriptor {
            available: true,
            description: "Full Schrodinger solver available via evolve_schrodinger.".to_string(),
        }
    }

    pub fn engine(&self) -> &StatevectorEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut StatevectorEngine {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn save_then_load_round_trip_restores_uniform_superposition() {
        let dir = tempdir().unwrap();
        let mut f = facade(dir.path());
        f.reset(4).unwrap();
        for q in 0..4 {
            f.engine_mut().apply_named_gate("H", gates::h(), q, None).unwrap();
        }
        f.save_state("unif").unwrap();
        f.reset(1).unwrap();
        let loaded = f.load_state("unif").unwrap();
        assert_eq!(loaded.n_qubits, 4);
        let p = f.engine().probabilities().unwrap();
        assert_eq!(p.len(), 16);
        for v in p.values() {
            assert!((v - 1.0 / 16.0).abs() < 1e-9);
        }
    }

    #[test]
    fn bell_state_phi_plus_is_50_50() {
        let dir = tempdir().unwrap();
        let mut f = facade(dir.path());
        f.bell_state("phi_plus").unwrap();
        let p = f.engine().probabilities().unwrap();
        assert!((p["00"] - 0.5).abs() < 1e-9);
        assert!((p["11"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn initialize_with_binary_string() {
        let dir = tempdir().unwrap();
        let mut f = facade(dir.path());
        f.initialize(2, "10").unwrap();
        let p = f.engine().probabilities().unwrap();
        assert!((p["10"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_pair_type_is_invalid_argument() {
        let dir = tempdir().unwrap();
        let mut f = facade(dir.path());
        let err = f.bell_state("not_a_pair").unwrap_err();
        assert_eq!(err.tag(), "InvalidArgument");
    }
}
