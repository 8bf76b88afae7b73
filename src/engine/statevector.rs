//! The Statevector Engine: owns one n-qubit state and every operation on it.
//!
//! Structurally this plays the role `qvnt::register::quant::Reg` plays (a
//! struct owning the backing amplitudes plus qubit-count bookkeeping, with a
//! rich module doc and a `#[cfg(test)] mod tests` at the bottom), but the
//! operation set, the bit-ordering convention, and the streaming pair-update
//! gate application follow `quantum_compute.py` and the streaming
//! `apply_single_qubit_gate`/`apply_two_qubit_gate` shape used across the
//! statevector-simulator examples in the pack.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::bits::{bit, bitstring};
use crate::error::{Error, Result};
use crate::gates;
use crate::math::linalg::DenseMatrix;
use crate::math::{is_unitary_m1, C, M1, C_ZERO, EPS};

const N_MAX: usize = 16;
const GATE_LOG_CAP: usize = 100;
const RESULT_LOG_CAP: usize = 50;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub max_qubits: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_qubits: N_MAX }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GateLogKind {
    Named(String),
    Matrix,
    Permutation(&'static str),
}

#[derive(Clone, Debug)]
pub struct GateLogEntry {
    pub kind: GateLogKind,
    pub target: usize,
    pub control: Option<usize>,
    pub t_wall_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntanglementInfo {
    pub schmidt_rank: usize,
    pub entropy_bits: f64,
    pub is_entangled: bool,
    pub bipartite_split: usize,
    pub top_8_coefficients: Vec<f64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct QubitMarginal {
    pub p0: f64,
    pub p1: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComputeResult {
    pub id: u64,
    pub mode: String,
    pub success: bool,
    pub probabilities: Option<HashMap<String, f64>>,
    pub counts: Option<HashMap<String, u64>>,
    pub bloch: Option<(f64, f64, f64)>,
    pub num_qubits: usize,
    pub gate_count: usize,
    pub time_ms: f64,
    pub error: Option<String>,
}

/// Owns `ψ ∈ ℂ^{2^n}` plus bookkeeping. `None` state means "not yet
/// initialized"; every public operation except `reset`/`set_state` requires
/// an initialized state.
pub struct StatevectorEngine {
    config: EngineConfig,
    state: Option<Vec<C>>,
    n: usize,
    gate_log: VecDeque<GateLogEntry>,
    result_log: VecDeque<ComputeResult>,
    next_result_id: u64,
}

impl StatevectorEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: None,
            n: 0,
            gate_log: VecDeque::new(),
            result_log: VecDeque::new(),
            next_result_id: 0,
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state.is_none() {
            return Err(Error::InvalidState(
                "engine has no state; call reset or set_state first".into(),
            ));
        }
        Ok(())
    }

    fn check_qubit(&self, q: usize) -> Result<()> {
        if q >= self.n {
            return Err(Error::InvalidArgument(format!(
                "qubit index {q} out of range for {}-qubit state",
                self.n
            )));
        }
        Ok(())
    }

    fn push_gate_log(&mut self, kind: GateLogKind, target: usize, control: Option<usize>) {
        let t_wall_ms = Instant::now().elapsed().as_millis() as i64;
        self.gate_log.push_back(GateLogEntry { kind, target, control, t_wall_ms });
        if self.gate_log.len() > GATE_LOG_CAP {
            self.gate_log.pop_front();
        }
    }

    fn push_result_log(&mut self, result: ComputeResult) {
        self.result_log.push_back(result);
        if self.result_log.len() > RESULT_LOG_CAP {
            self.result_log.pop_front();
        }
    }

    pub fn n_qubits(&self) -> usize {
        self.n
    }

    pub fn gate_count(&self) -> usize {
        self.gate_log.len()
    }

    pub fn result_history_len(&self) -> usize {
        self.result_log.len()
    }

    pub fn max_qubits(&self) -> usize {
        self.config.max_qubits
    }

    pub fn state(&self) -> Option<&[C]> {
        self.state.as_deref()
    }

    /// `ψ = |0...0⟩` over `n` qubits.
    pub fn reset(&mut self, n: usize) -> Result<()> {
        let _span = info_span!("engine.reset", n_qubits = n).entered();
        if n == 0 || n > self.config.max_qubits {
            return Err(Error::Capacity(format!(
                "n_qubits={n} exceeds max_qubits={}",
                self.config.max_qubits
            )));
        }
        let dim = 1usize << n;
        let mut state = vec![C_ZERO; dim];
        state[0] = C::new(1.0, 0.0);
        self.state = Some(state);
        self.n = n;
        self.gate_log.clear();
        debug!(n_qubits = n, "register reset");
        Ok(())
    }

    /// Accepts an arbitrary complex vector of length `2^k`, normalizes it,
    /// and sets `n = k`.
    pub fn set_state(&mut self, v: Vec<C>) -> Result<()> {
        let dim = v.len();
        if dim == 0 || dim & (dim - 1) != 0 {
            return Err(Error::InvalidArgument(
                "state vector length must be a power of two".into(),
            ));
        }
        let k = dim.trailing_zeros() as usize;
        if k == 0 || k > self.config.max_qubits {
            return Err(Error::Capacity(format!(
                "n_qubits={k} exceeds max_qubits={}",
                self.config.max_qubits
            )));
        }
        let norm2: f64 = v.iter().map(|z| z.norm_sqr()).sum();
        if norm2 < EPS {
            return Err(Error::InvalidArgument("zero-norm state".into()));
        }
        let norm = norm2.sqrt();
        self.state = Some(v.into_iter().map(|z| z / norm).collect());
        self.n = k;
        self.gate_log.clear();
        Ok(())
    }

    fn renormalize(&mut self) {
        let Some(state) = self.state.as_mut() else { return };
        let norm2: f64 = state.iter().map(|z| z.norm_sqr()).sum();
        if (norm2 - 1.0).abs() > EPS {
            let norm = norm2.sqrt();
            if norm > 0.0 {
                for z in state.iter_mut() {
                    *z /= norm;
                }
            }
        }
    }

    /// Applies a 1-qubit gate `u` to `target`, optionally controlled on
    /// `control`. `control == target` is rejected.
    pub fn apply_gate(&mut self, u: M1, target: usize, control: Option<usize>) -> Result<()> {
        self.apply_gate_impl(GateLogKind::Matrix, u, target, control)
    }

    /// Same as [`apply_gate`](Self::apply_gate) but records the native gate
    /// name in the gate log instead of tagging the entry as a raw matrix.
    pub fn apply_named_gate(
        &mut self,
        name: &str,
        u: M1,
        target: usize,
        control: Option<usize>,
    ) -> Result<()> {
        self.apply_gate_impl(GateLogKind::Named(name.to_string()), u, target, control)
    }

    fn apply_gate_impl(
        &mut self,
        kind: GateLogKind,
        u: M1,
        target: usize,
        control: Option<usize>,
    ) -> Result<()> {
        let _span = info_span!("engine.apply_gate", target, ?control).entered();
        self.ensure_ready()?;
        self.check_qubit(target)?;
        if let Some(c) = control {
            self.check_qubit(c)?;
            if c == target {
                return Err(Error::InvalidArgument(
                    "control qubit must differ from target qubit".into(),
                ));
            }
        }
        if !is_unitary_m1(&u, EPS) {
            return Err(Error::InvalidArgument("gate matrix is not unitary".into()));
        }

        let mask = 1usize << target;
        let state = self.state.as_mut().unwrap();
        for i in 0..state.len() {
            if i & mask != 0 {
                continue;
            }
            if let Some(c) = control {
                if bit(i, c) == 0 {
                    continue;
                }
            }
            let j = i | mask;
            let (psi_i, psi_j) = (state[i], state[j]);
            state[i] = u[0] * psi_i + u[1] * psi_j;
            state[j] = u[2] * psi_i + u[3] * psi_j;
        }
        self.renormalize();
        let gate_name = match &kind {
            GateLogKind::Named(name) => name.as_str(),
            GateLogKind::Matrix => "matrix",
            GateLogKind::Permutation(name) => name,
        };
        debug!(gate = gate_name, target, ?control, "gate application");
        self.push_gate_log(kind, target, control);
        Ok(())
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        self.ensure_ready()?;
        self.check_qubit(a)?;
        self.check_qubit(b)?;
        if a == b {
            return Ok(());
        }
        let (mask_a, mask_b) = (1usize << a, 1usize << b);
        let state = self.state.as_mut().unwrap();
        for i in 0..state.len() {
            let bit_a = i & mask_a != 0;
            let bit_b = i & mask_b != 0;
            if !bit_a && bit_b {
                let j = i ^ mask_a ^ mask_b;
                state.swap(i, j);
            }
        }
        self.push_gate_log(GateLogKind::Permutation("swap"), a, Some(b));
        Ok(())
    }

    pub fn cswap(&mut self, c: usize, a: usize, b: usize) -> Result<()> {
        self.ensure_ready()?;
        self.check_qubit(c)?;
        self.check_qubit(a)?;
        self.check_qubit(b)?;
        if a == b || c == a || c == b {
            return Err(Error::InvalidArgument(
                "cswap requires three distinct qubits".into(),
            ));
        }
        let (mask_a, mask_b, mask_c) = (1usize << a, 1usize << b, 1usize << c);
        let state = self.state.as_mut().unwrap();
        for i in 0..state.len() {
            if i & mask_c == 0 {
                continue;
            }
            let bit_a = i & mask_a != 0;
            let bit_b = i & mask_b != 0;
            if !bit_a && bit_b {
                let j = i ^ mask_a ^ mask_b;
                state.swap(i, j);
            }
        }
        self.push_gate_log(GateLogKind::Permutation("cswap"), a, Some(c));
        Ok(())
    }

    fn shift_register(&mut self, qubits: &[usize], delta: i64) -> Result<()> {
        self.ensure_ready()?;
        for &q in qubits {
            self.check_qubit(q)?;
        }
        let m = qubits.len();
        if m == 0 {
            return Ok(());
        }
        let modulus = 1i64 << m;
        let dim = 1usize << self.n;
        let old = self.state.take().unwrap();
        let mut new_state = vec![C_ZERO; dim];
        for (i, &amp) in old.iter().enumerate() {
            let mut value: usize = 0;
            for (j, &q) in qubits.iter().enumerate() {
                value |= (bit(i, q) as usize) << j;
            }
            let new_value = (value as i64 + delta).rem_euclid(modulus) as usize;
            let mut idx = i;
            for &q in qubits {
                idx &= !(1 << q);
            }
            for (j, &q) in qubits.iter().enumerate() {
                idx |= ((new_value >> j) & 1) << q;
            }
            new_state[idx] = amp;
        }
        self.state = Some(new_state);
        let label = if delta > 0 { "increment" } else { "decrement" };
        self.push_gate_log(GateLogKind::Permutation(label), qubits[0], None);
        Ok(())
    }

    pub fn increment(&mut self, qubits: &[usize]) -> Result<()> {
        self.shift_register(qubits, 1)
    }

    pub fn decrement(&mut self, qubits: &[usize]) -> Result<()> {
        self.shift_register(qubits, -1)
    }

    pub fn reverse_bits(&mut self, qubits: &[usize]) -> Result<()> {
        self.ensure_ready()?;
        for &q in qubits {
            self.check_qubit(q)?;
        }
        let m = qubits.len();
        if m < 2 {
            return Ok(());
        }
        let dim = 1usize << self.n;
        let old = self.state.take().unwrap();
        let mut new_state = vec![C_ZERO; dim];
        for (i, &amp) in old.iter().enumerate() {
            let mut idx = i;
            for &q in qubits {
                idx &= !(1 << q);
            }
            for (j, &q) in qubits.iter().enumerate() {
                let src_bit = bit(i, qubits[m - 1 - j]);
                idx |= (src_bit as usize) << q;
            }
            new_state[idx] = amp;
        }
        self.state = Some(new_state);
        self.push_gate_log(GateLogKind::Permutation("reverse_bits"), qubits[0], None);
        Ok(())
    }

    /// Samples `shots` outcomes from `p_i = |ψ_i|²` without collapsing `ψ`.
    pub fn measure_all(&self, shots: u64) -> Result<HashMap<String, u64>> {
        self.ensure_ready()?;
        let mut counts = HashMap::new();
        if shots == 0 {
            return Ok(counts);
        }
        let state = self.state.as_ref().unwrap();
        let weights: Vec<f64> = state.iter().map(|z| z.norm_sqr()).collect();
        let dist = WeightedIndex::new(&weights)
            .map_err(|e| Error::Internal(format!("degenerate probability distribution: {e}")))?;
        let mut rng = rand::thread_rng();
        for _ in 0..shots {
            let i = dist.sample(&mut rng);
            *counts.entry(bitstring(i, self.n)).or_insert(0u64) += 1;
        }
        Ok(counts)
    }

    /// Draws a collapsing measurement of `q` in the computational basis.
    pub fn measure_single(&mut self, q: usize) -> Result<u8> {
        self.ensure_ready()?;
        self.check_qubit(q)?;
        let mask = 1usize << q;
        let state = self.state.as_ref().unwrap();
        let p1: f64 = state.iter().enumerate().filter(|(i, _)| i & mask != 0).map(|(_, z)| z.norm_sqr()).sum();
        let mut rng = rand::thread_rng();
        let outcome: u8 = if rng.gen::<f64>() < p1 { 1 } else { 0 };

        let state = self.state.as_mut().unwrap();
        for (i, z) in state.iter_mut().enumerate() {
            let keep = if outcome == 1 { i & mask != 0 } else { i & mask == 0 };
            if !keep {
                *z = C_ZERO;
            }
        }
        self.renormalize();
        Ok(outcome)
    }

    /// Rotates to the X basis (`H`) and measures; does not rotate back.
    pub fn measure_x(&mut self, q: usize) -> Result<u8> {
        self.apply_named_gate("H", gates::h(), q, None)?;
        self.measure_single(q)
    }

    /// Rotates to the Y basis (`S†` then `H`) and measures; does not rotate
    /// back.
    pub fn measure_y(&mut self, q: usize) -> Result<u8> {
        self.apply_named_gate("S_dag", gates::s_dag(), q, None)?;
        self.apply_named_gate("H", gates::h(), q, None)?;
        self.measure_single(q)
    }

    pub fn probabilities(&self) -> Result<HashMap<String, f64>> {
        self.ensure_ready()?;
        let state = self.state.as_ref().unwrap();
        Ok(state
            .iter()
            .enumerate()
            .map(|(i, z)| (i, z.norm_sqr()))
            .filter(|(_, p)| *p > EPS)
            .map(|(i, p)| (bitstring(i, self.n), p))
            .collect())
    }

    pub fn marginals(&self) -> Result<Vec<QubitMarginal>> {
        self.ensure_ready()?;
        let state = self.state.as_ref().unwrap();
        let mut out = vec![QubitMarginal { p0: 0.0, p1: 0.0 }; self.n];
        for (i, z) in state.iter().enumerate() {
            let p = z.norm_sqr();
            for (q, marg) in out.iter_mut().enumerate() {
                if bit(i, q) == 1 {
                    marg.p1 += p;
                } else {
                    marg.p0 += p;
                }
            }
        }
        Ok(out)
    }

    fn reduced_density_single_qubit(&self, q: usize) -> (C, C, C, C) {
        let state = self.state.as_ref().unwrap();
        let mask = 1usize << q;
        let (mut rho00, mut rho11, mut rho01) = (C_ZERO, C_ZERO, C_ZERO);
        for (i, &psi_i) in state.iter().enumerate() {
            if i & mask != 0 {
                continue;
            }
            let j = i | mask;
            let psi_j = state[j];
            rho00 += psi_i * psi_i.conj();
            rho11 += psi_j * psi_j.conj();
            rho01 += psi_i * psi_j.conj();
        }
        let rho10 = rho01.conj();
        (rho00, rho01, rho10, rho11)
    }

    /// Bloch vector `(x, y, z)` of the reduced single-qubit density matrix.
    pub fn bloch(&self, q: usize) -> Result<(f64, f64, f64)> {
        self.ensure_ready()?;
        self.check_qubit(q)?;
        let (rho00, rho01, rho10, rho11) = self.reduced_density_single_qubit(q);
        let x = 2.0 * rho01.re;
        let y = 2.0 * rho10.im;
        let z = rho00.re - rho11.re;
        Ok((x, y, z))
    }

    pub fn bloch_all(&self) -> Result<Vec<(f64, f64, f64)>> {
        self.ensure_ready()?;
        (0..self.n).map(|q| self.bloch(q)).collect()
    }

    /// Bipartite Schmidt decomposition at split `k = floor(n/2)`.
    pub fn entanglement(&self) -> Result<EntanglementInfo> {
        self.ensure_ready()?;
        let state = self.state.as_ref().unwrap();
        let k = self.n / 2;
        let rows = 1usize << k;
        let cols = 1usize << (self.n - k);
        let reshaped = DenseMatrix::from_fn(rows, cols, |r, c| state[r + c * rows]);
        let singular_values = reshaped.singular_values();
        let coefficients: Vec<f64> = singular_values
            .iter()
            .map(|s| s * s)
            .filter(|p| *p > EPS)
            .collect();
        let schmidt_rank = coefficients.len();
        let entropy_bits = -coefficients
            .iter()
            .filter(|p| **p > 0.0)
            .map(|p| p * p.log2())
            .sum::<f64>();
        Ok(EntanglementInfo {
            schmidt_rank,
            entropy_bits,
            is_entangled: schmidt_rank > 1,
            bipartite_split: k,
            top_8_coefficients: coefficients.into_iter().take(8).collect(),
        })
    }

    /// Snapshot: probabilities, optional measurement counts, optional
    /// `bloch(0)` for `n <= 4`. Pushes a [`ComputeResult`] into the ring.
    pub fn compute(&mut self, mode: &str, shots: u64, visualize: bool) -> Result<ComputeResult> {
        let start = Instant::now();
        self.ensure_ready()?;

        let probabilities = self.probabilities()?;
        let counts = if shots > 0 { Some(self.measure_all(shots)?) } else { None };
        let bloch = if visualize && self.n <= 4 { Some(self.bloch(0)?) } else { None };

        let result = ComputeResult {
            id: self.next_result_id,
            mode: mode.to_string(),
            success: true,
            probabilities: Some(probabilities),
            counts,
            bloch,
            num_qubits: self.n,
            gate_count: self.gate_log.len(),
            time_ms: start.elapsed().as_secs_f64() * 1000.0,
            error: None,
        };
        self.next_result_id += 1;
        self.push_result_log(result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn bell_state_probabilities_and_entanglement() {
        let mut e = StatevectorEngine::new(EngineConfig::default());
        e.reset(2).unwrap();
        e.apply_named_gate("H", gates::h(), 0, None).unwrap();
        e.apply_named_gate("X", gates::x(), 1, Some(0)).unwrap();

        let p = e.probabilities().unwrap();
        assert!(approx(*p.get("00").unwrap(), 0.5, 1e-9));
        assert!(approx(*p.get("11").unwrap(), 0.5, 1e-9));
        assert_eq!(p.len(), 2);

        let ent = e.entanglement().unwrap();
        assert_eq!(ent.schmidt_rank, 2);
        assert!(approx(ent.entropy_bits, 1.0, 1e-9));
        assert!(ent.is_entangled);
    }

    #[test]
    fn ghz_state_three_qubits() {
        let mut e = StatevectorEngine::new(EngineConfig::default());
        e.reset(3).unwrap();
        e.apply_named_gate("H", gates::h(), 0, None).unwrap();
        e.apply_named_gate("X", gates::x(), 1, Some(0)).unwrap();
        e.apply_named_gate("X", gates::x(), 2, Some(0)).unwrap();

        let p = e.probabilities().unwrap();
        assert!(approx(*p.get("000").unwrap(), 0.5, 1e-9));
        assert!(approx(*p.get("111").unwrap(), 0.5, 1e-9));

        let ent = e.entanglement().unwrap();
        assert_eq!(ent.schmidt_rank, 2);
        assert!(approx(ent.entropy_bits, 1.0, 1e-9));
    }

    #[test]
    fn separable_plus_zero_is_unentangled() {
        let mut e = StatevectorEngine::new(EngineConfig::default());
        e.reset(2).unwrap();
        e.apply_named_gate("H", gates::h(), 0, None).unwrap();

        let ent = e.entanglement().unwrap();
        assert_eq!(ent.schmidt_rank, 1);
        assert!(approx(ent.entropy_bits, 0.0, 1e-9));
        assert!(!ent.is_entangled);

        let (x0, y0, z0) = e.bloch(0).unwrap();
        assert!(approx(x0, 1.0, 1e-9) && approx(y0, 0.0, 1e-9) && approx(z0, 0.0, 1e-9));
        let (x1, y1, z1) = e.bloch(1).unwrap();
        assert!(approx(x1, 0.0, 1e-9) && approx(y1, 0.0, 1e-9) && approx(z1, 1.0, 1e-9));
    }

    #[test]
    fn control_equal_target_is_rejected() {
        let mut e = StatevectorEngine::new(EngineConfig::default());
        e.reset(2).unwrap();
        let err = e.apply_named_gate("X", gates::x(), 0, Some(0)).unwrap_err();
        assert_eq!(err.tag(), "InvalidArgument");
    }

    #[test]
    fn reset_over_capacity_fails() {
        let mut e = StatevectorEngine::new(EngineConfig::default());
        let err = e.reset(17).unwrap_err();
        assert_eq!(err.tag(), "Capacity");
    }

    #[test]
    fn gate_log_is_capped() {
        let mut e = StatevectorEngine::new(EngineConfig::default());
        e.reset(1).unwrap();
        for _ in 0..150 {
            e.apply_named_gate("X", gates::x(), 0, None).unwrap();
        }
        assert_eq!(e.gate_count(), GATE_LOG_CAP);
    }

    #[test]
    fn measure_all_zero_shots_is_empty_and_non_collapsing() {
        let mut e = StatevectorEngine::new(EngineConfig::default());
        e.reset(2).unwrap();
        e.apply_named_gate("H", gates::h(), 0, None).unwrap();
        let counts = e.measure_all(0).unwrap();
        assert!(counts.is_empty());
        // still in superposition afterwards
        let p = e.probabilities().unwrap();
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn double_x_is_identity_up_to_phase() {
        let mut e = StatevectorEngine::new(EngineConfig::default());
        e.reset(1).unwrap();
        e.apply_named_gate("X", gates::x(), 0, None).unwrap();
        e.apply_named_gate("X", gates::x(), 0, None).unwrap();
        let p = e.probabilities().unwrap();
        assert!(approx(*p.get("0").unwrap(), 1.0, 1e-9));
    }

    #[test]
    fn double_h_is_identity_up_to_phase() {
        let mut e = StatevectorEngine::new(EngineConfig::default());
        e.reset(1).unwrap();
        e.apply_named_gate("H", gates::h(), 0, None).unwrap();
        e.apply_named_gate("H", gates::h(), 0, None).unwrap();
        let p = e.probabilities().unwrap();
        assert!(approx(*p.get("0").unwrap(), 1.0, 1e-9));
    }

    #[test]
    fn result_log_is_capped() {
        let mut e = StatevectorEngine::new(EngineConfig::default());
        e.reset(1).unwrap();
        for _ in 0..(RESULT_LOG_CAP + 20) {
            e.compute("statevector", 0, false).unwrap();
        }
        assert_eq!(e.result_history_len(), RESULT_LOG_CAP);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn gate_sequence() -> impl Strategy<Value = Vec<(usize, usize, Option<usize>)>> {
        prop::collection::vec((0usize..5, 0usize..3, prop::option::of(0usize..5)), 1..40)
    }

    fn gate_for(kind: usize) -> (&'static str, M1) {
        match kind % 3 {
            0 => ("H", gates::h()),
            1 => ("X", gates::x()),
            _ => ("T", gates::t()),
        }
    }

    proptest! {
        #[test]
        fn norm_probabilities_and_bloch_stay_bounded(ops in gate_sequence()) {
            let mut e = StatevectorEngine::new(EngineConfig::default());
            e.reset(3).unwrap();
            for (kind, target_raw, control_raw) in ops {
                let target = target_raw % 3;
                let (name, u) = gate_for(kind);
                let control = control_raw.map(|c| c % 3).filter(|&c| c != target);
                let _ = e.apply_named_gate(name, u, target, control);
            }

            let state = e.state().unwrap();
            let norm2: f64 = state.iter().map(|z| z.norm_sqr()).sum();
            prop_assert!((norm2 - 1.0).abs() < 1e-9);

            let p = e.probabilities().unwrap();
            let total: f64 = p.values().sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
            for &pi in p.values() {
                prop_assert!((0.0..=1.0 + 1e-9).contains(&pi));
            }

            for (x, y, z) in e.bloch_all().unwrap() {
                prop_assert!(x * x + y * y + z * z <= 1.0 + 1e-9);
            }
        }
    }
}
