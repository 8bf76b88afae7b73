//! Time-evolution solver (C4): `iħ ∂ψ/∂t = Hψ` for time-independent
//! Hermitian `H`.
//!
//! Builds the evolution operator from an eigendecomposition of `H` and
//! renormalizes after each application, following the shape of
//! `quantum_compute.py::evolve` and `engine.py`'s Schrodinger-evolution
//! sampling loop. `evolve_schrodinger` samples by repeated closed-form
//! evaluation off one eigendecomposition rather than stepping an adaptive
//! integrator: `H` is Hermitian and time-independent, so
//! `ψ(t_k) = exp(-iH t_k) ψ(0)` is exact at every sample point.

use crate::error::{Error, Result};
use crate::math::linalg::DenseMatrix;
use crate::math::{C, EPS_HERMITIAN};

/// `exp(-iHt) ψ₀`, built from the Hermitian eigendecomposition of `H`
/// rather than [`DenseMatrix::expm`]: the generator `-iHt` is
/// anti-Hermitian, so `expm` would take its general Pade path, while
/// diagonalizing `H` directly and exponentiating the eigenvalues by hand
/// is both exact and cheaper.
fn propagate(h: &DenseMatrix, psi0: &[C], t: f64) -> Result<Vec<C>> {
    let dim = psi0.len();
    if h.nrows() != dim || h.ncols() != dim {
        return Err(Error::InvalidArgument(format!(
            "Hamiltonian dimension {}x{} does not match state length {dim}",
            h.nrows(),
            h.ncols()
        )));
    }
    if !h.is_hermitian(EPS_HERMITIAN) {
        return Err(Error::InvalidArgument(
            "Hamiltonian is not Hermitian to the required tolerance".into(),
        ));
    }
    let (eigenvalues, vectors) = h
        .eig_hermitian()
        .expect("Hermiticity already checked above");

    // ψ in the eigenbasis: c = V† ψ₀.
    let coeffs = vectors.dagger().mul_vec(psi0);
    // Phase each mode by exp(-i λ t), then transform back: ψ(t) = V diag(e^{-iλt}) c.
    let phased: Vec<C> = coeffs
        .iter()
        .zip(eigenvalues.iter())
        .map(|(c, &lambda)| c * C::from_polar(1.0, -lambda * t))
        .collect();
    let mut psi_t = vectors.mul_vec(&phased);
    let norm: f64 = psi_t.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
    if norm > 0.0 {
        for z in psi_t.iter_mut() {
            *z /= norm;
        }
    }
    Ok(psi_t)
}

/// Exact unitary evolution `ψ(t) = expm(-iHt) ψ(0)`.
pub fn evolve_unitary(h: &DenseMatrix, psi0: &[C], t: f64) -> Result<Vec<C>> {
    propagate(h, psi0, t)
}

/// Samples `ψ(t_k)` at `n_points` evenly spaced points over `[t0, t1]`,
/// renormalizing after each sample. Returns `(times, states)`.
pub fn evolve_schrodinger(
    h: &DenseMatrix,
    psi0: &[C],
    t0: f64,
    t1: f64,
    n_points: usize,
) -> Result<(Vec<f64>, Vec<Vec<C>>)> {
    if n_points == 0 {
        return Err(Error::InvalidArgument("n_points must be >= 1".into()));
    }
    let dim = psi0.len();
    if h.nrows() != dim || h.ncols() != dim {
        return Err(Error::InvalidArgument(format!(
            "Hamiltonian dimension {}x{} does not match state length {dim}",
            h.nrows(),
            h.ncols()
        )));
    }
    if !h.is_hermitian(EPS_HERMITIAN) {
        return Err(Error::InvalidArgument(
            "Hamiltonian is not Hermitian to the required tolerance".into(),
        ));
    }

    let times: Vec<f64> = if n_points == 1 {
        vec![t0]
    } else {
        let step = (t1 - t0) / (n_points as f64 - 1.0);
        (0..n_points).map(|k| t0 + step * k as f64).collect()
    };
    let states = times
        .iter()
        .map(|&t| propagate(h, psi0, t))
        .collect::<Result<Vec<_>>>()?;
    Ok((times, states))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unitary_evolution_of_pi_x_over_2_flips_qubit() {
        // H = (pi/2) X; exp(-i H * 1) = -i X, so |0> -> -i|1> (prob 1 on "1").
        let h = DenseMatrix::from_row_major(
            2,
            2,
            &[
                C::new(0.0, 0.0),
                C::new(std::f64::consts::FRAC_PI_2, 0.0),
                C::new(std::f64::consts::FRAC_PI_2, 0.0),
                C::new(0.0, 0.0),
            ],
        );
        let psi0 = vec![C::new(1.0, 0.0), C::new(0.0, 0.0)];
        let psi_t = evolve_unitary(&h, &psi0, 1.0).unwrap();
        assert!(psi_t[0].norm_sqr() < 1e-8);
        assert!((psi_t[1].norm_sqr() - 1.0).abs() < 1e-8);
    }

    #[test]
    fn non_hermitian_hamiltonian_is_rejected() {
        let h = DenseMatrix::from_row_major(
            2,
            2,
            &[C::new(0.0, 0.0), C::new(1.0, 0.0), C::new(0.0, 0.0), C::new(0.0, 0.0)],
        );
        let psi0 = vec![C::new(1.0, 0.0), C::new(0.0, 0.0)];
        let err = evolve_unitary(&h, &psi0, 1.0).unwrap_err();
        assert_eq!(err.tag(), "InvalidArgument");
    }

    #[test]
    fn schrodinger_samples_stay_normalized() {
        let h = DenseMatrix::from_row_major(
            2,
            2,
            &[C::new(1.0, 0.0), C::new(0.0, 0.0), C::new(0.0, 0.0), C::new(-1.0, 0.0)],
        );
        let psi0 = vec![C::new(std::f64::consts::FRAC_1_SQRT_2, 0.0), C::new(std::f64::consts::FRAC_1_SQRT_2, 0.0)];
        let (times, states) = evolve_schrodinger(&h, &psi0, 0.0, 2.0, 5).unwrap();
        assert_eq!(times.len(), 5);
        for psi in &states {
            let norm2: f64 = psi.iter().map(|z| z.norm_sqr()).sum();
            assert!((norm2 - 1.0).abs() < 1e-9);
        }
    }
}
