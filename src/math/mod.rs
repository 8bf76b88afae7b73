//! Numeric type aliases and epsilon-comparison helpers shared across the
//! crate.
//!
//! Every subsystem (the gate catalog, the statevector engine, the
//! time-evolution solver) speaks in these same four aliases, so a reader
//! never has to wonder whether `N` means qubit count or basis index (it's
//! always "an unsigned count/index") or whether `C` is `f32` or `f64`
//! complex (it's always [`R`] = `f64`).

pub mod linalg;

mod consts {
    use super::types::*;

    pub const C_ONE: C = C { re: 1., im: 0. };
    pub const C_ZERO: C = C { re: 0., im: 0. };
    pub const C_IMAG: C = C { re: 0., im: 1. };
}

mod types {
    /// Qubit count / basis-index width.
    pub type N = usize;
    pub type R = f64;
    pub type C = num_complex::Complex<R>;

    /// Row-major single-qubit (2x2) gate.
    pub type M1 = [C; 4];
    /// Row-major two-qubit (4x4) gate.
    pub type M2 = [C; 16];
}

pub use consts::*;
pub use types::*;

/// Absolute tolerance used for unitarity/normalization/Hermiticity checks
/// throughout the crate: `1e-10` for composed gates and state norms,
/// `1e-9` for Hamiltonian Hermiticity.
pub const EPS: R = 1e-10;
pub const EPS_HERMITIAN: R = 1e-9;

#[inline]
pub fn approx_eq_real(a: R, b: R) -> bool {
    (a - b).abs() < EPS
}

#[inline]
pub fn approx_real(z: &C) -> bool {
    z.im.abs() < EPS
}

#[inline]
pub fn approx_eq(a: &C, b: &C) -> bool {
    (a.re - b.re).abs() < EPS && (a.im - b.im).abs() < EPS
}

#[inline]
pub fn approx_eq_conj(a: &C, b: &C) -> bool {
    (a.re - b.re).abs() < EPS && (a.im + b.im).abs() < EPS
}

/// `U U† == I` for a row-major 2x2 gate, within `eps`.
pub fn is_unitary_m1(u: &M1, eps: R) -> bool {
    let e00 = u[0].norm_sqr() + u[1].norm_sqr();
    let e11 = u[2].norm_sqr() + u[3].norm_sqr();
    let e01 = u[0] * u[2].conj() + u[1] * u[3].conj();
    (e00 - 1.0).abs() < eps && (e11 - 1.0).abs() < eps && e01.norm() < eps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_helpers() {
        assert!(approx_eq_real(1.0, 1.0 + 1e-12));
        assert!(!approx_eq_real(1.0, 1.1));
        assert!(approx_real(&C::new(0.3, 1e-13)));
        assert!(approx_eq_conj(&C::new(1.0, 2.0), &C::new(1.0, -2.0)));
    }
}
