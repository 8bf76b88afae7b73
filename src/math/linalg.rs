//! Dense complex linear algebra: the primitives the statevector engine and
//! the time-evolution solver build on.
//!
//! `qvnt::math::matrix` checks unitarity/hermiticity of fixed 2x2/4x4 arrays
//! but never needed a general dense matrix type, eigendecomposition, SVD, or
//! a matrix exponential. Those are pulled in from `nalgebra`, the numerics
//! crate the rest of the example pack standardizes on
//! (`LUXERON-VXLAN-CONTROL-PLANE-SERVER`, `symmetrix-core`).

use nalgebra::DMatrix;

use super::{C, EPS_HERMITIAN, R};

/// A dense, owned complex matrix.
///
/// Thin newtype over `nalgebra::DMatrix<Complex<f64>>` so call sites outside
/// this module never have to import `nalgebra` directly.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix(DMatrix<C>);

impl DenseMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self(DMatrix::from_element(rows, cols, C::new(0.0, 0.0)))
    }

    pub fn identity(n: usize) -> Self {
        Self(DMatrix::identity(n, n))
    }

    pub fn from_row_major(rows: usize, cols: usize, data: &[C]) -> Self {
        assert_eq!(data.len(), rows * cols);
        Self(DMatrix::from_fn(rows, cols, |r, c| data[r * cols + c]))
    }

    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> C) -> Self {
        Self(DMatrix::from_fn(rows, cols, f))
    }

    pub fn nrows(&self) -> usize {
        self.0.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.0.ncols()
    }

    pub fn get(&self, r: usize, c: usize) -> C {
        self.0[(r, c)]
    }

    pub fn set(&mut self, r: usize, c: usize, v: C) {
        self.0[(r, c)] = v;
    }

    pub fn dagger(&self) -> Self {
        Self(self.0.adjoint())
    }

    pub fn mul(&self, rhs: &Self) -> Self {
        Self(&self.0 * &rhs.0)
    }

    pub fn mul_vec(&self, v: &[C]) -> Vec<C> {
        let v = DMatrix::from_column_slice(v.len(), 1, v);
        let out = &self.0 * v;
        out.iter().copied().collect()
    }

    pub fn add(&self, rhs: &Self) -> Self {
        Self(&self.0 + &rhs.0)
    }

    pub fn scale(&self, s: C) -> Self {
        Self(self.0.clone() * s)
    }

    /// Kronecker product `self ⊗ rhs`.
    pub fn kron(&self, rhs: &Self) -> Self {
        Self(self.0.kronecker(&rhs.0))
    }

    /// `‖A‖₂`, the Frobenius norm (sufficient for the small state-like
    /// vectors/matrices this crate deals with; used for state-vector norms
    /// via the 1-column case).
    pub fn norm2(&self) -> R {
        self.0.iter().map(|z| z.norm_sqr()).sum::<R>().sqrt()
    }

    /// Maximum over columns of the L-infinity norm of that column.
    pub fn norm_inf_col(&self) -> R {
        (0..self.0.ncols())
            .map(|c| {
                (0..self.0.nrows())
                    .map(|r| self.0[(r, c)].norm())
                    .fold(0.0_f64, f64::max)
            })
            .fold(0.0_f64, f64::max)
    }

    pub fn is_hermitian(&self, eps: R) -> bool {
        if self.0.nrows() != self.0.ncols() {
            return false;
        }
        let n = self.0.nrows();
        for i in 0..n {
            for j in 0..n {
                if (self.0[(i, j)] - self.0[(j, i)].conj()).norm() > eps {
                    return false;
                }
            }
        }
        true
    }

    /// Eigendecomposition of a Hermitian matrix: real eigenvalues and the
    /// (unitary) matrix of column eigenvectors. Validates Hermiticity to
    /// `EPS_HERMITIAN` first, returning `None` otherwise.
    pub fn eig_hermitian(&self) -> Option<(Vec<R>, Self)> {
        if !self.is_hermitian(EPS_HERMITIAN) {
            return None;
        }
        let eigen = self.0.clone().symmetric_eigen();
        let values = eigen.eigenvalues.iter().copied().collect();
        Some((values, Self(eigen.eigenvectors)))
    }

    /// Ordered (descending) singular values of a (possibly rectangular)
    /// matrix, used by the Schmidt decomposition.
    pub fn singular_values(&self) -> Vec<R> {
        let svd = self.0.clone().svd(false, false);
        let mut values: Vec<R> = svd.singular_values.iter().copied().collect();
        values.sort_by(|a, b| b.partial_cmp(a).unwrap());
        values
    }

    /// Matrix exponential `exp(A)`.
    ///
    /// For Hermitian `A`, uses the eigendecomposition route (`V
    /// diag(exp(λ)) V†`); otherwise falls back to a scaling-and-squaring
    /// Padé(6) approximant, since `nalgebra` 0.32 does not ship a complex
    /// matrix exponential of its own.
    pub fn expm(&self) -> Self {
        if let Some((values, vectors)) = self.eig_hermitian() {
            let exp_diag = DMatrix::from_fn(values.len(), values.len(), |r, c| {
                if r == c {
                    C::new(values[r].exp(), 0.0)
                } else {
                    C::new(0.0, 0.0)
                }
            });
            Self(&vectors.0 * exp_diag * vectors.0.adjoint())
        } else {
            self.expm_pade()
        }
    }

    fn expm_pade(&self) -> Self {
        let n = self.0.nrows();
        let norm = self.norm_inf_col().max(1e-300);
        let scale_pow = (norm.log2().ceil().max(0.0)) as i32;
        let scale = 2f64.powi(scale_pow);
        let a = self.0.clone() / C::new(scale, 0.0);

        // Diagonal Padé[6/6] coefficients c_k, built via the standard
        // recurrence c_0 = 1, c_k = c_{k-1} * (q-k+1) / (k * (2q-k+1)).
        const Q: usize = 6;
        let mut coeffs = [0.0_f64; Q + 1];
        coeffs[0] = 1.0;
        for k in 1..=Q {
            coeffs[k] = coeffs[k - 1] * (Q - k + 1) as f64 / (k as f64 * (2 * Q - k + 1) as f64);
        }

        let id = DMatrix::<C>::identity(n, n);
        let mut a_pow = id.clone();
        let mut u = DMatrix::<C>::zeros(n, n);
        let mut v = DMatrix::<C>::zeros(n, n);
        for (k, &b) in coeffs.iter().enumerate() {
            if k % 2 == 1 {
                u += a_pow.clone() * C::new(b, 0.0);
            } else {
                v += a_pow.clone() * C::new(b, 0.0);
            }
            a_pow = &a_pow * &a;
        }
        let u = &a * u;
        let numerator = &v + &u;
        let denominator = &v - &u;
        let mut result = denominator
            .clone()
            .try_inverse()
            .unwrap_or_else(|| DMatrix::identity(n, n))
            * numerator;
        for _ in 0..scale_pow {
            result = &result * &result;
        }
        Self(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kron_identity() {
        let a = DenseMatrix::identity(2);
        let b = DenseMatrix::identity(2);
        let k = a.kron(&b);
        assert_eq!(k.nrows(), 4);
        assert_eq!(k.get(0, 0), C::new(1.0, 0.0));
        assert_eq!(k.get(1, 1), C::new(1.0, 0.0));
    }

    #[test]
    fn hermitian_eig_roundtrip() {
        // Pauli X is Hermitian, eigenvalues +-1.
        let x = DenseMatrix::from_row_major(
            2,
            2,
            &[C::new(0.0, 0.0), C::new(1.0, 0.0), C::new(1.0, 0.0), C::new(0.0, 0.0)],
        );
        let (values, _vectors) = x.eig_hermitian().unwrap();
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((sorted[0] + 1.0).abs() < 1e-9);
        assert!((sorted[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn expm_pauli_x_pi_over_2() {
        // exp(-i * (pi/2) * X) == -i X. The generator is anti-Hermitian,
        // so this exercises the Padé fallback path.
        let x = DenseMatrix::from_row_major(
            2,
            2,
            &[C::new(0.0, 0.0), C::new(1.0, 0.0), C::new(1.0, 0.0), C::new(0.0, 0.0)],
        );
        let gen = x.scale(C::new(0.0, -std::f64::consts::FRAC_PI_2));
        let u = gen.expm();
        let expected = x.scale(C::new(0.0, -1.0));
        for r in 0..2 {
            for c in 0..2 {
                assert!((u.get(r, c) - expected.get(r, c)).norm() < 1e-8);
            }
        }
    }
}
