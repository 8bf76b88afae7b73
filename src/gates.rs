//! Fixed gate catalog.
//!
//! Every gate here is a plain row-major `M1`/`M2` array rather than a trait
//! object: the statevector engine (`engine::statevector`) applies gates as
//! raw matrices via a streaming pair update, so there is no `Applicable`
//! trait to implement. Controlled variants are never stored; the engine
//! builds them at apply time from the base gate.

use crate::math::{linalg::DenseMatrix, C, M1, M2};

const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

#[inline]
fn c(re: f64, im: f64) -> C {
    C::new(re, im)
}

pub fn i() -> M1 {
    [c(1., 0.), c(0., 0.), c(0., 0.), c(1., 0.)]
}

pub fn x() -> M1 {
    [c(0., 0.), c(1., 0.), c(1., 0.), c(0., 0.)]
}

pub fn y() -> M1 {
    [c(0., 0.), c(0., -1.), c(0., 1.), c(0., 0.)]
}

pub fn z() -> M1 {
    [c(1., 0.), c(0., 0.), c(0., 0.), c(-1., 0.)]
}

pub fn h() -> M1 {
    [
        c(FRAC_1_SQRT_2, 0.),
        c(FRAC_1_SQRT_2, 0.),
        c(FRAC_1_SQRT_2, 0.),
        c(-FRAC_1_SQRT_2, 0.),
    ]
}

pub fn s() -> M1 {
    [c(1., 0.), c(0., 0.), c(0., 0.), c(0., 1.)]
}

pub fn s_dag() -> M1 {
    [c(1., 0.), c(0., 0.), c(0., 0.), c(0., -1.)]
}

pub fn t() -> M1 {
    let phase = C::from_polar(1.0, std::f64::consts::FRAC_PI_4);
    [c(1., 0.), c(0., 0.), c(0., 0.), phase]
}

pub fn t_dag() -> M1 {
    let phase = C::from_polar(1.0, -std::f64::consts::FRAC_PI_4);
    [c(1., 0.), c(0., 0.), c(0., 0.), phase]
}

/// Principal square root of a 2x2 unitary, via its Hermitian-adjacent
/// `fractional` construction at `p = 1/2` (see [`fractional`]).
pub fn sx() -> M1 {
    fractional(&x(), 0.5)
}

pub fn sx_dag() -> M1 {
    fractional(&x(), -0.5)
}

pub fn sy() -> M1 {
    fractional(&y(), 0.5)
}

pub fn sy_dag() -> M1 {
    fractional(&y(), -0.5)
}

pub fn rx(theta: f64) -> M1 {
    let (cs, sn) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    [c(cs, 0.), c(0., -sn), c(0., -sn), c(cs, 0.)]
}

pub fn ry(theta: f64) -> M1 {
    let (cs, sn) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    [c(cs, 0.), c(-sn, 0.), c(sn, 0.), c(cs, 0.)]
}

pub fn rz(theta: f64) -> M1 {
    [
        C::from_polar(1.0, -theta / 2.0),
        c(0., 0.),
        c(0., 0.),
        C::from_polar(1.0, theta / 2.0),
    ]
}

pub fn p(phi: f64) -> M1 {
    [c(1., 0.), c(0., 0.), c(0., 0.), C::from_polar(1.0, phi)]
}

pub fn swap() -> M2 {
    let mut m = [c(0., 0.); 16];
    m[0 * 4 + 0] = c(1., 0.);
    m[1 * 4 + 2] = c(1., 0.);
    m[2 * 4 + 1] = c(1., 0.);
    m[3 * 4 + 3] = c(1., 0.);
    m
}

/// `U^p` (half-turns), via eigendecomposition of the 2x2 unitary `U`.
///
/// `p = 1` returns `U` itself; `p = 0.5` is the principal square root.
pub fn fractional(u: &M1, p: f64) -> M1 {
    let matrix = DenseMatrix::from_row_major(2, 2, u);
    let hermitian_generator = hermitian_generator_of_unitary(&matrix);
    let scaled = hermitian_generator.scale(C::new(p, 0.0));
    let (values, vectors) = scaled
        .eig_hermitian()
        .expect("generator of a unitary 2x2 gate is always Hermitian");
    let exp_diag = DenseMatrix::from_fn(2, 2, |r, col| {
        if r == col {
            C::from_polar(1.0, values[r])
        } else {
            C::new(0.0, 0.0)
        }
    });
    let result = vectors.mul(&exp_diag).mul(&vectors.dagger());
    [
        result.get(0, 0),
        result.get(0, 1),
        result.get(1, 0),
        result.get(1, 1),
    ]
}

/// For a unitary `U = exp(i H)`, recovers a Hermitian `H` with eigenvalues
/// in `(-pi, pi]` (the branch `fractional` needs to exponentiate back at a
/// fractional power). `U` is unitary, so `U = V diag(e^{i θ_k}) V†`, and
/// `H = V diag(θ_k) V†`.
fn hermitian_generator_of_unitary(u: &DenseMatrix) -> DenseMatrix {
    // Diagonalize U directly: for 2x2 unitary U, U + U† is Hermitian and
    // commutes with U, so it shares eigenvectors; recover phases from the
    // diagonal action of U on those eigenvectors.
    let sum = u.add(&u.dagger());
    let (_, vectors) = sum
        .eig_hermitian()
        .expect("U + U† is always Hermitian for unitary U");
    let mut theta = [0.0_f64; 2];
    for k in 0..2 {
        let col = [vectors.get(0, k), vectors.get(1, k)];
        let image = u.mul_vec(&col);
        // image = e^{i theta} * col (col is an eigenvector of U too).
        let ratio = if col[0].norm() > col[1].norm() {
            image[0] / col[0]
        } else {
            image[1] / col[1]
        };
        theta[k] = ratio.arg();
    }
    let diag = DenseMatrix::from_fn(2, 2, |r, c2| {
        if r == c2 {
            C::new(theta[r], 0.0)
        } else {
            C::new(0.0, 0.0)
        }
    });
    vectors.mul(&diag).mul(&vectors.dagger())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{is_unitary_m1, EPS};

    #[test]
    fn catalog_is_unitary() {
        assert!(is_unitary_m1(&i(), 1e-8));
        assert!(is_unitary_m1(&x(), 1e-8));
        assert!(is_unitary_m1(&y(), 1e-8));
        assert!(is_unitary_m1(&z(), 1e-8));
        assert!(is_unitary_m1(&h(), 1e-8));
        assert!(is_unitary_m1(&s(), 1e-8));
        assert!(is_unitary_m1(&t(), 1e-8));
        assert!(is_unitary_m1(&rx(0.37), 1e-8));
        assert!(is_unitary_m1(&ry(1.2), 1e-8));
        assert!(is_unitary_m1(&rz(-0.8), 1e-8));
        assert!(is_unitary_m1(&p(0.9), 1e-8));
    }

    #[test]
    fn sqrt_x_squared_is_x() {
        let sx = sx();
        let matrix = DenseMatrix::from_row_major(2, 2, &sx);
        let squared = matrix.mul(&matrix);
        let x_ref = x();
        for idx in 0..4 {
            let (r, cidx) = (idx / 2, idx % 2);
            assert!((squared.get(r, cidx) - x_ref[idx]).norm() < 1e-8);
        }
    }

    #[test]
    fn h_is_involution() {
        let h_mat = DenseMatrix::from_row_major(2, 2, &h());
        let squared = h_mat.mul(&h_mat);
        assert!((squared.get(0, 0) - C::new(1.0, 0.0)).norm() < EPS * 10.0);
        assert!((squared.get(0, 1)).norm() < EPS * 10.0);
    }

    #[test]
    fn swap_matrix_permutes_basis() {
        let sw = swap();
        let v = [C::new(0., 0.), C::new(1., 0.), C::new(0., 0.), C::new(0., 0.)];
        let matrix = DenseMatrix::from_row_major(4, 4, &sw);
        let out = matrix.mul_vec(&v);
        assert_eq!(out, vec![C::new(0., 0.), C::new(0., 0.), C::new(1., 0.), C::new(0., 0.)]);
    }
}
