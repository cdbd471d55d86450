//! Completion of a partial isometry into a full unitary by Gram-Schmidt
//! orthonormalization.
//!
//! The input is a square matrix whose leading columns are (approximately)
//! orthonormal and whose remaining columns may be anything, including zero.
//! Columns are processed left to right; each one is made orthogonal to all
//! previously accepted columns and normalized. Columns that vanish, either on
//! input or after projection, are replaced by random vectors.
//!
//! ```
//! use nalgebra as na;
//! use num_complex::Complex64 as C64;
//! use rand::{ SeedableRng, rngs::StdRng };
//! use mps_encode::isometry::complete_unitary;
//!
//! let h = C64::from(std::f64::consts::FRAC_1_SQRT_2);
//! let z = C64::from(0.0);
//! // single column ∣+⟩
//! let partial = na::dmatrix!(h, z; h, z);
//! let mut rng = StdRng::seed_from_u64(10546);
//! let u = complete_unitary(&partial, &mut rng).unwrap();
//! let id = u.adjoint() * &u;
//! assert!((id - na::DMatrix::<C64>::identity(2, 2)).norm() < 1e-12);
//! assert!((u[(0, 0)] - h).norm() < 1e-12);
//! ```

use nalgebra as na;
use num_complex::Complex64 as C64;
use num_traits::One;
use rand::Rng;
use thiserror::Error;
use crate::ZERO_TOL;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IsometryError {
    /// Returned when the matrix to be completed is not square.
    #[error("error in unitary completion: expected a square matrix, got {0}×{1}")]
    NonSquare(usize, usize),
}
use IsometryError::*;
pub type IsometryResult<T> = Result<T, IsometryError>;

// real and imaginary parts each drawn uniformly from [-1, 1)
fn random_vector<R>(dim: usize, rng: &mut R) -> na::DVector<C64>
where R: Rng + ?Sized
{
    na::DVector::from_fn(dim, |_, _| {
        let re: f64 = rng.gen_range(-1.0..1.0);
        let im: f64 = rng.gen_range(-1.0..1.0);
        C64::new(re, im)
    })
}

// modified Gram-Schmidt with one re-orthogonalization pass
fn project_out(v: &mut na::DVector<C64>, basis: &[na::DVector<C64>]) {
    for _ in 0..2 {
        for b in basis.iter() {
            let c = b.dotc(v);
            v.axpy(-c, b, C64::one());
        }
    }
}

/// Complete a square matrix into a unitary of the same size.
///
/// Columns whose entries are all at most [`ZERO_TOL`] in magnitude are replaced
/// by fresh random vectors drawn from `rng`. If a column becomes degenerate
/// after projecting out the columns before it, random vectors are drawn until
/// a non-degenerate residual is found. Columns that are already orthonormal to
/// everything before them pass through unchanged (up to rounding), so the span
/// of an isometric prefix is preserved.
pub fn complete_unitary<R>(mat: &na::DMatrix<C64>, rng: &mut R)
    -> IsometryResult<na::DMatrix<C64>>
where R: Rng + ?Sized
{
    let (nrows, ncols) = mat.shape();
    if nrows != ncols { return Err(NonSquare(nrows, ncols)); }
    let dim = nrows;
    if dim == 0 { return Ok(na::DMatrix::zeros(0, 0)); }

    let mut basis: Vec<na::DVector<C64>> = Vec::with_capacity(dim);
    for col in mat.column_iter() {
        let mut v: na::DVector<C64> =
            if col.iter().all(|a| a.norm() <= ZERO_TOL) {
                random_vector(dim, rng)
            } else {
                col.clone_owned()
            };
        project_out(&mut v, &basis);
        let mut norm = v.norm();
        while norm < ZERO_TOL {
            v = random_vector(dim, rng);
            project_out(&mut v, &basis);
            norm = v.norm();
        }
        v.unscale_mut(norm);
        basis.push(v);
    }
    Ok(na::DMatrix::from_columns(&basis))
}
