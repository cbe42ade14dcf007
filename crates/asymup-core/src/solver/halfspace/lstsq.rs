//! Minimum-norm least-squares solve for non-square or rank-deficient
//! balance systems, via the SVD in `nalgebra`.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::solver::SolverError;

/// Solution of a least-squares balance problem.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    pub solution: Array1<Complex64>,
    /// Number of singular values above the cutoff.
    pub rank: usize,
}

/// Minimum-norm $\boldsymbol{\beta}$ minimising
/// $\|\mathbf{A}\boldsymbol{\beta} - \mathbf{b}\|$.
///
/// Singular values below `rel_cutoff` times the largest one are treated as
/// zero.
pub fn solve_min_norm(
    matrix: &Array2<Complex64>,
    rhs: &Array1<Complex64>,
    rel_cutoff: f64,
) -> Result<LeastSquares, SolverError> {
    let (rows, cols) = matrix.dim();
    if rows != rhs.len() {
        return Err(SolverError::LinAlgError(format!(
            "{} balance rows but {} right-hand side entries",
            rows,
            rhs.len()
        )));
    }

    if rows == 0 || cols == 0 {
        return Ok(LeastSquares {
            solution: Array1::zeros(cols),
            rank: 0,
        });
    }

    let a = DMatrix::<Complex64>::from_fn(rows, cols, |i, j| matrix[[i, j]]);
    let b = DVector::<Complex64>::from_fn(rows, |i, _| rhs[i]);

    let svd = a.svd(true, true);
    let largest = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    let eps = largest * rel_cutoff;
    let rank = svd.rank(eps);

    log::trace!(
        "SVD of {}x{} balance matrix: singular values {:?}",
        rows,
        cols,
        svd.singular_values.as_slice()
    );

    let x = svd
        .solve(&b, eps)
        .map_err(|e| SolverError::LinAlgError(e.to_string()))?;

    Ok(LeastSquares {
        solution: x.iter().cloned().collect(),
        rank,
    })
}
