//! Direct solve of a square balance system.
//!
//! LU decomposition with partial pivoting via `faer`. The balance systems
//! hold at most a handful of amplitudes, so no iterative fallback exists;
//! the caller falls back to least squares instead.

use faer::complex_native::c64;
use faer::linalg::solvers::SpSolver;
use faer::{Col, Mat};
use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::solver::SolverError;

fn to_faer(c: Complex64) -> c64 {
    c64::new(c.re, c.im)
}

fn from_faer(c: c64) -> Complex64 {
    Complex64::new(c.re, c.im)
}

fn faer_matrix(matrix: &Array2<Complex64>) -> Mat<c64> {
    Mat::from_fn(matrix.nrows(), matrix.ncols(), |i, j| to_faer(matrix[[i, j]]))
}

fn faer_column(values: &Array1<Complex64>) -> Col<c64> {
    Col::from_fn(values.len(), |i| to_faer(values[i]))
}

/// Solve the square system $\mathbf{A}\boldsymbol{\beta} = \mathbf{b}$.
///
/// # Errors
/// [`SolverError::LinAlgError`] for a non-square matrix, a right-hand side
/// of the wrong length, or non-finite amplitudes (how a singular matrix
/// shows up after pivoting).
pub fn solve_direct(
    matrix: &Array2<Complex64>,
    rhs: &Array1<Complex64>,
) -> Result<Array1<Complex64>, SolverError> {
    let (rows, cols) = matrix.dim();
    if rows != cols || rhs.len() != rows {
        return Err(SolverError::LinAlgError(format!(
            "LU needs a square system, got {}x{} with {} right-hand side entries",
            rows,
            cols,
            rhs.len()
        )));
    }

    let lu = faer_matrix(matrix).partial_piv_lu();
    let beta = lu.solve(&faer_column(rhs));
    let solution: Array1<Complex64> = (0..rows).map(|i| from_faer(beta[i])).collect();

    if solution.iter().any(|c| !c.is_finite()) {
        return Err(SolverError::LinAlgError("Singular balance matrix".to_string()));
    }
    Ok(solution)
}
