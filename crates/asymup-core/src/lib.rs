//! # AsymUP Core
//!
//! Numerical verification of a closed-form inverse of the AsymUP operator
//! for TE-polarised waves at a single in-plane wavevector $k_x$.
//!
//! ## Architecture
//!
//! An inverse image is a sum of exponential terms $(R_x, R_y)e^{ry}$. Any
//! solver implementing [`solver::InverseSolver`] can produce one; the
//! built-in [`solver::halfspace::HalfspaceSolver`] does so by mode matching.
//! AsymUP is applied to each term through a [`coefficients::CoefficientModel`]
//! (closed form, or compiled from the defining expressions), and
//! [`check::check_inverse`] compares the result with the source
//! $S_1 = e^{i k_y y}(-k_x, k_x^2/k_y)$.
//!
//! ## Modules
//!
//! - [`types`] — Parameters, exponential terms, grids and waveforms.
//! - [`expr`] — Parser and evaluator for the coefficient expressions.
//! - [`coefficients`] — The six coefficient functions of AsymUP.
//! - [`operator`] — AsymUP acting on exponential fields.
//! - [`solver`] — Inverse-image solver trait and mode-matching implementation.
//! - [`check`] — Verification and parameterisation-equivalence drivers.

pub mod check;
pub mod coefficients;
pub mod expr;
pub mod operator;
pub mod solver;
pub mod types;
