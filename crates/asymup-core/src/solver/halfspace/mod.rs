//! Half-space mode-matching solver.
//!
//! The inverse image is sought as a combination of the bounded modes of
//! AsymUP (see [`modes`]). Each mode maps onto pure $e^{i k_y y}$ and
//! $e^{-i k_y^* y}$ terms, so matching $S_1$ reduces to a small linear
//! system in the mode amplitudes $\beta_j$:
//!
//! $$
//! \sum_j \beta_j\, c^x_{ik_y}(\mathbf{R}_j) = -k_x, \qquad
//! \sum_j \beta_j\, c^x_{-ik_y^*}(\mathbf{R}_j) = 0.
//! $$
//!
//! The y-component weights are $-k_x/k_y$ times the x-component ones for
//! every mode, so balancing x balances y as well. When $k_{yr} = 0$ the two
//! exponentials coincide and the rows merge into one.
//!
//! If the modes alone cannot balance $S_1$ (no modes, or an inconsistent
//! system) the basis is widened by the bounded terms on the source
//! exponents from [`resonant`], and both components are balanced. Such a
//! term also contributes the finite part of its own $e^{ry}$ weight to the
//! row of its exponential.
//!
//! An image is returned only when it is unique: a balance system whose rank
//! falls short of the number of distinct directions fails with
//! [`SolverError::NonUniqueImage`]. [`modes::image_regime`] predicts the
//! outcome from the parameters alone.

pub mod direct;
pub mod lstsq;
pub mod modes;
pub mod resonant;

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use super::{InverseImage, InverseSolver, Parameterization, SolverError};
use crate::coefficients::{ClosedForm, CoefficientModel, TermCoefficients, POLE_TOLERANCE};
use crate::types::{ExpTerm, OperatorParams, PhaseFactors};
use modes::Mode;
use resonant::ResonantTerm;

/// Mode-matching inverse solver for a homogeneous half-space.
#[derive(Debug, Clone)]
pub struct HalfspaceSolver {
    /// Relative distance below which a root counts as a pole of AsymUP.
    /// Also the relative singular value below which a polarisation on a
    /// source exponent counts as bounded.
    pub root_tolerance: f64,
    /// Relative singular value cutoff for least-squares solves.
    pub rank_tolerance: f64,
    /// Largest accepted relative residual of the balance conditions.
    pub residual_tolerance: f64,
}

impl Default for HalfspaceSolver {
    fn default() -> Self {
        Self {
            root_tolerance: 1e-8,
            rank_tolerance: 1e-10,
            residual_tolerance: 1e-8,
        }
    }
}

/// One column of the balance system.
struct Column {
    term: ExpTerm,
    weights: TermCoefficients,
    /// Set for terms on a source exponent, whose own weight lands on a
    /// boundary row.
    resonant: bool,
}

impl Column {
    fn mode(params: &OperatorParams, term: ExpTerm) -> Self {
        Self {
            weights: ClosedForm.coefficients(params, &term),
            term,
            resonant: false,
        }
    }

    fn resonant(params: &OperatorParams, term: &ResonantTerm) -> Option<Self> {
        let term = term.term();
        let moments = resonant::moments_on_pole(params, &term)?;
        Some(Self {
            term,
            weights: moments.finite,
            resonant: true,
        })
    }
}

/// The balance system for a given set of basis terms.
struct BalanceSystem {
    matrix: Array2<Complex64>,
    rhs: Array1<Complex64>,
    basis: Vec<ExpTerm>,
}

impl BalanceSystem {
    fn build(params: &OperatorParams, columns: Vec<Column>, with_y_rows: bool) -> Self {
        let merged = params.exponentials_coincide();
        let exponents = resonant::source_exponents(params);
        let [sx, sy] = params.source_amplitudes();
        let zero = Complex64::from(0.0);
        let scale = params.ky().norm().max(1.0);

        let mut components = vec![(0usize, sx)];
        if with_y_rows {
            components.push((1, sy));
        }

        let mut rows: Vec<(Vec<Complex64>, Complex64)> = Vec::new();
        for (component, target) in components {
            let pick = |w: &TermCoefficients| if component == 0 { w.x } else { w.y };
            for (k, exponent) in exponents.iter().enumerate() {
                let row = columns
                    .iter()
                    .map(|col| {
                        let w = pick(&col.weights);
                        let mut value = if merged {
                            w.iky + w.mikyc
                        } else if k == 0 {
                            w.iky
                        } else {
                            w.mikyc
                        };
                        if col.resonant && (col.term.r - exponent).norm() <= POLE_TOLERANCE * scale {
                            value += w.ry;
                        }
                        value
                    })
                    .collect();
                rows.push((row, if k == 0 { target } else { zero }));
            }
        }

        let ncols = columns.len();
        let mut matrix = Array2::zeros((rows.len(), ncols));
        let mut rhs = Array1::zeros(rows.len());
        for (i, (row, target)) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                matrix[[i, j]] = v;
            }
            rhs[i] = target;
        }

        Self {
            matrix,
            rhs,
            basis: columns.into_iter().map(|c| c.term).collect(),
        }
    }

    fn relative_residual(&self, beta: &Array1<Complex64>) -> f64 {
        let residual = self.matrix.dot(beta) - &self.rhs;
        let r = residual.iter().map(|v| v.norm_sqr()).sum::<f64>().sqrt();
        let b = self.rhs.iter().map(|v| v.norm_sqr()).sum::<f64>().sqrt();
        if b > 0.0 {
            r / b
        } else {
            r
        }
    }
}

/// Outcome of solving one balance system.
struct Solved {
    beta: Array1<Complex64>,
    rank: usize,
    residual: f64,
}

impl HalfspaceSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(&self, params: &OperatorParams) -> Result<(), SolverError> {
        if !params.is_finite() {
            return Err(SolverError::InvalidParameters(format!(
                "Non-finite operator parameters: {:?}",
                params
            )));
        }
        if params.ky().norm() < 1e-14 {
            return Err(SolverError::InvalidParameters(format!(
                "ky vanishes at kx = {}, so the source kx^2/ky is singular",
                params.kx
            )));
        }
        if params.mf == 0.0 {
            return Err(SolverError::InvalidParameters(
                "Material factor Im(P / conj(chi)) is zero".to_string(),
            ));
        }
        Ok(())
    }

    fn mode_columns(
        params: &OperatorParams,
        modes: &[Mode],
        parameterization: Parameterization,
    ) -> Vec<Column> {
        let column = |r: Complex64, v: [Complex64; 2]| Column::mode(params, ExpTerm::new(r, v[0], v[1]));
        match parameterization {
            Parameterization::Primary => modes.iter().map(|m| column(m.r, m.polarisation())).collect(),
            Parameterization::Alternate => modes
                .iter()
                .flat_map(|m| [column(m.r, m.x_polarisation), column(m.r, m.y_polarisation)])
                .collect(),
        }
    }

    /// Least squares for the rank; LU for the amplitudes when the system is
    /// square and regular.
    fn solve(&self, system: &BalanceSystem, parameterization: Parameterization) -> Result<Solved, SolverError> {
        let (nrows, ncols) = system.matrix.dim();
        let ls = lstsq::solve_min_norm(&system.matrix, &system.rhs, self.rank_tolerance)?;

        let mut beta = ls.solution;
        if parameterization == Parameterization::Primary && nrows == ncols && ls.rank == ncols {
            match direct::solve_direct(&system.matrix, &system.rhs) {
                Ok(solution) => beta = solution,
                Err(e) => log::debug!("LU failed ({}), keeping the least-squares amplitudes", e),
            }
        }

        let residual = system.relative_residual(&beta);
        Ok(Solved {
            beta,
            rank: ls.rank,
            residual,
        })
    }

    fn image(
        &self,
        params: &OperatorParams,
        system: BalanceSystem,
        solved: Solved,
        directions: usize,
        parameterization: Parameterization,
    ) -> Result<InverseImage, SolverError> {
        if solved.rank < directions {
            return Err(SolverError::NonUniqueImage {
                kx: params.kx,
                free_parameters: directions - solved.rank,
            });
        }

        let unknowns = system.basis.len();
        let terms = system
            .basis
            .iter()
            .zip(solved.beta.iter())
            .map(|(t, b)| t.scaled(*b))
            .collect();

        Ok(InverseImage {
            terms,
            parameterization,
            unknowns,
            directions,
            rank: solved.rank,
            residual: solved.residual,
        })
    }
}

impl InverseSolver for HalfspaceSolver {
    fn inverse_image(
        &self,
        params: &OperatorParams,
        parameterization: Parameterization,
    ) -> Result<InverseImage, SolverError> {
        self.validate(params)?;

        if params.kx == 0.0 {
            log::debug!("kx = 0: the source vanishes, returning an empty image");
            return Ok(InverseImage {
                terms: Vec::new(),
                parameterization,
                unknowns: 0,
                directions: 0,
                rank: 0,
                residual: 0.0,
            });
        }

        let modes = modes::bounded_modes(params, self.root_tolerance);
        log::debug!(
            "kx = {}: {} bounded mode(s) {:?}",
            params.kx,
            modes.len(),
            modes.iter().map(|m| m.r).collect::<Vec<_>>()
        );

        let alternate = parameterization == Parameterization::Alternate;
        let mut residual = f64::INFINITY;

        if !modes.is_empty() {
            let system = BalanceSystem::build(
                params,
                Self::mode_columns(params, &modes, parameterization),
                alternate,
            );
            let solved = self.solve(&system, parameterization)?;
            if solved.residual <= self.residual_tolerance {
                return self.image(params, system, solved, modes.len(), parameterization);
            }
            log::debug!(
                "kx = {}: modes leave residual {:.2e}, adding terms on the source exponents",
                params.kx,
                solved.residual
            );
            residual = solved.residual;
        }

        let bounded = resonant::resonant_terms(params, self.root_tolerance);
        if modes.is_empty() && bounded.is_empty() {
            return Err(SolverError::NoAdmissibleModes { kx: params.kx });
        }

        let extra: Vec<Column> = bounded.iter().filter_map(|t| Column::resonant(params, t)).collect();
        let directions = modes.len() + extra.len();
        let mut columns = Self::mode_columns(params, &modes, parameterization);
        columns.extend(extra);
        let system = BalanceSystem::build(params, columns, true);
        let solved = self.solve(&system, parameterization)?;

        if !(solved.residual <= self.residual_tolerance) {
            log::warn!(
                "kx = {}: no bounded image (residual {:.2e} with modes only, {:.2e} with {} source-exponent term(s))",
                params.kx,
                residual,
                solved.residual,
                bounded.len()
            );
            return Err(SolverError::InconsistentBalance {
                residual: solved.residual,
            });
        }

        self.image(params, system, solved, directions, parameterization)
    }

    fn method_name(&self) -> &str {
        "Half-space mode matching"
    }
}

/// Inverse image of $S_1$ as `(r_list, Rx_list, Ry_list)`.
///
/// # Arguments
/// * `chi` - Material susceptibility.
/// * `phase` - Phase $P$ of the bound.
/// * `k0` - Free-space wavenumber.
/// * `kx` - In-plane wavevector.
/// * `use_test_params` - Select [`Parameterization::Alternate`].
pub fn inverse_image_lists(
    chi: Complex64,
    phase: Complex64,
    k0: f64,
    kx: f64,
    use_test_params: bool,
) -> Result<(Vec<Complex64>, Vec<Complex64>, Vec<Complex64>), SolverError> {
    let params = OperatorParams::new(
        kx,
        crate::types::transverse_wavevector(k0, kx),
        PhaseFactors::from_physical(chi, phase),
    );
    let image = HalfspaceSolver::default()
        .inverse_image(&params, Parameterization::from_test_flag(use_test_params))?;
    Ok(image.to_lists())
}
