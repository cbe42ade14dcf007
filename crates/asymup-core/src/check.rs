//! Verification drivers.
//!
//! [`check_inverse`] applies AsymUP to a solver's inverse image and compares
//! the result with the source $S_1$. [`check_parameterisation_equivalence`]
//! solves with both parameterisations and measures how far the two images
//! (and their reconstructions) drift apart.

use num_complex::Complex64;
use serde::Serialize;

use crate::coefficients::CoefficientModel;
use crate::operator::apply_to_image;
use crate::solver::{InverseImage, InverseSolver, Parameterization, SolverError};
use crate::types::{
    transverse_wavevector, ExpTerm, OperatorParams, PhaseFactors, Waveform, YGrid,
    DEFAULT_GRID_POINTS, DEFAULT_YMAX,
};

/// Inputs for one verification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheckSetup {
    pub chi: Complex64,
    pub phase: Complex64,
    pub k0: f64,
    pub kx: f64,
    pub ymax: f64,
    pub points: usize,
    pub parameterization: Parameterization,
}

impl Default for CheckSetup {
    fn default() -> Self {
        Self {
            chi: Complex64::new(1.0, 0.1),
            phase: Complex64::new(0.2, 0.3),
            k0: 1.0,
            kx: 0.5,
            ymax: DEFAULT_YMAX,
            points: DEFAULT_GRID_POINTS,
            parameterization: Parameterization::Primary,
        }
    }
}

impl CheckSetup {
    pub fn ky(&self) -> Complex64 {
        transverse_wavevector(self.k0, self.kx)
    }

    pub fn params(&self) -> OperatorParams {
        OperatorParams::new(self.kx, self.ky(), PhaseFactors::from_physical(self.chi, self.phase))
    }

    pub fn grid(&self) -> YGrid {
        YGrid::linspace(self.ymax, self.points)
    }

    /// Reject grids that [`YGrid::linspace`] cannot build.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.points < 2 {
            return Err(SolverError::InvalidParameters(format!(
                "A grid needs at least 2 points, got {}",
                self.points
            )));
        }
        if !(self.ymax.is_finite() && self.ymax > 0.0) {
            return Err(SolverError::InvalidParameters(format!(
                "ymax must be positive and finite, got {}",
                self.ymax
            )));
        }
        Ok(())
    }

    pub fn with_kx(&self, kx: f64) -> Self {
        Self { kx, ..*self }
    }

    pub fn with_parameterization(&self, parameterization: Parameterization) -> Self {
        Self {
            parameterization,
            ..*self
        }
    }
}

/// Everything produced by [`check_inverse`].
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub setup: CheckSetup,
    pub ky: Complex64,
    pub grid: YGrid,
    pub image: InverseImage,
    /// $S_1$ on the grid.
    pub reference: Waveform,
    /// AsymUP applied to the inverse image.
    pub reconstructed: Waveform,
    /// The inverse image itself, $\sum (R_x e^{ry}, R_y e^{ry})$.
    pub inverse: Waveform,
    pub max_abs_error: f64,
    /// `max_abs_error` relative to $\max |S_1|$.
    pub relative_error: f64,
    pub method: String,
    pub model: String,
}

/// Serializable digest of a [`VerificationReport`].
#[derive(Debug, Clone, Serialize)]
pub struct VerificationSummary {
    pub kx: f64,
    pub ky: Complex64,
    pub parameterization: Parameterization,
    pub method: String,
    pub model: String,
    pub terms: Vec<ExpTerm>,
    pub free_parameters: usize,
    pub balance_residual: f64,
    pub max_abs_error: f64,
    pub relative_error: f64,
}

impl VerificationReport {
    pub fn passes(&self, tolerance: f64) -> bool {
        self.relative_error <= tolerance
    }

    pub fn summary(&self) -> VerificationSummary {
        VerificationSummary {
            kx: self.setup.kx,
            ky: self.ky,
            parameterization: self.image.parameterization,
            method: self.method.clone(),
            model: self.model.clone(),
            terms: self.image.terms.clone(),
            free_parameters: self.image.free_parameters(),
            balance_residual: self.image.residual,
            max_abs_error: self.max_abs_error,
            relative_error: self.relative_error,
        }
    }
}

/// Apply AsymUP to the solver's inverse image of $S_1$ and compare with $S_1$.
pub fn check_inverse<S, M>(
    solver: &S,
    model: &M,
    setup: &CheckSetup,
) -> Result<VerificationReport, SolverError>
where
    S: InverseSolver + ?Sized,
    M: CoefficientModel + ?Sized,
{
    setup.validate()?;
    let params = setup.params();
    let ky = params.ky();
    log::info!("kx = {}, ky = {}", setup.kx, ky);

    let image = solver.inverse_image(&params, setup.parameterization)?;
    log::debug!("{} term(s) from {}", image.terms.len(), solver.method_name());

    let grid = setup.grid();
    let reference = Waveform::source(&grid, &params);
    let reconstructed = apply_to_image(model, &grid, &params, &image.terms);
    let inverse = image.waveform(&grid);

    let max_abs_error = reconstructed.max_abs_diff(&reference);
    let relative_error = reconstructed.relative_diff(&reference);

    Ok(VerificationReport {
        setup: *setup,
        ky,
        grid,
        image,
        reference,
        reconstructed,
        inverse,
        max_abs_error,
        relative_error,
        method: solver.method_name().to_string(),
        model: model.name().to_string(),
    })
}

/// Both parameterisations of the same inverse image.
#[derive(Debug, Clone)]
pub struct EquivalenceReport {
    pub primary: VerificationReport,
    pub alternate: VerificationReport,
    /// Relative deviation between the two inverse-image waveforms.
    pub image_deviation: f64,
    /// Relative deviation between the two reconstructions.
    pub reconstruction_deviation: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EquivalenceSummary {
    pub kx: f64,
    pub primary: VerificationSummary,
    pub alternate: VerificationSummary,
    pub image_deviation: f64,
    pub reconstruction_deviation: f64,
}

impl EquivalenceReport {
    pub fn agrees(&self, tolerance: f64) -> bool {
        self.image_deviation <= tolerance && self.reconstruction_deviation <= tolerance
    }

    pub fn summary(&self) -> EquivalenceSummary {
        EquivalenceSummary {
            kx: self.primary.setup.kx,
            primary: self.primary.summary(),
            alternate: self.alternate.summary(),
            image_deviation: self.image_deviation,
            reconstruction_deviation: self.reconstruction_deviation,
        }
    }
}

/// Solve with [`Parameterization::Primary`] and
/// [`Parameterization::Alternate`] and compare the results.
///
/// The parameterisation in `setup` is ignored.
pub fn check_parameterisation_equivalence<S, M>(
    solver: &S,
    model: &M,
    setup: &CheckSetup,
) -> Result<EquivalenceReport, SolverError>
where
    S: InverseSolver + ?Sized,
    M: CoefficientModel + ?Sized,
{
    let primary = check_inverse(
        solver,
        model,
        &setup.with_parameterization(Parameterization::Primary),
    )?;
    let alternate = check_inverse(
        solver,
        model,
        &setup.with_parameterization(Parameterization::Alternate),
    )?;

    let image_deviation = alternate.inverse.relative_diff(&primary.inverse);
    let reconstruction_deviation = alternate.reconstructed.relative_diff(&primary.reconstructed);
    log::info!(
        "kx = {}: {} vs {} terms, image deviation {:.2e}",
        setup.kx,
        primary.image.terms.len(),
        alternate.image.terms.len(),
        image_deviation
    );

    Ok(EquivalenceReport {
        primary,
        alternate,
        image_deviation,
        reconstruction_deviation,
    })
}
