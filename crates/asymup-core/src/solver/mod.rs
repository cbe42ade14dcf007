//! Inverse-image solver abstraction and implementations.
//!
//! The [`InverseSolver`] trait defines the interface for anything that can
//! produce a candidate inverse image of the source
//! $S_1 = e^{i k_y y}(-k_x\hat{x} + \frac{k_x^2}{k_y}\hat{y})$ under AsymUP,
//! expressed as a list of exponential terms. The verification drivers in
//! [`crate::check`] only depend on this trait.

pub mod halfspace;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expr::ExprError;
use crate::types::{ExpTerm, OperatorParams, Waveform, YGrid};

/// Errors that can occur while computing an inverse image.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("No bounded exponential mode found for kx = {kx}")]
    NoAdmissibleModes { kx: f64 },

    #[error("Balance conditions cannot be met (relative residual: {residual:.2e})")]
    InconsistentBalance { residual: f64 },

    #[error("Inverse image is not unique at kx = {kx}: AsymUP annihilates {free_parameters} bounded combination(s) of the image terms")]
    NonUniqueImage { kx: f64, free_parameters: usize },

    #[error("Linear algebra error: {0}")]
    LinAlgError(String),

    #[error("Coefficient expression error: {0}")]
    Expression(#[from] ExprError),
}

/// How the free parameters of the inverse image are laid out.
///
/// Both choices describe the same inverse image; they differ in how many
/// terms carry it and how the amplitudes are split between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Parameterization {
    /// One polarisation per mode, fixed by x-component balance.
    #[default]
    Primary,
    /// Two polarisations per mode and full x/y balance. The two null
    /// vectors of a mode are parallel, so the parameter system is rank
    /// deficient by one per mode and resolved by its minimum-norm solution.
    Alternate,
}

impl Parameterization {
    /// Map the boolean "use test parameters" switch onto a parameterisation.
    pub fn from_test_flag(use_test_params: bool) -> Self {
        if use_test_params {
            Parameterization::Alternate
        } else {
            Parameterization::Primary
        }
    }

    pub fn uses_test_params(self) -> bool {
        self == Parameterization::Alternate
    }
}

/// A candidate inverse image $\sum_i (R_{x,i}\hat{x} + R_{y,i}\hat{y})e^{r_i y}$.
#[derive(Debug, Clone, Serialize)]
pub struct InverseImage {
    /// Exponential terms, in no particular order.
    pub terms: Vec<ExpTerm>,
    /// Parameterisation that produced the terms.
    pub parameterization: Parameterization,
    /// Number of amplitudes in the balance system.
    pub unknowns: usize,
    /// Number of distinct field directions the terms can carry. Less than
    /// `unknowns` when a parameterisation repeats a direction.
    pub directions: usize,
    /// Numerical rank of the balance system.
    pub rank: usize,
    /// Relative residual of the balance conditions.
    pub residual: f64,
}

impl InverseImage {
    /// Field directions left undetermined by the balance conditions.
    ///
    /// Always zero for images returned by [`halfspace::HalfspaceSolver`],
    /// which reports a non-unique image as [`SolverError::NonUniqueImage`].
    pub fn free_parameters(&self) -> usize {
        self.directions.saturating_sub(self.rank)
    }

    /// Amplitudes spent on repeated directions.
    pub fn redundant_parameters(&self) -> usize {
        self.unknowns.saturating_sub(self.directions)
    }

    /// Split into `(r_list, Rx_list, Ry_list)`.
    pub fn to_lists(&self) -> (Vec<Complex64>, Vec<Complex64>, Vec<Complex64>) {
        let r = self.terms.iter().map(|t| t.r).collect();
        let rx = self.terms.iter().map(|t| t.rx).collect();
        let ry = self.terms.iter().map(|t| t.ry).collect();
        (r, rx, ry)
    }

    /// The inverse image sampled on `grid`.
    pub fn waveform(&self, grid: &YGrid) -> Waveform {
        Waveform::of_terms(grid, &self.terms)
    }
}

/// Produces inverse images of the source $S_1$.
pub trait InverseSolver {
    /// Compute the inverse image of $S_1$ for the given operator parameters.
    fn inverse_image(
        &self,
        params: &OperatorParams,
        parameterization: Parameterization,
    ) -> Result<InverseImage, SolverError>;

    /// Human-readable name of the method.
    fn method_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_flag_mapping() {
        assert_eq!(Parameterization::from_test_flag(false), Parameterization::Primary);
        assert_eq!(Parameterization::from_test_flag(true), Parameterization::Alternate);
        assert!(Parameterization::Alternate.uses_test_params());
        assert!(!Parameterization::Primary.uses_test_params());
    }

    #[test]
    fn test_lists_keep_term_order() {
        let terms = vec![
            ExpTerm::new(Complex64::new(-1.0, 0.0), Complex64::new(1.0, 0.0), Complex64::new(2.0, 0.0)),
            ExpTerm::new(Complex64::new(0.0, 1.0), Complex64::new(3.0, 0.0), Complex64::new(4.0, 0.0)),
        ];
        let image = InverseImage {
            terms,
            parameterization: Parameterization::Primary,
            unknowns: 2,
            directions: 2,
            rank: 2,
            residual: 0.0,
        };
        let (r, rx, ry) = image.to_lists();
        assert_eq!(r, vec![Complex64::new(-1.0, 0.0), Complex64::new(0.0, 1.0)]);
        assert_eq!(rx[1].re, 3.0);
        assert_eq!(ry[0].re, 2.0);
        assert_eq!(image.free_parameters(), 0);
        assert_eq!(image.redundant_parameters(), 0);
    }

    #[test]
    fn test_repeated_directions_are_not_free() {
        let image = InverseImage {
            terms: Vec::new(),
            parameterization: Parameterization::Alternate,
            unknowns: 4,
            directions: 2,
            rank: 2,
            residual: 0.0,
        };
        assert_eq!(image.free_parameters(), 0);
        assert_eq!(image.redundant_parameters(), 2);

        let short = InverseImage { rank: 1, ..image };
        assert_eq!(short.free_parameters(), 1);
    }

    #[test]
    fn test_non_unique_message_names_kx() {
        let e = SolverError::NonUniqueImage {
            kx: 1.2,
            free_parameters: 1,
        };
        let message = e.to_string();
        assert!(message.contains("kx = 1.2"));
        assert!(message.contains("1 bounded combination"));
    }

    #[test]
    fn test_parameterization_serde_names() {
        use serde::de::value::{Error, StrDeserializer};
        use serde::de::IntoDeserializer;

        let de: StrDeserializer<Error> = "alternate".into_deserializer();
        assert_eq!(Parameterization::deserialize(de).unwrap(), Parameterization::Alternate);
        let de: StrDeserializer<Error> = "primary".into_deserializer();
        assert_eq!(Parameterization::deserialize(de).unwrap(), Parameterization::Primary);
    }
}
