//! Coefficients of AsymUP acting on a single exponential term.
//!
//! For a term $\mathbf{v} = R_x e^{ry}\hat{x} + R_y e^{ry}\hat{y}$ the
//! operator's output is a combination of three basis waves,
//!
//! $$
//! (\mathrm{AsymUP}\,\mathbf{v})_\alpha
//!   = c^{\alpha}_{ry}\, e^{ry} + c^{\alpha}_{ik_y}\, e^{i k_y y}
//!   + c^{\alpha}_{-ik_y^*}\, e^{-i k_y^* y},
//!   \qquad \alpha \in \{x, y\},
//! $$
//!
//! so six scalar functions describe it completely. They are available through
//! the [`CoefficientModel`] trait in two forms:
//!
//! - [`ClosedForm`] — native complex arithmetic.
//! - [`Symbolic`] — the defining expressions in [`EXPRESSIONS`], parsed and
//!   compiled at construction.
//!
//! The functions have poles at $r = \pm i k_y$ and $r = \pm i k_y^*$. A term
//! sitting exactly on one of them is still meaningful when the singular parts
//! cancel; [`laurent_moments`] recovers its finite part and residue from a
//! circle around the pole.

pub mod closed_form;
pub mod symbolic;

pub use closed_form::ClosedForm;
pub use symbolic::Symbolic;

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::expr::ExprError;
use crate::types::{ExpTerm, OperatorParams};

/// Argument order shared by all six coefficient functions.
pub const ARGUMENTS: [&str; 9] = ["kx", "kyr", "kyi", "pr", "pi", "mf", "Rx", "Ry", "r"];

/// Defining expression of the x-polarised $e^{ry}$ coefficient.
pub const XPOL_RY: &str = "(kyi^4*(mf + pi)*Rx - 2*kyi*kyr*pr*r*(r*Rx - I*kx*Ry) + (kyr^2 + r^2)*(kyr^2*(mf + pi)*Rx + r*(mf*r*Rx + I*kx*pi*Ry)) + kyi^2*(2*kyr^2*(mf + pi)*Rx - r*(2*mf*r*Rx + pi*r*Rx + I*kx*pi*Ry)))/(kyi^4 + 2*kyi^2*(kyr^2 - r^2) + (kyr^2 + r^2)^2)";

/// Defining expression of the x-polarised $e^{ik_y y}$ coefficient.
pub const XPOL_IKY: &str = "-1/4*((pi + I*pr)*(kyi*Rx + I*(-(kyr*Rx) + kx*Ry)))/(kyi - I*kyr + r)";

/// Defining expression of the x-polarised $e^{-ik_y^* y}$ coefficient.
pub const XPOL_MIKYC: &str = "-1/4*((pi - I*pr)*(kyi*Rx + I*(kyr*Rx + kx*Ry)))/(kyi + I*kyr + r)";

/// Defining expression of the y-polarised $e^{ry}$ coefficient.
pub const YPOL_RY: &str = "(I*kx*r*(-(kyi^2*pi) + 2*kyi*kyr*pr + pi*(kyr^2 + r^2))*Rx + kx^2*(-(kyi^2*pi) + 2*kyi*kyr*pr + pi*(kyr^2 + r^2))*Ry + (mf + pi)*(kyi^4 + 2*kyi^2*(kyr^2 - r^2) + (kyr^2 + r^2)^2)*Ry)/(kyi^4 + 2*kyi^2*(kyr^2 - r^2) + (kyr^2 + r^2)^2)";

/// Defining expression of the y-polarised $e^{ik_y y}$ coefficient.
pub const YPOL_IKY: &str = "(kx*(pi + I*pr)*((-I)*kyi*Rx - kyr*Rx + kx*Ry))/(4*(kyi - I*kyr)*(kyi - I*kyr + r))";

/// Defining expression of the y-polarised $e^{-ik_y^* y}$ coefficient.
pub const YPOL_MIKYC: &str = "(kx*(pi - I*pr)*((-I)*kyi*Rx + kyr*Rx + kx*Ry))/(4*(kyi + I*kyr)*(kyi + I*kyr + r))";

/// The six expressions with their names, in the order
/// x: (ry, iky, mikyc), y: (ry, iky, mikyc).
pub const EXPRESSIONS: [(&str, &str); 6] = [
    ("xpol_ry", XPOL_RY),
    ("xpol_iky", XPOL_IKY),
    ("xpol_mikyc", XPOL_MIKYC),
    ("ypol_ry", YPOL_RY),
    ("ypol_iky", YPOL_IKY),
    ("ypol_mikyc", YPOL_MIKYC),
];

/// Selects one of the six coefficient functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coefficient {
    XpolRy,
    XpolIky,
    XpolMikyc,
    YpolRy,
    YpolIky,
    YpolMikyc,
}

impl Coefficient {
    /// All six, in [`EXPRESSIONS`] order.
    pub const ALL: [Coefficient; 6] = [
        Coefficient::XpolRy,
        Coefficient::XpolIky,
        Coefficient::XpolMikyc,
        Coefficient::YpolRy,
        Coefficient::YpolIky,
        Coefficient::YpolMikyc,
    ];

    /// Position in [`EXPRESSIONS`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        EXPRESSIONS[self.index()].0
    }

    pub fn source(self) -> &'static str {
        EXPRESSIONS[self.index()].1
    }
}

/// Weights of the three basis waves in one polarisation component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BasisCoefficients {
    /// Weight of $e^{ry}$.
    pub ry: Complex64,
    /// Weight of $e^{i k_y y}$.
    pub iky: Complex64,
    /// Weight of $e^{-i k_y^* y}$.
    pub mikyc: Complex64,
}

/// Basis weights for both polarisation components of a term's image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TermCoefficients {
    pub x: BasisCoefficients,
    pub y: BasisCoefficients,
}

impl TermCoefficients {
    /// Flatten in [`EXPRESSIONS`] order.
    pub fn to_array(&self) -> [Complex64; 6] {
        [
            self.x.ry,
            self.x.iky,
            self.x.mikyc,
            self.y.ry,
            self.y.iky,
            self.y.mikyc,
        ]
    }

    /// Inverse of [`Self::to_array`].
    pub fn from_array(values: [Complex64; 6]) -> Self {
        let [x_ry, x_iky, x_mikyc, y_ry, y_iky, y_mikyc] = values;
        Self {
            x: BasisCoefficients {
                ry: x_ry,
                iky: x_iky,
                mikyc: x_mikyc,
            },
            y: BasisCoefficients {
                ry: y_ry,
                iky: y_iky,
                mikyc: y_mikyc,
            },
        }
    }

    pub fn get(&self, which: Coefficient) -> Complex64 {
        self.to_array()[which.index()]
    }

    /// Largest modulus of the six weights.
    pub fn max_norm(&self) -> f64 {
        self.to_array().iter().map(|c| c.norm()).fold(0.0_f64, f64::max)
    }
}

/// Evaluates the six coefficient functions for a term.
pub trait CoefficientModel {
    /// Human-readable name of the model.
    fn name(&self) -> &str;

    /// Coefficients of AsymUP applied to `term`.
    fn coefficients(&self, params: &OperatorParams, term: &ExpTerm) -> TermCoefficients;
}

/// Relative distance within which an exponent counts as sitting on a pole.
pub const POLE_TOLERANCE: f64 = 1e-9;

/// Samples on the circle used by [`laurent_moments`].
const CONTOUR_POINTS: usize = 16;

/// Exponents where the coefficient functions are singular:
/// $i k_y$, $-i k_y$, $i k_y^*$, $-i k_y^*$.
pub fn singular_exponents(params: &OperatorParams) -> [Complex64; 4] {
    let iky = Complex64::i() * params.ky();
    let ikyc = Complex64::i() * params.ky().conj();
    [iky, -iky, ikyc, -ikyc]
}

/// If `r` sits on a singular exponent, the radius of a circle around it that
/// stays well clear of the other ones.
pub fn regularisation_radius(params: &OperatorParams, r: Complex64) -> Option<f64> {
    let scale = params.ky().norm().max(1.0);
    let exponents = singular_exponents(params);
    if !exponents.iter().any(|s| (s - r).norm() <= POLE_TOLERANCE * scale) {
        return None;
    }
    let nearest_other = exponents
        .iter()
        .map(|s| (s - r).norm())
        .filter(|d| *d > POLE_TOLERANCE * scale)
        .fold(f64::INFINITY, f64::min);
    Some(if nearest_other.is_finite() {
        0.2 * nearest_other
    } else {
        0.2 * scale
    })
}

/// Constant term and residue of the Laurent expansion of each coefficient
/// function around `term.r`.
#[derive(Debug, Clone, Copy)]
pub struct LaurentCoefficients {
    pub finite: TermCoefficients,
    pub residue: TermCoefficients,
}

/// Laurent moments of the coefficients from `CONTOUR_POINTS` samples on a
/// circle of `radius` around `term.r`.
///
/// Both moments converge geometrically as long as no other pole lies within
/// a few radii of `term.r`.
pub fn laurent_moments<M: CoefficientModel + ?Sized>(
    model: &M,
    params: &OperatorParams,
    term: &ExpTerm,
    radius: f64,
) -> LaurentCoefficients {
    let zero = Complex64::from(0.0);
    let mut finite = [zero; 6];
    let mut residue = [zero; 6];
    let n = CONTOUR_POINTS as f64;

    for k in 0..CONTOUR_POINTS {
        // Offset by half a step so no sample lands on the real axis.
        let offset = Complex64::from_polar(radius, 2.0 * PI * (k as f64 + 0.5) / n);
        let sample = ExpTerm::new(term.r + offset, term.rx, term.ry);
        let values = model.coefficients(params, &sample).to_array();
        for (i, v) in values.iter().enumerate() {
            finite[i] += v / n;
            residue[i] += v * offset / n;
        }
    }

    LaurentCoefficients {
        finite: TermCoefficients::from_array(finite),
        residue: TermCoefficients::from_array(residue),
    }
}

/// Selects a [`CoefficientModel`] implementation by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    #[default]
    ClosedForm,
    Symbolic,
}

impl ModelKind {
    /// Instantiate the selected model. Only the symbolic model can fail, when
    /// one of its expressions does not parse.
    pub fn build(self) -> Result<Box<dyn CoefficientModel>, ExprError> {
        Ok(match self {
            ModelKind::ClosedForm => Box::new(ClosedForm),
            ModelKind::Symbolic => Box::new(Symbolic::new()?),
        })
    }
}
