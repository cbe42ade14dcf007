//! Core types shared across the AsymUP verification pipeline.
//!
//! This module defines the parameter bundle consumed by the coefficient
//! functions, the exponential terms that make up an inverse image, and the
//! sampled waveforms the verification compares.

use ndarray::{Array1, Array2, ArrayView1};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Default number of grid points along y.
pub const DEFAULT_GRID_POINTS: usize = 1000;

/// Default extent of the y grid.
pub const DEFAULT_YMAX: f64 = 10.0;

/// Material and phase factors derived from the susceptibility and the
/// phase of the bound.
///
/// $P = P_r + i P_i$ is the phase, and the material factor is
/// $m_f = \operatorname{Im}(P / \chi^*)$.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseFactors {
    /// $\operatorname{Re}(P)$.
    pub pr: f64,
    /// $\operatorname{Im}(P)$.
    pub pi: f64,
    /// Material factor $\operatorname{Im}(P / \chi^*)$.
    pub mf: f64,
}

impl PhaseFactors {
    /// Derive the factors from the susceptibility `chi` and the phase.
    pub fn from_physical(chi: Complex64, phase: Complex64) -> Self {
        Self {
            pr: phase.re,
            pi: phase.im,
            mf: (phase / chi.conj()).im,
        }
    }
}

/// Transverse wavevector from the dispersion relation
/// $k_y = \sqrt{k_0^2 - k_x^2}$ on the principal branch, so that
/// $\operatorname{Im}(k_y) \geq 0$ for evanescent components.
pub fn transverse_wavevector(k0: f64, kx: f64) -> Complex64 {
    Complex64::new(k0 * k0 - kx * kx, 0.0).sqrt()
}

/// Everything the six coefficient functions depend on, apart from the term
/// being mapped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatorParams {
    /// In-plane wavevector.
    pub kx: f64,
    /// $\operatorname{Re}(k_y)$.
    pub kyr: f64,
    /// $\operatorname{Im}(k_y)$.
    pub kyi: f64,
    /// $\operatorname{Re}(P)$.
    pub pr: f64,
    /// $\operatorname{Im}(P)$.
    pub pi: f64,
    /// Material factor $\operatorname{Im}(P / \chi^*)$.
    pub mf: f64,
}

impl OperatorParams {
    /// Build the parameter bundle from physical inputs.
    ///
    /// # Arguments
    /// * `chi` - Material susceptibility.
    /// * `phase` - Phase $P$ of the bound.
    /// * `k0` - Free-space wavenumber.
    /// * `kx` - In-plane wavevector of the Fourier component.
    pub fn from_physical(chi: Complex64, phase: Complex64, k0: f64, kx: f64) -> Self {
        let ky = transverse_wavevector(k0, kx);
        Self::new(kx, ky, PhaseFactors::from_physical(chi, phase))
    }

    pub fn new(kx: f64, ky: Complex64, factors: PhaseFactors) -> Self {
        Self {
            kx,
            kyr: ky.re,
            kyi: ky.im,
            pr: factors.pr,
            pi: factors.pi,
            mf: factors.mf,
        }
    }

    /// $k_y = k_{yr} + i k_{yi}$.
    pub fn ky(&self) -> Complex64 {
        Complex64::new(self.kyr, self.kyi)
    }

    /// The phase $P = P_r + i P_i$.
    pub fn phase(&self) -> Complex64 {
        Complex64::new(self.pr, self.pi)
    }

    /// Whether $e^{i k_y y}$ and $e^{-i k_y^* y}$ are the same function,
    /// which happens for purely evanescent components ($k_{yr} = 0$).
    pub fn exponentials_coincide(&self) -> bool {
        self.kyr.abs() <= 1e-12 * self.ky().norm().max(1.0)
    }

    /// Coefficients of the source $S_1 = e^{i k_y y}(-k_x, k_x^2/k_y)$.
    pub fn source_amplitudes(&self) -> [Complex64; 2] {
        let ky = self.ky();
        [Complex64::from(-self.kx), Complex64::from(self.kx * self.kx) / ky]
    }

    /// All inputs finite.
    pub fn is_finite(&self) -> bool {
        [self.kx, self.kyr, self.kyi, self.pr, self.pi, self.mf]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// One term $R_x e^{ry}\hat{x} + R_y e^{ry}\hat{y}$ of an inverse image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpTerm {
    /// Exponent $r$.
    pub r: Complex64,
    /// x amplitude.
    pub rx: Complex64,
    /// y amplitude.
    pub ry: Complex64,
}

impl ExpTerm {
    pub fn new(r: Complex64, rx: Complex64, ry: Complex64) -> Self {
        Self { r, rx, ry }
    }

    /// The same exponent with amplitudes scaled by `factor`.
    pub fn scaled(&self, factor: Complex64) -> Self {
        Self {
            r: self.r,
            rx: self.rx * factor,
            ry: self.ry * factor,
        }
    }
}

/// Equally spaced sample points on $[0, y_{\max}]$.
#[derive(Debug, Clone)]
pub struct YGrid {
    points: Array1<f64>,
}

impl YGrid {
    /// `n` points from 0 to `ymax` inclusive.
    ///
    /// # Panics
    /// Panics if `n < 2`.
    pub fn linspace(ymax: f64, n: usize) -> Self {
        assert!(n >= 2, "A grid needs at least 2 points, got {}", n);
        Self {
            points: Array1::linspace(0.0, ymax, n),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &Array1<f64> {
        &self.points
    }

    pub fn ymax(&self) -> f64 {
        self.points[self.points.len() - 1]
    }

    /// $e^{\alpha y}$ sampled on the grid.
    pub fn exp(&self, alpha: Complex64) -> Array1<Complex64> {
        self.points.mapv(|y| (alpha * y).exp())
    }
}

impl Default for YGrid {
    fn default() -> Self {
        Self::linspace(DEFAULT_YMAX, DEFAULT_GRID_POINTS)
    }
}

/// A TE field sampled on a [`YGrid`], shape (2, N): row 0 is the x
/// component, row 1 the y component.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub values: Array2<Complex64>,
}

impl Waveform {
    pub fn zeros(len: usize) -> Self {
        Self {
            values: Array2::zeros((2, len)),
        }
    }

    /// Build from separately sampled components.
    ///
    /// # Panics
    /// Panics if the components have different lengths.
    pub fn from_components(x: Array1<Complex64>, y: Array1<Complex64>) -> Self {
        assert_eq!(x.len(), y.len(), "Component lengths must match");
        let mut values = Array2::zeros((2, x.len()));
        values.row_mut(0).assign(&x);
        values.row_mut(1).assign(&y);
        Self { values }
    }

    /// The source $S_1 = e^{i k_y y}(-k_x, k_x^2/k_y)$.
    pub fn source(grid: &YGrid, params: &OperatorParams) -> Self {
        let exp_iky = grid.exp(Complex64::i() * params.ky());
        let [sx, sy] = params.source_amplitudes();
        Self::from_components(exp_iky.mapv(|e| sx * e), exp_iky.mapv(|e| sy * e))
    }

    /// The raw field of one term, $(R_x e^{ry}, R_y e^{ry})$.
    pub fn of_term(grid: &YGrid, term: &ExpTerm) -> Self {
        let exp_ry = grid.exp(term.r);
        Self::from_components(exp_ry.mapv(|e| term.rx * e), exp_ry.mapv(|e| term.ry * e))
    }

    /// The raw field of a whole term list.
    pub fn of_terms(grid: &YGrid, terms: &[ExpTerm]) -> Self {
        let mut wave = Self::zeros(grid.len());
        for term in terms {
            wave.accumulate(&Self::of_term(grid, term));
        }
        wave
    }

    pub fn len(&self) -> usize {
        self.values.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x(&self) -> ArrayView1<'_, Complex64> {
        self.values.row(0)
    }

    pub fn y(&self) -> ArrayView1<'_, Complex64> {
        self.values.row(1)
    }

    /// Add `other` in place.
    pub fn accumulate(&mut self, other: &Waveform) {
        self.values += &other.values;
    }

    /// Largest modulus over both components.
    pub fn max_norm(&self) -> f64 {
        self.values.iter().map(|v| v.norm()).fold(0.0_f64, f64::max)
    }

    /// Largest pointwise modulus of `self - other`.
    pub fn max_abs_diff(&self, other: &Waveform) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).norm())
            .fold(0.0_f64, f64::max)
    }

    /// [`Self::max_abs_diff`] scaled by the largest modulus of `reference`.
    /// Falls back to the absolute difference for a vanishing reference.
    pub fn relative_diff(&self, reference: &Waveform) -> f64 {
        let diff = self.max_abs_diff(reference);
        let scale = reference.max_norm();
        if scale > 0.0 {
            diff / scale
        } else {
            diff
        }
    }
}
