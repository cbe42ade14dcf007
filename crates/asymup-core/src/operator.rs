//! AsymUP acting on exponential fields, sampled on a grid.
//!
//! For a term $\mathbf{v} = R_x e^{ry}\hat{x} + R_y e^{ry}\hat{y}$:
//!
//! $$
//! (\mathrm{AsymUP}\,\mathbf{v})_\alpha(y)
//!   = c^{\alpha}_{ry}\, e^{ry} + c^{\alpha}_{ik_y}\, e^{i k_y y}
//!   + c^{\alpha}_{-ik_y^*}\, e^{-i k_y^* y}
//! $$
//!
//! with the weights supplied by a [`CoefficientModel`].
//!
//! A term whose exponent sits on a pole of the weights ($r = i k_y$ or
//! $r = -i k_y^*$) is the limit of nearby terms. The limit exists when the
//! poles of the weights multiplying $e^{ry}$ and the coinciding boundary
//! wave cancel, and then reads
//!
//! $$
//! \bar c^{\alpha}_{ry}\, e^{ry} + \rho^{\alpha}_{ry}\, y\, e^{ry}
//!   + \bar c^{\alpha}_{ik_y}\, e^{i k_y y} + \bar c^{\alpha}_{-ik_y^*}\, e^{-i k_y^* y}
//! $$
//!
//! with $\bar c$ the finite parts and $\rho$ the residues from
//! [`laurent_moments`]. Otherwise AsymUP of the term is unbounded and the
//! samples are NaN.

use ndarray::Array1;
use num_complex::Complex64;

use crate::coefficients::{laurent_moments, regularisation_radius, CoefficientModel, POLE_TOLERANCE};
use crate::types::{ExpTerm, OperatorParams, Waveform, YGrid};

/// Relative size of the uncancelled pole above which AsymUP of a term on a
/// pole counts as unbounded.
const DIVERGENCE_TOLERANCE: f64 = 1e-8;

/// AsymUP applied to one exponential term.
pub fn apply_to_term<M: CoefficientModel + ?Sized>(
    model: &M,
    grid: &YGrid,
    params: &OperatorParams,
    term: &ExpTerm,
) -> Waveform {
    let ky = params.ky();
    log::debug!("AsymUP on e^(r y), r = {}: ky = {}", term.r, ky);

    let iky = Complex64::i() * ky;
    let mikyc = -Complex64::i() * ky.conj();
    let exp_ry = grid.exp(term.r);
    let exp_iky = grid.exp(iky);
    let exp_mikyc = grid.exp(mikyc);

    let Some(radius) = regularisation_radius(params, term.r) else {
        let c = model.coefficients(params, term);
        let x = &exp_ry * c.x.ry + &exp_iky * c.x.iky + &exp_mikyc * c.x.mikyc;
        let y = &exp_ry * c.y.ry + &exp_iky * c.y.iky + &exp_mikyc * c.y.mikyc;
        return Waveform::from_components(x, y);
    };

    let moments = laurent_moments(model, params, term, radius);
    let (c, res) = (moments.finite, moments.residue);

    // Poles that multiply e^{ry} itself once r coincides with a boundary wave.
    let scale = ky.norm().max(1.0);
    let on = |e: Complex64| (term.r - e).norm() <= POLE_TOLERANCE * scale;
    let total = |ry: Complex64, iky_res: Complex64, mikyc_res: Complex64| {
        let mut sum = ry;
        if on(iky) {
            sum += iky_res;
        }
        if on(mikyc) {
            sum += mikyc_res;
        }
        sum
    };
    let unbalanced = total(res.x.ry, res.x.iky, res.x.mikyc)
        .norm()
        .max(total(res.y.ry, res.y.iky, res.y.mikyc).norm());
    let size = c.max_norm().max(res.max_norm()).max(f64::MIN_POSITIVE);
    if unbalanced > DIVERGENCE_TOLERANCE * size {
        log::warn!(
            "AsymUP of the term at r = {} is unbounded (uncancelled pole {:.2e})",
            term.r,
            unbalanced
        );
        let nan = Array1::from_elem(grid.len(), Complex64::new(f64::NAN, f64::NAN));
        return Waveform::from_components(nan.clone(), nan);
    }

    let secular: Array1<Complex64> = grid
        .points()
        .iter()
        .zip(exp_ry.iter())
        .map(|(y, e)| e * *y)
        .collect();

    let x = &exp_ry * c.x.ry + &secular * res.x.ry + &exp_iky * c.x.iky + &exp_mikyc * c.x.mikyc;
    let y = &exp_ry * c.y.ry + &secular * res.y.ry + &exp_iky * c.y.iky + &exp_mikyc * c.y.mikyc;

    Waveform::from_components(x, y)
}

/// AsymUP applied to a sum of exponential terms.
pub fn apply_to_image<M: CoefficientModel + ?Sized>(
    model: &M,
    grid: &YGrid,
    params: &OperatorParams,
    terms: &[ExpTerm],
) -> Waveform {
    let mut wave = Waveform::zeros(grid.len());
    for term in terms {
        wave.accumulate(&apply_to_term(model, grid, params, term));
    }
    wave
}
