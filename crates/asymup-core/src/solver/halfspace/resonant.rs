//! Terms sitting on the source exponents.
//!
//! A term $\mathbf{R} e^{ry}$ with $r = i k_y$ (or $r = -i k_y^*$) lies on a
//! pole of the coefficient functions. AsymUP of such a term stays bounded
//! only for polarisations whose poles cancel: the residue of the $e^{ry}$
//! weight (which would produce a secular $y\,e^{ry}$ part) and the summed
//! residues of the boundary weights must both vanish. Those polarisations
//! form the null space of a $4 \times 2$ residue matrix.
//!
//! When $P$ is real and $k_y$ is imaginary both polarisations qualify and
//! AsymUP reduces to multiplication by $m_f$, which is how $S_1$ is matched
//! where the quotient roots give no modes.

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::coefficients::{laurent_moments, regularisation_radius, ClosedForm, LaurentCoefficients};
use crate::types::{ExpTerm, OperatorParams};

/// A bounded term on a source exponent.
#[derive(Debug, Clone, Copy)]
pub struct ResonantTerm {
    /// $i k_y$ or $-i k_y^*$.
    pub r: Complex64,
    /// Unit polarisation $(R_x, R_y)$.
    pub polarisation: [Complex64; 2],
}

impl ResonantTerm {
    pub fn term(&self) -> ExpTerm {
        ExpTerm::new(self.r, self.polarisation[0], self.polarisation[1])
    }
}

/// Distinct exponentials of the boundary waves, $i k_y$ first.
pub fn source_exponents(params: &OperatorParams) -> Vec<Complex64> {
    let iky = Complex64::i() * params.ky();
    if params.exponentials_coincide() {
        vec![iky]
    } else {
        vec![iky, -Complex64::i() * params.ky().conj()]
    }
}

/// Finite parts and residues of the weights of `term`, which must lie on a
/// source exponent.
pub fn moments_on_pole(params: &OperatorParams, term: &ExpTerm) -> Option<LaurentCoefficients> {
    let radius = regularisation_radius(params, term.r)?;
    Some(laurent_moments(&ClosedForm, params, term, radius))
}

/// Residues that must vanish for AsymUP of the term to stay bounded.
fn pole_residues(moments: &LaurentCoefficients) -> [Complex64; 4] {
    let res = &moments.residue;
    [
        res.x.ry,
        res.y.ry,
        res.x.iky + res.x.mikyc,
        res.y.iky + res.y.mikyc,
    ]
}

/// Polarisations on each bounded source exponent for which AsymUP stays
/// bounded.
///
/// Singular values of the residue matrix up to `tolerance` times the size
/// of the finite parts count as zero.
pub fn resonant_terms(params: &OperatorParams, tolerance: f64) -> Vec<ResonantTerm> {
    let one = Complex64::from(1.0);
    let zero = Complex64::from(0.0);
    let mut terms = Vec::new();

    for r in source_exponents(params) {
        if r.re > 1e-9 * r.norm().max(1.0) {
            continue;
        }

        let columns: Vec<LaurentCoefficients> = [(one, zero), (zero, one)]
            .iter()
            .filter_map(|&(rx, ry)| moments_on_pole(params, &ExpTerm::new(r, rx, ry)))
            .collect();
        if columns.len() != 2 {
            continue;
        }

        let residues = [pole_residues(&columns[0]), pole_residues(&columns[1])];
        let matrix = DMatrix::<Complex64>::from_fn(4, 2, |i, j| residues[j][i]);
        let scale = columns
            .iter()
            .map(|m| m.finite.max_norm())
            .fold(0.0_f64, f64::max)
            .max(f64::MIN_POSITIVE);

        let svd = matrix.svd(false, true);
        let Some(v_t) = svd.v_t else {
            continue;
        };
        for (k, sigma) in svd.singular_values.iter().enumerate() {
            if *sigma <= tolerance * scale {
                let polarisation = [v_t[(k, 0)].conj(), v_t[(k, 1)].conj()];
                log::debug!("Bounded term on r = {}: polarisation {:?}", r, polarisation);
                terms.push(ResonantTerm { r, polarisation });
            }
        }
    }

    terms
}
