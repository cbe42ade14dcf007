//! The six coefficient functions written out in native complex arithmetic.
//!
//! Each function is a direct transcription of the matching string in
//! [`super::EXPRESSIONS`]. Poles at `kyi ∓ i·kyr + r = 0` are not guarded
//! and produce non-finite values.

use num_complex::Complex64;

use super::{BasisCoefficients, CoefficientModel, TermCoefficients};
use crate::types::{ExpTerm, OperatorParams};

/// Native evaluation of the coefficient functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosedForm;

impl CoefficientModel for ClosedForm {
    fn name(&self) -> &str {
        "closed-form"
    }

    fn coefficients(&self, params: &OperatorParams, term: &ExpTerm) -> TermCoefficients {
        TermCoefficients {
            x: BasisCoefficients {
                ry: xpol_ry(params, term),
                iky: xpol_iky(params, term),
                mikyc: xpol_mikyc(params, term),
            },
            y: BasisCoefficients {
                ry: ypol_ry(params, term),
                iky: ypol_iky(params, term),
                mikyc: ypol_mikyc(params, term),
            },
        }
    }
}

/// $k_{yi}^4 + 2k_{yi}^2(k_{yr}^2 - r^2) + (k_{yr}^2 + r^2)^2
///   = (r^2 + k_y^2)(r^2 + k_y^{*2})$.
fn pole_polynomial(p: &OperatorParams, r: Complex64) -> Complex64 {
    let (kyr, kyi) = (p.kyr, p.kyi);
    let r2 = r * r;
    kyi.powi(4) + 2.0 * kyi * kyi * (kyr * kyr - r2) + (kyr * kyr + r2).powi(2)
}

pub fn xpol_ry(p: &OperatorParams, t: &ExpTerm) -> Complex64 {
    let i = Complex64::i();
    let OperatorParams { kx, kyr, kyi, pr, pi, mf } = *p;
    let (r, rx, ry) = (t.r, t.rx, t.ry);
    let r2 = r * r;

    let num = kyi.powi(4) * (mf + pi) * rx
        - 2.0 * kyi * kyr * pr * r * (r * rx - i * kx * ry)
        + (kyr * kyr + r2) * (kyr * kyr * (mf + pi) * rx + r * (mf * r * rx + i * kx * pi * ry))
        + kyi * kyi
            * (2.0 * kyr * kyr * (mf + pi) * rx
                - r * (2.0 * mf * r * rx + pi * r * rx + i * kx * pi * ry));

    num / pole_polynomial(p, r)
}

pub fn xpol_iky(p: &OperatorParams, t: &ExpTerm) -> Complex64 {
    let i = Complex64::i();
    let OperatorParams { kx, kyr, kyi, pr, pi, .. } = *p;
    let (r, rx, ry) = (t.r, t.rx, t.ry);

    -0.25 * ((pi + i * pr) * (kyi * rx + i * (-(kyr * rx) + kx * ry))) / (kyi - i * kyr + r)
}

pub fn xpol_mikyc(p: &OperatorParams, t: &ExpTerm) -> Complex64 {
    let i = Complex64::i();
    let OperatorParams { kx, kyr, kyi, pr, pi, .. } = *p;
    let (r, rx, ry) = (t.r, t.rx, t.ry);

    -0.25 * ((pi - i * pr) * (kyi * rx + i * (kyr * rx + kx * ry))) / (kyi + i * kyr + r)
}

pub fn ypol_ry(p: &OperatorParams, t: &ExpTerm) -> Complex64 {
    let i = Complex64::i();
    let OperatorParams { kx, kyr, kyi, pr, pi, mf } = *p;
    let (r, rx, ry) = (t.r, t.rx, t.ry);

    let g = -(kyi * kyi * pi) + 2.0 * kyi * kyr * pr + pi * (kyr * kyr + r * r);
    let den = pole_polynomial(p, r);

    (i * kx * r * g * rx + kx * kx * g * ry + (mf + pi) * den * ry) / den
}

pub fn ypol_iky(p: &OperatorParams, t: &ExpTerm) -> Complex64 {
    let i = Complex64::i();
    let OperatorParams { kx, kyr, kyi, pr, pi, .. } = *p;
    let (r, rx, ry) = (t.r, t.rx, t.ry);

    (kx * (pi + i * pr) * ((-i) * kyi * rx - kyr * rx + kx * ry))
        / (4.0 * (kyi - i * kyr) * (kyi - i * kyr + r))
}

pub fn ypol_mikyc(p: &OperatorParams, t: &ExpTerm) -> Complex64 {
    let i = Complex64::i();
    let OperatorParams { kx, kyr, kyi, pr, pi, .. } = *p;
    let (r, rx, ry) = (t.r, t.rx, t.ry);

    (kx * (pi - i * pr) * ((-i) * kyi * rx + kyr * rx + kx * ry))
        / (4.0 * (kyi + i * kyr) * (kyi + i * kyr + r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn params() -> OperatorParams {
        OperatorParams::from_physical(
            Complex64::new(1.0, 0.1),
            Complex64::new(0.2, 0.3),
            1.0,
            0.5,
        )
    }

    #[test]
    fn test_pole_polynomial_factorises() {
        let p = params();
        let ky = p.ky();
        let r = Complex64::new(-0.3, 0.7);
        let expected = (r * r + ky * ky) * (r * r + ky.conj() * ky.conj());
        let got = pole_polynomial(&p, r);
        assert_abs_diff_eq!(got.re, expected.re, epsilon = 1e-13);
        assert_abs_diff_eq!(got.im, expected.im, epsilon = 1e-13);
    }

    #[test]
    fn test_iky_weights_depend_only_on_kx_ry_minus_ky_rx() {
        // Terms with equal kx·Ry − ky·Rx give the same e^{iky y} weights.
        let p = params();
        let ky = p.ky();
        let r = Complex64::new(-0.4, 0.2);
        let a = ExpTerm::new(r, Complex64::new(1.0, 0.5), Complex64::new(0.3, -0.2));
        let shift = Complex64::new(0.7, 0.1);
        let b = ExpTerm::new(r, a.rx + shift * p.kx, a.ry + shift * ky);
        for (fa, fb) in [
            (xpol_iky(&p, &a), xpol_iky(&p, &b)),
            (ypol_iky(&p, &a), ypol_iky(&p, &b)),
        ] {
            assert_abs_diff_eq!(fa.re, fb.re, epsilon = 1e-13);
            assert_abs_diff_eq!(fa.im, fb.im, epsilon = 1e-13);
        }
    }

    #[test]
    fn test_y_weights_are_proportional_to_x_weights() {
        // ypol_iky = -(kx/ky) xpol_iky, the same ratio as in the source S1.
        let p = params();
        let t = ExpTerm::new(
            Complex64::new(-0.9, 0.4),
            Complex64::new(0.2, 1.1),
            Complex64::new(-0.6, 0.3),
        );
        let ratio = ypol_iky(&p, &t) / xpol_iky(&p, &t);
        let expected = -p.kx / p.ky();
        assert_abs_diff_eq!(ratio.re, expected.re, epsilon = 1e-12);
        assert_abs_diff_eq!(ratio.im, expected.im, epsilon = 1e-12);
    }

    #[test]
    fn test_pole_gives_non_finite_value() {
        let p = params();
        // kyi - i kyr + r = 0
        let t = ExpTerm::new(
            Complex64::new(-p.kyi, p.kyr),
            Complex64::from(1.0),
            Complex64::from(0.0),
        );
        assert!(!xpol_iky(&p, &t).is_finite());
    }
}
