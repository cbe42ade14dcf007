//! Bounded exponential modes of AsymUP on the half-space.
//!
//! Acting on $\mathbf{R} e^{ry}$, AsymUP returns $M(r)\mathbf{R} e^{ry}$ plus
//! terms in $e^{i k_y y}$ and $e^{-i k_y^* y}$. A mode is an exponent $r$ with
//! $\det M(r) = 0$ together with a null vector of $M(r)$, so that the mode
//! contributes nothing at its own exponent.
//!
//! With $s = r^2$ and $D(s) = (s + k_y^2)(s + k_y^{*2})$ the entries of
//! $D\,M$ are polynomials in $s$ (and $r$ for the off-diagonal), and
//!
//! $$
//! D^2 \det M = D\,Q(s)
//! $$
//!
//! for a real quadratic $Q$. The roots of $Q$ that are not poles of $M$ give
//! the mode exponents; only $\operatorname{Re}(r) \le 0$ is kept so the image
//! stays bounded as $y \to \infty$.
//!
//! For real $k_0$ and $\lambda = P_i k_0^2 / m_f$ the roots of $Q$ are the pole
//! $-k_y^2$ and $s^* = -(k_y^2 + \lambda)$. Which of them yields usable modes
//! decides whether $S_1$ has a unique bounded inverse image, see
//! [`image_regime`].

use num_complex::Complex64;

use crate::types::OperatorParams;

/// Exponents with real part up to this (relative) bound count as bounded.
const BOUNDED_TOLERANCE: f64 = 1e-9;

/// One bounded mode and the two null vectors read from the rows of $M(r)$.
#[derive(Debug, Clone, Copy)]
pub struct Mode {
    /// Exponent $r$.
    pub r: Complex64,
    /// Unit null vector annihilating the x row of $D\,M(r)$.
    pub x_polarisation: [Complex64; 2],
    /// Unit null vector annihilating the y row of $D\,M(r)$.
    pub y_polarisation: [Complex64; 2],
    x_weight: f64,
    y_weight: f64,
}

impl Mode {
    /// The better conditioned of the two null vectors.
    pub fn polarisation(&self) -> [Complex64; 2] {
        if self.x_weight >= self.y_weight {
            self.x_polarisation
        } else {
            self.y_polarisation
        }
    }
}

/// Real polynomial coefficients in $s$, lowest degree first.
#[derive(Debug, Clone, Copy)]
struct Invariants {
    /// $\operatorname{Re}(k_y^2)$.
    a: f64,
    /// $|k_y|^4$.
    m4: f64,
    /// $P_i a - P_r b$ with $b = \operatorname{Im}(k_y^2)$.
    c: f64,
    /// $P_i a + P_r b$.
    e: f64,
}

impl Invariants {
    fn new(p: &OperatorParams) -> Self {
        let a = p.kyr * p.kyr - p.kyi * p.kyi;
        let b = 2.0 * p.kyr * p.kyi;
        let mod2 = p.kyr * p.kyr + p.kyi * p.kyi;
        Self {
            a,
            m4: mod2 * mod2,
            c: p.pi * a - p.pr * b,
            e: p.pi * a + p.pr * b,
        }
    }

    fn pole_polynomial(&self) -> [f64; 3] {
        [self.m4, 2.0 * self.a, 1.0]
    }
}

/// Quotient $Q(s)$ of the determinant polynomial by the pole polynomial.
///
/// Returns the coefficients lowest degree first, and the relative size of
/// the discarded remainder.
pub fn determinant_quotient(p: &OperatorParams) -> ([f64; 3], f64) {
    let inv = Invariants::new(p);
    let d = inv.pole_polynomial();
    let kx2 = p.kx * p.kx;
    let mpi = p.mf + p.pi;

    // D*Mxx, D*Myy and the common factor of the off-diagonal.
    let a_poly = [p.mf * d[0] + p.pi * inv.m4, p.mf * d[1] + inv.c, p.mf];
    let c_poly = [mpi * d[0] + kx2 * inv.e, mpi * d[1] + kx2 * p.pi, mpi];
    let g_poly = [inv.e, p.pi];

    // N = A*C + kx^2 s G^2
    let mut n = [0.0_f64; 5];
    for (i, ai) in a_poly.iter().enumerate() {
        for (j, cj) in c_poly.iter().enumerate() {
            n[i + j] += ai * cj;
        }
    }
    n[1] += kx2 * g_poly[0] * g_poly[0];
    n[2] += kx2 * 2.0 * g_poly[0] * g_poly[1];
    n[3] += kx2 * g_poly[1] * g_poly[1];

    // Division by the monic D.
    let q2 = n[4];
    let q1 = n[3] - q2 * d[1];
    let q0 = n[2] - q1 * d[1] - q2 * d[0];
    let rem1 = n[1] - q0 * d[1] - q1 * d[0];
    let rem0 = n[0] - q0 * d[0];

    let scale = n.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(f64::MIN_POSITIVE);
    let remainder = rem1.abs().max(rem0.abs()) / scale;

    ([q0, q1, q2], remainder)
}

/// Roots of $Q$, with a root on a pole split off exactly.
///
/// When $P$ is real both roots sit on $-k_y^2$ and rounding would separate
/// them into two spurious non-pole roots.
fn quotient_roots(q: [f64; 3], p: &OperatorParams) -> Vec<Complex64> {
    let [q0, q1, q2] = q;
    let scale = q0.abs().max(q1.abs()).max(q2.abs());
    if q2 == 0.0 {
        return real_quadratic_roots(q);
    }
    let ky2 = p.ky() * p.ky();
    for pole in [-ky2, -ky2.conj()] {
        if pole.norm() == 0.0 {
            continue;
        }
        let value = q0 + q1 * pole + q2 * pole * pole;
        if value.norm() <= 1e-12 * scale * pole.norm().max(1.0).powi(2) {
            return vec![pole, Complex64::from(q0) / (q2 * pole)];
        }
    }
    real_quadratic_roots(q)
}

/// Roots of a real polynomial of degree at most two.
fn real_quadratic_roots(q: [f64; 3]) -> Vec<Complex64> {
    let [q0, q1, q2] = q;
    let scale = q0.abs().max(q1.abs()).max(q2.abs());
    if scale == 0.0 {
        return Vec::new();
    }
    let tiny = 1e-14 * scale;

    if q2.abs() <= tiny {
        if q1.abs() <= tiny {
            return Vec::new();
        }
        return vec![Complex64::from(-q0 / q1)];
    }

    let disc = Complex64::from(q1 * q1 - 4.0 * q2 * q0).sqrt();
    let sign = if q1 >= 0.0 { 1.0 } else { -1.0 };
    let t = -(Complex64::from(q1) + sign * disc) / 2.0;
    if t.norm() == 0.0 {
        return vec![Complex64::from(0.0), Complex64::from(0.0)];
    }
    vec![t / q2, Complex64::from(q0) / t]
}

fn is_pole(s: Complex64, p: &OperatorParams, tolerance: f64) -> bool {
    let ky2 = p.ky() * p.ky();
    let scale = ky2.norm().max(1.0);
    (s + ky2).norm() <= tolerance * scale || (s + ky2.conj()).norm() <= tolerance * scale
}

/// Null vectors of the rows of $D\,M(r)$.
fn polarisations(p: &OperatorParams, inv: &Invariants, r: Complex64) -> Mode {
    let s = r * r;
    let d = s * s + 2.0 * inv.a * s + inv.m4;
    let g = p.pi * s + inv.e;
    let m_xx = p.mf * d + p.pi * inv.m4 + inv.c * s;
    let m_xy = Complex64::i() * p.kx * r * g;
    let m_yy = (p.mf + p.pi) * d + p.kx * p.kx * g;

    let x_row = [m_xy, -m_xx];
    let y_row = [m_yy, -m_xy];
    let x_weight = (x_row[0].norm_sqr() + x_row[1].norm_sqr()).sqrt();
    let y_weight = (y_row[0].norm_sqr() + y_row[1].norm_sqr()).sqrt();

    let unit = |v: [Complex64; 2], w: f64| {
        if w > 0.0 {
            [v[0] / w, v[1] / w]
        } else {
            v
        }
    };

    Mode {
        r,
        x_polarisation: unit(x_row, x_weight),
        y_polarisation: unit(y_row, y_weight),
        x_weight,
        y_weight,
    }
}

/// All bounded modes for `p`.
///
/// Roots of the quotient that coincide with $-k_y^2$ or $-k_y^{*2}$ (within
/// `root_tolerance`) are poles of $M$ and are dropped. Modes whose null
/// vectors both vanish are dropped as well.
pub fn bounded_modes(p: &OperatorParams, root_tolerance: f64) -> Vec<Mode> {
    let inv = Invariants::new(p);
    let (quotient, remainder) = determinant_quotient(p);
    log::trace!("Determinant quotient {:?}, remainder {:.2e}", quotient, remainder);

    let mut exponents: Vec<Complex64> = Vec::new();
    for s in quotient_roots(quotient, p) {
        if is_pole(s, p, root_tolerance) {
            log::debug!("Dropping root s = {} at a pole", s);
            continue;
        }
        let w = s.sqrt();
        for r in [w, -w] {
            if r.re > BOUNDED_TOLERANCE * r.norm().max(1.0) {
                continue;
            }
            let duplicate = exponents
                .iter()
                .any(|e| (e - r).norm() <= root_tolerance * r.norm().max(1.0));
            if !duplicate {
                exponents.push(r);
            }
        }
    }

    exponents
        .into_iter()
        .map(|r| polarisations(p, &inv, r))
        .filter(|m| m.x_weight > 0.0 || m.y_weight > 0.0)
        .collect()
}

/// Whether $S_1$ has a bounded inverse image, and whether it is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRegime {
    /// Exactly one bounded image.
    Unique,
    /// No bounded combination of modes and source-exponent terms balances
    /// $S_1$.
    NoBoundedImage,
    /// A bounded image exists, but AsymUP annihilates a bounded oscillatory
    /// mode pair, so any multiple of it can be added.
    NonUnique,
}

/// Classify `p` by the signs of $k_y^2$ and $k_y^2 + \lambda$, $\lambda = P_i k_0^2 / m_f$.
///
/// | $k_y^2$ | $k_y^2 + \lambda$ | regime |
/// |---------|-------------------|--------|
/// | $> 0$ | $> 0$ | unique, two oscillatory modes |
/// | $> 0$ | $\le 0$ | no bounded image |
/// | $\le 0$ | $\le 0$ | unique, one decaying mode |
/// | $\le 0$ | $> 0$ | not unique |
///
/// With $P_i = 0$ the image exists only for evanescent $k_y$, where it is a
/// multiple of $S_1$ itself. Complex $k_y^2$ is classified by its real part.
pub fn image_regime(p: &OperatorParams) -> ImageRegime {
    let a = p.kyr * p.kyr - p.kyi * p.kyi;
    if p.pi == 0.0 {
        return if a < 0.0 {
            ImageRegime::Unique
        } else {
            ImageRegime::NoBoundedImage
        };
    }
    let shift = a + p.pi * (a + p.kx * p.kx) / p.mf;
    match (a > 0.0, shift > 0.0) {
        (true, true) | (false, false) => ImageRegime::Unique,
        (true, false) => ImageRegime::NoBoundedImage,
        (false, true) => ImageRegime::NonUnique,
    }
}
