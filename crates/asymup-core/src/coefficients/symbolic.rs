//! Coefficient functions compiled from their textual definitions.

use num_complex::Complex64;

use super::{Coefficient, CoefficientModel, TermCoefficients, ARGUMENTS, EXPRESSIONS};
use crate::expr::{self, CompiledExpr, ExprError};
use crate::types::{ExpTerm, OperatorParams};

/// The six expressions in [`EXPRESSIONS`], parsed and bound to
/// [`ARGUMENTS`] once at construction.
#[derive(Debug, Clone)]
pub struct Symbolic {
    functions: [CompiledExpr; 6],
}

impl Symbolic {
    /// Compile the built-in expressions.
    pub fn new() -> Result<Self, ExprError> {
        Self::from_sources(EXPRESSIONS.map(|(_, src)| src))
    }

    /// Compile six expressions given in [`EXPRESSIONS`] order. `^` and `**`
    /// are both accepted as powers.
    pub fn from_sources(sources: [&str; 6]) -> Result<Self, ExprError> {
        let [a, b, c, d, e, f] = sources.map(|src| expr::parse(src)?.compile(&ARGUMENTS));
        log::debug!("Compiled {} coefficient expressions", sources.len());
        Ok(Self {
            functions: [a?, b?, c?, d?, e?, f?],
        })
    }

    /// Evaluate a single coefficient function.
    pub fn evaluate(&self, which: Coefficient, params: &OperatorParams, term: &ExpTerm) -> Complex64 {
        self.functions[which.index()].call(&arguments(params, term))
    }
}

fn arguments(p: &OperatorParams, t: &ExpTerm) -> [Complex64; 9] {
    [
        Complex64::from(p.kx),
        Complex64::from(p.kyr),
        Complex64::from(p.kyi),
        Complex64::from(p.pr),
        Complex64::from(p.pi),
        Complex64::from(p.mf),
        t.rx,
        t.ry,
        t.r,
    ]
}

impl CoefficientModel for Symbolic {
    fn name(&self) -> &str {
        "symbolic"
    }

    fn coefficients(&self, params: &OperatorParams, term: &ExpTerm) -> TermCoefficients {
        let args = arguments(params, term);
        let values = Coefficient::ALL.map(|c| self.functions[c.index()].call(&args));
        TermCoefficients::from_array(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::ClosedForm;
    use crate::types::PhaseFactors;

    /// Parameter sets spanning propagating, evanescent and lossy-ky cases.
    fn sample_params() -> Vec<OperatorParams> {
        let factors = [
            PhaseFactors::from_physical(Complex64::new(1.0, 0.1), Complex64::new(0.2, 0.3)),
            PhaseFactors::from_physical(Complex64::new(3.0, 0.5), Complex64::new(0.1, 1.0)),
            PhaseFactors::from_physical(Complex64::new(-2.0, 0.4), Complex64::new(-0.7, 0.2)),
        ];
        let kys = [
            Complex64::new(0.866, 0.0),
            Complex64::new(0.0, 1.118),
            Complex64::new(0.93, 0.27),
        ];
        let mut out = Vec::new();
        for f in factors {
            for (j, &ky) in kys.iter().enumerate() {
                out.push(OperatorParams::new(0.3 + 0.6 * j as f64, ky, f));
            }
        }
        out
    }

    fn sample_terms() -> Vec<ExpTerm> {
        vec![
            ExpTerm::new(Complex64::new(-0.55, 0.0), Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0)),
            ExpTerm::new(Complex64::new(0.0, 1.3), Complex64::new(0.4, -0.2), Complex64::new(-1.1, 0.6)),
            ExpTerm::new(Complex64::new(-1.7, -0.9), Complex64::new(-0.3, 2.0), Complex64::new(0.8, 0.8)),
        ]
    }

    #[test]
    fn test_symbolic_matches_closed_form() {
        let symbolic = Symbolic::new().unwrap();
        for p in sample_params() {
            for t in sample_terms() {
                let a = symbolic.coefficients(&p, &t).to_array();
                let b = ClosedForm.coefficients(&p, &t).to_array();
                for k in 0..6 {
                    let scale = b[k].norm().max(1.0);
                    assert!(
                        (a[k] - b[k]).norm() <= 1e-12 * scale,
                        "{}: symbolic {} vs closed form {} at {:?}, {:?}",
                        EXPRESSIONS[k].0,
                        a[k],
                        b[k],
                        p,
                        t
                    );
                }
            }
        }
    }

    #[test]
    fn test_evaluate_single_coefficient() {
        let symbolic = Symbolic::new().unwrap();
        let p = sample_params()[0];
        let t = sample_terms()[2];
        let all = symbolic.coefficients(&p, &t);
        for which in Coefficient::ALL {
            assert_eq!(symbolic.evaluate(which, &p, &t), all.get(which), "{}", which.name());
        }
    }

    #[test]
    fn test_malformed_expression_is_rejected() {
        let mut sources = EXPRESSIONS.map(|(_, src)| src);
        sources[2] = "-1/4*((pi - I*pr)*(kyi*Rx";
        assert_eq!(Symbolic::from_sources(sources).unwrap_err(), ExprError::UnexpectedEnd);
    }

    #[test]
    fn test_unknown_symbol_is_rejected() {
        let mut sources = EXPRESSIONS.map(|(_, src)| src);
        sources[0] = "kz*Rx";
        assert_eq!(
            Symbolic::from_sources(sources).unwrap_err(),
            ExprError::UnboundSymbol("kz".into())
        );
    }
}
