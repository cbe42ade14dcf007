//! Integration test: the primary and alternate parameterisations describe
//! the same inverse image even though their term lists differ.

use asymup_core::check::{check_parameterisation_equivalence, CheckSetup};
use asymup_core::coefficients::ClosedForm;
use asymup_core::solver::halfspace::{inverse_image_lists, HalfspaceSolver};
use num_complex::Complex64;

#[test]
fn test_parameterisations_agree() {
    let solver = HalfspaceSolver::new();
    for kx in [0.3, 0.5, 1.5] {
        let setup = CheckSetup {
            kx,
            ..CheckSetup::default()
        };
        let report = check_parameterisation_equivalence(&solver, &ClosedForm, &setup).unwrap();

        assert!(
            report.alternate.image.terms.len() > report.primary.image.terms.len(),
            "kx = {}: alternate should carry more terms",
            kx
        );
        assert!(report.alternate.image.redundant_parameters() > 0);
        assert_eq!(report.alternate.image.free_parameters(), 0);
        assert!(report.primary.passes(1e-6));
        assert!(report.alternate.passes(1e-6));
        assert!(
            report.agrees(1e-8),
            "kx = {}: image deviation {:.2e}, reconstruction deviation {:.2e}",
            kx,
            report.image_deviation,
            report.reconstruction_deviation
        );
    }
}

#[test]
fn test_parameterisations_agree_on_source_exponent_terms() {
    // Real phase, evanescent: the image lives on e^{i ky y} and both
    // parameterisations use the same terms.
    let setup = CheckSetup {
        phase: Complex64::new(1.0, 0.0),
        kx: 1.5,
        ..CheckSetup::default()
    };
    let report =
        check_parameterisation_equivalence(&HalfspaceSolver::new(), &ClosedForm, &setup).unwrap();
    assert_eq!(report.primary.image.terms.len(), report.alternate.image.terms.len());
    assert!(report.primary.passes(1e-6));
    assert!(report.agrees(1e-8));
}

#[test]
fn test_list_interface_shapes() {
    let chi = Complex64::new(1.0, 0.1);
    let phase = Complex64::new(0.2, 0.3);
    let (r1, rx1, ry1) = inverse_image_lists(chi, phase, 1.0, 0.5, false).unwrap();
    let (r2, rx2, ry2) = inverse_image_lists(chi, phase, 1.0, 0.5, true).unwrap();

    assert_eq!(r1.len(), rx1.len());
    assert_eq!(r1.len(), ry1.len());
    assert_eq!(r2.len(), rx2.len());
    assert_eq!(r2.len(), ry2.len());
    assert_eq!(r2.len(), 2 * r1.len());

    // Same exponents, each appearing twice in the alternate list.
    for r in &r1 {
        let count = r2.iter().filter(|s| (*s - r).norm() < 1e-12).count();
        assert_eq!(count, 2);
    }
}
