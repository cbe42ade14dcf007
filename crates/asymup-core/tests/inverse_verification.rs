//! Integration test: AsymUP applied to the mode-matched inverse image
//! reproduces the source $S_1$ wherever a unique bounded image exists, and
//! the solver refuses the parameters where it does not.

use approx::assert_relative_eq;
use asymup_core::check::{check_inverse, CheckSetup};
use asymup_core::coefficients::{ClosedForm, Symbolic};
use asymup_core::solver::halfspace::modes::{image_regime, ImageRegime};
use asymup_core::solver::halfspace::HalfspaceSolver;
use asymup_core::solver::{Parameterization, SolverError};
use num_complex::Complex64;

const TOLERANCE: f64 = 1e-6;

fn setup(chi: Complex64, phase: Complex64, kx: f64) -> CheckSetup {
    CheckSetup {
        chi,
        phase,
        k0: 1.0,
        kx,
        ymax: 10.0,
        points: 1000,
        parameterization: Parameterization::Primary,
    }
}

#[test]
fn test_reference_medium_across_kx() {
    let chi = Complex64::new(1.0, 0.1);
    let phase = Complex64::new(0.2, 0.3);
    let solver = HalfspaceSolver::new();

    for kx in [0.1, 0.5, 0.999, 1.5, 2.5] {
        let report = check_inverse(&solver, &ClosedForm, &setup(chi, phase, kx)).unwrap();
        println!(
            "kx = {:.3}: {} terms, relative error {:.2e}",
            kx,
            report.image.terms.len(),
            report.relative_error
        );
        assert!(
            report.passes(TOLERANCE),
            "kx = {}: relative error {:.2e}",
            kx,
            report.relative_error
        );
        assert!(report.image.terms.iter().all(|t| t.r.re <= 1e-9));
    }
}

#[test]
fn test_other_media() {
    let solver = HalfspaceSolver::new();
    let cases = [
        (Complex64::new(3.0, 0.5), Complex64::new(0.1, 1.0), 0.9),
        (Complex64::new(2.0, 1.0), Complex64::new(0.5, 0.1), 3.0),
    ];
    for (chi, phase, kx) in cases {
        let report = check_inverse(&solver, &ClosedForm, &setup(chi, phase, kx)).unwrap();
        assert!(
            report.passes(TOLERANCE),
            "chi = {}, phase = {}, kx = {}: relative error {:.2e}",
            chi,
            phase,
            kx,
            report.relative_error
        );
    }
}

#[test]
fn test_reconstruction_at_origin_matches_source() {
    let report = check_inverse(
        &HalfspaceSolver::new(),
        &ClosedForm,
        &setup(Complex64::new(1.0, 0.1), Complex64::new(0.2, 0.3), 0.5),
    )
    .unwrap();

    let ky = 0.75_f64.sqrt();
    let x0 = report.reconstructed.x()[0];
    let y0 = report.reconstructed.y()[0];
    assert_relative_eq!(x0.re, -0.5, epsilon = 1e-10);
    assert!(x0.im.abs() < 1e-10);
    assert_relative_eq!(y0.re, 0.25 / ky, epsilon = 1e-10);
    assert!(y0.im.abs() < 1e-10);
    assert_relative_eq!(report.ky.re, ky, epsilon = 1e-15);
}

#[test]
fn test_returned_images_are_unique() {
    let solver = HalfspaceSolver::new();
    for kx in [0.5, 0.9999, 1.5, 2.5] {
        for parameterization in [Parameterization::Primary, Parameterization::Alternate] {
            let s = CheckSetup {
                parameterization,
                ..setup(Complex64::new(1.0, 0.1), Complex64::new(0.2, 0.3), kx)
            };
            let image = check_inverse(&solver, &ClosedForm, &s).unwrap().image;
            assert_eq!(image.free_parameters(), 0, "kx = {}, {:?}", kx, parameterization);
            assert_eq!(image.rank, image.directions, "kx = {}, {:?}", kx, parameterization);
        }
    }
}

#[test]
fn test_annihilated_mode_pair_is_reported() {
    // Between k0 and sqrt(k0^2 + pi k0^2 / mf) the two bounded modes are
    // oscillatory and one combination of them is mapped to zero.
    let solver = HalfspaceSolver::new();
    for kx in [1.0001, 1.2, 1.39] {
        let s = setup(Complex64::new(1.0, 0.1), Complex64::new(0.2, 0.3), kx);
        assert_eq!(image_regime(&s.params()), ImageRegime::NonUnique);
        match check_inverse(&solver, &ClosedForm, &s) {
            Err(SolverError::NonUniqueImage { free_parameters, .. }) => assert_eq!(free_parameters, 1),
            other => panic!("kx = {}: expected a non-unique image, got {:?}", kx, other.map(|r| r.image)),
        }
    }
}

#[test]
fn test_regimes_across_media() {
    let solver = HalfspaceSolver::new();
    let media = [
        // Lossy dielectric, both signs of Im(P).
        (Complex64::new(1.0, 0.1), Complex64::new(0.2, 0.3)),
        (Complex64::new(1.0, 0.1), Complex64::new(0.2, -0.3)),
        (Complex64::new(1.0, 0.1), Complex64::new(0.0, -0.5)),
        // Real phase.
        (Complex64::new(1.0, 0.1), Complex64::new(1.0, 0.0)),
        (Complex64::new(1.0, 0.1), Complex64::new(-1.0, 0.0)),
        (Complex64::new(-5.0, 0.3), Complex64::new(1.0, 0.0)),
        // Metallic.
        (Complex64::new(-5.0, 0.3), Complex64::new(0.0, 1.0)),
        (Complex64::new(-3.0, 0.5), Complex64::new(0.3, 0.4)),
        // Strong and weak loss.
        (Complex64::new(3.0, 0.5), Complex64::new(0.1, 1.0)),
        (Complex64::new(2.0, 1.0), Complex64::new(0.5, 0.1)),
        (Complex64::new(2.0, 0.01), Complex64::new(0.7, -0.3)),
    ];
    let kxs = [-0.5, 0.05, 0.5, 0.9999, 1.0001, 1.2, 1.39, 1.5, 2.5];

    let mut counts = [0usize; 3];
    for (chi, phase) in media {
        for kx in kxs {
            let s = CheckSetup {
                points: 201,
                ..setup(chi, phase, kx)
            };
            let regime = image_regime(&s.params());
            let result = check_inverse(&solver, &ClosedForm, &s);
            let case = format!("chi = {}, phase = {}, kx = {}", chi, phase, kx);
            match regime {
                ImageRegime::Unique => {
                    counts[0] += 1;
                    let report = result.unwrap_or_else(|e| panic!("{}: {}", case, e));
                    assert!(
                        report.passes(TOLERANCE),
                        "{}: relative error {:.2e}",
                        case,
                        report.relative_error
                    );
                    assert_eq!(report.image.free_parameters(), 0, "{}", case);
                    assert!(report.image.terms.iter().all(|t| t.r.re <= 1e-9), "{}", case);
                }
                ImageRegime::NoBoundedImage => {
                    counts[1] += 1;
                    assert!(
                        matches!(
                            result,
                            Err(SolverError::InconsistentBalance { .. }) | Err(SolverError::NoAdmissibleModes { .. })
                        ),
                        "{}: expected no bounded image",
                        case
                    );
                }
                ImageRegime::NonUnique => {
                    counts[2] += 1;
                    assert!(
                        matches!(result, Err(SolverError::NonUniqueImage { .. })),
                        "{}: expected a non-unique image",
                        case
                    );
                }
            }
        }
    }
    // Every regime is exercised.
    assert!(counts.iter().all(|&n| n > 0), "{:?}", counts);
}

#[test]
fn test_symbolic_model_agrees_with_closed_form() {
    let symbolic = Symbolic::new().unwrap();
    let solver = HalfspaceSolver::new();
    for kx in [0.5, 1.5] {
        let s = setup(Complex64::new(1.0, 0.1), Complex64::new(0.2, 0.3), kx);
        let closed = check_inverse(&solver, &ClosedForm, &s).unwrap();
        let compiled = check_inverse(&solver, &symbolic, &s).unwrap();
        assert!(compiled.passes(TOLERANCE));
        assert!(compiled.reconstructed.relative_diff(&closed.reconstructed) < 1e-12);
        assert_eq!(compiled.model, "symbolic");
    }
}
