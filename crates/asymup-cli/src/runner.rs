//! Verification runner: ties together the job file, the solver and the
//! coefficient model, and writes the results.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use num_complex::Complex64;

use asymup_core::check::{
    check_inverse, check_parameterisation_equivalence, CheckSetup, EquivalenceReport,
    VerificationReport,
};
use asymup_core::coefficients::CoefficientModel;
use asymup_core::solver::halfspace::modes::{image_regime, ImageRegime};
use asymup_core::solver::halfspace::HalfspaceSolver;
use asymup_core::solver::{InverseSolver, SolverError};

use crate::config::JobConfig;
use crate::plot;

/// Results from a verification run.
pub struct RunOutput {
    pub reports: Vec<VerificationReport>,
    pub equivalence: Vec<EquivalenceReport>,
}

impl RunOutput {
    pub fn failures(&self, tolerance: f64) -> usize {
        self.reports.iter().filter(|r| !r.passes(tolerance)).count()
    }
}

fn build_model(job: &JobConfig) -> Result<Box<dyn CoefficientModel>> {
    job.check
        .coefficients
        .build()
        .map_err(|e| anyhow!("Failed to compile coefficient expressions: {}", e))
}

/// Solver failure with the parameter regime it falls in.
fn solver_error(setup: &CheckSetup, error: SolverError) -> anyhow::Error {
    let regime = match image_regime(&setup.params()) {
        ImageRegime::Unique => "a unique bounded image",
        ImageRegime::NoBoundedImage => "no bounded image",
        ImageRegime::NonUnique => "a non-unique image",
    };
    anyhow!(
        "Solver error at kx={} (parameters predict {}): {}",
        setup.kx,
        regime,
        error
    )
}

/// Verify the inverse image for every configured kx.
pub fn run_checks(job: &JobConfig) -> Result<RunOutput> {
    let solver = HalfspaceSolver::default();
    let model = build_model(job)?;
    let kx_values = job.kx_values();
    let tolerance = job.check.tolerance;

    println!(
        "Solver: {} | coefficients: {} | parameterisation: {:?}",
        solver.method_name(),
        model.name(),
        job.check.parameterisation
    );

    let mut reports = Vec::with_capacity(kx_values.len());
    let mut equivalence = Vec::new();

    for (i, &kx) in kx_values.iter().enumerate() {
        let setup = job.setup(kx);
        let report = check_inverse(&solver, model.as_ref(), &setup).map_err(|e| solver_error(&setup, e))?;

        println!(
            "  [{}/{}] kx={:.4}: ky={:.4}, {} term(s), max error={:.2e}, relative={:.2e} {}",
            i + 1,
            kx_values.len(),
            kx,
            report.ky,
            report.image.terms.len(),
            report.max_abs_error,
            report.relative_error,
            if report.passes(tolerance) { "PASS" } else { "FAIL" }
        );

        if job.check.equivalence {
            let eq = check_parameterisation_equivalence(&solver, model.as_ref(), &setup)
                .map_err(|e| solver_error(&setup, e))?;
            print_equivalence(&eq);
            equivalence.push(eq);
        }

        reports.push(report);
    }

    Ok(RunOutput {
        reports,
        equivalence,
    })
}

/// Compare both parameterisations for every configured kx.
pub fn run_equivalence(job: &JobConfig) -> Result<Vec<EquivalenceReport>> {
    let solver = HalfspaceSolver::default();
    let model = build_model(job)?;

    job.kx_values()
        .into_iter()
        .map(|kx| -> Result<EquivalenceReport> {
            let setup = job.setup(kx);
            let report = check_parameterisation_equivalence(&solver, model.as_ref(), &setup)
                .map_err(|e| solver_error(&setup, e))?;
            println!("kx = {}", kx);
            print_equivalence(&report);
            Ok(report)
        })
        .collect()
}

fn format_list(values: &[Complex64]) -> String {
    let items: Vec<String> = values.iter().map(|v| format!("{}", v)).collect();
    format!("[{}]", items.join(", "))
}

/// Print both term lists side by side, followed by the deviations.
pub fn print_equivalence(report: &EquivalenceReport) {
    let (r1, rx1, ry1) = report.primary.image.to_lists();
    let (r2, rx2, ry2) = report.alternate.image.to_lists();
    println!("r_list_1 {}", format_list(&r1));
    println!("r_list_2 {}", format_list(&r2));
    println!("Rx_list_1 {}", format_list(&rx1));
    println!("Rx_list_2 {}", format_list(&rx2));
    println!("Ry_list_1 {}", format_list(&ry1));
    println!("Ry_list_2 {}", format_list(&ry2));
    println!(
        "image deviation {:.2e}, reconstruction deviation {:.2e}",
        report.image_deviation, report.reconstruction_deviation
    );
}

/// File stem shared by all outputs for the `index`-th kx.
pub fn output_stem(index: usize) -> String {
    format!("kx_{:03}", index)
}

/// Render the inverse image and the reference-vs-reconstruction overlay.
pub fn write_plots(report: &VerificationReport, dir: &Path, stem: &str, job: &JobConfig) -> Result<()> {
    let size = (job.output.image_width, job.output.image_height);
    let kx = report.setup.kx;

    let image_path = dir.join(format!("{}_inverse.svg", stem));
    plot::plot_waveform(
        &image_path,
        size,
        &format!("Inverse image, kx = {:.4}", kx),
        &report.grid,
        &report.inverse,
    )
    .map_err(|e| anyhow!("Failed to plot {}: {}", image_path.display(), e))?;

    let comparison_path = dir.join(format!("{}_comparison.svg", stem));
    plot::plot_waveform_comparison(
        &comparison_path,
        size,
        &format!("S1 (solid) vs AsymUP of inverse image (dashed), kx = {:.4}", kx),
        &report.grid,
        &report.reference,
        &report.reconstructed,
    )
    .map_err(|e| anyhow!("Failed to plot {}: {}", comparison_path.display(), e))?;

    println!("Plots written to: {}, {}", image_path.display(), comparison_path.display());
    Ok(())
}

/// Write the sampled waveforms to a CSV file with a metadata header.
pub fn write_waveform_csv(report: &VerificationReport, path: &Path, job: &JobConfig) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writeln!(file, "# AsymUP inverse-image verification")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# chi: {}", report.setup.chi)?;
    writeln!(file, "# phase: {}", report.setup.phase)?;
    writeln!(file, "# k0: {}", report.setup.k0)?;
    writeln!(file, "# kx: {}", report.setup.kx)?;
    writeln!(file, "# ky: {}", report.ky)?;
    writeln!(file, "# parameterisation: {:?}", report.image.parameterization)?;
    writeln!(file, "# coefficients: {}", report.model)?;
    writeln!(
        file,
        "# relative_error: {:.6e} (tolerance {:e})",
        report.relative_error, job.check.tolerance
    )?;
    for (i, t) in report.image.terms.iter().enumerate() {
        writeln!(file, "# term {}: r={}, Rx={}, Ry={}", i, t.r, t.rx, t.ry)?;
    }
    writeln!(file, "#")?;

    let mut columns = vec!["y".to_string()];
    for wave in ["inverse", "reconstructed", "reference"] {
        for part in ["x_re", "x_im", "y_re", "y_im"] {
            columns.push(format!("{}_{}", wave, part));
        }
    }
    writeln!(file, "{}", columns.join(","))?;

    for (i, y) in report.grid.points().iter().enumerate() {
        let mut row = vec![format!("{:.6}", y)];
        for wave in [&report.inverse, &report.reconstructed, &report.reference] {
            let x = wave.x()[i];
            let yv = wave.y()[i];
            for v in [x.re, x.im, yv.re, yv.im] {
                row.push(format!("{:.10e}", v));
            }
        }
        writeln!(file, "{}", row.join(","))?;
    }

    println!("Waveforms written to: {}", path.display());
    Ok(())
}

/// Write per-kx summaries (and equivalence results, if any) to JSON.
pub fn write_summary_json(output: &RunOutput, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let summary = serde_json::json!({
        "checks": output.reports.iter().map(|r| r.summary()).collect::<Vec<_>>(),
        "equivalence": output.equivalence.iter().map(|r| r.summary()).collect::<Vec<_>>(),
    });
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("Summary (JSON) written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn job(extra: &str) -> JobConfig {
        let content = format!(
            "[medium]\nchi = [1.0, 0.1]\nphase = [0.2, 0.3]\n[wave]\nkx = {{ values = [0.5, 1.5] }}\n[grid]\npoints = 101\n{}",
            extra
        );
        parse_config(&content).unwrap()
    }

    #[test]
    fn test_run_checks_passes_for_both_regimes() {
        let output = run_checks(&job("")).unwrap();
        assert_eq!(output.reports.len(), 2);
        assert_eq!(output.failures(1e-6), 0);
        assert!(output.equivalence.is_empty());
    }

    #[test]
    fn test_run_with_equivalence_and_symbolic_model() {
        let output = run_checks(&job("[check]\ncoefficients = \"symbolic\"\nequivalence = true")).unwrap();
        assert_eq!(output.equivalence.len(), 2);
        assert!(output.equivalence.iter().all(|r| r.agrees(1e-8)));
        assert_eq!(output.reports[0].model, "symbolic");
    }

    #[test]
    fn test_non_unique_kx_fails_with_regime() {
        let content = "[medium]\nchi = [1.0, 0.1]\nphase = [0.2, 0.3]\n[wave]\nkx = 1.2\n[grid]\npoints = 11";
        let job = parse_config(content).unwrap();
        let message = run_checks(&job).err().unwrap().to_string();
        assert!(message.contains("kx=1.2"), "{}", message);
        assert!(message.contains("a non-unique image"), "{}", message);
    }

    #[test]
    fn test_format_list() {
        let list = format_list(&[Complex64::new(1.0, -2.0), Complex64::new(0.0, 0.5)]);
        assert_eq!(list, "[1-2i, 0+0.5i]");
        assert_eq!(format_list(&[]), "[]");
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem(7), "kx_007");
    }

    #[test]
    fn test_csv_has_header_and_one_row_per_point() {
        let job = job("");
        let output = run_checks(&job).unwrap();
        let dir = std::env::temp_dir().join(format!("asymup-csv-{}", std::process::id()));
        let path = dir.join("waveforms.csv");
        write_waveform_csv(&output.reports[0], &path, &job).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let data: Vec<&str> = content.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(data.len(), 102);
        assert!(data[0].starts_with("y,inverse_x_re"));
        assert_eq!(data[1].split(',').count(), 13);
        std::fs::remove_dir_all(&dir).ok();
    }
}
