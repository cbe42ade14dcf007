//! TOML configuration deserialisation for verification jobs.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use asymup_core::check::CheckSetup;
use asymup_core::coefficients::ModelKind;
use asymup_core::solver::Parameterization;
use asymup_core::types::{PhaseFactors, DEFAULT_GRID_POINTS, DEFAULT_YMAX};
use num_complex::Complex64;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub medium: MediumConfig,
    pub wave: WaveConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub check: CheckConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// A complex number: `1.0`, `[1.0, 0.1]` or `{ re = 1.0, im = 0.1 }`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum ComplexValue {
    Real(f64),
    Pair([f64; 2]),
    Parts {
        re: f64,
        #[serde(default)]
        im: f64,
    },
}

impl ComplexValue {
    pub fn value(&self) -> Complex64 {
        match *self {
            ComplexValue::Real(re) => Complex64::new(re, 0.0),
            ComplexValue::Pair([re, im]) => Complex64::new(re, im),
            ComplexValue::Parts { re, im } => Complex64::new(re, im),
        }
    }
}

/// Susceptibility and phase of the bound.
#[derive(Debug, Deserialize)]
pub struct MediumConfig {
    pub chi: ComplexValue,
    pub phase: ComplexValue,
}

impl MediumConfig {
    fn validate(&self) -> Result<()> {
        let chi = self.chi.value();
        let phase = self.phase.value();
        if !(chi.re.is_finite() && chi.im.is_finite() && phase.re.is_finite() && phase.im.is_finite()) {
            return Err(anyhow!("chi and phase must be finite (chi={}, phase={})", chi, phase));
        }
        if chi.norm() == 0.0 {
            return Err(anyhow!("chi must be non-zero"));
        }
        if PhaseFactors::from_physical(chi, phase).mf == 0.0 {
            return Err(anyhow!(
                "Im(phase / conj(chi)) must be non-zero (chi={}, phase={})",
                chi,
                phase
            ));
        }
        Ok(())
    }
}

/// In-plane wavevector specification: a single value, a range or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum KxSpec {
    Single(f64),
    Range { range: [f64; 2], points: usize },
    List { values: Vec<f64> },
}

impl KxSpec {
    pub fn values(&self) -> Vec<f64> {
        match self {
            KxSpec::Single(kx) => vec![*kx],
            KxSpec::Range { range, points } => {
                let start = range[0];
                let end = range[1];
                (0..*points)
                    .map(|i| start + (end - start) * i as f64 / (*points - 1).max(1) as f64)
                    .collect()
            }
            KxSpec::List { values } => values.clone(),
        }
    }
}

/// Free-space wavenumber and the Fourier components to check.
#[derive(Debug, Deserialize)]
pub struct WaveConfig {
    #[serde(default = "default_k0")]
    pub k0: f64,
    pub kx: KxSpec,
}

/// Relative distance of |kx| from k0 below which ky counts as zero.
const GRAZING_TOLERANCE: f64 = 1e-12;

fn default_k0() -> f64 {
    1.0
}

impl WaveConfig {
    fn validate(&self) -> Result<()> {
        if !(self.k0.is_finite() && self.k0 > 0.0) {
            return Err(anyhow!("k0 must be positive, got {}", self.k0));
        }
        if let KxSpec::Range { points, .. } = self.kx {
            if points == 0 {
                return Err(anyhow!("kx range needs at least one point"));
            }
        }
        let values = self.kx.values();
        if values.is_empty() {
            return Err(anyhow!("No kx values given"));
        }
        for kx in values {
            if !kx.is_finite() {
                return Err(anyhow!("kx must be finite, got {}", kx));
            }
            if (kx.abs() - self.k0).abs() <= GRAZING_TOLERANCE * self.k0 {
                return Err(anyhow!(
                    "kx={} is at k0={} (within a relative {:e}), where ky vanishes and the source is singular",
                    kx,
                    self.k0,
                    GRAZING_TOLERANCE
                ));
            }
        }
        Ok(())
    }
}

/// Sampling of the y axis.
#[derive(Debug, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_ymax")]
    pub ymax: f64,
    #[serde(default = "default_points")]
    pub points: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            ymax: default_ymax(),
            points: default_points(),
        }
    }
}

fn default_ymax() -> f64 {
    DEFAULT_YMAX
}
fn default_points() -> usize {
    DEFAULT_GRID_POINTS
}

impl GridConfig {
    fn validate(&self) -> Result<()> {
        if !(self.ymax.is_finite() && self.ymax > 0.0) {
            return Err(anyhow!("ymax must be positive, got {}", self.ymax));
        }
        if self.points < 2 {
            return Err(anyhow!("The grid needs at least 2 points, got {}", self.points));
        }
        Ok(())
    }
}

/// What to verify and how.
#[derive(Debug, Deserialize)]
pub struct CheckConfig {
    #[serde(default)]
    pub parameterisation: Parameterization,
    /// Coefficient model used for the reconstruction.
    #[serde(default)]
    pub coefficients: ModelKind,
    /// Largest accepted relative error (default: 1e-6).
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Also compare both parameterisations (default: false).
    #[serde(default)]
    pub equivalence: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            parameterisation: Parameterization::default(),
            coefficients: ModelKind::default(),
            tolerance: default_tolerance(),
            equivalence: false,
        }
    }
}

fn default_tolerance() -> f64 {
    1e-6
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to render SVG plots (default: true).
    #[serde(default = "default_true")]
    pub save_plots: bool,
    /// Whether to save sampled waveforms as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_csv: bool,
    /// Whether to save a JSON summary (default: false).
    #[serde(default)]
    pub save_json: bool,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_plots: true,
            save_csv: true,
            save_json: false,
            image_width: default_image_width(),
            image_height: default_image_height(),
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}
fn default_image_width() -> u32 {
    1600
}
fn default_image_height() -> u32 {
    400
}

impl JobConfig {
    pub fn validate(&self) -> Result<()> {
        self.medium.validate().context("Invalid [medium] section")?;
        self.wave.validate().context("Invalid [wave] section")?;
        self.grid.validate().context("Invalid [grid] section")?;
        if !(self.check.tolerance > 0.0) {
            return Err(anyhow!("tolerance must be positive, got {}", self.check.tolerance));
        }
        if self.output.image_width == 0 || self.output.image_height == 0 {
            return Err(anyhow!(
                "Image size must be positive ({}x{})",
                self.output.image_width,
                self.output.image_height
            ));
        }
        Ok(())
    }

    /// Verification inputs for one in-plane wavevector.
    pub fn setup(&self, kx: f64) -> CheckSetup {
        CheckSetup {
            chi: self.medium.chi.value(),
            phase: self.medium.phase.value(),
            k0: self.wave.k0,
            kx,
            ymax: self.grid.ymax,
            points: self.grid.points,
            parameterization: self.check.parameterisation,
        }
    }

    pub fn kx_values(&self) -> Vec<f64> {
        self.wave.kx.values()
    }
}

/// Parse a TOML job configuration.
pub fn parse_config(content: &str) -> Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load, parse and validate a TOML job configuration file.
pub fn load_config(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid job file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const MINIMAL: &str = r#"
        [medium]
        chi = [1.0, 0.1]
        phase = [0.2, 0.3]

        [wave]
        kx = 0.5
    "#;

    #[test]
    fn test_minimal_job_uses_defaults() {
        let job = parse_config(MINIMAL).unwrap();
        assert_eq!(job.wave.k0, 1.0);
        assert_eq!(job.kx_values(), vec![0.5]);
        assert_eq!(job.grid.points, 1000);
        assert_eq!(job.grid.ymax, 10.0);
        assert_eq!(job.check.parameterisation, Parameterization::Primary);
        assert_eq!(job.check.coefficients, ModelKind::ClosedForm);
        assert_eq!(job.check.tolerance, 1e-6);
        assert!(!job.check.equivalence);
        assert_eq!(job.output.directory, "./output");
        assert!(job.output.save_plots);
        assert!(job.output.save_csv);
        assert!(!job.output.save_json);
        assert_eq!((job.output.image_width, job.output.image_height), (1600, 400));

        let setup = job.setup(0.5);
        assert_eq!(setup.chi, Complex64::new(1.0, 0.1));
        assert_eq!(setup.phase, Complex64::new(0.2, 0.3));
    }

    #[test]
    fn test_complex_spellings() {
        let job = parse_config(
            r#"
            [medium]
            chi = 2
            phase = { re = 0.5, im = 0.1 }
            [wave]
            kx = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(job.medium.chi.value(), Complex64::new(2.0, 0.0));
        assert_eq!(job.medium.phase.value(), Complex64::new(0.5, 0.1));
    }

    #[test]
    fn test_kx_range_and_list() {
        let job = parse_config(
            r#"
            [medium]
            chi = [1.0, 0.1]
            phase = [0.2, 0.3]
            [wave]
            k0 = 2.0
            kx = { range = [0.0, 1.0], points = 5 }
            [check]
            parameterisation = "alternate"
            coefficients = "symbolic"
            equivalence = true
            "#,
        )
        .unwrap();
        let values = job.kx_values();
        assert_eq!(values.len(), 5);
        assert_relative_eq!(values[1], 0.25);
        assert_relative_eq!(values[4], 1.0);
        assert_eq!(job.check.parameterisation, Parameterization::Alternate);
        assert_eq!(job.check.coefficients, ModelKind::Symbolic);
        assert!(job.check.equivalence);

        let spec: KxSpec = toml::from_str::<WaveConfig>("kx = { values = [0.1, 1.5] }")
            .unwrap()
            .kx;
        assert_eq!(spec.values(), vec![0.1, 1.5]);
    }

    #[test]
    fn test_single_point_range() {
        let spec = KxSpec::Range {
            range: [0.3, 0.9],
            points: 1,
        };
        assert_eq!(spec.values(), vec![0.3]);
    }

    #[test]
    fn test_validation_failures() {
        let bad = [
            // kx == k0: ky vanishes.
            "[medium]\nchi = [1.0, 0.1]\nphase = [0.2, 0.3]\n[wave]\nkx = 1.0",
            // One ulp past k0, and -k0 at a larger k0.
            "[medium]\nchi = [1.0, 0.1]\nphase = [0.2, 0.3]\n[wave]\nkx = 1.0000000000000002",
            "[medium]\nchi = [1.0, 0.1]\nphase = [0.2, 0.3]\n[wave]\nk0 = 3.0\nkx = -3.0000000000000004",
            // Real chi and phase: vanishing material factor.
            "[medium]\nchi = 1.0\nphase = 0.5\n[wave]\nkx = 0.5",
            "[medium]\nchi = [1.0, 0.1]\nphase = [0.2, 0.3]\n[wave]\nk0 = -1.0\nkx = 0.5",
            "[medium]\nchi = [1.0, 0.1]\nphase = [0.2, 0.3]\n[wave]\nkx = 0.5\n[grid]\npoints = 1",
            "[medium]\nchi = [1.0, 0.1]\nphase = [0.2, 0.3]\n[wave]\nkx = { values = [] }",
            "[medium]\nchi = [1.0, 0.1]\nphase = [0.2, 0.3]\n[wave]\nkx = 0.5\n[check]\ntolerance = 0.0",
        ];
        for content in bad {
            assert!(parse_config(content).is_err(), "Accepted: {}", content);
        }
    }

    #[test]
    fn test_near_grazing_kx_is_accepted() {
        let content = "[medium]\nchi = [1.0, 0.1]\nphase = [0.2, 0.3]\n[wave]\nkx = { values = [0.9999, 1.0001] }";
        assert!(parse_config(content).is_ok());
    }

    #[test]
    fn test_unknown_parameterisation_is_rejected() {
        let content = format!("{}\n[check]\nparameterisation = \"tertiary\"", MINIMAL);
        assert!(parse_config(&content).is_err());
    }
}
