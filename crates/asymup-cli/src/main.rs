//! AsymUP command-line interface.
//!
//! Verify inverse images from TOML job files:
//! ```sh
//! asymup-cli run job.toml
//! asymup-cli equivalence job.toml
//! asymup-cli validate job.toml
//! asymup-cli coefficients
//! ```

mod config;
mod plot;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use asymup_core::coefficients::{Coefficient, Symbolic, ARGUMENTS};

#[derive(Parser)]
#[command(name = "asymup-cli")]
#[command(about = "AsymUP: numerical verification of TE inverse images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the inverse image for every kx in a job file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare the primary and alternate parameterisations.
    Equivalence {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Validate a configuration file without running the checks.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Print the coefficient expressions and check that they compile.
    Coefficients,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("AsymUP inverse-image verification");
            println!("=================================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_checks(&job)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            log::info!("Writing outputs to {}", out_dir.display());

            for (index, report) in result.reports.iter().enumerate() {
                let stem = runner::output_stem(index);
                if job.output.save_plots {
                    runner::write_plots(report, &out_dir, &stem, &job)?;
                }
                if job.output.save_csv {
                    let csv_path = out_dir.join(format!("{}_waveforms.csv", stem));
                    runner::write_waveform_csv(report, &csv_path, &job)?;
                }
            }

            if job.output.save_json {
                runner::write_summary_json(&result, &out_dir.join("summary.json"))?;
            }

            let failures = result.failures(job.check.tolerance);
            if failures > 0 {
                anyhow::bail!(
                    "{} of {} checks exceeded the tolerance {:e}",
                    failures,
                    result.reports.len(),
                    job.check.tolerance
                );
            }
            println!("All {} checks passed.", result.reports.len());
            Ok(())
        }
        Commands::Equivalence { config } => {
            let job = config::load_config(&config)?;
            let reports = runner::run_equivalence(&job)?;
            let disagreeing = reports
                .iter()
                .filter(|r| !r.agrees(job.check.tolerance))
                .count();
            if disagreeing > 0 {
                anyhow::bail!(
                    "Parameterisations disagree for {} of {} kx values",
                    disagreeing,
                    reports.len()
                );
            }
            println!("Parameterisations agree for all {} kx values.", reports.len());
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            println!("Configuration is valid: {}", config.display());
            println!("  {} kx value(s), {} grid points", job.kx_values().len(), job.grid.points);
            Ok(())
        }
        Commands::Coefficients => {
            println!("Arguments: {}", ARGUMENTS.join(", "));
            println!();
            for which in Coefficient::ALL {
                println!("{} = {}", which.name(), which.source());
                println!();
            }
            Symbolic::new()
                .map_err(|e| anyhow::anyhow!("Coefficient expressions failed to compile: {}", e))?;
            println!("All {} expressions compile.", Coefficient::ALL.len());
            Ok(())
        }
    }
}
