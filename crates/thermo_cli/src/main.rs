//! Predator-prey temperature analysis driver.
//!
//! Usage: `thermo [--config FILE] <params|summary|simulate|bifurcation|run>`

mod export;
mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use thermo_core::config::AnalysisConfig;
use thermo_core::equilibrium::equilibrium_summary;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "thermo", version, author)]
#[command(about = "Temperature-dependent predator-prey equilibrium, stability and simulation analysis")]
struct Cli {
    /// JSON analysis configuration; omitted fields keep the reference values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print model parameters and the critical temperature
    Params,
    /// Classify every equilibrium at one temperature
    Summary {
        #[arg(long, short = 't', value_parser = parse_temperature)]
        temperature: f64,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Integrate fixed-temperature scenarios and write scenario_T*.csv
    Simulate {
        /// Temperatures to run (defaults to the configured scenarios)
        #[arg(long = "temperature", short = 't', value_delimiter = ',', value_parser = parse_temperature)]
        temperatures: Vec<f64>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Sweep temperatures and write bifurcation.csv
    Bifurcation {
        #[command(flatten)]
        sweep: SweepArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Parameters, all scenarios and the sweep in one go
    Run {
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Directory for CSV output
    #[arg(long = "out", default_value = "data")]
    out_dir: PathBuf,
}

#[derive(Args, Debug)]
struct SweepArgs {
    #[arg(long, value_parser = parse_temperature)]
    min: Option<f64>,
    #[arg(long, value_parser = parse_temperature)]
    max: Option<f64>,
    #[arg(long)]
    points: Option<usize>,
    /// Evaluate grid points on a single thread
    #[arg(long)]
    sequential: bool,
}

/// Parses a finite temperature in °C.
fn parse_temperature(arg: &str) -> std::result::Result<f64, String> {
    let value: f64 = arg.trim().parse().map_err(|err| format!("{err}"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("temperature must be finite, got {value}"))
    }
}

/// Initialize logging to stderr; `RUST_LOG` overrides the default filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,thermo_core=info,thermo_cli=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_config(text: &str) -> Result<AnalysisConfig> {
    let config: AnalysisConfig = serde_json::from_str(text).context("parsing analysis config")?;
    config.validate().context("validating analysis config")?;
    Ok(config)
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let config = parse_config(&text)?;
            info!(path = %path.display(), "loaded configuration");
            Ok(config)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

fn simulate(config: &AnalysisConfig, temperatures: &[f64], out_dir: &Path) -> Result<()> {
    let runner = config.runner();
    for &temperature in temperatures {
        let result = runner.run(&config.parameters, temperature)?;
        println!("{}", report::scenario(&result));
        export::save_scenario(out_dir, &result)?;
    }
    Ok(())
}

fn bifurcation(config: &AnalysisConfig, out_dir: &Path) -> Result<()> {
    let grid = config.sweep.grid()?;
    let record = config.scanner().scan(&config.parameters, &grid);
    println!("{}", report::bifurcation(&record));
    export::save_bifurcation(out_dir, &record)?;
    Ok(())
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    let started = Instant::now();

    match cli.command {
        Command::Params => println!("{}", report::parameters(&config)),
        Command::Summary { temperature, json } => {
            let summary = equilibrium_summary(&config.parameters, temperature);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", report::summary(&summary));
            }
        }
        Command::Simulate {
            temperatures,
            output,
        } => {
            let temperatures = if temperatures.is_empty() {
                config.scenario_temperatures.clone()
            } else {
                temperatures
            };
            simulate(&config, &temperatures, &output.out_dir)?;
        }
        Command::Bifurcation { sweep, output } => {
            config.sweep.min = sweep.min.unwrap_or(config.sweep.min);
            config.sweep.max = sweep.max.unwrap_or(config.sweep.max);
            config.sweep.points = sweep.points.unwrap_or(config.sweep.points);
            config.parallel &= !sweep.sequential;
            bifurcation(&config, &output.out_dir)?;
        }
        Command::Run { output } => {
            println!("{}", report::parameters(&config));
            simulate(&config, &config.scenario_temperatures, &output.out_dir)?;
            bifurcation(&config, &output.out_dir)?;
        }
    }

    info!(elapsed_s = started.elapsed().as_secs_f64(), "done");
    Ok(())
}
