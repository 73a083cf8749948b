//! CSV output for scenarios and temperature sweeps.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use thermo_core::bifurcation::{BifurcationRecord, BifurcationSample};
use thermo_core::scenario::{ScenarioResult, Trajectory};
use tracing::info;

pub const BIFURCATION_FILE: &str = "bifurcation.csv";

/// One row of `bifurcation.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct BifurcationRow {
    pub temperature: f64,
    #[serde(rename = "R_star")]
    pub prey: f64,
    #[serde(rename = "P_star")]
    pub predator: f64,
    pub coexistence_exists: bool,
    pub trace: f64,
    pub determinant: f64,
    pub lambda1_re: f64,
    pub lambda1_im: f64,
    pub lambda2_re: f64,
    pub lambda2_im: f64,
    pub classification: &'static str,
}

impl From<&BifurcationSample> for BifurcationRow {
    fn from(sample: &BifurcationSample) -> Self {
        let [lambda1, lambda2] = sample.stability.eigenvalues.to_complex();
        Self {
            temperature: sample.temperature,
            prey: sample.equilibrium.prey,
            predator: sample.equilibrium.predator,
            coexistence_exists: sample.equilibrium.exists,
            trace: sample.stability.trace,
            determinant: sample.stability.determinant,
            lambda1_re: lambda1.re,
            lambda1_im: lambda1.im,
            lambda2_re: lambda2.re,
            lambda2_im: lambda2.im,
            classification: sample.stability.classification.as_str(),
        }
    }
}

/// `scenario_T{T}.csv`, with `T` truncated towards zero.
pub fn scenario_file_name(temperature: f64) -> String {
    format!("scenario_T{}.csv", temperature.trunc() as i64)
}

pub fn write_trajectory<W: io::Write>(writer: W, trajectory: &Trajectory) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for sample in trajectory.samples() {
        csv.serialize(sample)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_bifurcation<W: io::Write>(writer: W, record: &BifurcationRecord) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for sample in &record.samples {
        csv.serialize(BifurcationRow::from(sample))?;
    }
    csv.flush()?;
    Ok(())
}

fn create_in(dir: &Path, name: &str) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    Ok((file, path))
}

pub fn save_scenario(dir: &Path, result: &ScenarioResult) -> Result<PathBuf> {
    let (file, path) = create_in(dir, &scenario_file_name(result.temperature))?;
    write_trajectory(file, &result.trajectory)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), rows = result.trajectory.len(), "scenario written");
    Ok(path)
}

pub fn save_bifurcation(dir: &Path, record: &BifurcationRecord) -> Result<PathBuf> {
    let (file, path) = create_in(dir, BIFURCATION_FILE)?;
    write_bifurcation(file, record).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), rows = record.samples.len(), "bifurcation table written");
    Ok(path)
}
