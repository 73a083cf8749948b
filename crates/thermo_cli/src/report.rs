//! Plain-text reports printed by the CLI.

use std::fmt::Write;

use thermo_core::bifurcation::BifurcationRecord;
use thermo_core::config::AnalysisConfig;
use thermo_core::equilibrium::{ClassifiedEquilibrium, EquilibriumSummary};
use thermo_core::scenario::ScenarioResult;
use thermo_core::stability::Eigenvalues;

const RULE: &str = "======================================================================";

pub fn parameters(config: &AnalysisConfig) -> String {
    let p = config.parameters.values();
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "TEMPERATURE-DEPENDENT PREDATOR-PREY MODEL PARAMETERS");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Prey:");
    let _ = writeln!(out, "  r0      = {} day^-1", p.r0);
    let _ = writeln!(out, "  K       = {} individuals/m^3", p.carrying_capacity);
    let _ = writeln!(out, "  alpha_r = {} degC^-1", p.alpha_r);
    let _ = writeln!(out, "Predator:");
    let _ = writeln!(out, "  a0      = {} per predator per day", p.a0);
    let _ = writeln!(out, "  b       = {}", p.b);
    let _ = writeln!(out, "  d0      = {} day^-1", p.d0);
    let _ = writeln!(out, "  alpha_d = {} degC^-1", p.alpha_d);
    let _ = writeln!(
        out,
        "Critical temperature: Tc = {:.2} degC",
        config.parameters.critical_temperature()
    );
    let _ = writeln!(out, "Scenarios: {:?} degC", config.scenario_temperatures);
    let _ = writeln!(
        out,
        "Sweep: {}-{} degC ({} points)",
        config.sweep.min, config.sweep.max, config.sweep.points
    );
    let _ = writeln!(
        out,
        "Integration: {}-{} days, output every {} days",
        config.scenario.t_start, config.scenario.t_end, config.scenario.output_step
    );
    let _ = write!(out, "{RULE}");
    out
}

fn eigenvalues(eigenvalues: &Eigenvalues) -> String {
    match *eigenvalues {
        Eigenvalues::RealPair { lambda1, lambda2 } => {
            format!("lambda1 = {lambda1:.4}, lambda2 = {lambda2:.4}")
        }
        Eigenvalues::ComplexConjugatePair { re, im } => {
            format!("lambda = {re:.4} +/- {im:.4}i")
        }
    }
}

fn equilibrium_line(out: &mut String, label: &str, eq: &ClassifiedEquilibrium) {
    let _ = writeln!(
        out,
        "{label}: R* = {:.4}, P* = {:.4}  [{}]",
        eq.point.prey, eq.point.predator, eq.stability.classification
    );
    let _ = writeln!(
        out,
        "    trace = {:.4}, det = {:.4}, {}",
        eq.stability.trace,
        eq.stability.determinant,
        eigenvalues(&eq.stability.eigenvalues)
    );
}

pub fn summary(summary: &EquilibriumSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "EQUILIBRIUM ANALYSIS AT T = {} degC", summary.temperature);
    equilibrium_line(&mut out, "1. Extinction ", &summary.extinction);
    equilibrium_line(&mut out, "2. Prey-only  ", &summary.prey_only);
    match &summary.coexistence {
        Some(eq) => equilibrium_line(&mut out, "3. Coexistence", eq),
        None => {
            let _ = writeln!(out, "3. Coexistence: does not exist (d(T) >= b*a0*K)");
        }
    }
    let tc = summary.critical_temperature;
    let _ = writeln!(out, "Critical temperature: Tc = {tc:.2} degC");
    let status = if summary.temperature < tc {
        "T < Tc: coexistence equilibrium exists"
    } else if summary.temperature > tc {
        "T > Tc: predator cannot persist, prey-only equilibrium is stable"
    } else {
        "T = Tc: bifurcation point"
    };
    let _ = write!(out, "Status: {status}");
    out
}

pub fn scenario(result: &ScenarioResult) -> String {
    format!(
        "T = {:>5.1} degC: final R = {:.4}, P = {:.4} ({} samples)",
        result.temperature,
        result.final_state.prey,
        result.final_state.predator,
        result.trajectory.len()
    )
}

pub fn bifurcation(record: &BifurcationRecord) -> String {
    let analytic = record.analytic_critical_temperature;
    match (record.observed_critical_temperature(), record.discrepancy()) {
        (Some(observed), Some(delta)) => format!(
            "Critical temperature: observed {observed:.4} degC, analytic {analytic:.4} degC (difference {delta:+.4})"
        ),
        _ => format!(
            "No crossing inside the sweep; analytic Tc = {analytic:.4} degC ({} of {} points coexist)",
            record.coexisting_count(),
            record.samples.len()
        ),
    }
}
