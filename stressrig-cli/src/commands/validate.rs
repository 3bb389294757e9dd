use anyhow::{Context, Result};
use std::fmt::Write;
use stressrig_config::StressConfig;
use stressrig_execution::{build_suites, TestSuite};
use tracing::info;

/// Build every suite and print what would run
pub fn execute(config: &StressConfig) -> Result<()> {
    let suites = build_suites(config, &[]).context("Configuration validation failed")?;
    info!("Configuration validation passed");
    print!("{}", plan(&suites));
    Ok(())
}

fn plan(suites: &[TestSuite]) -> String {
    let mut out = String::new();
    for suite in suites {
        let _ = writeln!(out, "{} ({} actions)", suite.name, suite.len());
        for (index, action) in suite.actions.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", index + 1, action);
        }
    }
    out
}
