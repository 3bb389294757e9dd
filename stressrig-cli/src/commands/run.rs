use anyhow::{bail, Context, Result};
use std::fmt::Write;
use std::sync::Arc;
use stressrig_config::StressConfig;
use stressrig_execution::{build_suites, OcCli, RunReport, TestRunner};
use stressrig_logging::TracingEventSink;

/// Build the selected suites and run them against the configured cluster
pub async fn execute(config: &StressConfig, only: &[String], json: bool) -> Result<()> {
    let suites = build_suites(config, only).context("Invalid test definition")?;

    let runner = TestRunner::new(
        Arc::new(OcCli::new(&config.cluster)),
        config.options.clone(),
        TracingEventSink::shared(),
    );
    let report = runner.run(&suites).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize run report")?
        );
    } else {
        let mut text = String::new();
        write_summary(&mut text, &report).context("Failed to format run summary")?;
        print!("{}", text);
    }

    let failures = report.failures();
    if failures > 0 {
        bail!("{} action(s) failed", failures);
    }
    Ok(())
}

/// Write a human readable run summary
fn write_summary(out: &mut impl Write, report: &RunReport) -> std::fmt::Result {
    writeln!(out, "Run {}", report.run_id)?;

    for suite in &report.suites {
        writeln!(out, "{}: {} failed of {}", suite.name, suite.failures(), suite.actions.len())?;
        for action in &suite.actions {
            match &action.error {
                None => writeln!(out, "  [{}] {} ok ({}ms)", action.index, action.action, action.elapsed_ms)?,
                Some(error) => writeln!(
                    out,
                    "  [{}] {} FAILED ({}): {}",
                    action.index,
                    action.action,
                    action.kind.unwrap_or("error"),
                    error
                )?,
            }
        }
    }

    for (resource, r) in &report.resources {
        let state = r.state.map(|s| s.as_str()).unwrap_or("unknown");
        writeln!(
            out,
            "{}: {} lines, {} matched, monitor {}",
            resource, r.status.lines_seen, r.status.lines_matched, state
        )?;
        if let Some(error) = &r.status.last_error {
            writeln!(out, "  last error: {}", error)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use stressrig_core::{MatchStatus, MonitorState, ResourceId};
    use stressrig_execution::{ActionReport, ResourceReport, SuiteReport};

    #[test]
    fn test_summary_lists_failures_and_resources() {
        let mut resources = BTreeMap::new();
        resources.insert(
            ResourceId::new("svc"),
            ResourceReport {
                status: MatchStatus {
                    lines_seen: 12,
                    lines_matched: 2,
                    last_error: Some("exit status: 1".to_string()),
                },
                state: Some(MonitorState::Failed),
                monitors: 1,
            },
        );
        let report = RunReport {
            run_id: Default::default(),
            started_at: Default::default(),
            finished_at: Default::default(),
            suites: vec![SuiteReport {
                name: "up".to_string(),
                actions: vec![ActionReport {
                    index: 0,
                    action: "scale svc to 2 units".to_string(),
                    elapsed_ms: 0,
                    error: Some("could not satisfy scaling change".to_string()),
                    kind: Some("convergence_retry_exhausted"),
                }],
            }],
            resources,
        };

        let mut text = String::new();
        write_summary(&mut text, &report).unwrap();
        assert!(text.contains("up: 1 failed of 1"));
        assert!(text.contains("FAILED (convergence_retry_exhausted)"));
        assert!(text.contains("svc: 12 lines, 2 matched, monitor failed"));
        assert!(text.contains("last error: exit status: 1"));
    }

    /// Writer that refuses every write
    struct FullBuffer;

    impl Write for FullBuffer {
        fn write_str(&mut self, _: &str) -> std::fmt::Result {
            Err(std::fmt::Error)
        }
    }

    #[test]
    fn test_summary_propagates_write_errors() {
        let report = RunReport {
            run_id: Default::default(),
            started_at: Default::default(),
            finished_at: Default::default(),
            suites: Vec::new(),
            resources: BTreeMap::new(),
        };
        assert!(write_summary(&mut FullBuffer, &report).is_err());
    }
}
