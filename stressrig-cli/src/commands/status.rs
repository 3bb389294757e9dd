use anyhow::{bail, Context, Result};
use stressrig_config::StressConfig;
use stressrig_core::ResourceId;
use stressrig_execution::{parse_listing, resource_map, verify_scale, ClusterOps, OcCli};
use stressrig_resilience::Verdict;

/// Query one resource and report whether it has converged
pub async fn execute(config: &StressConfig, name: &str) -> Result<()> {
    let resource = resolve(config, name);
    let cluster = OcCli::new(&config.cluster);

    let output = cluster
        .query_status(&resource)
        .await
        .with_context(|| format!("Failed to query status of {}", resource))?;

    let rows = parse_listing(&output).context("Unexpected status listing")?;
    for row in &rows {
        println!(
            "{}\trevision {}\tdesired {}\tcurrent {}\t{}",
            row.name, row.revision, row.desired, row.current, row.trigger
        );
    }

    match verify_scale(&output, &resource) {
        Verdict::Converged => {
            println!("{} has converged", resource);
            Ok(())
        }
        Verdict::Retry => bail!("{} has not converged", resource),
        Verdict::Failed(reason) => bail!("cannot verify {}: {}", resource, reason),
    }
}

/// Logical image names take precedence over raw identifiers
fn resolve(config: &StressConfig, name: &str) -> ResourceId {
    resource_map(config)
        .resolve(name)
        .cloned()
        .unwrap_or_else(|| ResourceId::new(name))
}
