//! Gather metrics from a cluster snapshot

use anyhow::{Context, Result};
use evaluator_lib::{selector, GatherConfig, GatheredMetric, Gatherer, MetricSpec, Snapshot, StructuredLogger};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::read_json;
use crate::output::{print_json, print_success, print_warning};

/// Where to gather from and what to gather
pub struct GatherRequest<'a> {
    pub snapshot: &'a Path,
    pub specs: &'a Path,
    pub namespace: &'a str,
    /// `kubectl`-style label selector for the scaled pods
    pub selector: &'a str,
}

/// Gather metrics for every spec, warning about specs that could not be
/// gathered. Fails only if nothing could be gathered.
pub async fn gather_metrics(
    request: &GatherRequest<'_>,
    config: GatherConfig,
) -> Result<Vec<GatheredMetric>> {
    let snapshot = Snapshot::load(request.snapshot)?;
    let specs: Vec<MetricSpec> = read_json(request.specs, "metric specs")?;
    let pod_selector = selector::parse(request.selector)
        .with_context(|| format!("Invalid pod selector {:?}", request.selector))?;

    info!(
        specs = specs.len(),
        pods = snapshot.pods.len(),
        namespace = %request.namespace,
        selector = %request.selector,
        "Gathering metrics from snapshot"
    );

    let gatherer = Gatherer::from_source(Arc::new(snapshot), config);
    let logger = StructuredLogger::new(format!("{}/{}", request.namespace, request.selector));

    match gatherer.gather(&specs, request.namespace, &pod_selector).await {
        Ok(gathered) => {
            if let Some(failures) = &gathered.failures {
                logger.log_metric_failures("gather", failures);
                for failure in &failures.errors {
                    print_warning(&format!("Skipping {}", failure));
                }
            }
            Ok(gathered.metrics)
        }
        Err(err) => {
            logger.log_metric_failures("gather", &err);
            Err(err.into())
        }
    }
}

/// Gather metrics and write them as JSON to `output`, or stdout
pub async fn run(request: &GatherRequest<'_>, config: GatherConfig, output: Option<&Path>) -> Result<()> {
    let metrics = gather_metrics(request, config).await?;

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&metrics)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!(
                "Gathered {} metrics into {}",
                metrics.len(),
                path.display()
            ));
        }
        None => print_json(&metrics)?,
    }

    Ok(())
}
