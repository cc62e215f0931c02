//! Evaluate previously gathered metrics

use anyhow::Result;
use evaluator_lib::{Evaluator, GatheredMetric};
use std::path::Path;
use tracing::info;

use super::{evaluate_and_report, read_json, RunContext};

/// Evaluate the gathered metrics stored in `input` against `current_replicas`
pub fn run(
    evaluator: &Evaluator,
    input: &Path,
    current_replicas: i32,
    ctx: &RunContext,
) -> Result<()> {
    let metrics: Vec<GatheredMetric> = read_json(input, "gathered metrics")?;
    info!(
        metrics = metrics.len(),
        current_replicas,
        input = %input.display(),
        "Evaluating gathered metrics"
    );

    let workload = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workload".to_string());

    evaluate_and_report(evaluator, &metrics, current_replicas, &workload, ctx)
}
