//! Subcommand implementations

pub mod evaluate;
pub mod gather;
pub mod simulate;

use anyhow::{Context, Result};
use evaluator_lib::{
    Evaluation, EvaluationError, Evaluator, EvaluatorMetrics, GatheredMetric, MultiMetricError,
    Proposal, StructuredLogger,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tabled::Tabled;
use tracing::info;

use crate::output::{color_replicas, print_info, print_json, print_warning, OutputFormat};

/// Read and parse a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {what} file {}", path.display()))
}

/// Failed metric as reported to the user
#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub metric: String,
    pub error: String,
}

/// Evaluation outcome as reported to the user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub current_replicas: i32,
    pub target_replicas: Option<i32>,
    pub partial: bool,
    pub proposals: Vec<Proposal>,
    pub errors: Vec<FailureReport>,
}

impl EvaluationReport {
    pub fn new(
        current_replicas: i32,
        outcome: &Result<Evaluation, MultiMetricError<EvaluationError>>,
    ) -> Self {
        let failures = |err: &MultiMetricError<EvaluationError>| {
            err.errors
                .iter()
                .map(|f| FailureReport {
                    metric: f.metric.clone(),
                    error: f.error.to_string(),
                })
                .collect::<Vec<_>>()
        };

        match outcome {
            Ok(evaluation) => Self {
                current_replicas,
                target_replicas: Some(evaluation.target_replicas),
                partial: evaluation.is_partial(),
                proposals: evaluation.proposals.clone(),
                errors: evaluation.failures.as_ref().map(failures).unwrap_or_default(),
            },
            Err(err) => Self {
                current_replicas,
                target_replicas: None,
                partial: false,
                proposals: Vec::new(),
                errors: failures(err),
            },
        }
    }
}

/// Row for the per-metric decision table
#[derive(Tabled)]
struct DecisionRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Proposed")]
    proposed: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// Print an evaluation report in the requested format
pub fn print_report(report: &EvaluationReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    let rows: Vec<DecisionRow> = report
        .proposals
        .iter()
        .map(|p| DecisionRow {
            metric: p.metric.clone(),
            proposed: color_replicas(report.current_replicas, p.replicas),
            error: String::new(),
        })
        .chain(report.errors.iter().map(|e| DecisionRow {
            metric: e.metric.clone(),
            proposed: "-".to_string(),
            error: e.error.clone(),
        }))
        .collect();

    if !rows.is_empty() {
        let table = tabled::Table::new(rows)
            .with(tabled::settings::Style::rounded())
            .to_string();
        println!("{}", table);
    }

    match report.target_replicas {
        Some(target) => {
            if report.partial {
                print_warning(&format!(
                    "{} of {} metrics failed, result is based on the rest",
                    report.errors.len(),
                    report.errors.len() + report.proposals.len()
                ));
            }
            print_info(&format!(
                "Target replicas: {} (current {}, {})",
                color_replicas(report.current_replicas, target),
                report.current_replicas,
                crate::output::scaling_direction(report.current_replicas, target)
            ));
        }
        None => print_warning("No metric produced a replica count"),
    }

    Ok(())
}

/// Settings shared by every subcommand
pub struct RunContext {
    pub format: OutputFormat,
    /// Where to write Prometheus metrics after an evaluation
    pub metrics_file: Option<PathBuf>,
}

/// Evaluate gathered metrics, report the outcome, and fail when no metric
/// produced a replica count
pub fn evaluate_and_report(
    evaluator: &Evaluator,
    metrics: &[GatheredMetric],
    current_replicas: i32,
    workload: &str,
    ctx: &RunContext,
) -> Result<()> {
    let logger = StructuredLogger::new(workload);
    let recorder = EvaluatorMetrics::new();

    let started = Instant::now();
    let outcome = evaluator.evaluate(metrics, current_replicas);
    recorder.record(&outcome, started.elapsed().as_secs_f64());

    match &outcome {
        Ok(evaluation) => {
            logger.log_evaluation(current_replicas, evaluation);
            if let Some(failures) = &evaluation.failures {
                logger.log_metric_failures("evaluate", failures);
            }
        }
        Err(err) => logger.log_metric_failures("evaluate", err),
    }

    print_report(&EvaluationReport::new(current_replicas, &outcome), ctx.format)?;

    if let Some(path) = &ctx.metrics_file {
        std::fs::write(path, recorder.render()?)
            .with_context(|| format!("Failed to write metrics file {}", path.display()))?;
        info!(path = %path.display(), "Wrote evaluation metrics");
    }

    outcome.map(|_| ()).map_err(Into::into)
}
