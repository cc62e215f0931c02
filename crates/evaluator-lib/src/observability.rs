//! Observability for replica evaluation
//!
//! Provides:
//! - Prometheus metrics (evaluation counts and latency, failed metrics, proposed replicas)
//! - Structured logging of evaluation outcomes with tracing

use crate::error::{EvaluationError, MultiMetricError};
use crate::evaluate::Evaluation;
use anyhow::Result;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for evaluation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5];

/// Histogram buckets for proposed replica counts
const REPLICA_BUCKETS: &[f64] = &[0.0, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0, 55.0, 100.0];

static GLOBAL_METRICS: OnceLock<EvaluatorMetricsInner> = OnceLock::new();

struct EvaluatorMetricsInner {
    evaluations: IntCounter,
    partial_evaluations: IntCounter,
    failed_evaluations: IntCounter,
    failed_metrics: IntCounterVec,
    evaluation_latency_seconds: Histogram,
    target_replicas: Histogram,
}

impl EvaluatorMetricsInner {
    fn new() -> Self {
        Self {
            evaluations: register_int_counter!(
                "replica_evaluator_evaluations_total",
                "Total number of multi-metric evaluations"
            )
            .expect("Failed to register evaluations_total"),

            partial_evaluations: register_int_counter!(
                "replica_evaluator_partial_evaluations_total",
                "Evaluations that produced a result while some metrics failed"
            )
            .expect("Failed to register partial_evaluations_total"),

            failed_evaluations: register_int_counter!(
                "replica_evaluator_failed_evaluations_total",
                "Evaluations in which every metric failed"
            )
            .expect("Failed to register failed_evaluations_total"),

            failed_metrics: register_int_counter_vec!(
                "replica_evaluator_failed_metrics_total",
                "Metrics that failed to evaluate, by metric label",
                &["metric"]
            )
            .expect("Failed to register failed_metrics_total"),

            evaluation_latency_seconds: register_histogram!(
                "replica_evaluator_evaluation_latency_seconds",
                "Time spent evaluating a set of gathered metrics",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register evaluation_latency_seconds"),

            target_replicas: register_histogram!(
                "replica_evaluator_target_replicas",
                "Target replica counts produced by evaluations",
                REPLICA_BUCKETS.to_vec()
            )
            .expect("Failed to register target_replicas"),
        }
    }
}

/// Handle to the process-wide evaluator metrics.
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct EvaluatorMetrics {
    _private: (),
}

impl Default for EvaluatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluatorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EvaluatorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EvaluatorMetricsInner {
        GLOBAL_METRICS.get_or_init(EvaluatorMetricsInner::new)
    }

    /// Record the outcome of a multi-metric evaluation
    pub fn record(
        &self,
        outcome: &Result<Evaluation, MultiMetricError<EvaluationError>>,
        duration_secs: f64,
    ) {
        let inner = self.inner();
        inner.evaluations.inc();
        inner.evaluation_latency_seconds.observe(duration_secs);

        let failures = match outcome {
            Ok(evaluation) => {
                inner
                    .target_replicas
                    .observe(f64::from(evaluation.target_replicas));
                if evaluation.is_partial() {
                    inner.partial_evaluations.inc();
                }
                evaluation.failures.as_ref()
            }
            Err(err) => {
                inner.failed_evaluations.inc();
                Some(err)
            }
        };

        for failure in failures.iter().flat_map(|f| f.errors.iter()) {
            inner
                .failed_metrics
                .with_label_values(&[failure.metric.as_str()])
                .inc();
        }
    }

    /// Render all registered metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Structured logger for evaluation events
#[derive(Clone)]
pub struct StructuredLogger {
    workload: String,
}

impl StructuredLogger {
    /// `workload` identifies what is being scaled, e.g. `shop/web`
    pub fn new(workload: impl Into<String>) -> Self {
        Self {
            workload: workload.into(),
        }
    }

    /// Log the combined result of an evaluation
    pub fn log_evaluation(&self, current_replicas: i32, evaluation: &Evaluation) {
        let failed = evaluation
            .failures
            .as_ref()
            .map_or(0, |f| f.errors.len());

        info!(
            event = "replicas_evaluated",
            workload = %self.workload,
            current_replicas,
            target_replicas = evaluation.target_replicas,
            metrics = evaluation.proposals.len() + failed,
            failed_metrics = failed,
            partial = evaluation.is_partial(),
            "Evaluated target replica count"
        );
    }

    /// Log every failed metric of a run
    pub fn log_metric_failures<E: std::fmt::Display>(&self, stage: &str, err: &MultiMetricError<E>) {
        for failure in &err.errors {
            warn!(
                event = "metric_evaluation_failed",
                workload = %self.workload,
                stage = %stage,
                metric = %failure.metric,
                error = %failure.error,
                partial = err.partial,
                "Metric could not be used"
            );
        }
    }
}
