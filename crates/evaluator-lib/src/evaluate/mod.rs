//! Replica evaluation across one or more gathered metrics
//!
//! Each metric is evaluated by the function for its source type. The
//! proposals are then combined: the largest proposal wins, so the workload
//! always gets enough replicas for its most demanding metric. A metric that
//! fails to evaluate does not stop the others.

pub mod external;
pub mod object;
pub mod pods;
pub mod resource;

use crate::error::{EvaluationError, EvaluationResult, MetricFailure, MultiMetricError};
use crate::models::{GatheredMetric, MetricSourceType};
use crate::replicas::{ReplicaCalculator, DEFAULT_TOLERANCE};
use serde::Serialize;
use tracing::{debug, warn};

/// Replica count proposed by a single metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proposal {
    pub metric: String,
    pub replicas: i32,
}

/// Combined outcome of evaluating a set of metrics
#[derive(Debug)]
pub struct Evaluation {
    pub target_replicas: i32,
    /// Successful proposals in input order
    pub proposals: Vec<Proposal>,
    /// Set when some, but not all, metrics failed
    pub failures: Option<MultiMetricError<EvaluationError>>,
}

impl Evaluation {
    pub fn is_partial(&self) -> bool {
        self.failures.is_some()
    }
}

/// Evaluates gathered metrics into a target replica count
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluator {
    calculator: ReplicaCalculator,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl Evaluator {
    pub fn new(tolerance: f64) -> Self {
        Self {
            calculator: ReplicaCalculator::new(tolerance),
        }
    }

    pub fn calculator(&self) -> &ReplicaCalculator {
        &self.calculator
    }

    /// Evaluate every metric and combine the proposals.
    ///
    /// Returns `Err` only when no metric produced a proposal, including when
    /// `metrics` is empty. Partial failures are reported on the `Ok` value.
    pub fn evaluate(
        &self,
        metrics: &[GatheredMetric],
        current_replicas: i32,
    ) -> Result<Evaluation, MultiMetricError<EvaluationError>> {
        let mut target: Option<i32> = None;
        let mut proposals = Vec::with_capacity(metrics.len());
        let mut errors = Vec::new();

        for gathered in metrics {
            let label = gathered.label();
            match self.evaluate_single_metric(gathered, current_replicas) {
                Ok(replicas) => {
                    debug!(metric = %label, replicas, current_replicas, "Metric proposed replica count");
                    target = Some(target.map_or(replicas, |t| t.max(replicas)));
                    proposals.push(Proposal {
                        metric: label,
                        replicas,
                    });
                }
                Err(error) => {
                    warn!(metric = %label, error = %error, "Failed to evaluate metric");
                    errors.push(MetricFailure {
                        metric: label,
                        error,
                    });
                }
            }
        }

        let total = metrics.len();
        match target {
            Some(target_replicas) => Ok(Evaluation {
                target_replicas,
                proposals,
                failures: (!errors.is_empty()).then(|| MultiMetricError {
                    errors,
                    total,
                    partial: true,
                }),
            }),
            None => Err(MultiMetricError {
                errors,
                total,
                partial: false,
            }),
        }
    }

    /// Evaluate one metric, dispatching on its source type
    pub fn evaluate_single_metric(
        &self,
        gathered: &GatheredMetric,
        current_replicas: i32,
    ) -> EvaluationResult<i32> {
        let calculator = &self.calculator;
        match &gathered.spec.type_ {
            MetricSourceType::Resource => resource::evaluate(calculator, current_replicas, gathered),
            MetricSourceType::Pods => pods::evaluate(calculator, current_replicas, gathered),
            MetricSourceType::Object => object::evaluate(calculator, current_replicas, gathered),
            MetricSourceType::External => external::evaluate(calculator, current_replicas, gathered),
            other => Err(EvaluationError::UnknownMetricSourceType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ExternalMetric, MetricIdentifier, MetricSpec, MetricTarget, MetricValue, PodMetric,
        PodsMetric,
    };

    /// An external metric whose total value proposes exactly `replicas`
    fn proposing(name: &str, replicas: i64) -> GatheredMetric {
        GatheredMetric::with_external(
            MetricSpec::external(MetricIdentifier::named(name), MetricTarget::average_value(1000)),
            ExternalMetric {
                current: MetricValue {
                    value: None,
                    average_value: Some(replicas * 1000),
                },
                ..Default::default()
            },
        )
    }

    fn failing(name: &str) -> GatheredMetric {
        GatheredMetric::with_pods(
            MetricSpec::pods(MetricIdentifier::named(name), MetricTarget::average_value(50)),
            PodsMetric::default(),
        )
    }

    #[test]
    fn test_largest_proposal_wins() {
        let metrics = vec![proposing("a", 2), proposing("b", 5), proposing("c", 3)];

        let evaluation = Evaluator::default().evaluate(&metrics, 1).unwrap();

        assert_eq!(evaluation.target_replicas, 5);
        assert_eq!(evaluation.proposals.len(), 3);
        assert!(!evaluation.is_partial());
    }

    #[test]
    fn test_partial_failure_keeps_successful_proposal() {
        let metrics = vec![failing("qps"), proposing("queue", 3)];

        let evaluation = Evaluator::default().evaluate(&metrics, 1).unwrap();

        assert_eq!(evaluation.target_replicas, 3);
        let failures = evaluation.failures.unwrap();
        assert!(failures.partial);
        assert_eq!(failures.errors.len(), 1);
        assert_eq!(failures.total, 2);
        assert_eq!(failures.errors[0].metric, "Pods/qps");
    }

    #[test]
    fn test_zero_proposal_does_not_lower_target() {
        let metrics = vec![failing("qps"), proposing("a", 1), proposing("b", 0)];

        let evaluation = Evaluator::default().evaluate(&metrics, 4).unwrap();

        assert_eq!(evaluation.target_replicas, 1);
    }

    #[test]
    fn test_all_failed_is_total_failure() {
        let metrics = vec![failing("a"), failing("b")];

        let err = Evaluator::default().evaluate(&metrics, 2).unwrap_err();

        assert!(!err.partial);
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.errors[0].metric, "Pods/a");
        assert!(err.to_string().starts_with("invalid metrics (2 invalid out of 2)"));
    }

    #[test]
    fn test_empty_input_is_total_failure() {
        let err = Evaluator::default().evaluate(&[], 2).unwrap_err();

        assert!(!err.partial);
        assert_eq!(err.total, 0);
        assert!(err.errors.is_empty());
    }

    #[test]
    fn test_unknown_source_type() {
        let json = r#"{ "spec": { "type": "ContainerResource" } }"#;
        let gathered: GatheredMetric = serde_json::from_str(json).unwrap();

        let err = Evaluator::default()
            .evaluate_single_metric(&gathered, 1)
            .unwrap_err();

        assert_eq!(
            err,
            EvaluationError::UnknownMetricSourceType("ContainerResource".to_string())
        );
    }

    #[test]
    fn test_unknown_source_type_reports_its_name() {
        let json = r#"{ "spec": { "type": "Foo" } }"#;
        let gathered: GatheredMetric = serde_json::from_str(json).unwrap();

        let err = Evaluator::default()
            .evaluate_single_metric(&gathered, 1)
            .unwrap_err();

        assert_eq!(err.to_string(), r#"unknown metric source type "Foo""#);
    }

    #[test]
    fn test_evaluation_leaves_input_untouched() {
        let mut pods = PodsMetric {
            ready_pod_count: 2,
            ..Default::default()
        };
        pods.pod_metrics_info
            .insert("a".to_string(), PodMetric::synthetic(100));
        pods.pod_metrics_info
            .insert("b".to_string(), PodMetric::synthetic(100));
        pods.missing_pods.insert("c".to_string());
        let metrics = vec![GatheredMetric::with_pods(
            MetricSpec::pods(MetricIdentifier::named("qps"), MetricTarget::average_value(50)),
            pods,
        )];
        let before = metrics.clone();

        Evaluator::default().evaluate(&metrics, 3).unwrap();

        assert_eq!(metrics, before);
    }
}
