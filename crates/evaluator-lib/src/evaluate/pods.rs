//! Custom per-pod metric evaluation

use crate::error::{EvaluationError, EvaluationResult};
use crate::models::{GatheredMetric, MetricSourceType};
use crate::replicas::ReplicaCalculator;
use std::collections::HashSet;

/// Propose a replica count for a gathered pods metric.
///
/// Pods metrics have no readiness window, so no pods are ever rebalanced as
/// ignored.
pub fn evaluate(
    calculator: &ReplicaCalculator,
    current_replicas: i32,
    gathered: &GatheredMetric,
) -> EvaluationResult<i32> {
    let average_value = gathered
        .spec
        .pods
        .as_ref()
        .and_then(|source| source.target.average_value)
        .ok_or(EvaluationError::InvalidMetricSource {
            source_type: MetricSourceType::Pods,
        })?;
    let metric = gathered
        .pods
        .as_ref()
        .ok_or(EvaluationError::MissingPayload {
            source_type: MetricSourceType::Pods,
        })?;

    calculator.plain_metric_replicas(
        &metric.pod_metrics_info,
        current_replicas,
        average_value,
        metric.ready_pod_count,
        &metric.missing_pods,
        &HashSet::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricIdentifier, MetricSpec, MetricTarget, PodMetric, PodsMetric};

    fn gathered(values: &[(&str, i64)], target: MetricTarget) -> GatheredMetric {
        GatheredMetric::with_pods(
            MetricSpec::pods(MetricIdentifier::named("requests_per_second"), target),
            PodsMetric {
                pod_metrics_info: values
                    .iter()
                    .map(|(p, v)| (p.to_string(), PodMetric::synthetic(*v)))
                    .collect(),
                ready_pod_count: values.len() as i64,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_scale_up() {
        let metric = gathered(&[("a", 100), ("b", 100)], MetricTarget::average_value(50));
        assert_eq!(evaluate(&ReplicaCalculator::default(), 2, &metric).unwrap(), 4);
    }

    #[test]
    fn test_ignored_pods_are_not_rebalanced() {
        let mut metric = gathered(&[("a", 100), ("b", 100)], MetricTarget::average_value(50));
        if let Some(pods) = metric.pods.as_mut() {
            pods.ignored_pods.insert("c".to_string());
        }

        // fast path: ceil(2.0 * 2) even though a pod is ignored
        assert_eq!(evaluate(&ReplicaCalculator::default(), 3, &metric).unwrap(), 4);
    }

    #[test]
    fn test_value_target_is_invalid() {
        let metric = gathered(&[("a", 100)], MetricTarget::value(50));
        let err = evaluate(&ReplicaCalculator::default(), 1, &metric).unwrap_err();

        assert_eq!(
            err,
            EvaluationError::InvalidMetricSource {
                source_type: MetricSourceType::Pods
            }
        );
    }

    #[test]
    fn test_empty_metrics_divide_by_zero() {
        let metric = gathered(&[], MetricTarget::average_value(50));
        let err = evaluate(&ReplicaCalculator::default(), 1, &metric).unwrap_err();

        assert!(matches!(err, EvaluationError::DivideByZero(_)));
    }
}
