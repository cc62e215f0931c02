//! Resource metric evaluation (CPU, memory)

use crate::error::{EvaluationError, EvaluationResult};
use crate::models::{GatheredMetric, MetricSourceType};
use crate::replicas::ReplicaCalculator;

/// Propose a replica count for a gathered resource metric.
///
/// An average value target takes precedence over a utilization target.
pub fn evaluate(
    calculator: &ReplicaCalculator,
    current_replicas: i32,
    gathered: &GatheredMetric,
) -> EvaluationResult<i32> {
    let invalid = EvaluationError::InvalidMetricSource {
        source_type: MetricSourceType::Resource,
    };
    let target = &gathered.spec.resource.as_ref().ok_or(invalid.clone())?.target;
    let metric = gathered
        .resource
        .as_ref()
        .ok_or(EvaluationError::MissingPayload {
            source_type: MetricSourceType::Resource,
        })?;

    if let Some(average_value) = target.average_value {
        return calculator.plain_metric_replicas(
            &metric.pod_metrics_info,
            current_replicas,
            average_value,
            metric.ready_pod_count,
            &metric.missing_pods,
            &metric.ignored_pods,
        );
    }

    if let Some(utilization) = target.average_utilization {
        return calculator.resource_utilization_replicas(
            &metric.pod_metrics_info,
            &metric.requests,
            current_replicas,
            utilization,
            metric.ready_pod_count,
            &metric.missing_pods,
            &metric.ignored_pods,
        );
    }

    Err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricSpec, MetricTarget, PodMetric, ResourceMetric};

    fn resource_metric(usage: &[(&str, i64)], requests: &[(&str, i64)], ready: i64) -> ResourceMetric {
        ResourceMetric {
            pod_metrics_info: usage
                .iter()
                .map(|(p, v)| (p.to_string(), PodMetric::synthetic(*v)))
                .collect(),
            requests: requests.iter().map(|(p, v)| (p.to_string(), *v)).collect(),
            ready_pod_count: ready,
            ..Default::default()
        }
    }

    #[test]
    fn test_utilization_on_target_keeps_replicas() {
        let gathered = GatheredMetric::with_resource(
            MetricSpec::resource("cpu", MetricTarget::utilization(50)),
            resource_metric(&[("a", 5), ("b", 5)], &[("a", 10), ("b", 10)], 2),
        );

        let replicas = evaluate(&ReplicaCalculator::default(), 2, &gathered).unwrap();
        assert_eq!(replicas, 2);
    }

    #[test]
    fn test_utilization_scale_up_with_missing_pods() {
        let mut metric = resource_metric(
            &[("a", 20), ("b", 20)],
            &[("a", 10), ("b", 10), ("c", 10), ("d", 10)],
            2,
        );
        metric.missing_pods = ["c", "d"].iter().map(|s| s.to_string()).collect();
        let gathered = GatheredMetric::with_resource(
            MetricSpec::resource("cpu", MetricTarget::utilization(50)),
            metric,
        );

        let replicas = evaluate(&ReplicaCalculator::default(), 4, &gathered).unwrap();
        assert_eq!(replicas, 8);
    }

    #[test]
    fn test_average_value_checked_before_utilization() {
        let mut target = MetricTarget::utilization(50);
        target.average_value = Some(100);
        let gathered = GatheredMetric::with_resource(
            MetricSpec::resource("memory", target),
            // no requests, so a utilization calculation would fail
            resource_metric(&[("a", 300), ("b", 300)], &[], 2),
        );

        let replicas = evaluate(&ReplicaCalculator::default(), 2, &gathered).unwrap();
        assert_eq!(replicas, 6);
    }

    #[test]
    fn test_no_target_is_invalid() {
        let mut target = MetricTarget::value(100);
        target.value = None;
        let gathered = GatheredMetric::with_resource(
            MetricSpec::resource("cpu", target),
            resource_metric(&[("a", 5)], &[("a", 10)], 1),
        );

        let err = evaluate(&ReplicaCalculator::default(), 1, &gathered).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::InvalidMetricSource {
                source_type: MetricSourceType::Resource
            }
        );
    }

    #[test]
    fn test_missing_payload() {
        let gathered = GatheredMetric {
            spec: MetricSpec::resource("cpu", MetricTarget::utilization(50)),
            resource: None,
            pods: None,
            object: None,
            external: None,
        };

        let err = evaluate(&ReplicaCalculator::default(), 1, &gathered).unwrap_err();
        assert!(matches!(err, EvaluationError::MissingPayload { .. }));
    }
}
