//! External metric evaluation

use crate::error::{EvaluationError, EvaluationResult};
use crate::models::{GatheredMetric, MetricSourceType};
use crate::replicas::ReplicaCalculator;
use crate::utilization::value_ratio;

const SOURCE: MetricSourceType = MetricSourceType::External;

/// Propose a replica count for a gathered external metric.
///
/// A per-pod average value target is checked before a total value target.
pub fn evaluate(
    calculator: &ReplicaCalculator,
    current_replicas: i32,
    gathered: &GatheredMetric,
) -> EvaluationResult<i32> {
    let invalid = EvaluationError::InvalidMetricSource { source_type: SOURCE };
    let target = &gathered.spec.external.as_ref().ok_or(invalid.clone())?.target;
    let metric = gathered
        .external
        .as_ref()
        .ok_or(EvaluationError::MissingPayload { source_type: SOURCE })?;

    if let Some(target_average) = target.average_value {
        let current = metric
            .current
            .average_value
            .ok_or(missing("current.averageValue"))?;
        return calculator.average_value_replicas(current_replicas, current, target_average);
    }

    if let Some(target_value) = target.value {
        let current = metric.current.value.ok_or(missing("current.value"))?;
        let ready_pod_count = metric.ready_pod_count.ok_or(missing("readyPodCount"))?;

        let usage_ratio = value_ratio(current, target_value)?;
        return Ok(calculator.usage_ratio_replicas(current_replicas, usage_ratio, ready_pod_count));
    }

    Err(invalid)
}

fn missing(field: &'static str) -> EvaluationError {
    EvaluationError::MissingValue {
        source_type: SOURCE,
        field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExternalMetric, MetricIdentifier, MetricSpec, MetricTarget, MetricValue};

    fn gathered(target: MetricTarget, current: MetricValue, ready: Option<i64>) -> GatheredMetric {
        GatheredMetric::with_external(
            MetricSpec::external(MetricIdentifier::named("queue_messages_ready"), target),
            ExternalMetric {
                current,
                ready_pod_count: ready,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_average_value_target() {
        let metric = gathered(
            MetricTarget::average_value(30_000),
            MetricValue {
                value: None,
                average_value: Some(150_000),
            },
            None,
        );

        assert_eq!(evaluate(&ReplicaCalculator::default(), 3, &metric).unwrap(), 5);
    }

    #[test]
    fn test_average_value_within_tolerance() {
        let metric = gathered(
            MetricTarget::average_value(30_000),
            MetricValue {
                value: None,
                average_value: Some(92_000),
            },
            None,
        );

        assert_eq!(evaluate(&ReplicaCalculator::default(), 3, &metric).unwrap(), 3);
    }

    #[test]
    fn test_value_target_scale_down() {
        let metric = gathered(
            MetricTarget::value(10_000),
            MetricValue {
                value: Some(3_000),
                average_value: None,
            },
            Some(3),
        );

        assert_eq!(evaluate(&ReplicaCalculator::default(), 3, &metric).unwrap(), 1);
    }

    #[test]
    fn test_scale_from_zero() {
        let metric = gathered(
            MetricTarget::value(10_000),
            MetricValue {
                value: Some(25_000),
                average_value: None,
            },
            Some(0),
        );

        assert_eq!(evaluate(&ReplicaCalculator::default(), 0, &metric).unwrap(), 3);
    }

    #[test]
    fn test_missing_current_average() {
        let metric = gathered(
            MetricTarget::average_value(30_000),
            MetricValue {
                value: Some(1),
                average_value: None,
            },
            None,
        );

        let err = evaluate(&ReplicaCalculator::default(), 3, &metric).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::MissingValue {
                source_type: MetricSourceType::External,
                field: "current.averageValue"
            }
        );
    }
}
